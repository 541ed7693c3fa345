//! Window tiling: aggregate site counts into fixed-size, fixed-step windows
//!
//! Windows on a chromosome start at `0, S, 2S, ...` and span `[start, start + W)`.
//! The number of windows is `max(1, floor((max_pos - (W - S)) / S) + 1)`, so the
//! last window overhangs the largest observed position by less than one window.
//! With `S < W` windows overlap and a site feeds every window containing it;
//! with `S > W` there are gaps between windows and sites in a gap are not counted.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{SampleLayout, SiteRecord, WindowAggregate, WindowKey};
use crate::error::{MethDiffError, Result};

/// Parameters for window tiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingParams {
    /// Window width in bases
    pub window_size: u64,
    /// Distance between consecutive window starts
    pub step_size: u64,
    /// Minimum number of covered cytosines for a window to be emitted
    pub min_sites: u32,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            window_size: 1000,
            step_size: 1000,
            min_sites: 1,
        }
    }
}

impl TilingParams {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(MethDiffError::InvalidConfig {
                reason: "window_size must be greater than 0".to_string(),
            });
        }
        if self.step_size == 0 {
            return Err(MethDiffError::InvalidConfig {
                reason: "step_size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Number of windows tiled on a chromosome whose largest site position is `max_pos`
pub fn window_count(max_pos: u64, window_size: u64, step_size: u64) -> u64 {
    // floor((max_pos - (W - S)) / S) + 1, at least one window
    let reach = max_pos.saturating_add(step_size);
    if reach < window_size {
        1
    } else {
        ((reach - window_size) / step_size + 1).max(1)
    }
}

/// Indices of the windows containing `position`, restricted to `0..n_windows`
fn window_range(position: u64, params: &TilingParams, n_windows: u64) -> std::ops::Range<u64> {
    let (w, s) = (params.window_size, params.step_size);
    // start = k * s must satisfy start <= position < start + w
    let first = if position >= w { (position - w) / s + 1 } else { 0 };
    let last = (position / s).min(n_windows.saturating_sub(1));
    if first > last {
        first..first
    } else {
        first..last + 1
    }
}

#[derive(Default)]
struct WindowAccumulator {
    coverage: u64,
    methylated: u64,
    n_sites: u32,
}

/// Tile the sites of one sample on one chromosome
///
/// Uncovered sites are ignored. Windows with fewer than `min_sites` covered
/// cytosines are not emitted. Output is sorted by window start.
pub fn tile_chromosome(
    sample_id: &str,
    chromosome: &str,
    sites: &[&SiteRecord],
    params: &TilingParams,
) -> Vec<WindowAggregate> {
    let covered: Vec<&SiteRecord> = sites.iter().copied().filter(|s| s.coverage > 0).collect();
    let max_pos = match covered.iter().map(|s| s.position).max() {
        Some(p) => p,
        None => return Vec::new(),
    };
    let n_windows = window_count(max_pos, params.window_size, params.step_size);

    let mut windows: BTreeMap<u64, WindowAccumulator> = BTreeMap::new();
    for site in covered {
        for k in window_range(site.position, params, n_windows) {
            let acc = windows.entry(k).or_default();
            acc.coverage += site.coverage as u64;
            acc.methylated += site.methylated as u64;
            acc.n_sites += 1;
        }
    }

    windows
        .into_iter()
        .filter(|(_, acc)| acc.n_sites >= params.min_sites)
        .map(|(k, acc)| WindowAggregate {
            key: WindowKey::new(chromosome, k * params.step_size, params.window_size),
            sample_id: sample_id.to_string(),
            total_coverage: acc.coverage,
            total_methylated: acc.methylated,
            n_sites: acc.n_sites,
        })
        .collect()
}

/// Tile every sample, in parallel over (sample, chromosome) pairs
///
/// Returns one window list per sample, in layout order, each sorted by window key.
/// A sample that ends up with no windows is reported as insufficient data.
pub fn tile_samples(
    records: &[SiteRecord],
    layout: &SampleLayout,
    params: &TilingParams,
) -> Result<Vec<Vec<WindowAggregate>>> {
    params.validate()?;

    let index = layout.index_map();
    let mut partitions: HashMap<(usize, &str), Vec<&SiteRecord>> = HashMap::new();
    for record in records {
        let j = *index.get(record.sample_id.as_str()).ok_or_else(|| MethDiffError::InvalidInput {
            reason: format!("sample '{}' is not part of the run", record.sample_id),
        })?;
        partitions
            .entry((j, record.chromosome.as_str()))
            .or_default()
            .push(record);
    }

    let tiled: Vec<(usize, Vec<WindowAggregate>)> = partitions
        .into_par_iter()
        .map(|((j, chromosome), sites)| {
            let sample_id = &layout.samples()[j].sample_id;
            (j, tile_chromosome(sample_id, chromosome, &sites, params))
        })
        .collect();

    let mut per_sample: Vec<Vec<WindowAggregate>> = vec![Vec::new(); layout.n_samples()];
    for (j, windows) in tiled {
        per_sample[j].extend(windows);
    }

    for (sample, windows) in layout.samples().iter().zip(per_sample.iter_mut()) {
        if windows.is_empty() {
            return Err(MethDiffError::InsufficientSampleData {
                sample_id: sample.sample_id.clone(),
                reason: "no windows with coverage after tiling".to_string(),
            });
        }
        windows.sort_by(|a, b| a.key.cmp(&b.key));
        log::debug!("Sample {}: {} windows", sample.sample_id, windows.len());
    }

    Ok(per_sample)
}
