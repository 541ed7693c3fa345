//! Uniting tiled windows across samples
//!
//! Uniting is an inner join on the window key: only windows present in every
//! sample of the run survive. The united set is stored column-wise as
//! windows x samples count matrices.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1};

use crate::data::{SampleLayout, UnitedWindow, WindowAggregate, WindowKey};
use crate::error::{MethDiffError, Result};

/// Windows shared by all samples, with their per-sample counts
#[derive(Debug, Clone)]
pub struct UnitedWindows {
    /// Window keys, sorted by chromosome then start
    keys: Vec<WindowKey>,
    /// Samples, one matrix column each
    layout: SampleLayout,
    /// Coverage (windows x samples)
    coverage: Array2<u64>,
    /// Methylated read counts (windows x samples)
    methylated: Array2<u64>,
    /// Contributing cytosines (windows x samples)
    n_sites: Array2<u32>,
}

impl UnitedWindows {
    /// Create from matrices, checking the dimensions agree
    pub fn new(
        keys: Vec<WindowKey>,
        layout: SampleLayout,
        coverage: Array2<u64>,
        methylated: Array2<u64>,
        n_sites: Array2<u32>,
    ) -> Result<Self> {
        let expected = (keys.len(), layout.n_samples());
        for (name, dim) in [
            ("coverage", coverage.dim()),
            ("methylated", methylated.dim()),
            ("n_sites", n_sites.dim()),
        ] {
            if dim != expected {
                return Err(MethDiffError::DimensionMismatch {
                    expected: format!("{} matrix of {}x{}", name, expected.0, expected.1),
                    got: format!("{}x{}", dim.0, dim.1),
                });
            }
        }
        if coverage.iter().zip(methylated.iter()).any(|(c, m)| m > c) {
            return Err(MethDiffError::InvalidInput {
                reason: "united window has more methylated reads than coverage".to_string(),
            });
        }
        Ok(Self {
            keys,
            layout,
            coverage,
            methylated,
            n_sites,
        })
    }

    pub fn n_windows(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[WindowKey] {
        &self.keys
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    /// Coverage of every sample in one window
    pub fn coverage_row(&self, window_idx: usize) -> ArrayView1<'_, u64> {
        self.coverage.row(window_idx)
    }

    /// Methylated counts of every sample in one window
    pub fn methylated_row(&self, window_idx: usize) -> ArrayView1<'_, u64> {
        self.methylated.row(window_idx)
    }

    /// Materialise one window as a record keyed by sample id
    pub fn window(&self, window_idx: usize) -> UnitedWindow {
        let key = self.keys[window_idx].clone();
        let aggregates = self
            .layout
            .samples()
            .iter()
            .enumerate()
            .map(|(j, sample)| {
                (
                    sample.sample_id.clone(),
                    WindowAggregate {
                        key: key.clone(),
                        sample_id: sample.sample_id.clone(),
                        total_coverage: self.coverage[[window_idx, j]],
                        total_methylated: self.methylated[[window_idx, j]],
                        n_sites: self.n_sites[[window_idx, j]],
                    },
                )
            })
            .collect();
        UnitedWindow { key, aggregates }
    }

    /// Iterate over all windows as records
    pub fn windows(&self) -> impl Iterator<Item = UnitedWindow> + '_ {
        (0..self.n_windows()).map(move |i| self.window(i))
    }
}

/// Inner-join per-sample windows into a united set
///
/// `per_sample[j]` holds the windows of `layout` sample `j`. Returns the
/// united windows and the number of windows dropped because at least one
/// sample lacked them.
pub fn unite_samples(per_sample: &[Vec<WindowAggregate>], layout: &SampleLayout) -> Result<(UnitedWindows, usize)> {
    let n_samples = layout.n_samples();
    if per_sample.len() != n_samples {
        return Err(MethDiffError::DimensionMismatch {
            expected: format!("{} window lists", n_samples),
            got: format!("{} window lists", per_sample.len()),
        });
    }

    let mut joined: BTreeMap<&WindowKey, Vec<Option<&WindowAggregate>>> = BTreeMap::new();

    for (j, windows) in per_sample.iter().enumerate() {
        for window in windows {
            let slots = joined.entry(&window.key).or_insert_with(|| vec![None; n_samples]);
            if slots[j].is_some() {
                return Err(MethDiffError::InvalidInput {
                    reason: format!(
                        "window {} appears twice for sample {}",
                        window.key,
                        layout.samples()[j].sample_id
                    ),
                });
            }
            slots[j] = Some(window);
        }
    }

    let total_keys = joined.len();
    let complete: Vec<(&WindowKey, Vec<&WindowAggregate>)> = joined
        .into_iter()
        .filter_map(|(key, slots)| slots.into_iter().collect::<Option<Vec<_>>>().map(|aggs| (key, aggs)))
        .collect();

    let n_windows = complete.len();
    let dropped = total_keys - n_windows;

    let mut coverage = Array2::zeros((n_windows, n_samples));
    let mut methylated = Array2::zeros((n_windows, n_samples));
    let mut n_sites = Array2::zeros((n_windows, n_samples));
    let mut keys = Vec::with_capacity(n_windows);

    for (i, (key, aggregates)) in complete.into_iter().enumerate() {
        keys.push(key.clone());
        for (j, agg) in aggregates.into_iter().enumerate() {
            coverage[[i, j]] = agg.total_coverage;
            methylated[[i, j]] = agg.total_methylated;
            n_sites[[i, j]] = agg.n_sites;
        }
    }

    log::debug!(
        "United {} windows across {} samples ({} dropped as incomplete)",
        n_windows,
        n_samples,
        dropped
    );

    let united = UnitedWindows::new(keys, layout.clone(), coverage, methylated, n_sites)?;
    Ok((united, dropped))
}
