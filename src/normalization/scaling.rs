//! Per-sample coverage scaling factors

use serde::{Deserialize, Serialize};

use crate::data::{SampleLayout, SiteRecord};
use crate::error::{MethDiffError, Result};
use crate::stats::{mean, median};

/// Statistic summarising a sample's coverage distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMethod {
    /// Median site coverage (default)
    Median,
    /// Mean site coverage
    Mean,
}

/// Which per-sample level all samples are scaled to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceLevel {
    /// Scale every sample down to the shallowest one (default)
    Min,
    /// Scale every sample up to the deepest one
    Max,
}

/// Parameters for coverage normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    pub method: NormalizeMethod,
    pub reference: ReferenceLevel,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            method: NormalizeMethod::Median,
            reference: ReferenceLevel::Min,
        }
    }
}

/// Coverage level of each sample, in layout order
///
/// Only covered sites (coverage > 0) contribute to a level. A sample with no
/// covered site is reported as insufficient data.
pub fn sample_coverage_levels(
    records: &[SiteRecord],
    layout: &SampleLayout,
    method: NormalizeMethod,
) -> Result<Vec<f64>> {
    let index = layout.index_map();
    let mut coverages: Vec<Vec<f64>> = vec![Vec::new(); layout.n_samples()];

    for record in records {
        let j = *index.get(record.sample_id.as_str()).ok_or_else(|| MethDiffError::InvalidInput {
            reason: format!("sample '{}' is not part of the run", record.sample_id),
        })?;
        if record.coverage > 0 {
            coverages[j].push(record.coverage as f64);
        }
    }

    layout
        .samples()
        .iter()
        .zip(coverages.iter())
        .map(|(sample, values)| {
            if values.is_empty() {
                return Err(MethDiffError::InsufficientSampleData {
                    sample_id: sample.sample_id.clone(),
                    reason: "no covered sites left after filtering".to_string(),
                });
            }
            let level = match method {
                NormalizeMethod::Median => median(values),
                NormalizeMethod::Mean => mean(values),
            };
            if level <= 0.0 || !level.is_finite() {
                return Err(MethDiffError::InsufficientSampleData {
                    sample_id: sample.sample_id.clone(),
                    reason: format!("{:?} coverage is {}", method, level),
                });
            }
            Ok(level)
        })
        .collect()
}

/// Scaling factor of each sample: reference level / sample level
pub fn estimate_scaling_factors(
    records: &[SiteRecord],
    layout: &SampleLayout,
    params: &NormalizeParams,
) -> Result<Vec<f64>> {
    let levels = sample_coverage_levels(records, layout, params.method)?;

    let reference = match params.reference {
        ReferenceLevel::Min => levels.iter().copied().fold(f64::INFINITY, f64::min),
        ReferenceLevel::Max => levels.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };

    let factors: Vec<f64> = levels.iter().map(|&level| reference / level).collect();

    for (sample, (level, factor)) in layout.samples().iter().zip(levels.iter().zip(factors.iter())) {
        log::debug!(
            "Sample {}: {:?} coverage {:.2}, scaling factor {:.4}",
            sample.sample_id,
            params.method,
            level,
            factor
        );
    }

    Ok(factors)
}

/// Round a scaled count half away from zero, never below zero
fn scale_count(count: u32, factor: f64) -> u32 {
    let scaled = (count as f64 * factor).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= u32::MAX as f64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Rescale coverage and methylated counts so samples carry comparable weight
///
/// Returns new records in input order; `methylated <= coverage` holds on every output record.
pub fn normalize_coverage(
    records: &[SiteRecord],
    layout: &SampleLayout,
    params: &NormalizeParams,
) -> Result<Vec<SiteRecord>> {
    let factors = estimate_scaling_factors(records, layout, params)?;
    let index = layout.index_map();

    records
        .iter()
        .map(|record| {
            let j = *index.get(record.sample_id.as_str()).ok_or_else(|| MethDiffError::InvalidInput {
                reason: format!("sample '{}' is not part of the run", record.sample_id),
            })?;
            let factor = factors[j];
            Ok(record.with_counts(
                scale_count(record.coverage, factor),
                scale_count(record.methylated, factor),
            ))
        })
        .collect()
}
