//! Site-level coverage filtering

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{Context, SiteRecord};
use crate::error::{MethDiffError, Result};
use crate::stats::quantile_type7;

/// Parameters for site filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Minimum coverage a site needs to be kept (0 keeps everything)
    pub min_coverage: u32,
    /// Sites above this percentile of their sample's coverage are dropped (100 disables)
    pub hi_percentile: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_coverage: 10,
            hi_percentile: 100.0,
        }
    }
}

impl FilterParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.hi_percentile > 0.0 && self.hi_percentile <= 100.0) {
            return Err(MethDiffError::InvalidConfig {
                reason: format!("hi_percentile must be in (0, 100], got {}", self.hi_percentile),
            });
        }
        Ok(())
    }
}

/// Keep only records of one cytosine context
pub fn select_context(records: &[SiteRecord], context: Context) -> Vec<SiteRecord> {
    records.iter().filter(|r| r.context == context).cloned().collect()
}

/// Keep records with `coverage >= min_coverage`, preserving order
///
/// `min_coverage == 0` returns the input unchanged.
pub fn filter_by_coverage(records: &[SiteRecord], min_coverage: u32) -> Vec<SiteRecord> {
    if min_coverage == 0 {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| r.coverage >= min_coverage)
        .cloned()
        .collect()
}

/// Per-sample coverage ceiling at the given percentile
fn high_coverage_cutoffs(records: &[SiteRecord], hi_percentile: f64) -> HashMap<&str, f64> {
    let mut coverages: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in records {
        coverages
            .entry(record.sample_id.as_str())
            .or_default()
            .push(record.coverage as f64);
    }
    coverages
        .into_iter()
        .map(|(sample, mut values)| {
            values.sort_by(|a, b| a.total_cmp(b));
            (sample, quantile_type7(&values, hi_percentile / 100.0))
        })
        .collect()
}

/// Apply the low and high coverage filters in one ordered pass
///
/// The high-coverage ceiling is computed per sample on the unfiltered
/// coverage distribution, then both bounds are applied together.
pub fn filter_sites(records: &[SiteRecord], params: &FilterParams) -> Result<Vec<SiteRecord>> {
    params.validate()?;

    if params.hi_percentile >= 100.0 {
        return Ok(filter_by_coverage(records, params.min_coverage));
    }

    let cutoffs = high_coverage_cutoffs(records, params.hi_percentile);
    let kept: Vec<SiteRecord> = records
        .iter()
        .filter(|r| {
            let cov = r.coverage as f64;
            r.coverage >= params.min_coverage
                && cutoffs.get(r.sample_id.as_str()).map_or(true, |&hi| cov <= hi)
        })
        .cloned()
        .collect();

    log::debug!(
        "Coverage filter kept {} of {} sites (min={}, hi_percentile={})",
        kept.len(),
        records.len(),
        params.min_coverage,
        params.hi_percentile
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Group, Strand};

    fn site(sample: &str, pos: u64, cov: u32, context: Context) -> SiteRecord {
        SiteRecord::new("chr1", pos, Strand::Forward, context, cov, 0, sample, Group::Control).unwrap()
    }

    #[test]
    fn test_min_coverage_zero_is_identity() {
        let records = vec![
            site("s1", 30, 0, Context::CpG),
            site("s1", 10, 4, Context::CpG),
            site("s2", 20, 1, Context::CHG),
        ];
        assert_eq!(filter_by_coverage(&records, 0), records);
    }

    #[test]
    fn test_low_coverage_site_removed() {
        let records = vec![
            site("s1", 10, 3, Context::CpG),
            site("s1", 20, 5, Context::CpG),
            site("s1", 30, 9, Context::CpG),
        ];
        let kept = filter_by_coverage(&records, 5);
        let positions: Vec<u64> = kept.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![20, 30]);
    }

    #[test]
    fn test_select_context() {
        let records = vec![
            site("s1", 10, 3, Context::CpG),
            site("s1", 11, 3, Context::CHH),
            site("s1", 12, 3, Context::CpG),
        ];
        let cpg = select_context(&records, Context::CpG);
        assert_eq!(cpg.len(), 2);
        assert!(cpg.iter().all(|r| r.context == Context::CpG));
    }

    #[test]
    fn test_high_percentile_drops_outliers_per_sample() {
        let mut records: Vec<SiteRecord> = (1..=10).map(|i| site("s1", i, 10, Context::CpG)).collect();
        records.push(site("s1", 11, 5000, Context::CpG));
        records.push(site("s2", 1, 5000, Context::CpG));

        let params = FilterParams {
            min_coverage: 0,
            hi_percentile: 90.0,
        };
        let kept = filter_sites(&records, &params).unwrap();

        assert_eq!(kept.len(), 11);
        assert!(kept.iter().all(|r| r.sample_id == "s2" || r.coverage == 10));
    }

    #[test]
    fn test_invalid_percentile() {
        let params = FilterParams {
            min_coverage: 1,
            hi_percentile: 0.0,
        };
        assert!(filter_sites(&[], &params).is_err());
    }
}
