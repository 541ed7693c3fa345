//! Genomic windows and per-window aggregates

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A fixed-size genomic window `[start, end)`
///
/// Ordering is chromosome first, then window start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl WindowKey {
    pub fn new(chromosome: &str, start: u64, size: u64) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            end: start + size,
        }
    }

    /// Whether a 1-based site position falls inside the window
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position < self.end
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

/// Summed counts of one sample inside one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAggregate {
    pub key: WindowKey,
    pub sample_id: String,
    pub total_coverage: u64,
    pub total_methylated: u64,
    /// Number of cytosines that contributed to the window
    pub n_sites: u32,
}

impl WindowAggregate {
    /// Summed methylated over summed coverage, `None` without coverage
    pub fn methylation_ratio(&self) -> Option<f64> {
        if self.total_coverage == 0 {
            None
        } else {
            Some(self.total_methylated as f64 / self.total_coverage as f64)
        }
    }
}

/// A window present in every sample of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitedWindow {
    pub key: WindowKey,
    /// Sample id -> aggregate, one entry per sample
    pub aggregates: BTreeMap<String, WindowAggregate>,
}

/// Counts of windows dropped without aborting the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowExclusions {
    /// Windows dropped during uniting because at least one sample lacked them
    pub missing_in_samples: usize,
    /// Windows skipped by the test because a group had no coverage
    pub zero_coverage_group: usize,
    /// Windows whose test did not produce a usable p-value
    pub failed_test: usize,
}

impl WindowExclusions {
    pub fn total(&self) -> usize {
        self.missing_in_samples + self.zero_coverage_group + self.failed_test
    }

    pub fn merge(&mut self, other: &WindowExclusions) {
        self.missing_in_samples += other.missing_in_samples;
        self.zero_coverage_group += other.zero_coverage_group;
        self.failed_test += other.failed_test;
    }
}

impl fmt::Display for WindowExclusions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} windows excluded: missing in {} samples, {} zero-coverage groups",
            self.total(),
            self.missing_in_samples,
            self.zero_coverage_group
        )?;
        if self.failed_test > 0 {
            write!(f, ", {} failed tests", self.failed_test)?;
        }
        Ok(())
    }
}
