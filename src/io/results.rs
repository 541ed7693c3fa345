//! Differential methylation results

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{WindowExclusions, WindowKey};

/// Direction of a methylation change, experimental relative to control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Hyper,
    Hypo,
}

impl Direction {
    /// Sign-only classification of a methylation difference; zero counts as hypo
    pub fn from_difference(meth_diff: f64) -> Self {
        if meth_diff > 0.0 {
            Direction::Hyper
        } else {
            Direction::Hypo
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Hyper => write!(f, "hyper"),
            Direction::Hypo => write!(f, "hypo"),
        }
    }
}

/// Test outcome for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub key: WindowKey,
    pub pvalue: f64,
    /// Multiple-testing adjusted p-value
    pub qvalue: f64,
    /// Experimental minus control methylation, in percentage points
    pub meth_diff: f64,
    pub direction: Direction,
}

/// Called windows split by direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedResults {
    /// Windows passing both the q-value and the effect-size threshold
    pub all: Vec<DiffResult>,
    /// Members of `all` gaining methylation
    pub hyper: Vec<DiffResult>,
    /// Members of `all` losing methylation
    pub hypo: Vec<DiffResult>,
}

/// Summary of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub samples: usize,
    pub windows_united: usize,
    pub windows_tested: usize,
    pub significant: usize,
    pub hyper: usize,
    pub hypo: usize,
    pub q_threshold: f64,
    pub min_diff: f64,
    pub exclusions: WindowExclusions,
}

impl fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Differential Methylation Summary")?;
        writeln!(f, "================================")?;
        writeln!(f, "Samples: {}", self.samples)?;
        writeln!(f, "Windows united: {}", self.windows_united)?;
        writeln!(f, "Windows tested: {}", self.windows_tested)?;
        writeln!(
            f,
            "Significant (q <= {}, |diff| >= {}): {}",
            self.q_threshold, self.min_diff, self.significant
        )?;
        writeln!(f, "  Hypermethylated: {}", self.hyper)?;
        writeln!(f, "  Hypomethylated: {}", self.hypo)?;
        writeln!(f, "{}", self.exclusions)?;
        Ok(())
    }
}
