//! Calling differentially methylated windows

use serde::{Deserialize, Serialize};

use crate::error::{MethDiffError, Result};
use crate::io::{ClassifiedResults, DiffResult};

/// Thresholds for calling a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyParams {
    /// Minimum absolute methylation difference, in percentage points
    pub min_diff: f64,
    /// Maximum q-value
    pub q_threshold: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            min_diff: 25.0,
            q_threshold: 0.01,
        }
    }
}

impl ClassifyParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.q_threshold) {
            return Err(MethDiffError::InvalidConfig {
                reason: format!("q-value threshold must be in [0, 1], got {}", self.q_threshold),
            });
        }
        if !(0.0..=100.0).contains(&self.min_diff) {
            return Err(MethDiffError::InvalidConfig {
                reason: format!("minimum difference must be in [0, 100], got {}", self.min_diff),
            });
        }
        Ok(())
    }

    /// Whether a result passes both thresholds
    ///
    /// Windows without any difference never pass, even with `min_diff = 0`.
    pub fn passes(&self, result: &DiffResult) -> bool {
        result.meth_diff != 0.0 && result.meth_diff.abs() >= self.min_diff && result.qvalue <= self.q_threshold
    }
}

/// Split results into significant, hyper- and hypomethylated windows
///
/// `all` is always the disjoint union of `hyper` and `hypo`; input order is kept.
pub fn classify(results: &[DiffResult], params: &ClassifyParams) -> ClassifiedResults {
    let all: Vec<DiffResult> = results.iter().filter(|r| params.passes(r)).cloned().collect();
    let hyper = all.iter().filter(|r| r.meth_diff > 0.0).cloned().collect();
    let hypo = all.iter().filter(|r| r.meth_diff < 0.0).cloned().collect();

    ClassifiedResults { all, hyper, hypo }
}

/// Windows gaining methylation, strongest first
///
/// Ordered by q-value, ties broken by the larger difference.
pub fn top_hyper(classified: &ClassifiedResults, n: usize) -> Vec<&DiffResult> {
    let mut hits: Vec<&DiffResult> = classified.hyper.iter().collect();
    hits.sort_by(|a, b| {
        a.qvalue
            .total_cmp(&b.qvalue)
            .then_with(|| b.meth_diff.abs().total_cmp(&a.meth_diff.abs()))
    });
    hits.truncate(n);
    hits
}

/// Windows losing methylation, strongest first
pub fn top_hypo(classified: &ClassifiedResults, n: usize) -> Vec<&DiffResult> {
    let mut hits: Vec<&DiffResult> = classified.hypo.iter().collect();
    hits.sort_by(|a, b| {
        a.qvalue
            .total_cmp(&b.qvalue)
            .then_with(|| b.meth_diff.abs().total_cmp(&a.meth_diff.abs()))
    });
    hits.truncate(n);
    hits
}
