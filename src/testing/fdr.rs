//! Multiple-testing correction over the p-values of a whole run
//!
//! Both procedures need every raw p-value before any adjusted value can be
//! produced, so they operate on the complete batch.

use serde::{Deserialize, Serialize};

/// P-value adjustment procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMethod {
    /// Benjamini-Hochberg false discovery rate (default)
    #[value(name = "bh")]
    #[serde(rename = "bh")]
    BenjaminiHochberg,
    /// Bonferroni family-wise error rate
    Bonferroni,
}

/// Adjust a batch of p-values with the chosen procedure
pub fn adjust_pvalues(pvalues: &[f64], method: AdjustMethod) -> Vec<f64> {
    match method {
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg(pvalues),
        AdjustMethod::Bonferroni => bonferroni(pvalues),
    }
}

/// Benjamini-Hochberg q-values
///
/// NaN p-values are carried through as NaN and do not count towards the
/// number of tests. An empty input yields an empty output.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    // Indices of finite p-values, ascending by p-value
    let mut order: Vec<usize> = (0..n).filter(|&i| pvalues[i].is_finite()).collect();
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let m = order.len();
    let mut qvalues = vec![f64::NAN; n];
    if m == 0 {
        return qvalues;
    }

    // Walk from the largest p-value down, keeping the running minimum of p * m / rank
    let mut running_min = f64::INFINITY;
    for (rank0, &i) in order.iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adjusted = (pvalues[i] * m as f64 / rank as f64).min(1.0);
        running_min = running_min.min(adjusted);
        qvalues[i] = running_min;
    }

    qvalues
}

/// Bonferroni-adjusted p-values, capped at 1
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    pvalues
        .iter()
        .map(|&p| if p.is_finite() { (p * m as f64).min(1.0) } else { f64::NAN })
        .collect()
}
