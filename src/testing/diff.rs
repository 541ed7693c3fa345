//! Per-window differential methylation testing
//!
//! Runs in two passes:
//! 1. a parallel map computing a raw p-value and methylation difference per window;
//! 2. once every p-value is known, a single batch adjustment whose q-values are
//!    written back to the tested windows.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::fdr::{adjust_pvalues, AdjustMethod};
use super::fisher::fisher_exact;
use super::logistic::{logistic_lrt, BinomialCount, DispersionTest, Overdispersion};
use crate::data::{Group, SampleLayout, WindowExclusions, WindowKey};
use crate::error::Result;
use crate::io::{DiffResult, Direction};
use crate::unite::UnitedWindows;

/// Statistical test selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatTest {
    /// Fisher's exact test when both groups hold a single sample, otherwise the likelihood-ratio test
    Auto,
    /// Logistic-regression likelihood-ratio test
    #[value(name = "lrt")]
    #[serde(rename = "lrt")]
    LogisticLrt,
    /// Fisher's exact test on the pooled 2x2 table
    Fisher,
}

/// Parameters for the per-window test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffTestParams {
    pub test: StatTest,
    pub overdispersion: Overdispersion,
    pub dispersion_test: DispersionTest,
    pub adjust: AdjustMethod,
}

impl Default for DiffTestParams {
    fn default() -> Self {
        Self {
            test: StatTest::Auto,
            overdispersion: Overdispersion::None,
            dispersion_test: DispersionTest::Chisq,
            adjust: AdjustMethod::BenjaminiHochberg,
        }
    }
}

/// Test actually applied to every window of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedTest {
    #[serde(rename = "lrt")]
    LogisticLrt,
    Fisher,
}

/// Pick the one test used for the whole run
pub fn resolve_test(test: StatTest, layout: &SampleLayout) -> ResolvedTest {
    match test {
        StatTest::LogisticLrt => ResolvedTest::LogisticLrt,
        StatTest::Fisher => ResolvedTest::Fisher,
        StatTest::Auto => {
            if layout.n_in_group(Group::Control) == 1 && layout.n_in_group(Group::Experimental) == 1 {
                ResolvedTest::Fisher
            } else {
                ResolvedTest::LogisticLrt
            }
        }
    }
}

/// Output of the testing stage
#[derive(Debug, Clone)]
pub struct DiffMethResults {
    /// One result per tested window, in window-key order
    pub results: Vec<DiffResult>,
    pub test: ResolvedTest,
    /// Windows skipped by the test (the uniting count is left at zero here)
    pub exclusions: WindowExclusions,
}

/// Raw outcome of the first pass
#[derive(Debug, PartialEq)]
enum WindowOutcome {
    Tested { pvalue: f64, meth_diff: f64 },
    ZeroCoverageGroup,
    Failed(String),
}

fn test_window(
    united: &UnitedWindows,
    window_idx: usize,
    experimental: &[bool],
    test: ResolvedTest,
    params: &DiffTestParams,
) -> WindowOutcome {
    let coverage = united.coverage_row(window_idx);
    let methylated = united.methylated_row(window_idx);

    let counts: Vec<BinomialCount> = coverage
        .iter()
        .zip(methylated.iter())
        .zip(experimental.iter())
        .map(|((&coverage, &methylated), &experimental)| BinomialCount {
            methylated,
            coverage,
            experimental,
        })
        .collect();

    let (mut m_ctl, mut n_ctl, mut m_exp, mut n_exp) = (0u64, 0u64, 0u64, 0u64);
    for c in &counts {
        if c.experimental {
            m_exp += c.methylated;
            n_exp += c.coverage;
        } else {
            m_ctl += c.methylated;
            n_ctl += c.coverage;
        }
    }

    if n_ctl == 0 || n_exp == 0 {
        return WindowOutcome::ZeroCoverageGroup;
    }

    // Identical group ratios: no difference to test
    if m_ctl as u128 * n_exp as u128 == m_exp as u128 * n_ctl as u128 {
        return WindowOutcome::Tested {
            pvalue: 1.0,
            meth_diff: 0.0,
        };
    }

    let meth_diff = 100.0 * (m_exp as f64 / n_exp as f64 - m_ctl as f64 / n_ctl as f64);

    let pvalue = match test {
        ResolvedTest::Fisher => Ok(fisher_exact(m_ctl, n_ctl - m_ctl, m_exp, n_exp - m_exp)),
        ResolvedTest::LogisticLrt => logistic_lrt(&counts, params.overdispersion, params.dispersion_test),
    };

    window_outcome(pvalue, meth_diff)
}

/// A usable p-value makes the window tested; anything else is a failed test
fn window_outcome(pvalue: Result<f64>, meth_diff: f64) -> WindowOutcome {
    match pvalue {
        Ok(p) if p.is_finite() => WindowOutcome::Tested { pvalue: p, meth_diff },
        Ok(p) => WindowOutcome::Failed(format!("non-finite p-value {}", p)),
        Err(e) => WindowOutcome::Failed(e.to_string()),
    }
}

/// Split first-pass outcomes into (window index, p-value, difference) triples
/// and the exclusion counts
fn tally_outcomes(
    outcomes: Vec<WindowOutcome>,
    keys: &[WindowKey],
) -> (Vec<(usize, f64, f64)>, WindowExclusions) {
    let mut exclusions = WindowExclusions::default();
    let mut tested = Vec::with_capacity(outcomes.len());
    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            WindowOutcome::Tested { pvalue, meth_diff } => tested.push((i, pvalue, meth_diff)),
            WindowOutcome::ZeroCoverageGroup => exclusions.zero_coverage_group += 1,
            WindowOutcome::Failed(reason) => {
                log::debug!("Window {} excluded: {}", keys[i], reason);
                exclusions.failed_test += 1;
            }
        }
    }
    (tested, exclusions)
}

/// Test every united window for a methylation difference between groups
///
/// Windows with no coverage in a group, or whose test fails, are excluded
/// and counted; the rest receive a p-value, a q-value adjusted over all
/// tested windows, and the experimental-minus-control difference.
pub fn calculate_diff_meth(united: &UnitedWindows, params: &DiffTestParams) -> Result<DiffMethResults> {
    let layout = united.layout();
    layout.require_both_groups()?;

    let test = resolve_test(params.test, layout);
    let experimental: Vec<bool> = layout
        .samples()
        .iter()
        .map(|s| s.group == Group::Experimental)
        .collect();

    log::debug!("Testing {} windows with {:?}", united.n_windows(), test);

    // Pass 1: per-window test
    let outcomes: Vec<WindowOutcome> = (0..united.n_windows())
        .into_par_iter()
        .map(|i| test_window(united, i, &experimental, test, params))
        .collect();

    let (tested, exclusions) = tally_outcomes(outcomes, united.keys());

    if tested.is_empty() {
        log::warn!("No windows could be tested; returning an empty result set");
    }

    // Pass 2: batch adjustment over every tested window
    let pvalues: Vec<f64> = tested.iter().map(|&(_, p, _)| p).collect();
    let qvalues = adjust_pvalues(&pvalues, params.adjust);

    let results = tested
        .into_iter()
        .zip(qvalues)
        .map(|((i, pvalue, meth_diff), qvalue)| DiffResult {
            key: united.keys()[i].clone(),
            pvalue,
            qvalue,
            meth_diff,
            direction: Direction::from_difference(meth_diff),
        })
        .collect();

    Ok(DiffMethResults {
        results,
        test,
        exclusions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleInfo;
    use crate::error::MethDiffError;
    use ndarray::{array, Array2};

    fn layout(n_ctl: usize, n_exp: usize) -> SampleLayout {
        let mut samples = Vec::new();
        for i in 0..n_ctl {
            samples.push(SampleInfo {
                sample_id: format!("c{}", i + 1),
                group: Group::Control,
            });
        }
        for i in 0..n_exp {
            samples.push(SampleInfo {
                sample_id: format!("t{}", i + 1),
                group: Group::Experimental,
            });
        }
        SampleLayout::new(samples).unwrap()
    }

    fn united(layout: SampleLayout, coverage: Array2<u64>, methylated: Array2<u64>) -> UnitedWindows {
        let keys = (0..coverage.nrows())
            .map(|i| WindowKey::new("chr1", i as u64 * 100, 100))
            .collect();
        let n_sites = coverage.mapv(|_| 1u32);
        UnitedWindows::new(keys, layout, coverage, methylated, n_sites).unwrap()
    }

    #[test]
    fn test_resolve_test() {
        assert_eq!(resolve_test(StatTest::Auto, &layout(1, 1)), ResolvedTest::Fisher);
        assert_eq!(resolve_test(StatTest::Auto, &layout(2, 1)), ResolvedTest::LogisticLrt);
        assert_eq!(resolve_test(StatTest::Fisher, &layout(3, 3)), ResolvedTest::Fisher);
    }

    #[test]
    fn test_diff_and_direction() {
        let data = united(
            layout(2, 2),
            array![[100, 100, 100, 100], [50, 50, 50, 50], [40, 40, 40, 40]],
            array![[20, 20, 80, 80], [40, 40, 10, 10], [20, 20, 20, 20]],
        );
        let out = calculate_diff_meth(&data, &DiffTestParams::default()).unwrap();

        assert_eq!(out.test, ResolvedTest::LogisticLrt);
        assert_eq!(out.results.len(), 3);

        let hyper = &out.results[0];
        assert!((hyper.meth_diff - 60.0).abs() < 1e-9);
        assert_eq!(hyper.direction, Direction::Hyper);
        assert!(hyper.qvalue < 0.05);

        let hypo = &out.results[1];
        assert!((hypo.meth_diff + 60.0).abs() < 1e-9);
        assert_eq!(hypo.direction, Direction::Hypo);

        let flat = &out.results[2];
        assert_eq!(flat.pvalue, 1.0);
        assert_eq!(flat.meth_diff, 0.0);
        assert_eq!(flat.direction, Direction::Hypo);

        for r in &out.results {
            assert!(r.qvalue >= r.pvalue);
            assert!((0.0..=1.0).contains(&r.qvalue));
        }
    }

    #[test]
    fn test_zero_coverage_group_excluded() {
        let data = united(
            layout(1, 1),
            array![[10, 0], [10, 10]],
            array![[5, 0], [1, 9]],
        );
        let out = calculate_diff_meth(&data, &DiffTestParams::default()).unwrap();

        assert_eq!(out.test, ResolvedTest::Fisher);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].key.start, 100);
        assert_eq!(out.exclusions.zero_coverage_group, 1);
        // A single test: q equals p
        assert!((out.results[0].qvalue - out.results[0].pvalue).abs() < 1e-15);
    }

    #[test]
    fn test_empty_united_set() {
        let data = united(layout(1, 1), Array2::zeros((0, 2)), Array2::zeros((0, 2)));
        let out = calculate_diff_meth(&data, &DiffTestParams::default()).unwrap();
        assert!(out.results.is_empty());
        assert_eq!(out.exclusions.total(), 0);
    }

    #[test]
    fn test_failed_window_counted() {
        assert_eq!(
            window_outcome(Ok(0.02), 15.0),
            WindowOutcome::Tested {
                pvalue: 0.02,
                meth_diff: 15.0
            }
        );
        assert!(matches!(window_outcome(Ok(f64::NAN), 15.0), WindowOutcome::Failed(_)));
        let err = MethDiffError::InvalidInput {
            reason: "degenerate window".to_string(),
        };
        match window_outcome(Err(err), -5.0) {
            WindowOutcome::Failed(reason) => assert!(reason.contains("degenerate window")),
            other => panic!("unexpected outcome: {:?}", other),
        }

        let keys: Vec<WindowKey> = (0..4).map(|i| WindowKey::new("chr1", i * 100, 100)).collect();
        let outcomes = vec![
            window_outcome(Ok(0.5), 10.0),
            window_outcome(Ok(f64::INFINITY), 20.0),
            WindowOutcome::ZeroCoverageGroup,
            window_outcome(Ok(0.01), -30.0),
        ];
        let (tested, exclusions) = tally_outcomes(outcomes, &keys);

        assert_eq!(tested, vec![(0, 0.5, 10.0), (3, 0.01, -30.0)]);
        assert_eq!(exclusions.failed_test, 1);
        assert_eq!(exclusions.zero_coverage_group, 1);
        assert_eq!(exclusions.total(), 2);
    }
}
