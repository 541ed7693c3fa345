//! Statistical testing for differential methylation

mod diff;
mod fdr;
mod fisher;
mod logistic;

pub use diff::{calculate_diff_meth, resolve_test, DiffMethResults, DiffTestParams, ResolvedTest, StatTest};
pub use fdr::{adjust_pvalues, benjamini_hochberg, bonferroni, AdjustMethod};
pub use fisher::fisher_exact;
pub use logistic::{logistic_lrt, BinomialCount, DispersionTest, Overdispersion};
