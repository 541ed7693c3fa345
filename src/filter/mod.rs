//! Site filtering ahead of normalization

mod coverage;

pub use coverage::{filter_by_coverage, filter_sites, select_context, FilterParams};
