//! Coverage normalization across samples

mod scaling;

pub use scaling::{
    estimate_scaling_factors, normalize_coverage, sample_coverage_levels, NormalizeMethod, NormalizeParams,
    ReferenceLevel,
};
