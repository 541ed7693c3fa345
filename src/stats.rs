//! Small descriptive statistics shared by the filter and normalizer

/// Quantile with linear interpolation between order statistics (type 7)
///
/// `sorted_x` must be sorted ascending; `p` is a probability in [0, 1].
/// Returns NaN for an empty slice.
pub fn quantile_type7(sorted_x: &[f64], p: f64) -> f64 {
    let n = sorted_x.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_x[0];
    }

    // 0-based fractional index h = (n-1)*p
    let h = (n as f64 - 1.0) * p.clamp(0.0, 1.0);
    let h_floor = h.floor() as usize;
    let h_ceil = h.ceil() as usize;

    let lo = h_floor.min(n - 1);
    let hi = h_ceil.min(n - 1);

    if lo == hi {
        sorted_x[lo]
    } else {
        let frac = h - h_floor as f64;
        sorted_x[lo] + frac * (sorted_x[hi] - sorted_x[lo])
    }
}

/// Median of unsorted values, NaN when empty
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_type7(&sorted, 0.5)
}

/// Arithmetic mean, NaN when empty
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
