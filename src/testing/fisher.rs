//! Fisher's exact test on a pooled 2x2 methylation table

use statrs::function::factorial::ln_factorial;

/// Relative tolerance when comparing table probabilities to the observed one
const RELATIVE_TOLERANCE: f64 = 1e-7;

/// Two-sided Fisher's exact test
///
/// Table layout (rows are groups):
///
/// ```text
///                 methylated   unmethylated
/// control              a             b
/// experimental         c             d
/// ```
///
/// The p-value is the total probability, under fixed margins, of every table
/// at most as likely as the observed one.
pub fn fisher_exact(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let col2 = b + d;
    let n = row1 + row2;

    if n == 0 || row1 == 0 || row2 == 0 || col1 == 0 || col2 == 0 {
        return 1.0;
    }

    let ln_const = ln_factorial(row1) + ln_factorial(row2) + ln_factorial(col1) + ln_factorial(col2)
        - ln_factorial(n);
    let ln_prob = |x: u64| -> f64 {
        ln_const - ln_factorial(x) - ln_factorial(row1 - x) - ln_factorial(col1 - x) - ln_factorial(row2 + x - col1)
    };

    let lo = col1.saturating_sub(row2);
    let hi = row1.min(col1);
    let observed = ln_prob(a);
    let cutoff = observed + RELATIVE_TOLERANCE.ln_1p();

    let p: f64 = (lo..=hi)
        .map(ln_prob)
        .filter(|&lp| lp <= cutoff)
        .map(f64::exp)
        .sum();

    p.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fisher_small_table() {
        // probabilities 1, 16, 36, 16, 1 over 70
        let p = fisher_exact(3, 1, 1, 3);
        assert!((p - 34.0 / 70.0).abs() < 1e-10);
    }

    #[test]
    fn test_fisher_extreme_table() {
        let p = fisher_exact(10, 0, 0, 10);
        assert!((p - 2.0 / 184_756.0).abs() < 1e-12);
    }

    #[test]
    fn test_fisher_identical_rows() {
        let p = fisher_exact(5, 5, 5, 5);
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fisher_degenerate_margins() {
        assert_eq!(fisher_exact(0, 0, 3, 4), 1.0);
        assert_eq!(fisher_exact(4, 0, 6, 0), 1.0);
    }

    #[test]
    fn test_fisher_symmetry() {
        let p1 = fisher_exact(2, 8, 7, 3);
        let p2 = fisher_exact(7, 3, 2, 8);
        assert!((p1 - p2).abs() < 1e-12);
        assert!(p1 > 0.0 && p1 < 0.1);
    }
}
