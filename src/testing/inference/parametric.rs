//! Parametric two-sample tests for gene-set statistics.
//!
//! Gene-level statistics of the gene-set members are compared against those of the
//! remaining genes with a pooled-variance t-test. The variance of the member mean can
//! be inflated by a variance inflation factor to account for inter-gene correlation.

use crate::testing::TestResult;
use log::warn;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Student's t-test of a difference in means from its pooled standard deviation.
///
/// # Arguments
///
/// * `mean_diff` - Member mean minus non-member mean
/// * `pooled_sd` - Pooled standard deviation across both groups
/// * `n1`, `n2` - Member and non-member counts
/// * `vif` - Variance inflation factor applied to the member mean (1 for independence)
/// * `df` - Degrees of freedom of the reference t distribution
///
/// # Returns
///
/// `TestResult` containing the t-statistic, two-sided p-value, degrees of freedom and
/// the standard error. A vanishing standard error yields the degenerate result
/// (statistic 0, p-value 1).
pub fn pooled_t_test(
    mean_diff: f64,
    pooled_sd: f64,
    n1: f64,
    n2: f64,
    vif: f64,
    df: f64,
) -> TestResult {
    let std_err = pooled_sd * (vif / n1 + 1.0 / n2).sqrt();

    if !(std_err > 0.0) || !std_err.is_finite() {
        warn!(
            "Pooled standard error is {} (mean difference {}); reporting statistic 0 and p-value 1",
            std_err, mean_diff
        );
        return TestResult::degenerate().with_degrees_of_freedom(df);
    }

    let t_stat = mean_diff / std_err;
    TestResult::new(t_stat, t_test_p_value(t_stat, df))
        .with_degrees_of_freedom(df)
        .with_standard_error(std_err)
}

/// Two-sided p-value of a t-statistic.
pub fn t_test_p_value(t_stat: f64, df: f64) -> f64 {
    if t_stat.is_nan() || df <= 0.0 || !df.is_finite() {
        return 1.0;
    }
    if t_stat.is_infinite() {
        return 0.0;
    }

    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * t_dist.sf(t_stat.abs())).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}
