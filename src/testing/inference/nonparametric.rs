use crate::testing::TestResult;
use log::warn;
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

/// Null variance of the Mann-Whitney `U` statistic of `n1` members against `n2` non-members.
///
/// With `mean_correlation = None` the genes are treated as independent. Otherwise the
/// correlation-adjusted variance of Wu and Smyth (CAMERA) is used, which reduces to the
/// independent variance at zero correlation.
pub fn rank_sum_variance(n1: f64, n2: f64, mean_correlation: Option<f64>) -> f64 {
    match mean_correlation {
        None => n1 * n2 * (n1 + n2 + 1.0) / 12.0,
        Some(rho) => {
            let rho = rho.clamp(-1.0, 1.0);
            (n1 * n2 / (2.0 * PI))
                * (1.0_f64.asin()
                    + (n2 - 1.0) * 0.5_f64.asin()
                    + (n1 - 1.0) * (n2 - 1.0) * (rho / 2.0).asin()
                    + (n1 - 1.0) * ((rho + 1.0) / 2.0).asin())
        }
    }
}

/// Standardized rank-sum test.
///
/// `u` is the Mann-Whitney statistic of the members, i.e. their rank sum minus
/// `n1 (n1 + 1) / 2`. The statistic is centered at `n1 n2 / 2` and divided by the square
/// root of the null variance; the p-value is two-sided against the standard normal.
pub fn rank_sum_z_test(u: f64, n1: f64, n2: f64, mean_correlation: Option<f64>) -> TestResult {
    let var_u = rank_sum_variance(n1, n2, mean_correlation);

    if !(var_u > 0.0) || !var_u.is_finite() {
        warn!(
            "Rank-sum null variance is {} for n1={}, n2={}; reporting statistic 0 and p-value 1",
            var_u, n1, n2
        );
        return TestResult::degenerate();
    }

    let mean_u = n1 * n2 / 2.0;
    let std_err = var_u.sqrt();
    let z = (u - mean_u) / std_err;

    TestResult::new(z, normal_p_value(z)).with_standard_error(std_err)
}

/// Two-sided p-value of a z-statistic against the standard normal.
pub fn normal_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return 1.0;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => (2.0 * normal.sf(z.abs())).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}
