use log::warn;

pub mod parametric;

pub mod nonparametric;

pub mod permutation;

/// Null distribution used to standardize a gene-set statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NullModel {
    /// Gene-level statistics treated as independent draws.
    Independent,
    /// Variance inflated for an average inter-gene correlation.
    CorrelationAdjusted {
        mean_correlation: f64,
        /// Degrees of freedom of the t reference (mean difference only)
        degrees_of_freedom: f64,
    },
}

/// Variance inflation factor `1 + (m - 1) ρ̄` for the mean of `m` correlated genes.
///
/// Floored at `f64::EPSILON`; a non-positive factor is only reachable with strongly
/// negative average correlation.
pub fn variance_inflation_factor(n_members: f64, mean_correlation: f64) -> f64 {
    let vif = 1.0 + (n_members - 1.0) * mean_correlation;
    if vif <= f64::EPSILON {
        warn!(
            "Variance inflation factor {} for {} genes with mean correlation {}; flooring at machine epsilon",
            vif, n_members, mean_correlation
        );
        return f64::EPSILON;
    }
    vif
}
