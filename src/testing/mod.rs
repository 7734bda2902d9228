use crate::error::PcgseError;
use std::str::FromStr;

pub mod inference;

pub mod utils;

/// Aggregation of gene-level statistics into one value per gene set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneSetStatistic {
    /// Standardized difference between member and non-member means.
    #[default]
    MeanDiff,
    /// Standardized Wilcoxon rank-sum of the members.
    RankSum,
}

/// Competitive null regime used to compute p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneSetTest {
    /// Gene-level statistics treated as independent.
    Parametric,
    /// Variance inflated by the average inter-gene correlation (CAMERA style).
    #[default]
    CorAdjParametric,
    /// Empirical null from permuting the PC scores across observations.
    Permutation,
}

/// Which variables enter the average correlation used for the variance inflation factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationScope {
    /// Mean off-diagonal correlation over every variable, shared by all gene sets.
    #[default]
    AllVariables,
    /// Mean off-diagonal correlation among the members of each gene set.
    GeneSetMembers,
}

impl FromStr for GeneSetStatistic {
    type Err = PcgseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean.diff" => Ok(GeneSetStatistic::MeanDiff),
            "rank.sum" => Ok(GeneSetStatistic::RankSum),
            other => Err(PcgseError::UnknownName {
                kind: "gene set statistic",
                name: other.to_string(),
            }),
        }
    }
}

impl FromStr for GeneSetTest {
    type Err = PcgseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parametric" => Ok(GeneSetTest::Parametric),
            "cor.adj.parametric" => Ok(GeneSetTest::CorAdjParametric),
            "permutation" => Ok(GeneSetTest::Permutation),
            other => Err(PcgseError::UnknownName {
                kind: "gene set test",
                name: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// The standardized test statistic (t or z)
    pub statistic: f64,
    /// The two-sided p-value of the test
    pub p_value: f64,
    /// Degrees of freedom (for t-based inference)
    pub degrees_of_freedom: Option<f64>,
    /// Standard error used to standardize the raw statistic
    pub standard_error: Option<f64>,
}

impl TestResult {
    /// Create a new test result with minimal information
    pub fn new(statistic: f64, p_value: f64) -> Self {
        TestResult {
            statistic,
            p_value,
            degrees_of_freedom: None,
            standard_error: None,
        }
    }

    /// Result reported when the null variance vanishes
    pub fn degenerate() -> Self {
        TestResult::new(0.0, 1.0)
    }

    /// Add degrees of freedom to the result
    pub fn with_degrees_of_freedom(mut self, df: f64) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    /// Add standard error to the result
    pub fn with_standard_error(mut self, se: f64) -> Self {
        self.standard_error = Some(se);
        self
    }
}
