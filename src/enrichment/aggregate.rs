use crate::enrichment::gene_sets::GeneSetCollection;
use crate::error::PcgseError;
use crate::testing::inference::nonparametric::rank_sum_z_test;
use crate::testing::inference::parametric::pooled_t_test;
use crate::testing::inference::{variance_inflation_factor, NullModel};
use crate::testing::utils::average_ranks;
use crate::testing::{GeneSetStatistic, TestResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Raw per-gene-set summary of one column of gene-level statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneSetSummary {
    MeanDiff {
        n_members: f64,
        n_non_members: f64,
        /// Member mean minus non-member mean
        mean_diff: f64,
        /// Pooled standard deviation of the two groups
        pooled_sd: f64,
    },
    RankSum {
        n_members: f64,
        n_non_members: f64,
        /// Mann-Whitney statistic of the members
        u: f64,
    },
}

impl GeneSetSummary {
    /// Standardize the summary under the given null and compute its two-sided p-value.
    ///
    /// Independent mean differences use `n1 + n2 - 2` degrees of freedom; the
    /// correlation-adjusted null supplies its own.
    pub fn test(&self, null: &NullModel) -> TestResult {
        match (*self, *null) {
            (
                GeneSetSummary::MeanDiff {
                    n_members,
                    n_non_members,
                    mean_diff,
                    pooled_sd,
                },
                NullModel::Independent,
            ) => pooled_t_test(
                mean_diff,
                pooled_sd,
                n_members,
                n_non_members,
                1.0,
                n_members + n_non_members - 2.0,
            ),
            (
                GeneSetSummary::MeanDiff {
                    n_members,
                    n_non_members,
                    mean_diff,
                    pooled_sd,
                },
                NullModel::CorrelationAdjusted {
                    mean_correlation,
                    degrees_of_freedom,
                },
            ) => pooled_t_test(
                mean_diff,
                pooled_sd,
                n_members,
                n_non_members,
                variance_inflation_factor(n_members, mean_correlation),
                degrees_of_freedom,
            ),
            (
                GeneSetSummary::RankSum {
                    n_members,
                    n_non_members,
                    u,
                },
                NullModel::Independent,
            ) => rank_sum_z_test(u, n_members, n_non_members, None),
            (
                GeneSetSummary::RankSum {
                    n_members,
                    n_non_members,
                    u,
                },
                NullModel::CorrelationAdjusted {
                    mean_correlation, ..
                },
            ) => rank_sum_z_test(u, n_members, n_non_members, Some(mean_correlation)),
        }
    }
}

/// Membership matrix and set sizes, prepared once and reused across PCs and permutations.
#[derive(Debug, Clone)]
pub struct Membership {
    matrix: Array2<f64>,
    sizes: Array1<f64>,
}

impl Membership {
    pub fn new(gene_sets: &GeneSetCollection, n_variables: usize) -> Self {
        let matrix = gene_sets.membership_matrix(n_variables);
        let sizes = matrix.sum_axis(Axis(1));
        Membership { matrix, sizes }
    }

    pub fn n_variables(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn sizes(&self) -> ArrayView1<f64> {
        self.sizes.view()
    }

    /// Summaries of every gene set for one column of gene-level statistics.
    ///
    /// Member sums are gathered for all gene sets at once as `M · g`; non-member sums
    /// follow from the totals.
    pub fn summarize(&self, stats: ArrayView1<f64>, statistic: GeneSetStatistic) -> Vec<GeneSetSummary> {
        let p = self.n_variables() as f64;
        match statistic {
            GeneSetStatistic::MeanDiff => {
                // shift to the grand mean so the sum-of-squares formula stays well conditioned
                let grand_mean = stats.sum() / p;
                let centered = stats.mapv(|v| v - grand_mean);
                let squares = centered.mapv(|v| v * v);
                let total = centered.sum();
                let total_sq = squares.sum();
                let member_sums = self.matrix.dot(&centered);
                let member_sq = self.matrix.dot(&squares);

                self.sizes
                    .iter()
                    .zip(member_sums.iter().zip(member_sq.iter()))
                    .map(|(&n1, (&s1, &q1))| {
                        let n2 = p - n1;
                        let s2 = total - s1;
                        let q2 = total_sq - q1;
                        let ss1 = (q1 - s1 * s1 / n1).max(0.0);
                        let ss2 = (q2 - s2 * s2 / n2).max(0.0);
                        GeneSetSummary::MeanDiff {
                            n_members: n1,
                            n_non_members: n2,
                            mean_diff: s1 / n1 - s2 / n2,
                            pooled_sd: ((ss1 + ss2) / (p - 2.0)).sqrt(),
                        }
                    })
                    .collect()
            }
            GeneSetStatistic::RankSum => {
                let ranks = Array1::from(average_ranks(stats));
                let rank_sums = self.matrix.dot(&ranks);

                self.sizes
                    .iter()
                    .zip(rank_sums.iter())
                    .map(|(&n1, &r1)| GeneSetSummary::RankSum {
                        n_members: n1,
                        n_non_members: p - n1,
                        u: r1 - n1 * (n1 + 1.0) / 2.0,
                    })
                    .collect()
            }
        }
    }

    /// Standardized statistics of every gene set under the independence null.
    pub fn standardized(&self, stats: ArrayView1<f64>, statistic: GeneSetStatistic) -> Vec<f64> {
        self.summarize(stats, statistic)
            .iter()
            .map(|s| s.test(&NullModel::Independent).statistic)
            .collect()
    }
}

/// Gene-set statistics, gene sets × PCs, standardized under the independence null.
///
/// `stats` holds gene-level statistics as variables × PCs; the collection is validated
/// against its `stats.nrows()` variables.
pub fn gene_set_statistics(
    stats: ArrayView2<f64>,
    gene_sets: &GeneSetCollection,
    statistic: GeneSetStatistic,
) -> anyhow::Result<Array2<f64>> {
    if stats.nrows() < 3 {
        return Err(PcgseError::InsufficientData(format!(
            "at least 3 variables are required, got {}",
            stats.nrows()
        ))
        .into());
    }
    gene_sets.validate(stats.nrows())?;
    let membership = Membership::new(gene_sets, stats.nrows());

    let mut out = Array2::<f64>::zeros((gene_sets.len(), stats.ncols()));
    for (j, column) in stats.axis_iter(Axis(1)).enumerate() {
        let values = membership.standardized(column, statistic);
        out.column_mut(j).assign(&Array1::from(values));
    }
    Ok(out)
}
