//! Principal component gene set enrichment (PCGSE).
//!
//! Gene sets are tested for competitive enrichment against principal components of an
//! observations × genes matrix. The analysis runs as a forward pipeline:
//!
//! 1. **PCA** (`crate::pca`): scores, loadings and eigenvalues of the correlation matrix,
//!    computed here or supplied by the caller
//! 2. **Gene-level statistics** (`gene_level`): loading, correlation or Fisher z of each
//!    gene with each PC, optionally in absolute value
//! 3. **Gene-set statistics** (`aggregate`): standardized mean difference or standardized
//!    rank sum of members against non-members
//! 4. **Significance**: parametric, correlation-adjusted parametric or permutation test
//!
//! p-values are two-sided and are not corrected for multiple testing.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use ndarray::Array2;
//! use single_pcgse::enrichment::{pcgse, GeneSetCollection, PcgseConfig};
//! use single_pcgse::pca::PcaSource;
//! use single_pcgse::testing::GeneSetTest;
//!
//! # fn main() -> anyhow::Result<()> {
//! let data: Array2<f64> = Array2::zeros((50, 200));
//! let gene_sets = GeneSetCollection::Indexed(vec![("set_1".to_string(), (0..10).collect())]);
//! let config = PcgseConfig::default()
//!     .with_pc_indexes(vec![1, 2])
//!     .with_gene_set_test(GeneSetTest::Parametric);
//! let result = pcgse(&data, PcaSource::ComputeFromData, &gene_sets, &config)?;
//! assert_eq!(result.p_values.dim(), (1, 2));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod gene_level;
pub mod gene_sets;

pub use aggregate::{gene_set_statistics, GeneSetSummary, Membership};
pub use gene_level::{gene_level_statistics, GeneStatistic, Transformation};
pub use gene_sets::GeneSetCollection;

use crate::error::PcgseError;
use crate::pca::{resolve_pca, PcaSource};
use crate::testing::inference::permutation::permutation_p_values;
use crate::testing::inference::NullModel;
use crate::testing::utils::{mean_pairwise_correlation, standardize_columns, standardize_vector};
use crate::testing::{CorrelationScope, GeneSetStatistic, GeneSetTest};
use gene_level::{correlation_with_standardized, from_correlation, gene_level_from_standardized};
use log::{debug, info};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Analysis settings. `Default` gives PC 1, Fisher z gene statistics without
/// transformation, mean differences and the correlation-adjusted parametric test.
#[derive(Debug, Clone, PartialEq)]
pub struct PcgseConfig {
    /// 1-based indexes of the PCs to test
    pub pc_indexes: Vec<usize>,
    pub gene_statistic: GeneStatistic,
    pub transformation: Transformation,
    pub gene_set_statistic: GeneSetStatistic,
    pub gene_set_test: GeneSetTest,
    /// Number of permutations (permutation test only)
    pub nperm: usize,
    /// Genes averaged for the variance inflation factor (correlation-adjusted test only)
    pub correlation_scope: CorrelationScope,
}

impl Default for PcgseConfig {
    fn default() -> Self {
        PcgseConfig {
            pc_indexes: vec![1],
            gene_statistic: GeneStatistic::default(),
            transformation: Transformation::default(),
            gene_set_statistic: GeneSetStatistic::default(),
            gene_set_test: GeneSetTest::default(),
            nperm: 9999,
            correlation_scope: CorrelationScope::default(),
        }
    }
}

impl PcgseConfig {
    pub fn with_pc_indexes(mut self, pc_indexes: Vec<usize>) -> Self {
        self.pc_indexes = pc_indexes;
        self
    }

    pub fn with_gene_statistic(mut self, gene_statistic: GeneStatistic) -> Self {
        self.gene_statistic = gene_statistic;
        self
    }

    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = transformation;
        self
    }

    pub fn with_gene_set_statistic(mut self, gene_set_statistic: GeneSetStatistic) -> Self {
        self.gene_set_statistic = gene_set_statistic;
        self
    }

    pub fn with_gene_set_test(mut self, gene_set_test: GeneSetTest) -> Self {
        self.gene_set_test = gene_set_test;
        self
    }

    pub fn with_nperm(mut self, nperm: usize) -> Self {
        self.nperm = nperm;
        self
    }

    pub fn with_correlation_scope(mut self, correlation_scope: CorrelationScope) -> Self {
        self.correlation_scope = correlation_scope;
        self
    }
}

/// p-values and standardized gene-set statistics, gene sets × requested PCs.
///
/// Rows follow the gene set collection, columns follow `PcgseConfig::pc_indexes`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcgseResult {
    pub p_values: Array2<f64>,
    pub statistics: Array2<f64>,
}

/// Run PCGSE with a generator seeded from system entropy for the permutation test.
pub fn pcgse(
    data: &Array2<f64>,
    pca: PcaSource,
    gene_sets: &GeneSetCollection,
    config: &PcgseConfig,
) -> anyhow::Result<PcgseResult> {
    let mut rng = ChaCha8Rng::from_entropy();
    pcgse_with_rng(data, pca, gene_sets, config, &mut rng)
}

/// Run PCGSE drawing permutations from `rng`.
///
/// All inputs are validated before any statistic is computed. With a seeded `rng` the
/// permutation test is reproducible; the parametric tests never touch it.
pub fn pcgse_with_rng<R>(
    data: &Array2<f64>,
    pca: PcaSource,
    gene_sets: &GeneSetCollection,
    config: &PcgseConfig,
    rng: &mut R,
) -> anyhow::Result<PcgseResult>
where
    R: Rng + ?Sized,
{
    validate_inputs(data.view(), gene_sets, config)?;
    let z = standardize_columns(data.view())?;
    let pca = resolve_pca(data.view(), &pca, &config.pc_indexes)?;

    info!(
        "PCGSE on {} observations x {} variables: {} gene sets, PCs {:?}, {:?}/{:?}/{:?}/{:?}",
        data.nrows(),
        data.ncols(),
        gene_sets.len(),
        config.pc_indexes,
        config.gene_statistic,
        config.transformation,
        config.gene_set_statistic,
        config.gene_set_test
    );

    let gene_stats = gene_level_from_standardized(z.view(), &pca, config.gene_statistic, config.transformation)?;
    let membership = Membership::new(gene_sets, data.ncols());

    let result = match config.gene_set_test {
        GeneSetTest::Parametric => parametric_test(gene_stats.view(), &membership, config, |_| NullModel::Independent),
        GeneSetTest::CorAdjParametric => {
            let degrees_of_freedom = data.nrows() as f64 - 2.0;
            match config.correlation_scope {
                CorrelationScope::AllVariables => {
                    let mean_correlation = mean_pairwise_correlation(z.view(), None);
                    debug!("Mean pairwise correlation over all variables: {:.6}", mean_correlation);
                    parametric_test(gene_stats.view(), &membership, config, |_| {
                        NullModel::CorrelationAdjusted {
                            mean_correlation,
                            degrees_of_freedom,
                        }
                    })
                }
                CorrelationScope::GeneSetMembers => {
                    let correlations: Vec<f64> = (0..gene_sets.len())
                        .map(|i| mean_pairwise_correlation(z.view(), Some(gene_sets.members(i).as_slice())))
                        .collect();
                    debug!("Mean within-set correlations: {:?}", correlations);
                    parametric_test(gene_stats.view(), &membership, config, |i| {
                        NullModel::CorrelationAdjusted {
                            mean_correlation: correlations[i],
                            degrees_of_freedom,
                        }
                    })
                }
            }
        }
        GeneSetTest::Permutation => permutation_test(z.view(), pca.scores.view(), gene_stats.view(), &membership, config, rng)?,
    };

    info!("PCGSE finished for {} gene sets x {} PCs", result.p_values.nrows(), result.p_values.ncols());
    Ok(result)
}

fn validate_inputs(data: ArrayView2<f64>, gene_sets: &GeneSetCollection, config: &PcgseConfig) -> anyhow::Result<()> {
    let (n, p) = data.dim();
    if let Some(((row, col), _)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PcgseError::MissingData { row, col }.into());
    }
    if n < 3 || p < 3 {
        return Err(PcgseError::InsufficientData(format!(
            "at least 3 observations and 3 variables are required, got {} x {}",
            n, p
        ))
        .into());
    }
    crate::pca::validate_pc_indexes(&config.pc_indexes, n.min(p))?;
    gene_sets.validate(p)?;

    if config.gene_set_test == GeneSetTest::Permutation {
        if config.gene_statistic == GeneStatistic::Loading {
            return Err(PcgseError::UnsupportedCombination(
                "the loading gene statistic cannot be used with the permutation test".to_string(),
            )
            .into());
        }
        if !gene_sets.is_matrix() {
            return Err(PcgseError::UnsupportedFormat(
                "the permutation test requires gene sets as a binary membership matrix".to_string(),
            )
            .into());
        }
        if config.nperm == 0 {
            return Err(PcgseError::InsufficientData("nperm must be at least 1".to_string()).into());
        }
    }
    Ok(())
}

fn parametric_test<F>(
    gene_stats: ArrayView2<f64>,
    membership: &Membership,
    config: &PcgseConfig,
    null_for_set: F,
) -> PcgseResult
where
    F: Fn(usize) -> NullModel,
{
    let n_sets = membership.sizes().len();
    let n_pcs = gene_stats.ncols();
    let mut p_values = Array2::<f64>::zeros((n_sets, n_pcs));
    let mut statistics = Array2::<f64>::zeros((n_sets, n_pcs));

    for (j, column) in gene_stats.axis_iter(Axis(1)).enumerate() {
        for (i, summary) in membership.summarize(column, config.gene_set_statistic).iter().enumerate() {
            let result = summary.test(&null_for_set(i));
            statistics[[i, j]] = result.statistic;
            p_values[[i, j]] = result.p_value;
        }
    }

    PcgseResult { p_values, statistics }
}

fn permutation_test<R>(
    z: ArrayView2<f64>,
    scores: ArrayView2<f64>,
    gene_stats: ArrayView2<f64>,
    membership: &Membership,
    config: &PcgseConfig,
    rng: &mut R,
) -> anyhow::Result<PcgseResult>
where
    R: Rng + ?Sized,
{
    let n_sets = membership.sizes().len();
    let n_pcs = gene_stats.ncols();
    let mut p_values = Array2::<f64>::zeros((n_sets, n_pcs));
    let mut statistics = Array2::<f64>::zeros((n_sets, n_pcs));

    for (j, column) in gene_stats.axis_iter(Axis(1)).enumerate() {
        let observed = membership.standardized(column, config.gene_set_statistic);
        let labels = standardize_vector(scores.column(j)).ok_or_else(|| {
            PcgseError::InsufficientData(format!("scores of PC {} have zero variance", config.pc_indexes[j]))
        })?;

        let p = permutation_p_values(&observed, &labels, config.nperm, rng, |permuted| {
            let r = correlation_with_standardized(z, ArrayView1::from(permuted));
            let null_stats = r.mapv(|v| from_correlation(v, config.gene_statistic, config.transformation));
            membership.standardized(null_stats.view(), config.gene_set_statistic)
        });

        for i in 0..n_sets {
            statistics[[i, j]] = observed[i];
            p_values[[i, j]] = p[i];
        }
        debug!("Finished {} permutations for PC {}", config.nperm, config.pc_indexes[j]);
    }

    Ok(PcgseResult { p_values, statistics })
}
