use crate::error::PcgseError;
use crate::pca::PcaResult;
use crate::testing::utils::{standardize_columns, standardize_vector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::str::FromStr;

/// Largest |r| passed to the Fisher transform; keeps `atanh` finite at perfect correlation.
pub const FISHER_Z_MAX_ABS_R: f64 = 1.0 - 1e-12;

/// Per-variable score of association with a principal component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneStatistic {
    /// The variable's PC loading
    Loading,
    /// Pearson correlation between the variable and the PC scores
    Correlation,
    /// Fisher z transform of the Pearson correlation
    #[default]
    FisherZ,
}

/// Elementwise transformation applied to gene-level statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transformation {
    #[default]
    None,
    AbsValue,
}

impl FromStr for GeneStatistic {
    type Err = PcgseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(GeneStatistic::Loading),
            "cor" => Ok(GeneStatistic::Correlation),
            "z" => Ok(GeneStatistic::FisherZ),
            other => Err(PcgseError::UnknownName {
                kind: "gene statistic",
                name: other.to_string(),
            }),
        }
    }
}

impl FromStr for Transformation {
    type Err = PcgseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Transformation::None),
            "abs.value" => Ok(Transformation::AbsValue),
            other => Err(PcgseError::UnknownName {
                kind: "transformation",
                name: other.to_string(),
            }),
        }
    }
}

impl Transformation {
    #[inline]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Transformation::None => value,
            Transformation::AbsValue => value.abs(),
        }
    }
}

/// Fisher's variance-stabilizing transform `0.5 ln((1 + r) / (1 - r))`.
///
/// `|r|` is clamped to `FISHER_Z_MAX_ABS_R` first. Evaluated on `|r|` so the result is
/// exactly odd: `atanh` loses precision near -1.
#[inline]
pub fn fisher_z(r: f64) -> f64 {
    r.signum() * r.abs().min(FISHER_Z_MAX_ABS_R).atanh()
}

/// Pearson correlations between every standardized column of `z` and a standardized
/// score vector.
pub(crate) fn correlation_with_standardized(z: ArrayView2<f64>, scores: ArrayView1<f64>) -> Array1<f64> {
    let denom = z.nrows() as f64 - 1.0;
    z.t().dot(&scores).mapv(|v| (v / denom).clamp(-1.0, 1.0))
}

/// Pearson correlation between each data column and each PC score column.
///
/// Returns a variables × components matrix.
pub fn correlation_with_scores(data: ArrayView2<f64>, scores: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
    let z = standardize_columns(data)?;
    correlation_from_standardized(z.view(), scores)
}

pub(crate) fn correlation_from_standardized(
    z: ArrayView2<f64>,
    scores: ArrayView2<f64>,
) -> anyhow::Result<Array2<f64>> {
    if scores.nrows() != z.nrows() {
        return Err(PcgseError::DimensionMismatch(format!(
            "scores have {} rows, data has {} observations",
            scores.nrows(),
            z.nrows()
        ))
        .into());
    }

    let mut out = Array2::<f64>::zeros((z.ncols(), scores.ncols()));
    for (j, column) in scores.axis_iter(Axis(1)).enumerate() {
        let standardized = standardize_vector(column).ok_or_else(|| {
            PcgseError::InsufficientData(format!("score column {} of the PCA result has zero variance", j + 1))
        })?;
        let r = correlation_with_standardized(z, ArrayView1::from(&standardized));
        out.column_mut(j).assign(&r);
    }
    Ok(out)
}

/// Gene-level statistics, variables × selected components.
///
/// `pca` must already be restricted to the requested components.
pub fn gene_level_statistics(
    data: ArrayView2<f64>,
    pca: &PcaResult,
    statistic: GeneStatistic,
    transformation: Transformation,
) -> anyhow::Result<Array2<f64>> {
    match statistic {
        GeneStatistic::Loading => Ok(pca.loadings.mapv(|v| transformation.apply(v))),
        _ => {
            let z = standardize_columns(data)?;
            gene_level_from_standardized(z.view(), pca, statistic, transformation)
        }
    }
}

pub(crate) fn gene_level_from_standardized(
    z: ArrayView2<f64>,
    pca: &PcaResult,
    statistic: GeneStatistic,
    transformation: Transformation,
) -> anyhow::Result<Array2<f64>> {
    let stats = match statistic {
        GeneStatistic::Loading => pca.loadings.clone(),
        GeneStatistic::Correlation => correlation_from_standardized(z, pca.scores.view())?,
        GeneStatistic::FisherZ => correlation_from_standardized(z, pca.scores.view())?.mapv(fisher_z),
    };
    Ok(stats.mapv(|v| transformation.apply(v)))
}

/// Per-correlation gene-level statistic, used when correlations are recomputed
/// under permutation.
#[inline]
pub(crate) fn from_correlation(r: f64, statistic: GeneStatistic, transformation: Transformation) -> f64 {
    let base = match statistic {
        GeneStatistic::FisherZ => fisher_z(r),
        _ => r,
    };
    transformation.apply(base)
}
