//! Principal components of the correlation matrix.
//!
//! PCGSE consumes per-observation scores, per-variable loadings and eigenvalues. They
//! can be supplied from an external PCA run or computed here from the standardized data,
//! in which case the decomposition is that of the sample correlation matrix.

use crate::error::PcgseError;
use crate::testing::utils::{standardize_columns, standardize_vector};
use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::cmp::Ordering;

/// Scores, loadings and eigenvalues of a PCA, one column (or entry) per component.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaResult {
    /// Observations × components
    pub scores: Array2<f64>,
    /// Variables × components
    pub loadings: Array2<f64>,
    /// Variance of each component's scores
    pub eigenvalues: Array1<f64>,
}

/// Where the principal components come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PcaSource {
    /// A precomputed decomposition of the same data matrix
    Provided(PcaResult),
    /// Compute the decomposition from the data matrix
    ComputeFromData,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Restrict the result to the given 1-based component indexes, in the given order.
    pub fn select(&self, pc_indexes: &[usize]) -> anyhow::Result<PcaResult> {
        let max = self.n_components();
        let mut columns = Vec::with_capacity(pc_indexes.len());
        for &index in pc_indexes {
            if index == 0 || index > max {
                return Err(PcgseError::InvalidIndex { index, max }.into());
            }
            columns.push(index - 1);
        }

        Ok(PcaResult {
            scores: self.scores.select(Axis(1), &columns),
            loadings: self.loadings.select(Axis(1), &columns),
            eigenvalues: self.eigenvalues.select(Axis(0), &columns),
        })
    }

    fn check_shape(&self, n_observations: usize, n_variables: usize) -> anyhow::Result<()> {
        let k = self.n_components();
        if self.scores.dim() != (n_observations, k) {
            return Err(PcgseError::DimensionMismatch(format!(
                "scores are {:?}, expected ({}, {})",
                self.scores.dim(),
                n_observations,
                k
            ))
            .into());
        }
        if self.loadings.dim() != (n_variables, k) {
            return Err(PcgseError::DimensionMismatch(format!(
                "loadings are {:?}, expected ({}, {})",
                self.loadings.dim(),
                n_variables,
                k
            ))
            .into());
        }
        Ok(())
    }
}

/// PCA of the centered and unit-variance scaled data.
///
/// Computed through a thin SVD `Z = U Σ Vᵀ` of the standardized matrix: scores are `U Σ`,
/// loadings are the columns of `V` and eigenvalues are `σ² / (n - 1)`. Components are
/// sorted by decreasing eigenvalue and each is oriented so that its largest-magnitude
/// loading is positive.
pub fn compute_pca(data: ArrayView2<f64>) -> anyhow::Result<PcaResult> {
    let (n, p) = data.dim();
    let z = standardize_columns(data)?;

    let z_mat = DMatrix::from_fn(n, p, |i, j| z[[i, j]]);
    let svd = z_mat.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| anyhow::anyhow!("SVD did not return left singular vectors"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| anyhow::anyhow!("SVD did not return right singular vectors"))?;
    let sigma = svd.singular_values;
    let k = sigma.len();

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| sigma[b].partial_cmp(&sigma[a]).unwrap_or(Ordering::Equal));

    let mut scores = Array2::<f64>::zeros((n, k));
    let mut loadings = Array2::<f64>::zeros((p, k));
    let mut eigenvalues = Array1::<f64>::zeros(k);

    for (comp, &src) in order.iter().enumerate() {
        let mut pivot = 0;
        for var in 1..p {
            if v_t[(src, var)].abs() > v_t[(src, pivot)].abs() {
                pivot = var;
            }
        }
        let sign = if v_t[(src, pivot)] < 0.0 { -1.0 } else { 1.0 };

        for var in 0..p {
            loadings[[var, comp]] = sign * v_t[(src, var)];
        }
        for obs in 0..n {
            scores[[obs, comp]] = sign * u[(obs, src)] * sigma[src];
        }
        eigenvalues[comp] = sigma[src] * sigma[src] / (n as f64 - 1.0);
    }

    debug!(
        "Computed {} principal components of a {} x {} matrix; leading eigenvalue {:.4}",
        k,
        n,
        p,
        eigenvalues.get(0).copied().unwrap_or(0.0)
    );

    Ok(PcaResult {
        scores,
        loadings,
        eigenvalues,
    })
}

/// Check the requested PC indexes and return the matching components.
///
/// Indexes are 1-based and must lie in `1..=min(n_observations, n_variables)`; a
/// provided decomposition must also contain them and match the data dimensions. The
/// scores of every requested component must vary across observations.
pub fn resolve_pca(
    data: ArrayView2<f64>,
    source: &PcaSource,
    pc_indexes: &[usize],
) -> anyhow::Result<PcaResult> {
    let (n, p) = data.dim();
    validate_pc_indexes(pc_indexes, n.min(p))?;

    let selected = match source {
        PcaSource::Provided(pca) => {
            pca.check_shape(n, p)?;
            pca.select(pc_indexes)?
        }
        PcaSource::ComputeFromData => compute_pca(data)?.select(pc_indexes)?,
    };

    for (column, &index) in selected.scores.columns().into_iter().zip(pc_indexes) {
        if standardize_vector(column).is_none() {
            return Err(PcgseError::InsufficientData(format!("scores of PC {} have zero variance", index)).into());
        }
    }
    Ok(selected)
}

pub(crate) fn validate_pc_indexes(pc_indexes: &[usize], max: usize) -> anyhow::Result<()> {
    if pc_indexes.is_empty() {
        return Err(PcgseError::InvalidIndex { index: 0, max }.into());
    }
    if let Some(&index) = pc_indexes.iter().find(|&&i| i == 0 || i > max) {
        return Err(PcgseError::InvalidIndex { index, max }.into());
    }
    Ok(())
}
