use crate::error::PcgseError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use std::cmp::Ordering;

/// Rank values in ascending order, assigning tied values their average rank (1-based).
pub fn average_ranks(values: ArrayView1<f64>) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let val = values[order[i]];
        let mut j = i + 1;

        while j < n && values[order[j]] == val {
            j += 1;
        }

        // positions i..j share the mean of ranks i+1..=j
        let rank = (i + j + 1) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }

        i = j;
    }

    ranks
}

/// Relative spread below which a vector counts as constant.
const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Whether a standard deviation is negligible against the largest magnitude of the
/// uncentered values. Rounding in the mean leaves a centered constant vector with an
/// sd of a few ulps of its level, never exactly zero.
#[inline]
fn is_negligible_spread(sd: f64, max_abs: f64) -> bool {
    !(sd > CONSTANT_TOLERANCE * max_abs) || !sd.is_finite()
}

/// Center each column and scale it to unit sample variance (`n - 1` denominator).
///
/// Fails with [`PcgseError::ConstantVariable`] for a column whose spread vanishes on
/// the scale of its own values.
pub fn standardize_columns(data: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
    let n = data.nrows();
    if n < 2 {
        return Err(PcgseError::InsufficientData(format!(
            "at least 2 observations are needed to standardize, got {}",
            n
        ))
        .into());
    }

    let mut z = data.to_owned();
    for (col, mut column) in z.axis_iter_mut(Axis(1)).enumerate() {
        let max_abs = column.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let mean = column.sum() / n as f64;
        column.mapv_inplace(|v| v - mean);
        let ss: f64 = column.iter().map(|v| v * v).sum();
        let sd = (ss / (n as f64 - 1.0)).sqrt();
        if is_negligible_spread(sd, max_abs) {
            return Err(PcgseError::ConstantVariable { index: col }.into());
        }
        column.mapv_inplace(|v| v / sd);
    }

    Ok(z)
}

/// Center a vector and scale it to unit sample variance; `None` if it is constant.
pub fn standardize_vector(values: ArrayView1<f64>) -> Option<Vec<f64>> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.sum() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    let sd = (ss / (n as f64 - 1.0)).sqrt();
    let max_abs = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if is_negligible_spread(sd, max_abs) {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / sd).collect())
}

/// Mean of the off-diagonal entries of the sample correlation matrix of the given columns.
///
/// `z` must be column-standardized. The sum of all correlations is obtained from the
/// squared norm of the row sums, so the `p × p` matrix is never materialized.
pub fn mean_pairwise_correlation(z: ArrayView2<f64>, columns: Option<&[usize]>) -> f64 {
    let n = z.nrows();
    let row_sums: Vec<f64> = match columns {
        Some(cols) => (0..n)
            .map(|i| cols.iter().map(|&c| z[[i, c]]).sum())
            .collect(),
        None => z.sum_axis(Axis(1)).to_vec(),
    };
    let m = columns.map_or(z.ncols(), |c| c.len());
    if m < 2 {
        return 0.0;
    }

    let total: f64 = row_sums.iter().map(|s| s * s).sum::<f64>() / (n as f64 - 1.0);
    let m_f = m as f64;
    (total - m_f) / (m_f * (m_f - 1.0))
}
