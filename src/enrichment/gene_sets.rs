use crate::error::PcgseError;
use ndarray::Array2;

/// A collection of gene sets over the variables (columns) of the data matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneSetCollection {
    /// Binary membership, gene sets × variables, entries 0 or 1.
    Matrix(Array2<u8>),
    /// Named gene sets with 0-based member variable indexes.
    Indexed(Vec<(String, Vec<usize>)>),
}

impl GeneSetCollection {
    pub fn len(&self) -> usize {
        match self {
            GeneSetCollection::Matrix(m) => m.nrows(),
            GeneSetCollection::Indexed(sets) => sets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, GeneSetCollection::Matrix(_))
    }

    /// Gene set names; matrix rows are named by their position.
    pub fn names(&self) -> Vec<String> {
        match self {
            GeneSetCollection::Matrix(m) => (0..m.nrows()).map(|i| format!("gene_set_{}", i + 1)).collect(),
            GeneSetCollection::Indexed(sets) => sets.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    /// Sorted, deduplicated member indexes of gene set `i`.
    pub fn members(&self, i: usize) -> Vec<usize> {
        match self {
            GeneSetCollection::Matrix(m) => m
                .row(i)
                .iter()
                .enumerate()
                .filter_map(|(j, &v)| if v != 0 { Some(j) } else { None })
                .collect(),
            GeneSetCollection::Indexed(sets) => {
                let mut members = sets[i].1.clone();
                members.sort_unstable();
                members.dedup();
                members
            }
        }
    }

    /// Dense 0/1 membership matrix (gene sets × variables) as floats.
    pub fn membership_matrix(&self, n_variables: usize) -> Array2<f64> {
        match self {
            GeneSetCollection::Matrix(m) => m.mapv(f64::from),
            GeneSetCollection::Indexed(sets) => {
                let mut out = Array2::<f64>::zeros((sets.len(), n_variables));
                for (i, (_, members)) in sets.iter().enumerate() {
                    for &j in members {
                        out[[i, j]] = 1.0;
                    }
                }
                out
            }
        }
    }

    /// Check the collection against a data matrix with `n_variables` columns.
    ///
    /// Every gene set needs at least one member and at least one non-member.
    pub fn validate(&self, n_variables: usize) -> anyhow::Result<()> {
        if self.is_empty() {
            return Err(PcgseError::InvalidGeneSet("collection contains no gene sets".to_string()).into());
        }

        match self {
            GeneSetCollection::Matrix(m) => {
                if m.ncols() != n_variables {
                    return Err(PcgseError::DimensionMismatch(format!(
                        "membership matrix has {} columns, data has {} variables",
                        m.ncols(),
                        n_variables
                    ))
                    .into());
                }
                if let Some(((row, col), v)) = m.indexed_iter().find(|(_, v)| **v > 1) {
                    return Err(PcgseError::InvalidGeneSet(format!(
                        "membership entry ({}, {}) is {}, expected 0 or 1",
                        row, col, v
                    ))
                    .into());
                }
            }
            GeneSetCollection::Indexed(sets) => {
                for (name, members) in sets {
                    if let Some(&j) = members.iter().find(|&&j| j >= n_variables) {
                        return Err(PcgseError::InvalidGeneSet(format!(
                            "gene set '{}' references variable {}, data has {} variables",
                            name, j, n_variables
                        ))
                        .into());
                    }
                }
            }
        }

        for i in 0..self.len() {
            let size = self.members(i).len();
            if size == 0 || size == n_variables {
                return Err(PcgseError::DegenerateGeneSet {
                    gene_set: i,
                    size,
                    n_variables,
                }
                .into());
            }
        }

        Ok(())
    }
}
