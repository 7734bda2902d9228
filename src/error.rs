use thiserror::Error;

/// Errors raised while validating or running a PCGSE analysis.
///
/// Public entry points return `anyhow::Result`; the concrete variant can be
/// recovered with `err.downcast_ref::<PcgseError>()`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PcgseError {
    #[error("PC index {index} is out of range, valid indexes are 1..={max}")]
    InvalidIndex { index: usize, max: usize },

    #[error("Gene set {gene_set} has {size} members out of {n_variables} variables; both members and non-members are required")]
    DegenerateGeneSet {
        gene_set: usize,
        size: usize,
        n_variables: usize,
    },

    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[error("Unsupported gene set format: {0}")]
    UnsupportedFormat(String),

    #[error("Data matrix contains a missing or non-finite value at observation {row}, variable {col}")]
    MissingData { row: usize, col: usize },

    #[error("Variable {index} has zero variance; correlations with it are undefined")]
    ConstantVariable { index: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid gene set collection: {0}")]
    InvalidGeneSet(String),

    #[error("Unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },
}
