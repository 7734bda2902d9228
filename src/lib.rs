//! # single-pcgse
//!
//! Principal component gene set enrichment (PCGSE) for the single-rust ecosystem.
//!
//! This crate tests predefined gene sets for competitive enrichment against principal
//! components of an expression matrix. Each gene receives a statistic describing its
//! association with a PC, the statistics of each gene set are compared with those of the
//! remaining genes, and significance is assessed under one of three competitive nulls.
//!
//! ## Core Features
//!
//! - **PCA of the correlation matrix**: computed internally or supplied by the caller
//! - **Gene-level statistics**: loadings, Pearson correlations and Fisher z statistics
//! - **Gene-set statistics**: standardized mean differences and standardized rank sums
//! - **Significance tests**: parametric, correlation-adjusted parametric (CAMERA style)
//!   and permutation tests with an injectable random source
//!
//! ## Quick Start
//!
//! Build a [`enrichment::PcgseConfig`], describe the gene sets with
//! [`enrichment::GeneSetCollection`] and call [`enrichment::pcgse`]. Multiple testing
//! correction of the returned p-values is left to the caller.
//!
//! ## Module Organization
//!
//! - **[`pca`]**: Principal components of the standardized data
//! - **[`enrichment`]**: Gene-level and gene-set statistics and the PCGSE entry points
//! - **[`testing`]**: Parametric, rank-based and permutation test machinery
//! - **[`error`]**: Error taxonomy

pub mod error;
pub mod pca;
pub mod testing;
pub mod enrichment;

pub use error::PcgseError;
