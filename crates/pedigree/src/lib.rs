//! Pedigree wire/boundary support.
//!
//! This crate provides **wire models** and **translation helpers** for the two JSON shapes the
//! family studies engine deals with:
//! - the external pedigree document (schema v1.0) produced by the pedigree editor: a `GG`
//!   graph of nodes whose `prop` objects describe people
//! - the internal patient record consumed by downstream record controllers
//!
//! This crate focuses on serialisation/deserialisation and structural access. It does not
//! resolve ontology codes or format dates; that belongs to `famstudy-core`.

pub mod graph;
pub mod record;

// Re-export facades
pub use graph::Pedigree;

// Re-export public domain-level types
pub use graph::{DateField, PartialDate, PedigreeDocument, PedigreeNode, PersonNode};
pub use record::{InternalPatientRecord, PatientName};

/// Pedigree JSON schema version understood by this crate.
pub const PEDIGREE_JSON_VERSION: &str = "1.0";

/// Errors returned by the `pedigree` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum PedigreeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`PedigreeError`].
pub type PedigreeResult<T> = Result<T, PedigreeError>;
