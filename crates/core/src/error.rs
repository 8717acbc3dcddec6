//! Store and core error types.
//!
//! Component-specific failures live next to their components (`DateError`, `OntologyError`,
//! `ConversionError`, `FamilyCreationError`). This module holds the record store error and the
//! configuration error.

use std::path::PathBuf;

/// Errors raised by [`RecordStore`](crate::repositories::RecordStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    #[error("failed to create record directory: {0}")]
    RecordDirCreation(std::io::Error),
    #[error("failed to remove record directory: {0}")]
    RecordDirRemoval(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("stored record does not match schema: {0}")]
    Schema(String),
    #[error(
        "create failed and cleanup also failed (path: {path}): create={create_error}; cleanup={cleanup_error}",
        path = path.display()
    )]
    CleanupAfterCreateFailed {
        path: PathBuf,
        #[source]
        create_error: Box<StoreError>,
        cleanup_error: std::io::Error,
    },
    #[error("store is locked by another migration (lock file: {})", .0.display())]
    Locked(PathBuf),
    #[error("store lock poisoned")]
    Poisoned,

    #[error("failed to initialise git repository: {0}")]
    GitInit(git2::Error),
    #[error("failed to open git repository: {0}")]
    GitOpen(git2::Error),
    #[error("failed to access git index: {0}")]
    GitIndex(git2::Error),
    #[error("failed to add file to git index: {0}")]
    GitAdd(git2::Error),
    #[error("failed to write git tree: {0}")]
    GitWriteTree(git2::Error),
    #[error("failed to find git tree: {0}")]
    GitFindTree(git2::Error),
    #[error("failed to create git signature: {0}")]
    GitSignature(git2::Error),
    #[error("failed to create git commit: {0}")]
    GitCommit(git2::Error),
    #[error("failed to get git head: {0}")]
    GitHead(git2::Error),
    #[error("failed to set git head: {0}")]
    GitSetHead(git2::Error),
    #[error("failed to peel git commit: {0}")]
    GitPeel(git2::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised while building configuration and validated inputs.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] famstudy_types::TextError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
