//! # Family Studies Core
//!
//! Core logic for moving legacy pedigrees onto family records.
//!
//! This crate contains:
//! - Pedigree format conversion from the editor's JSON into internal patient records
//!   ([`convert`]), with ontology term resolution ([`ontology`]) and partial date handling
//!   ([`dates`])
//! - Family creation from a patient's legacy pedigree ([`family`]) and the batch migration that
//!   drives it over a whole record store ([`migration`])
//! - The [`RecordStore`] seam with a git-versioned file store and an in-memory store
//!
//! **No process concerns**: environment variables, logging setup and command-line handling
//! belong in the `famstudy` CLI and the `famstudy-run` runner.

pub mod allocator;
pub mod author;
pub mod config;
pub mod constants;
pub mod convert;
pub mod dates;
pub mod error;
pub mod family;
pub mod migration;
pub mod model;
pub mod ontology;
pub mod permissions;
pub mod repositories;
pub(crate) mod versioned_files;

pub use allocator::FamilyIdentifierAllocator;
pub use author::Author;
pub use config::CoreConfig;
pub use convert::{convert, ConversionContext, ConversionError};
pub use error::{CoreError, CoreResult, StoreError, StoreResult};
pub use family::{FamilyCreationCause, FamilyCreationError, FamilyMigrator};
pub use migration::{MigrationBatchDriver, MigrationPreview, MigrationReport, RecordFailure};
pub use model::{EditNote, FamilyAggregate, FamilyKey, PatientRecord};
pub use ontology::{OntologyDomain, OntologyService, TermTable};
pub use repositories::files::{FileRecordStore, MigrationLock};
pub use repositories::memory::InMemoryStore;
pub use repositories::RecordStore;
