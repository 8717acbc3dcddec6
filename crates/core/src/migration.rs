//! Batch migration of legacy pedigrees into families.
//!
//! The driver walks every patient record once. Records without a usable legacy pedigree are
//! skipped; the rest get a new family, a family reference and lose the legacy sub-object. Each
//! record is saved on its own, so a failure (or a killed process) only affects the record in
//! flight and a second run finds nothing left to migrate.

use crate::constants::MIGRATION_COMMENT;
use crate::error::{StoreError, StoreResult};
use crate::family::{FamilyCreationError, FamilyMigrator};
use crate::model::{EditNote, FamilyKey, PatientRecord};
use crate::repositories::RecordStore;
use famstudy_types::RecordId;

/// Why a record was left alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Template,
    NoPedigree,
    EmptyPedigree,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template record",
            Self::NoPedigree => "no legacy pedigree",
            Self::EmptyPedigree => "pedigree data or image is empty",
        }
    }
}

/// What happened to one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Migrated(FamilyKey),
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordFailureCause {
    #[error("patient record could not be loaded: {0}")]
    Load(#[source] StoreError),
    #[error("patient record disappeared during the run")]
    Vanished,
    #[error(transparent)]
    Family(#[from] FamilyCreationError),
    #[error("patient record could not be saved: {0}")]
    SavePatient(#[source] StoreError),
    #[error("patient record could not be saved ({save}) and family {key} could not be removed: {cleanup}")]
    OrphanedFamily {
        key: FamilyKey,
        #[source]
        save: StoreError,
        cleanup: StoreError,
    },
    #[error("family {key} could not be saved: {source}")]
    SaveFamily {
        key: FamilyKey,
        #[source]
        source: StoreError,
    },
}

/// A record the run could not migrate.
#[derive(Debug)]
pub struct RecordFailure {
    pub patient_id: RecordId,
    pub cause: RecordFailureCause,
}

/// Summary of a migration run.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
}

impl MigrationReport {
    fn record(&mut self, patient_id: RecordId, result: Result<RecordOutcome, RecordFailureCause>) {
        match result {
            Ok(RecordOutcome::Migrated(_)) => self.migrated += 1,
            Ok(RecordOutcome::Skipped(_)) => self.skipped += 1,
            Err(cause) => {
                self.failed += 1;
                self.failures.push(RecordFailure { patient_id, cause });
            }
        }
    }
}

/// Dry-run counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationPreview {
    pub would_migrate: usize,
    pub would_skip: usize,
    pub unreadable: usize,
}

/// Legacy pedigree parts of a record that will be migrated.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingPedigree<'r> {
    pub data: &'r str,
    pub image: &'r str,
}

/// Decides whether `record` is a migration candidate.
pub fn candidate(record: &PatientRecord) -> Result<PendingPedigree<'_>, SkipReason> {
    if record.template {
        return Err(SkipReason::Template);
    }
    let pedigree = record.pedigree.as_ref().ok_or(SkipReason::NoPedigree)?;
    if pedigree.data.is_empty() || pedigree.image.is_empty() {
        return Err(SkipReason::EmptyPedigree);
    }
    Ok(PendingPedigree {
        data: &pedigree.data,
        image: &pedigree.image,
    })
}

pub struct MigrationBatchDriver<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> MigrationBatchDriver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Migrates every candidate record.
    ///
    /// # Errors
    ///
    /// Only failing to enumerate the patient records is fatal. Per-record failures are logged
    /// and collected in the report.
    pub fn run(&self) -> StoreResult<MigrationReport> {
        let ids = self.store.patient_ids()?;
        tracing::debug!(patients = ids.len(), "found patient records");

        let mut report = MigrationReport::default();
        for id in ids {
            let result = self.migrate_record(&id);
            if let Err(cause) = &result {
                tracing::error!(patient = %id, error = %cause, "pedigree migration failed for record");
            }
            report.record(id, result);
        }

        tracing::info!(
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed,
            "pedigree migration finished"
        );
        Ok(report)
    }

    /// Counts what [`run`](Self::run) would do, without writing.
    pub fn preview(&self) -> StoreResult<MigrationPreview> {
        let mut preview = MigrationPreview::default();
        for id in self.store.patient_ids()? {
            match self.store.load_patient(&id) {
                Ok(Some(record)) => match candidate(&record) {
                    Ok(_) => preview.would_migrate += 1,
                    Err(_) => preview.would_skip += 1,
                },
                Ok(None) | Err(_) => preview.unreadable += 1,
            }
        }
        Ok(preview)
    }

    /// Migrates a single record.
    pub fn migrate_record(&self, id: &RecordId) -> Result<RecordOutcome, RecordFailureCause> {
        let mut record = self
            .store
            .load_patient(id)
            .map_err(RecordFailureCause::Load)?
            .ok_or(RecordFailureCause::Vanished)?;

        let family = match candidate(&record) {
            Err(reason) => {
                tracing::debug!(patient = %id, reason = reason.as_str(), "skipping record");
                return Ok(RecordOutcome::Skipped(reason));
            }
            Ok(pending) => {
                tracing::debug!(patient = %id, "creating new family for record");
                FamilyMigrator::new(self.store).migrate(Some(&record), pending.data, pending.image)?
            }
        };
        let key = family.key();

        record.set_family_reference(&key);
        record.pedigree = None;

        let note = EditNote::minor(MIGRATION_COMMENT);
        if let Err(save) = self.store.save_patient(&record, &note) {
            return Err(self.discard_family(key, save));
        }
        self.store
            .save_family(&family, &note)
            .map_err(|source| RecordFailureCause::SaveFamily { key, source })?;

        tracing::debug!(patient = %id, family = %key, "updated record");
        Ok(RecordOutcome::Migrated(key))
    }

    /// Removes a family whose owner could not be linked to it, so a later run starts clean.
    fn discard_family(&self, key: FamilyKey, save: StoreError) -> RecordFailureCause {
        match self.store.remove_family(&key) {
            Ok(()) => {
                tracing::debug!(family = %key, "removed family of unsaved patient");
                RecordFailureCause::SavePatient(save)
            }
            Err(cleanup) => {
                tracing::error!(family = %key, error = %cleanup, "family left without a linked patient");
                RecordFailureCause::OrphanedFamily { key, save, cleanup }
            }
        }
    }
}
