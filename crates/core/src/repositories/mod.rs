//! Record store seam and its implementations.
//!
//! The migration engine only talks to a [`RecordStore`]. Two implementations ship with the
//! crate:
//!
//! - [`files::FileRecordStore`]: one git repository per record directory, every save a commit
//! - [`memory::InMemoryStore`]: process-local maps, used by tests and dry runs

pub mod files;
pub mod memory;

use crate::error::StoreResult;
use crate::model::{EditNote, FamilyAggregate, FamilyKey, PatientRecord};
use famstudy_types::RecordId;

/// Persistent storage for patient and family records.
///
/// All methods take `&self`; implementations handle their own interior locking.
pub trait RecordStore {
    /// Identifiers of every stored patient record, in ascending order.
    fn patient_ids(&self) -> StoreResult<Vec<RecordId>>;

    /// Loads a patient record, or `None` if no record has that identifier.
    fn load_patient(&self, id: &RecordId) -> StoreResult<Option<PatientRecord>>;

    /// Stores a new patient record.
    ///
    /// Fails with [`StoreError::AlreadyExists`](crate::error::StoreError::AlreadyExists) if
    /// the identifier is taken.
    fn create_patient(&self, record: &PatientRecord) -> StoreResult<()>;

    /// Replaces an existing patient record.
    fn save_patient(&self, record: &PatientRecord, note: &EditNote) -> StoreResult<()>;

    fn family_exists(&self, key: &FamilyKey) -> StoreResult<bool>;

    /// Stores a new family under its key.
    ///
    /// The key acts as a unique constraint: if it is already taken the call fails with
    /// [`StoreError::AlreadyExists`](crate::error::StoreError::AlreadyExists) and nothing is
    /// written.
    fn create_family(&self, family: &FamilyAggregate) -> StoreResult<()>;

    /// Replaces an existing family.
    fn save_family(&self, family: &FamilyAggregate, note: &EditNote) -> StoreResult<()>;

    fn load_family(&self, key: &FamilyKey) -> StoreResult<Option<FamilyAggregate>>;

    /// Deletes a family and its history.
    ///
    /// Only used to undo a family whose owning patient could not be linked to it. Fails with
    /// [`StoreError::NotFound`](crate::error::StoreError::NotFound) if the key is unused.
    fn remove_family(&self, key: &FamilyKey) -> StoreResult<()>;

    /// Highest family identifier in the store, or `None` when there are no families.
    fn max_family_identifier(&self) -> StoreResult<Option<u64>>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn patient_ids(&self) -> StoreResult<Vec<RecordId>> {
        (**self).patient_ids()
    }

    fn load_patient(&self, id: &RecordId) -> StoreResult<Option<PatientRecord>> {
        (**self).load_patient(id)
    }

    fn create_patient(&self, record: &PatientRecord) -> StoreResult<()> {
        (**self).create_patient(record)
    }

    fn save_patient(&self, record: &PatientRecord, note: &EditNote) -> StoreResult<()> {
        (**self).save_patient(record, note)
    }

    fn family_exists(&self, key: &FamilyKey) -> StoreResult<bool> {
        (**self).family_exists(key)
    }

    fn create_family(&self, family: &FamilyAggregate) -> StoreResult<()> {
        (**self).create_family(family)
    }

    fn save_family(&self, family: &FamilyAggregate, note: &EditNote) -> StoreResult<()> {
        (**self).save_family(family, note)
    }

    fn load_family(&self, key: &FamilyKey) -> StoreResult<Option<FamilyAggregate>> {
        (**self).load_family(key)
    }

    fn remove_family(&self, key: &FamilyKey) -> StoreResult<()> {
        (**self).remove_family(key)
    }

    fn max_family_identifier(&self) -> StoreResult<Option<u64>> {
        (**self).max_family_identifier()
    }
}
