//! In-memory record store.

use super::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{EditNote, FamilyAggregate, FamilyKey, PatientRecord};
use famstudy_types::RecordId;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A save recorded by [`InMemoryStore`], kept so callers can inspect edit notes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveEvent {
    pub target: String,
    pub note: EditNote,
}

#[derive(Debug, Default)]
struct Tables {
    patients: BTreeMap<RecordId, PatientRecord>,
    families: BTreeMap<FamilyKey, FamilyAggregate>,
    saves: Vec<SaveEvent>,
}

/// Record store backed by ordered maps behind a mutex.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store holding `patients`.
    pub fn with_patients(patients: impl IntoIterator<Item = PatientRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.lock() {
            for patient in patients {
                tables.patients.insert(patient.id.clone(), patient);
            }
        }
        store
    }

    /// Every save so far, in order.
    pub fn saves(&self) -> StoreResult<Vec<SaveEvent>> {
        Ok(self.lock()?.saves.clone())
    }

    pub fn family_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.families.len())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for InMemoryStore {
    fn patient_ids(&self) -> StoreResult<Vec<RecordId>> {
        Ok(self.lock()?.patients.keys().cloned().collect())
    }

    fn load_patient(&self, id: &RecordId) -> StoreResult<Option<PatientRecord>> {
        Ok(self.lock()?.patients.get(id).cloned())
    }

    fn create_patient(&self, record: &PatientRecord) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.patients.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.to_string()));
        }
        tables.patients.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn save_patient(&self, record: &PatientRecord, note: &EditNote) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let slot = tables
            .patients
            .get_mut(&record.id)
            .ok_or_else(|| StoreError::NotFound(record.id.to_string()))?;
        *slot = record.clone();
        tables.saves.push(SaveEvent {
            target: record.id.to_string(),
            note: note.clone(),
        });
        Ok(())
    }

    fn family_exists(&self, key: &FamilyKey) -> StoreResult<bool> {
        Ok(self.lock()?.families.contains_key(key))
    }

    fn create_family(&self, family: &FamilyAggregate) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let key = family.key();
        if tables.families.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        tables.families.insert(key, family.clone());
        Ok(())
    }

    fn save_family(&self, family: &FamilyAggregate, note: &EditNote) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let key = family.key();
        let slot = tables
            .families
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        *slot = family.clone();
        tables.saves.push(SaveEvent {
            target: key.to_string(),
            note: note.clone(),
        });
        Ok(())
    }

    fn load_family(&self, key: &FamilyKey) -> StoreResult<Option<FamilyAggregate>> {
        Ok(self.lock()?.families.get(key).cloned())
    }

    fn remove_family(&self, key: &FamilyKey) -> StoreResult<()> {
        self.lock()?
            .families
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn max_family_identifier(&self) -> StoreResult<Option<u64>> {
        Ok(self.lock()?.families.keys().next_back().map(FamilyKey::identifier))
    }
}
