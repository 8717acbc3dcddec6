//! Git-versioned, file-backed record store.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!   .migration.lock              (only while a migration runs)
//!   patients/<record id>/record.yaml
//!   families/FAM0000001/family.yaml
//! ```
//!
//! Each record directory is its own git repository on `refs/heads/main`. Creating a record
//! creates its directory with an exclusive `create_dir`, so a directory name doubles as a
//! unique constraint: two writers racing for the same family key cannot both succeed.

use super::RecordStore;
use crate::config::CoreConfig;
use crate::constants::{
    DEFAULT_GITIGNORE, FAMILY_RECORD_FILENAME, MIGRATION_LOCK_FILENAME, PATIENT_RECORD_FILENAME,
};
use crate::error::{StoreError, StoreResult};
use crate::model::{EditNote, FamilyAggregate, FamilyKey, PatientRecord};
use crate::versioned_files::{
    FileToWrite, RecordCommitAction, RecordCommitDomain, RecordCommitMessage,
    VersionedFileService,
};
use famstudy_types::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Record store rooted at the configured data directory.
#[derive(Clone, Debug)]
pub struct FileRecordStore {
    cfg: Arc<CoreConfig>,
}

impl FileRecordStore {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    pub fn patient_dir(&self, id: &RecordId) -> PathBuf {
        self.cfg.patients_dir().join(id.as_str())
    }

    pub fn family_dir(&self, key: &FamilyKey) -> PathBuf {
        self.cfg.families_dir().join(key.to_string())
    }

    /// Takes the store-wide migration lock.
    ///
    /// The lock is a file created with `create_new` in the data directory and removed when the
    /// returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the lock.
    pub fn acquire_migration_lock(&self) -> StoreResult<MigrationLock> {
        let data_dir = self.cfg.data_dir();
        fs::create_dir_all(data_dir).map_err(StoreError::RecordDirCreation)?;

        let path = data_dir.join(MIGRATION_LOCK_FILENAME);
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(StoreError::Locked(path)),
            Err(e) => return Err(StoreError::FileWrite(e)),
        };

        let lock = MigrationLock { path };
        writeln!(file, "{}", std::process::id()).map_err(StoreError::FileWrite)?;
        tracing::debug!(path = %lock.path.display(), "acquired migration lock");
        Ok(lock)
    }

    fn create_record<T: Serialize>(
        &self,
        parent: &Path,
        dir: &Path,
        filename: &str,
        record: &T,
        message: &RecordCommitMessage,
    ) -> StoreResult<()> {
        let content = serde_yaml::to_string(record).map_err(StoreError::YamlSerialization)?;

        fs::create_dir_all(parent).map_err(StoreError::RecordDirCreation)?;
        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(dir_name(dir)));
            }
            Err(e) => return Err(StoreError::RecordDirCreation(e)),
        }

        let files = [
            FileToWrite {
                relative_path: Path::new(".gitignore"),
                content: DEFAULT_GITIGNORE,
                old_content: None,
            },
            FileToWrite {
                relative_path: Path::new(filename),
                content: &content,
                old_content: None,
            },
        ];
        VersionedFileService::init_and_commit(dir, self.cfg.author(), message, &files)
    }

    fn update_record<T: Serialize>(
        &self,
        dir: &Path,
        filename: &str,
        record: &T,
        message: &RecordCommitMessage,
    ) -> StoreResult<()> {
        let path = dir.join(filename);
        let old_content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(dir_name(dir)));
            }
            Err(e) => return Err(StoreError::FileRead(e)),
        };
        let content = serde_yaml::to_string(record).map_err(StoreError::YamlSerialization)?;

        let files = [FileToWrite {
            relative_path: Path::new(filename),
            content: &content,
            old_content: Some(&old_content),
        }];
        VersionedFileService::write_and_commit_files(dir, self.cfg.author(), message, &files)
    }
}

impl RecordStore for FileRecordStore {
    fn patient_ids(&self) -> StoreResult<Vec<RecordId>> {
        let mut ids: Vec<RecordId> = record_dir_names(&self.cfg.patients_dir())?
            .into_iter()
            .filter_map(|name| match RecordId::new(&name) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(dir = %name, error = %e, "skipping patient directory with invalid name");
                    None
                }
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn load_patient(&self, id: &RecordId) -> StoreResult<Option<PatientRecord>> {
        read_yaml(&self.patient_dir(id).join(PATIENT_RECORD_FILENAME))
    }

    fn create_patient(&self, record: &PatientRecord) -> StoreResult<()> {
        let message = RecordCommitMessage::new(
            RecordCommitDomain::Patient,
            RecordCommitAction::Create,
            "patient record created",
        )?;
        self.create_record(
            &self.cfg.patients_dir(),
            &self.patient_dir(&record.id),
            PATIENT_RECORD_FILENAME,
            record,
            &message,
        )
    }

    fn save_patient(&self, record: &PatientRecord, note: &EditNote) -> StoreResult<()> {
        let message = RecordCommitMessage::new(
            RecordCommitDomain::Patient,
            RecordCommitAction::Update,
            &note.comment,
        )?
        .minor(note.minor);
        self.update_record(
            &self.patient_dir(&record.id),
            PATIENT_RECORD_FILENAME,
            record,
            &message,
        )
    }

    fn family_exists(&self, key: &FamilyKey) -> StoreResult<bool> {
        Ok(self.family_dir(key).exists())
    }

    fn create_family(&self, family: &FamilyAggregate) -> StoreResult<()> {
        let message = RecordCommitMessage::new(
            RecordCommitDomain::Family,
            RecordCommitAction::Create,
            "family created",
        )?;
        self.create_record(
            &self.cfg.families_dir(),
            &self.family_dir(&family.key()),
            FAMILY_RECORD_FILENAME,
            family,
            &message,
        )
    }

    fn save_family(&self, family: &FamilyAggregate, note: &EditNote) -> StoreResult<()> {
        let message = RecordCommitMessage::new(
            RecordCommitDomain::Family,
            RecordCommitAction::Update,
            &note.comment,
        )?
        .minor(note.minor);
        self.update_record(
            &self.family_dir(&family.key()),
            FAMILY_RECORD_FILENAME,
            family,
            &message,
        )
    }

    fn load_family(&self, key: &FamilyKey) -> StoreResult<Option<FamilyAggregate>> {
        read_yaml(&self.family_dir(key).join(FAMILY_RECORD_FILENAME))
    }

    fn remove_family(&self, key: &FamilyKey) -> StoreResult<()> {
        let dir = self.family_dir(key);
        if !dir.join(FAMILY_RECORD_FILENAME).exists() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        VersionedFileService::remove_record(&dir)
    }

    fn max_family_identifier(&self) -> StoreResult<Option<u64>> {
        Ok(record_dir_names(&self.cfg.families_dir())?
            .iter()
            .filter_map(|name| FamilyKey::parse(name))
            .map(|key| key.identifier())
            .max())
    }
}

/// Guard for the store-wide migration lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct MigrationLock {
    path: PathBuf,
}

impl MigrationLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release migration lock");
        }
    }
}

/// Names of the subdirectories of `dir`. A missing directory has none.
fn record_dir_names(dir: &Path) -> StoreResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::FileRead(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(StoreError::FileRead)?;
        if !entry.file_type().map_err(StoreError::FileRead)?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Reads and parses a YAML record file, naming the failing field path on schema errors.
fn read_yaml<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::FileRead(e)),
    };

    let deserializer = serde_yaml::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(deserializer)
        .map(Some)
        .map_err(|err| {
            let field = err.path().to_string();
            let source = err.into_inner();
            StoreError::Schema(format!(
                "{} does not match schema at {field}: {source}",
                path.display()
            ))
        })
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::Author;
    use crate::model::{FamilyPedigree, LegacyPedigree, RightsEntry};
    use tempfile::TempDir;

    fn test_cfg(data_dir: &Path) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(
                data_dir.to_path_buf(),
                "%Y-%m-%d".into(),
                Author::new("Test Author", "test@example.com").unwrap(),
                None,
            )
            .unwrap(),
        )
    }

    fn patient(id: &str) -> PatientRecord {
        let mut record = PatientRecord::new(RecordId::new(id).unwrap());
        record.pedigree = Some(LegacyPedigree {
            data: r#"{"GG": []}"#.into(),
            image: "<svg/>".into(),
        });
        record
    }

    fn family(identifier: u64) -> FamilyAggregate {
        let owner = RecordId::new("P0000001").unwrap();
        FamilyAggregate {
            identifier,
            members: vec![owner.clone()],
            external_id: String::new(),
            warning: false,
            warning_message: String::new(),
            owner,
            pedigree: FamilyPedigree::default(),
            rights: RightsEntry::family_grant(vec!["XWiki.alice".into()], vec![]),
            attribution: Default::default(),
        }
    }

    fn head_message(dir: &Path) -> String {
        let repo = git2::Repository::open(dir).unwrap();
        let commit = repo.head().unwrap().peel_to_commit().unwrap();
        commit.message().unwrap().to_string()
    }

    #[test]
    fn patient_round_trip_through_git() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));

        store.create_patient(&patient("P0000001")).unwrap();
        let id = RecordId::new("P0000001").unwrap();
        let loaded = store.load_patient(&id).unwrap().unwrap();
        assert_eq!(loaded.pedigree.unwrap().image, "<svg/>");
        assert!(head_message(&store.patient_dir(&id)).starts_with("patient:create:"));
    }

    #[test]
    fn save_patient_commits_minor_edit() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));
        let mut record = patient("P0000001");
        store.create_patient(&record).unwrap();

        record.pedigree = None;
        let note = EditNote::minor("migrate pedigrees");
        store.save_patient(&record, &note).unwrap();

        let loaded = store.load_patient(&record.id).unwrap().unwrap();
        assert!(loaded.pedigree.is_none());
        let message = head_message(&store.patient_dir(&record.id));
        assert!(message.starts_with("patient:update: migrate pedigrees"));
        assert!(message.contains("Minor-Edit: true"));
    }

    #[test]
    fn save_of_unknown_patient_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));
        let note = EditNote::new("edit");
        let err = store.save_patient(&patient("P404"), &note).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn create_family_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));

        store.create_family(&family(1)).unwrap();
        let err = store.create_family(&family(1)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(key) if key == "FAM0000001"));
        assert!(store.family_exists(&FamilyKey::new(1)).unwrap());
        assert!(!store.family_exists(&FamilyKey::new(2)).unwrap());
    }

    #[test]
    fn remove_family_deletes_the_repository() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));
        let key = FamilyKey::new(1);

        store.create_family(&family(1)).unwrap();
        store.remove_family(&key).unwrap();

        assert!(!store.family_dir(&key).exists());
        assert!(store.load_family(&key).unwrap().is_none());
        assert!(matches!(
            store.remove_family(&key),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn max_family_identifier_scans_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));
        assert_eq!(store.max_family_identifier().unwrap(), None);

        for id in [3, 7, 2] {
            store.create_family(&family(id)).unwrap();
        }
        fs::create_dir_all(temp_dir.path().join("families").join("scratch")).unwrap();
        assert_eq!(store.max_family_identifier().unwrap(), Some(7));
    }

    #[test]
    fn patient_ids_are_sorted_and_skip_invalid_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));
        store.create_patient(&patient("P0000002")).unwrap();
        store.create_patient(&patient("P0000001")).unwrap();
        fs::create_dir_all(temp_dir.path().join("patients").join("bad name")).unwrap();

        let ids: Vec<String> = store
            .patient_ids()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["P0000001", "P0000002"]);
    }

    #[test]
    fn schema_errors_name_the_field() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));
        let dir = temp_dir.path().join("families").join("FAM0000004");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("family.yaml"), "identifier: four\n").unwrap();

        let err = store.load_family(&FamilyKey::new(4)).unwrap_err();
        match err {
            StoreError::Schema(msg) => assert!(msg.contains("identifier"), "{msg}"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn migration_lock_is_exclusive_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::new(test_cfg(temp_dir.path()));

        let lock = store.acquire_migration_lock().unwrap();
        assert!(lock.path().exists());
        assert!(matches!(
            store.acquire_migration_lock(),
            Err(StoreError::Locked(_))
        ));

        drop(lock);
        assert!(store.acquire_migration_lock().is_ok());
    }
}
