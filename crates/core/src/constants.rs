//! Constants used throughout the family studies core crate.
//!
//! Path and filename constants for the file-backed store, plus the fixed values the family
//! migration writes.

/// Directory name for patient records storage.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Directory name for family records storage.
pub const FAMILIES_DIR_NAME: &str = "families";

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "record_data";

/// Filename of a stored patient record.
pub const PATIENT_RECORD_FILENAME: &str = "record.yaml";

/// Filename of a stored family record.
pub const FAMILY_RECORD_FILENAME: &str = "family.yaml";

/// Lock file taken by a running migration, relative to the data directory.
pub const MIGRATION_LOCK_FILENAME: &str = ".migration.lock";

/// Default `.gitignore` written into every record repository.
pub const DEFAULT_GITIGNORE: &str = ".DS_Store\n*.tmp\n";

/// Date format used when none is configured (chrono strftime syntax).
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Prefix of family record keys (`FAM0000123`).
pub const FAMILY_KEY_PREFIX: &str = "FAM";

/// Number of digits in the numeric part of a family key.
pub const FAMILY_KEY_DIGITS: usize = 7;

/// Access levels granted on a newly created family.
pub const FAMILY_RIGHTS_LEVELS: &str = "view,edit";

/// Access level a principal needs on the patient record to be granted family access.
pub const EDIT_LEVEL: &str = "edit";

/// Comment recorded on patients updated by the pedigree migration.
pub const MIGRATION_COMMENT: &str = "migrate pedigrees";

/// Number of attempts at allocating and claiming a family key before giving up.
pub const MAX_FAMILY_KEY_ATTEMPTS: usize = 5;
