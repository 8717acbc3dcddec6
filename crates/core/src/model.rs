//! Stored record types.
//!
//! ## Patient records
//!
//! A patient record carries attribution, access grants and two optional sub-objects:
//! the legacy `pedigree` (`{data, image}`) and the current `family` reference. The pedigree
//! migration moves the first into a new family and replaces it with the second.
//!
//! ## Family records
//!
//! A family aggregate owns a pedigree and lists its member patients. Its key is derived from a
//! store-wide integer identifier, rendered as `FAM` followed by seven zero-padded digits.

use crate::constants::{FAMILY_KEY_DIGITS, FAMILY_KEY_PREFIX, FAMILY_RIGHTS_LEVELS};
use famstudy_types::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Shared pieces
// ============================================================================

/// Who wrote a record. Copied from patient to family on migration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_author: Option<String>,
}

/// One access grant: the listed principals are allowed (or denied) the listed levels.
///
/// `levels` is a comma-separated list such as `view,edit`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RightsEntry {
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub levels: String,

    #[serde(default)]
    pub allow: bool,
}

impl RightsEntry {
    /// Returns true if `level` appears in this entry's level list.
    pub fn covers(&self, level: &str) -> bool {
        self.levels
            .split(',')
            .any(|l| l.trim().eq_ignore_ascii_case(level))
    }

    /// The grant written onto a new family for the given principals.
    pub fn family_grant(users: Vec<String>, groups: Vec<String>) -> Self {
        Self {
            users,
            groups,
            levels: FAMILY_RIGHTS_LEVELS.to_string(),
            allow: true,
        }
    }
}

/// Annotation attached to a save: a comment and whether the edit is minor.
///
/// Stores reject saves whose comment is empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditNote {
    pub comment: String,
    pub minor: bool,
}

impl EditNote {
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            minor: false,
        }
    }

    pub fn minor(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            minor: true,
        }
    }
}

// ============================================================================
// Patient records
// ============================================================================

/// A stored patient record.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PatientRecord {
    pub id: RecordId,

    /// Template records describe the shape of new patients and are never migrated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default)]
    pub attribution: Attribution,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rights: Vec<RightsEntry>,

    /// Legacy pedigree sub-object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pedigree: Option<LegacyPedigree>,

    /// Family reference sub-object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<FamilyReference>,

    /// Fields owned by other record controllers, carried through untouched.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

impl PatientRecord {
    /// A bare record with the given identifier.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            template: false,
            owner: None,
            attribution: Attribution::default(),
            rights: Vec::new(),
            pedigree: None,
            family: None,
            other: BTreeMap::new(),
        }
    }

    /// Points this record at `key`, replacing any previous family reference.
    pub fn set_family_reference(&mut self, key: &FamilyKey) {
        self.family = Some(FamilyReference {
            reference: key.to_string(),
        });
    }
}

/// Pedigree stored directly on a patient record before families existed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LegacyPedigree {
    /// Pedigree document as JSON text.
    #[serde(default)]
    pub data: String,

    /// Rendered pedigree drawing (SVG text).
    #[serde(default)]
    pub image: String,
}

/// Pointer from a patient record to its family.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FamilyReference {
    pub reference: String,
}

// ============================================================================
// Family records
// ============================================================================

/// Store key of a family, derived from its integer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FamilyKey(u64);

impl FamilyKey {
    pub fn new(identifier: u64) -> Self {
        Self(identifier)
    }

    pub fn identifier(&self) -> u64 {
        self.0
    }

    /// Parses a rendered key such as `FAM0000123`.
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.strip_prefix(FAMILY_KEY_PREFIX)?;
        if digits.len() < FAMILY_KEY_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for FamilyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            FAMILY_KEY_PREFIX,
            self.0,
            width = FAMILY_KEY_DIGITS
        )
    }
}

/// Pedigree owned by a family.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FamilyPedigree {
    /// Pedigree document as JSON text.
    pub data: String,

    /// Rendered pedigree drawing, passed through unchanged.
    pub image: String,
}

/// A family aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FamilyAggregate {
    pub identifier: u64,
    pub members: Vec<RecordId>,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub warning: bool,
    #[serde(default)]
    pub warning_message: String,
    pub owner: RecordId,
    pub pedigree: FamilyPedigree,
    pub rights: RightsEntry,
    #[serde(default)]
    pub attribution: Attribution,
}

impl FamilyAggregate {
    pub fn key(&self) -> FamilyKey {
        FamilyKey::new(self.identifier)
    }
}
