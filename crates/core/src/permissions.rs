//! Edit-access principals of a patient record.
//!
//! A new family inherits full access from the patient it was created for: every principal that
//! can edit the patient gets `view,edit` on the family.

use crate::constants::EDIT_LEVEL;
use crate::model::{PatientRecord, RightsEntry};

/// Users and groups with edit access to a record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditAccess {
    pub users: Vec<String>,
    pub groups: Vec<String>,
}

impl EditAccess {
    /// The grant written onto a family derived from this record.
    pub fn into_family_grant(self) -> RightsEntry {
        RightsEntry::family_grant(self.users, self.groups)
    }
}

/// Collects the principals with edit access to `record`.
///
/// The owner comes first (as a user), followed by the users and groups of every allowing entry
/// that covers `edit`, in entry order. Principals named by a denying `edit` entry are removed.
/// Duplicates keep their first position.
pub fn edit_access(record: &PatientRecord) -> EditAccess {
    let mut users: Vec<String> = Vec::new();
    let mut groups: Vec<String> = Vec::new();

    if let Some(owner) = record.owner.as_deref() {
        push_unique(&mut users, owner);
    }

    let edit_entries = record.rights.iter().filter(|entry| entry.covers(EDIT_LEVEL));
    for entry in edit_entries.clone().filter(|entry| entry.allow) {
        for user in &entry.users {
            push_unique(&mut users, user);
        }
        for group in &entry.groups {
            push_unique(&mut groups, group);
        }
    }

    for entry in edit_entries.filter(|entry| !entry.allow) {
        users.retain(|u| !entry.users.contains(u));
        groups.retain(|g| !entry.groups.contains(g));
    }

    EditAccess { users, groups }
}

fn push_unique(list: &mut Vec<String>, principal: &str) {
    let principal = principal.trim();
    if !principal.is_empty() && !list.iter().any(|p| p == principal) {
        list.push(principal.to_string());
    }
}
