//! Family identifier allocation.
//!
//! Identifiers are `max(stored identifiers) + 1`. The read and the later create are separate
//! store calls, so allocation alone does not guarantee uniqueness: the family migrator relies on
//! the store's exclusive `create_family` and retries with a fresh identifier when it loses.

use crate::error::StoreResult;
use crate::model::FamilyKey;
use crate::repositories::RecordStore;

pub struct FamilyIdentifierAllocator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> FamilyIdentifierAllocator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Next unused family identifier; 1 for an empty store.
    pub fn next_identifier(&self) -> StoreResult<u64> {
        let last_used = self.store.max_family_identifier()?.unwrap_or(0);
        Ok(last_used + 1)
    }

    pub fn next_key(&self) -> StoreResult<FamilyKey> {
        self.next_identifier().map(FamilyKey::new)
    }
}
