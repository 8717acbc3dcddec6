//! Commit author for store writes.
//!
//! Every save in the file-backed store is a git commit. The author recorded on those commits
//! is the operator running the tool (or the migration service account), configured once at
//! startup.

use crate::error::{CoreError, CoreResult, StoreError, StoreResult};
use famstudy_types::NonEmptyText;

/// Represents the author of store commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    /// The full name of the author.
    pub name: NonEmptyText,

    /// The email address of the author.
    pub email: NonEmptyText,
}

impl Author {
    /// Builds an author from raw name and email values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Text`] for empty values and [`CoreError::InvalidInput`] if the name
    /// or email spans several lines or the email has no `@`.
    pub fn new(name: impl AsRef<str>, email: impl AsRef<str>) -> CoreResult<Self> {
        let name = NonEmptyText::new(name)?;
        let email = NonEmptyText::new(email)?;

        if name.as_str().contains(['\n', '\r']) || email.as_str().contains(['\n', '\r']) {
            return Err(CoreError::InvalidInput(
                "author name and email must be single-line".into(),
            ));
        }
        if !email.as_str().contains('@') {
            return Err(CoreError::InvalidInput(format!(
                "author email '{}' is not an email address",
                email
            )));
        }

        Ok(Self { name, email })
    }

    /// Creates a git signature for this author stamped with the current time.
    pub(crate) fn signature(&self) -> StoreResult<git2::Signature<'static>> {
        git2::Signature::now(self.name.as_str(), self.email.as_str())
            .map_err(StoreError::GitSignature)
    }
}
