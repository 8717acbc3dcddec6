//! Family creation from a legacy pedigree.
//!
//! [`FamilyMigrator::migrate`] turns the `{data, image}` pedigree stored on a patient record into
//! a new family aggregate owned by that patient:
//!
//! 1. allocate the next family identifier and check the key is unused
//! 2. build the aggregate (owner, single member, pedigree payload)
//! 3. grant `view,edit` to everyone with edit access to the patient
//! 4. copy the patient's attribution
//! 5. record the patient as proband inside the pedigree payload
//! 6. create the family in the store
//!
//! Creating the family is exclusive on its key. If another writer takes the key between the
//! allocation and the create, allocation starts over, up to [`MAX_FAMILY_KEY_ATTEMPTS`] times.

use crate::allocator::FamilyIdentifierAllocator;
use crate::constants::MAX_FAMILY_KEY_ATTEMPTS;
use crate::error::StoreError;
use crate::model::{FamilyAggregate, FamilyKey, FamilyPedigree, PatientRecord};
use crate::permissions;
use crate::repositories::RecordStore;
use famstudy_types::RecordId;
use pedigree::{Pedigree, PedigreeError};

/// Family creation failed for a patient.
///
/// The message only names the patient; the structured cause is available through
/// [`std::error::Error::source`] and [`FamilyCreationError::cause`].
#[derive(Debug, thiserror::Error)]
#[error(
    "could not create a new family for patient {}",
    .patient_id.as_ref().map_or("<none>", |id| id.as_str())
)]
pub struct FamilyCreationError {
    pub patient_id: Option<RecordId>,
    #[source]
    cause: FamilyCreationCause,
}

impl FamilyCreationError {
    fn new(patient_id: Option<&RecordId>, cause: FamilyCreationCause) -> Self {
        tracing::error!(
            patient = patient_id.map(RecordId::as_str).unwrap_or("<none>"),
            cause = %cause,
            "could not create a new family"
        );
        Self {
            patient_id: patient_id.cloned(),
            cause,
        }
    }

    pub fn cause(&self) -> &FamilyCreationCause {
        &self.cause
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FamilyCreationCause {
    #[error("no patient record was supplied")]
    MissingPatient,
    #[error("family identifier allocation failed: {0}")]
    Allocation(#[source] StoreError),
    #[error("the new family id {0} was already taken")]
    IdentifierTaken(FamilyKey),
    #[error("pedigree payload is malformed: {0}")]
    MalformedPedigree(#[source] PedigreeError),
    #[error("family could not be stored: {0}")]
    Persistence(#[source] StoreError),
    #[error("no free family key after {attempts} attempts")]
    KeyAttemptsExhausted { attempts: usize },
}

/// Creates family aggregates in a record store.
pub struct FamilyMigrator<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> FamilyMigrator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Creates and stores a family for `patient` from its legacy pedigree.
    ///
    /// The returned aggregate is the stored one: its pedigree data carries the proband
    /// metadata, while `image` is passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`FamilyCreationError`] if `patient` is `None`, `data` is not a pedigree
    /// document, the allocated key is already in use, or the store fails.
    pub fn migrate(
        &self,
        patient: Option<&PatientRecord>,
        data: &str,
        image: &str,
    ) -> Result<FamilyAggregate, FamilyCreationError> {
        let patient =
            patient.ok_or_else(|| FamilyCreationError::new(None, FamilyCreationCause::MissingPatient))?;
        let fail = |cause| FamilyCreationError::new(Some(&patient.id), cause);

        let payload = proband_payload(data, &patient.id)
            .map_err(|e| fail(FamilyCreationCause::MalformedPedigree(e)))?;
        let rights = permissions::edit_access(patient).into_family_grant();
        let allocator = FamilyIdentifierAllocator::new(self.store);

        for attempt in 1..=MAX_FAMILY_KEY_ATTEMPTS {
            let identifier = allocator
                .next_identifier()
                .map_err(|e| fail(FamilyCreationCause::Allocation(e)))?;
            let key = FamilyKey::new(identifier);

            let taken = self
                .store
                .family_exists(&key)
                .map_err(|e| fail(FamilyCreationCause::Allocation(e)))?;
            if taken {
                return Err(fail(FamilyCreationCause::IdentifierTaken(key)));
            }

            let family = FamilyAggregate {
                identifier,
                members: vec![patient.id.clone()],
                external_id: String::new(),
                warning: false,
                warning_message: String::new(),
                owner: patient.id.clone(),
                pedigree: FamilyPedigree {
                    data: payload.clone(),
                    image: image.to_string(),
                },
                rights: rights.clone(),
                attribution: patient.attribution.clone(),
            };

            match self.store.create_family(&family) {
                Ok(()) => {
                    tracing::info!(patient = %patient.id, family = %key, "created family");
                    return Ok(family);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    tracing::warn!(
                        patient = %patient.id,
                        family = %key,
                        attempt,
                        "family key taken by a concurrent writer, allocating again"
                    );
                }
                Err(e) => return Err(fail(FamilyCreationCause::Persistence(e))),
            }
        }

        Err(fail(FamilyCreationCause::KeyAttemptsExhausted {
            attempts: MAX_FAMILY_KEY_ATTEMPTS,
        }))
    }
}

/// Parses `data`, marks `patient_id` as its proband and renders it back.
fn proband_payload(data: &str, patient_id: &RecordId) -> Result<String, PedigreeError> {
    let mut document = Pedigree::parse(data)?;
    if !Pedigree::mark_proband(&mut document, patient_id) {
        tracing::warn!(patient = %patient_id, "pedigree has no proband node");
    }
    Pedigree::render(&document)
}
