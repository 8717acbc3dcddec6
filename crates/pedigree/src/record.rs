//! Internal patient-record JSON wire model.
//!
//! This is the shape accepted by the downstream patient record controllers:
//!
//! ```json
//! {
//!   "id": "P0000001",
//!   "external_id": "FAM-A-1",
//!   "sex": "F",
//!   "patient_name": { "first_name": "Ann", "last_name": "Lee" },
//!   "date_of_birth": "1980-01-01",
//!   "features": [ { "id": "HP:0001250", "name": "Seizures", "observed": "yes", "type": "phenotype" } ],
//!   "disorders": [ { "id": "MIM:1", "name": "..." } ]
//! }
//! ```
//!
//! Every field is optional: a record whose conversion stopped early only carries the fields
//! produced before the failure, and absent fields are omitted from the output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A patient record in the internal (current) schema.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct InternalPatientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<PatientName>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_death: Option<String>,

    /// Resolved phenotype terms, in input order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<Value>>,

    /// Resolved disorder terms, in input order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disorders: Option<Vec<Value>>,
}

/// Name block of an internal patient record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatientName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl InternalPatientRecord {
    /// Renders the record as a JSON value.
    pub fn to_json(&self) -> Value {
        // Serialising plain optional fields into a `Value` cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
