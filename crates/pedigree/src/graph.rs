//! External pedigree document (schema v1.0) wire model.
//!
//! A pedigree document is a JSON object with an optional `JSON_version`, an optional
//! `probandNodeID` and a `GG` array of graph nodes. Each node has an integer `id` and, for
//! people, a `prop` object:
//!
//! ```json
//! {
//!   "JSON_version": "1.0",
//!   "GG": [
//!     { "id": 0, "prop": { "fName": "Ann", "lName": "Lee", "gender": "F",
//!                          "dob": { "year": "1980" }, "hpoTerms": ["HP:0001250"] } },
//!     { "id": 1, "rel": true, "prop": {} }
//!   ]
//! }
//! ```
//!
//! Keys this crate does not model are kept in `other` maps so a document can be modified and
//! rendered back without losing editor state.

use crate::{PedigreeError, PedigreeResult, PEDIGREE_JSON_VERSION};
use famstudy_types::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Graph-local id of the proband node.
pub const PROBAND_NODE_ID: i64 = 0;

// ============================================================================
// Wire types
// ============================================================================

/// A whole pedigree document.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PedigreeDocument {
    #[serde(
        rename = "JSON_version",
        default,
        deserialize_with = "version_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub json_version: Option<String>,

    #[serde(
        rename = "probandNodeID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub proband_node_id: Option<i64>,

    #[serde(rename = "GG")]
    pub graph: Vec<PedigreeNode>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Reads `JSON_version` as text whatever its JSON type; older editors wrote it as a number.
fn version_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// One node of the `GG` graph.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PedigreeNode {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prop: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl PedigreeNode {
    /// Relationship and child-hub nodes carry a `prop` object too but do not describe people.
    const NON_PERSON_MARKERS: [&'static str; 3] = ["rel", "chhub", "hub"];

    /// Returns true when this node describes a person.
    pub fn is_person(&self) -> bool {
        self.prop.is_some()
            && !Self::NON_PERSON_MARKERS
                .iter()
                .any(|marker| self.other.get(*marker).and_then(Value::as_bool) == Some(true))
    }
}

impl PedigreeDocument {
    /// Returns true unless the document declares a `JSON_version` other than `1.0`.
    ///
    /// The comparison is case-insensitive; a document without a version is assumed current.
    pub fn has_expected_version(&self) -> bool {
        self.json_version
            .as_deref()
            .map_or(true, |v| v.eq_ignore_ascii_case(PEDIGREE_JSON_VERSION))
    }

    /// Person nodes in document order.
    pub fn persons(&self) -> Vec<PersonNode<'_>> {
        self.graph
            .iter()
            .filter(|node| node.is_person())
            .filter_map(|node| {
                node.prop.as_ref().map(|properties| PersonNode {
                    node_id: node.id,
                    properties,
                })
            })
            .collect()
    }
}

// ============================================================================
// Person view
// ============================================================================

/// Read-only view over the `prop` object of a person node.
#[derive(Clone, Copy, Debug)]
pub struct PersonNode<'a> {
    pub node_id: i64,
    pub properties: &'a Map<String, Value>,
}

impl<'a> PersonNode<'a> {
    pub const PHENOTIPS_ID: &'static str = "phenotipsId";
    pub const EXTERNAL_ID: &'static str = "externalID";
    pub const FIRST_NAME: &'static str = "fName";
    pub const LAST_NAME: &'static str = "lName";
    pub const GENDER: &'static str = "gender";
    pub const DATE_OF_BIRTH: &'static str = "dob";
    pub const DATE_OF_DEATH: &'static str = "dod";
    pub const HPO_TERMS: &'static str = "hpoTerms";
    pub const DISORDERS: &'static str = "disorders";

    pub fn is_proband(&self) -> bool {
        self.node_id == PROBAND_NODE_ID
    }

    /// Reads a scalar property as text.
    ///
    /// Strings are returned as-is; numbers and booleans are rendered. Absent and `null`
    /// properties are `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PedigreeError::InvalidInput`] if the property is an array or object.
    pub fn text(&self, key: &str) -> PedigreeResult<Option<String>> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(PedigreeError::InvalidInput(format!(
                "property '{key}' of node {} must be a scalar",
                self.node_id
            ))),
        }
    }

    /// Reads a partial date property (`dob`, `dod`).
    ///
    /// # Errors
    ///
    /// Returns [`PedigreeError::Translation`] if the property is present but is not a
    /// partial-date object.
    pub fn date(&self, key: &str) -> PedigreeResult<Option<PartialDate>> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => PartialDate::from_value(value).map(Some).map_err(|e| {
                PedigreeError::Translation(format!(
                    "property '{key}' of node {}: {e}",
                    self.node_id
                ))
            }),
        }
    }

    /// Reads a list of ontology codes (`hpoTerms`, `disorders`).
    ///
    /// A property that is absent or not an array yields no codes. Non-string entries are
    /// rendered as JSON text.
    pub fn codes(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Partial dates
// ============================================================================

/// A date as entered in the pedigree editor: either `{year, month?, day?}` or `{decade}`.
///
/// Field values may be JSON strings or integers. Interpreting the fields (defaults, decade
/// truncation, calendar validation) is left to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartialDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<DateField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<DateField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<DateField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decade: Option<String>,
}

impl PartialDate {
    /// Deserialises a partial date from a JSON value, naming the failing field on error.
    pub fn from_value(value: &Value) -> PedigreeResult<Self> {
        serde_path_to_error::deserialize(value).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            PedigreeError::Translation(format!("partial date mismatch at {path}: {source}"))
        })
    }
}

/// A single numeric date component as written by the editor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DateField {
    Number(i64),
    Text(String),
}

impl DateField {
    /// Returns the component as an integer, or `None` if the text is not a plain integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DateField::Number(n) => Some(*n),
            DateField::Text(s) => s.parse().ok(),
        }
    }
}

// ============================================================================
// Public Pedigree operations
// ============================================================================

/// Pedigree document operations.
///
/// Zero-sized namespace for parsing, rendering and the proband bookkeeping done when a
/// pedigree moves into a family.
pub struct Pedigree;

impl Pedigree {
    /// Parse a pedigree document from JSON text.
    ///
    /// Uses `serde_path_to_error` to report the path (e.g. `GG[2].id`) of the failing field.
    ///
    /// # Errors
    ///
    /// Returns [`PedigreeError::Translation`] if the text is not JSON or does not match the
    /// document shape (missing `GG`, node without integer `id`, ...).
    pub fn parse(json_text: &str) -> PedigreeResult<PedigreeDocument> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            PedigreeError::Translation(format!("pedigree schema mismatch at {path}: {source}"))
        })
    }

    /// Parse a pedigree document from an already-decoded JSON value.
    pub fn from_value(value: Value) -> PedigreeResult<PedigreeDocument> {
        serde_path_to_error::deserialize(value).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            PedigreeError::Translation(format!("pedigree schema mismatch at {path}: {source}"))
        })
    }

    /// Render a pedigree document as compact JSON text.
    pub fn render(document: &PedigreeDocument) -> PedigreeResult<String> {
        Ok(serde_json::to_string(document)?)
    }

    /// Records `patient_id` as the proband of `document`.
    ///
    /// Sets `phenotipsId` on the `prop` object of the first node with id 0 (creating `prop`
    /// if the node has none), then sets `probandNodeID = 0` and `JSON_version = "1.0"` at the
    /// root. Existing values are replaced, so the identifier is present exactly once.
    ///
    /// Returns whether a proband node was found.
    pub fn mark_proband(document: &mut PedigreeDocument, patient_id: &RecordId) -> bool {
        let proband = document
            .graph
            .iter_mut()
            .find(|node| node.id == PROBAND_NODE_ID);

        let found = match proband {
            Some(node) => {
                node.prop.get_or_insert_with(Map::new).insert(
                    PersonNode::PHENOTIPS_ID.to_string(),
                    Value::String(patient_id.to_string()),
                );
                true
            }
            None => false,
        };

        document.proband_node_id = Some(PROBAND_NODE_ID);
        document.json_version = Some(PEDIGREE_JSON_VERSION.to_string());
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "GG": [
            { "id": 0, "prop": { "fName": "Ann", "lName": "Lee", "gender": "F",
                                 "dob": { "year": "1980" }, "hpoTerms": ["HP:0001250"] } },
            { "id": 1, "prop": { "fName": "Bob" } },
            { "id": 2, "rel": true, "prop": {} },
            { "id": 3, "chhub": true },
            { "id": 4, "prop": { "fName": "Cat" } }
        ],
        "ranks": [1, 2, 3]
    }"#;

    #[test]
    fn persons_skip_relationship_and_hub_nodes() {
        let doc = Pedigree::parse(SAMPLE).expect("parse sample");
        let ids: Vec<i64> = doc.persons().iter().map(|p| p.node_id).collect();
        assert_eq!(ids, vec![0, 1, 4]);
        assert!(doc.persons()[0].is_proband());
    }

    #[test]
    fn unknown_keys_survive_render() {
        let doc = Pedigree::parse(SAMPLE).expect("parse sample");
        let rendered: Value =
            serde_json::from_str(&Pedigree::render(&doc).expect("render")).expect("json");
        assert_eq!(rendered["ranks"], json!([1, 2, 3]));
        assert_eq!(rendered["GG"][2]["rel"], json!(true));
    }

    #[test]
    fn parse_reports_failing_path() {
        let err = Pedigree::parse(r#"{"GG": [{"id": 0}, {"id": "x"}]}"#)
            .expect_err("string id should fail");
        match err {
            PedigreeError::Translation(msg) => assert!(msg.contains("GG"), "{msg}"),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_missing_graph() {
        assert!(Pedigree::parse(r#"{"JSON_version": "1.0"}"#).is_err());
        assert!(Pedigree::parse("not json").is_err());
    }

    #[test]
    fn version_check_is_case_insensitive_and_optional() {
        let mut doc = Pedigree::parse(r#"{"GG": []}"#).unwrap();
        assert!(doc.has_expected_version());
        doc.json_version = Some("1.0".into());
        assert!(doc.has_expected_version());
        doc.json_version = Some("2.0".into());
        assert!(!doc.has_expected_version());
    }

    #[test]
    fn numeric_version_is_read_as_text() {
        let doc = Pedigree::parse(r#"{"JSON_version": 1.0, "GG": []}"#).unwrap();
        assert_eq!(doc.json_version.as_deref(), Some("1.0"));
        assert!(doc.has_expected_version());

        let doc = Pedigree::parse(r#"{"JSON_version": 2, "GG": []}"#).unwrap();
        assert_eq!(doc.json_version.as_deref(), Some("2"));
        assert!(!doc.has_expected_version());

        let doc = Pedigree::parse(r#"{"JSON_version": null, "GG": []}"#).unwrap();
        assert!(doc.json_version.is_none());
    }

    #[test]
    fn mark_proband_sets_id_and_root_fields() {
        let mut doc = Pedigree::parse(r#"{"GG": [{"id": 0, "prop": {}}]}"#).unwrap();
        let patient = RecordId::new("P001").unwrap();

        assert!(Pedigree::mark_proband(&mut doc, &patient));

        let rendered: Value = serde_json::from_str(&Pedigree::render(&doc).unwrap()).unwrap();
        assert_eq!(rendered["GG"][0]["prop"]["phenotipsId"], json!("P001"));
        assert_eq!(rendered["probandNodeID"], json!(0));
        assert_eq!(rendered["JSON_version"], json!("1.0"));
    }

    #[test]
    fn mark_proband_twice_keeps_single_value() {
        let mut doc = Pedigree::parse(r#"{"GG": [{"id": 0}], "JSON_version": "1.0"}"#).unwrap();
        let patient = RecordId::new("P001").unwrap();
        Pedigree::mark_proband(&mut doc, &patient);
        Pedigree::mark_proband(&mut doc, &patient);

        let rendered: Value = serde_json::from_str(&Pedigree::render(&doc).unwrap()).unwrap();
        assert_eq!(rendered["GG"][0]["prop"]["phenotipsId"], json!("P001"));
        assert_eq!(rendered["JSON_version"], json!("1.0"));
    }

    #[test]
    fn mark_proband_without_proband_node_still_sets_root() {
        let mut doc = Pedigree::parse(r#"{"GG": [{"id": 5, "prop": {}}]}"#).unwrap();
        let patient = RecordId::new("P001").unwrap();
        assert!(!Pedigree::mark_proband(&mut doc, &patient));
        assert_eq!(doc.proband_node_id, Some(0));
        assert!(doc.graph[0].prop.as_ref().unwrap().is_empty());
    }

    #[test]
    fn person_text_accepts_scalars_only() {
        let props = json!({ "fName": "Ann", "externalID": 42, "lName": ["x"] });
        let map = props.as_object().unwrap();
        let person = PersonNode {
            node_id: 0,
            properties: map,
        };
        assert_eq!(person.text("fName").unwrap(), Some("Ann".into()));
        assert_eq!(person.text("externalID").unwrap(), Some("42".into()));
        assert_eq!(person.text("gender").unwrap(), None);
        assert!(person.text("lName").is_err());
    }

    #[test]
    fn person_codes_ignore_non_arrays() {
        let props = json!({ "hpoTerms": ["HP:1", 7], "disorders": "OMIM:1" });
        let map = props.as_object().unwrap();
        let person = PersonNode {
            node_id: 1,
            properties: map,
        };
        assert_eq!(person.codes("hpoTerms"), vec!["HP:1", "7"]);
        assert!(person.codes("disorders").is_empty());
    }

    #[test]
    fn partial_date_accepts_both_forms() {
        let calendar = PartialDate::from_value(&json!({"year": "1980", "month": 4})).unwrap();
        assert_eq!(calendar.year.as_ref().and_then(DateField::as_integer), Some(1980));
        assert_eq!(calendar.month.as_ref().and_then(DateField::as_integer), Some(4));
        assert_eq!(calendar.day, None);

        let decade = PartialDate::from_value(&json!({"decade": "1980s"})).unwrap();
        assert_eq!(decade.decade.as_deref(), Some("1980s"));
        assert_eq!(decade.year, None);
    }

    #[test]
    fn person_date_rejects_non_objects() {
        let props = json!({ "dob": "1980-01-01" });
        let map = props.as_object().unwrap();
        let person = PersonNode {
            node_id: 0,
            properties: map,
        };
        assert!(person.date("dob").is_err());
        assert_eq!(person.date("dod").unwrap(), None);
    }
}
