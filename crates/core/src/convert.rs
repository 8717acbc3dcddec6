//! Pedigree format conversion.
//!
//! Converts the person nodes of an external pedigree document into internal patient records.
//! Each person runs through a fixed sequence of stages; a failing stage stops that person's
//! pipeline and the record built so far is kept. One bad person never affects another.

use crate::dates::{self, DateError};
use crate::ontology::{OntologyDomain, OntologyError, OntologyService};
use pedigree::{InternalPatientRecord, PatientName, PedigreeDocument, PedigreeError, PersonNode};
use serde_json::Value;
use std::fmt::Write as _;

/// Collaborators shared by every conversion of one document.
#[derive(Clone, Copy)]
pub struct ConversionContext<'a> {
    pub ontology: &'a dyn OntologyService,

    /// chrono strftime pattern for `date_of_birth` and `date_of_death`.
    pub date_format: &'a str,
}

impl<'a> ConversionContext<'a> {
    pub fn new(ontology: &'a dyn OntologyService, date_format: &'a str) -> Self {
        Self {
            ontology,
            date_format,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("unreadable person property: {0}")]
    Property(#[from] PedigreeError),
    #[error("{field}: {source}")]
    Date {
        field: &'static str,
        #[source]
        source: DateError,
    },
    #[error("date format '{0}' could not be rendered")]
    DateFormat(String),
    #[error("{domain} lookup for '{code}' failed: {source}")]
    Lookup {
        domain: OntologyDomain,
        code: String,
        #[source]
        source: OntologyError,
    },
    #[error("{domain} term for '{code}' is not a JSON object")]
    TermShape { domain: OntologyDomain, code: String },
}

/// One conversion step, filling part of the record from the person node.
pub type Stage = fn(
    &PersonNode<'_>,
    &mut InternalPatientRecord,
    &ConversionContext<'_>,
) -> Result<(), ConversionError>;

/// The conversion stages, in execution order.
pub const STAGES: [(&str, Stage); 5] = [
    ("identity", identity),
    ("demographics", demographics),
    ("dates", life_dates),
    ("phenotypes", phenotypes),
    ("disorders", disorders),
];

/// Result of running the stages for one person.
#[derive(Debug)]
pub enum PersonOutcome {
    Complete(InternalPatientRecord),
    Stopped {
        record: InternalPatientRecord,
        stage: &'static str,
        error: ConversionError,
    },
}

impl PersonOutcome {
    pub fn record(&self) -> &InternalPatientRecord {
        match self {
            Self::Complete(record) | Self::Stopped { record, .. } => record,
        }
    }

    pub fn into_record(self) -> InternalPatientRecord {
        match self {
            Self::Complete(record) | Self::Stopped { record, .. } => record,
        }
    }
}

/// Runs `stages` in order against a fresh record.
///
/// The first failing stage ends the run; the fields written by earlier stages are kept and
/// later stages are not attempted.
pub fn run_stages(
    person: &PersonNode<'_>,
    ctx: &ConversionContext<'_>,
    stages: &[(&'static str, Stage)],
) -> PersonOutcome {
    let mut record = InternalPatientRecord::default();

    for &(name, stage) in stages {
        if let Err(error) = stage(person, &mut record, ctx) {
            return PersonOutcome::Stopped {
                record,
                stage: name,
                error,
            };
        }
    }

    PersonOutcome::Complete(record)
}

/// Converts one person, logging a warning if conversion stopped early.
pub fn convert_person(person: &PersonNode<'_>, ctx: &ConversionContext<'_>) -> InternalPatientRecord {
    let outcome = run_stages(person, ctx, &STAGES);
    if let PersonOutcome::Stopped { stage, error, .. } = &outcome {
        tracing::warn!(
            node_id = person.node_id,
            stage,
            error = %error,
            "could not fully convert pedigree person"
        );
    }
    outcome.into_record()
}

/// Converts every person of `document`, in document order.
///
/// Always returns one record per person node.
pub fn convert(document: &PedigreeDocument, ctx: &ConversionContext<'_>) -> Vec<InternalPatientRecord> {
    if !document.has_expected_version() {
        tracing::warn!(
            json_version = document.json_version.as_deref().unwrap_or_default(),
            "pedigree JSON version differs from the expected version"
        );
    }

    let persons = document.persons();
    tracing::debug!(persons = persons.len(), "converting pedigree");

    persons
        .iter()
        .map(|person| convert_person(person, ctx))
        .collect()
}

// ============================================================================
// Stages
// ============================================================================

fn identity(
    person: &PersonNode<'_>,
    record: &mut InternalPatientRecord,
    _ctx: &ConversionContext<'_>,
) -> Result<(), ConversionError> {
    record.id = person.text(PersonNode::PHENOTIPS_ID)?;
    record.external_id = person.text(PersonNode::EXTERNAL_ID)?;
    Ok(())
}

fn demographics(
    person: &PersonNode<'_>,
    record: &mut InternalPatientRecord,
    _ctx: &ConversionContext<'_>,
) -> Result<(), ConversionError> {
    let name = PatientName {
        first_name: person.text(PersonNode::FIRST_NAME)?,
        last_name: person.text(PersonNode::LAST_NAME)?,
    };
    record.sex = person.text(PersonNode::GENDER)?;
    record.patient_name = Some(name);
    Ok(())
}

fn life_dates(
    person: &PersonNode<'_>,
    record: &mut InternalPatientRecord,
    ctx: &ConversionContext<'_>,
) -> Result<(), ConversionError> {
    record.date_of_birth = formatted_date(person, PersonNode::DATE_OF_BIRTH, ctx.date_format)?;
    record.date_of_death = formatted_date(person, PersonNode::DATE_OF_DEATH, ctx.date_format)?;
    Ok(())
}

fn phenotypes(
    person: &PersonNode<'_>,
    record: &mut InternalPatientRecord,
    ctx: &ConversionContext<'_>,
) -> Result<(), ConversionError> {
    let mut features = Vec::new();
    for code in person.codes(PersonNode::HPO_TERMS) {
        if let Some(mut term) = resolve(ctx, OntologyDomain::Phenotype, &code)? {
            if let Value::Object(fields) = &mut term {
                fields.insert("observed".into(), Value::String("yes".into()));
                fields.insert("type".into(), Value::String("phenotype".into()));
            }
            features.push(term);
        }
    }
    record.features = Some(features);
    Ok(())
}

fn disorders(
    person: &PersonNode<'_>,
    record: &mut InternalPatientRecord,
    ctx: &ConversionContext<'_>,
) -> Result<(), ConversionError> {
    let mut terms = Vec::new();
    for code in person.codes(PersonNode::DISORDERS) {
        if let Some(term) = resolve(ctx, OntologyDomain::Disorder, &code)? {
            terms.push(term);
        }
    }
    record.disorders = Some(terms);
    Ok(())
}

fn formatted_date(
    person: &PersonNode<'_>,
    field: &'static str,
    format: &str,
) -> Result<Option<String>, ConversionError> {
    let Some(partial) = person.date(field)? else {
        return Ok(None);
    };
    let date = dates::normalize(&partial).map_err(|source| ConversionError::Date { field, source })?;

    let mut rendered = String::new();
    write!(rendered, "{}", date.format(format))
        .map_err(|_| ConversionError::DateFormat(format.to_string()))?;
    Ok(Some(rendered))
}

/// Looks up a code; unknown codes are `None`, non-object terms are an error.
fn resolve(
    ctx: &ConversionContext<'_>,
    domain: OntologyDomain,
    code: &str,
) -> Result<Option<Value>, ConversionError> {
    let term = ctx
        .ontology
        .term(domain, code)
        .map_err(|source| ConversionError::Lookup {
            domain,
            code: code.to_string(),
            source,
        })?;

    match term {
        None => {
            tracing::debug!(%domain, code, "ontology code did not resolve, omitting");
            Ok(None)
        }
        Some(term @ Value::Object(_)) => Ok(Some(term)),
        Some(_) => Err(ConversionError::TermShape {
            domain,
            code: code.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::TermTable;
    use pedigree::Pedigree;
    use serde_json::json;

    struct FailingOntology;

    impl OntologyService for FailingOntology {
        fn term(&self, _: OntologyDomain, _: &str) -> Result<Option<Value>, OntologyError> {
            Err(OntologyError::Unavailable("index offline".into()))
        }
    }

    fn terms() -> TermTable {
        TermTable::new()
            .with_term(
                OntologyDomain::Phenotype,
                "HP:0001",
                json!({"id": "HP:0001", "name": "All"}),
            )
            .with_term(
                OntologyDomain::Phenotype,
                "HP:0003",
                json!({"id": "HP:0003", "name": "Third"}),
            )
            .with_term(
                OntologyDomain::Disorder,
                "MIM:143100",
                json!({"id": "MIM:143100", "name": "Huntington disease"}),
            )
    }

    fn convert_text(json_text: &str, ontology: &dyn OntologyService) -> Vec<InternalPatientRecord> {
        let doc = Pedigree::parse(json_text).unwrap();
        convert(&doc, &ConversionContext::new(ontology, "%Y-%m-%d"))
    }

    #[test]
    fn converts_proband_demographics_and_phenotypes() {
        let table = terms();
        let records = convert_text(
            r#"{"JSON_version": "1.0", "GG": [{"id": 0, "prop": {
                "fName": "Ann", "lName": "Lee", "gender": "F",
                "dob": {"year": "1980"}, "hpoTerms": ["HP:0001"]}}]}"#,
            &table,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].to_json(),
            json!({
                "sex": "F",
                "patient_name": {"first_name": "Ann", "last_name": "Lee"},
                "date_of_birth": "1980-01-01",
                "features": [{"id": "HP:0001", "name": "All", "observed": "yes", "type": "phenotype"}],
                "disorders": []
            })
        );
    }

    #[test]
    fn identity_fields_are_copied() {
        let table = terms();
        let records = convert_text(
            r#"{"GG": [{"id": 0, "prop": {"phenotipsId": "P0000007", "externalID": "EXT-9",
                "disorders": ["MIM:143100"]}}]}"#,
            &table,
        );
        let record = &records[0];
        assert_eq!(record.id.as_deref(), Some("P0000007"));
        assert_eq!(record.external_id.as_deref(), Some("EXT-9"));
        assert_eq!(
            record.disorders.as_ref().unwrap()[0]["name"],
            json!("Huntington disease")
        );
    }

    #[test]
    fn one_record_per_person_in_order_despite_failures() {
        let table = terms();
        let records = convert_text(
            r#"{"GG": [
                {"id": 0, "prop": {"fName": "A"}},
                {"id": 1, "prop": {"fName": "B", "dob": {"month": "3"}}},
                {"id": 2, "rel": true, "prop": {}},
                {"id": 3, "prop": {"fName": "C"}}
            ]}"#,
            &table,
        );

        let names: Vec<_> = records
            .iter()
            .map(|r| r.patient_name.as_ref().and_then(|n| n.first_name.clone()))
            .collect();
        assert_eq!(
            names,
            vec![Some("A".into()), Some("B".into()), Some("C".into())]
        );

        // The date stage failed for B: no dates and no later stages.
        assert!(records[1].date_of_birth.is_none());
        assert!(records[1].features.is_none());
        assert!(records[2].features.is_some());
    }

    #[test]
    fn unresolved_codes_are_omitted_in_order() {
        let table = terms();
        let records = convert_text(
            r#"{"GG": [{"id": 0, "prop": {"hpoTerms": ["HP:0001", "HP:0002", "HP:0003"]}}]}"#,
            &table,
        );
        let ids: Vec<_> = records[0]
            .features
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("HP:0001"), json!("HP:0003")]);
    }

    #[test]
    fn ontology_failure_stops_at_phenotypes() {
        let doc = Pedigree::parse(
            r#"{"GG": [{"id": 0, "prop": {"fName": "Ann", "dob": {"decade": "1980s"},
                "hpoTerms": ["HP:0001"]}}]}"#,
        )
        .unwrap();
        let ctx = ConversionContext::new(&FailingOntology, "%d/%m/%Y");
        let persons = doc.persons();

        match run_stages(&persons[0], &ctx, &STAGES) {
            PersonOutcome::Stopped {
                record,
                stage,
                error,
            } => {
                assert_eq!(stage, "phenotypes");
                assert!(matches!(error, ConversionError::Lookup { .. }));
                assert_eq!(record.date_of_birth.as_deref(), Some("01/01/1980"));
                assert!(record.features.is_none());
                assert!(record.disorders.is_none());
            }
            other => panic!("expected a stopped outcome, got {other:?}"),
        }
    }

    #[test]
    fn codes_without_lookups_never_touch_the_service() {
        let doc = Pedigree::parse(r#"{"GG": [{"id": 0, "prop": {"fName": "Ann"}}]}"#).unwrap();
        let ctx = ConversionContext::new(&FailingOntology, "%Y-%m-%d");
        let persons = doc.persons();
        let outcome = run_stages(&persons[0], &ctx, &STAGES);
        assert!(matches!(outcome, PersonOutcome::Complete(_)));
        assert_eq!(outcome.record().features, Some(vec![]));
    }

    #[test]
    fn non_object_terms_fail_the_stage() {
        let table = TermTable::new().with_term(OntologyDomain::Disorder, "MIM:1", json!("flat"));
        let doc = Pedigree::parse(r#"{"GG": [{"id": 0, "prop": {"disorders": ["MIM:1"]}}]}"#)
            .unwrap();
        let ctx = ConversionContext::new(&table, "%Y-%m-%d");
        let persons = doc.persons();
        match run_stages(&persons[0], &ctx, &STAGES) {
            PersonOutcome::Stopped { stage, error, .. } => {
                assert_eq!(stage, "disorders");
                assert!(matches!(error, ConversionError::TermShape { .. }));
            }
            other => panic!("expected a stopped outcome, got {other:?}"),
        }
    }

    #[test]
    fn stage_runner_stops_at_first_failure() {
        fn ok(
            _: &PersonNode<'_>,
            r: &mut InternalPatientRecord,
            _: &ConversionContext<'_>,
        ) -> Result<(), ConversionError> {
            r.sex = Some("M".into());
            Ok(())
        }
        fn fail(
            _: &PersonNode<'_>,
            _: &mut InternalPatientRecord,
            _: &ConversionContext<'_>,
        ) -> Result<(), ConversionError> {
            Err(ConversionError::DateFormat("%Q".into()))
        }
        fn never(
            _: &PersonNode<'_>,
            r: &mut InternalPatientRecord,
            _: &ConversionContext<'_>,
        ) -> Result<(), ConversionError> {
            r.id = Some("unreachable".into());
            Ok(())
        }

        let props = json!({});
        let person = PersonNode {
            node_id: 0,
            properties: props.as_object().unwrap(),
        };
        let table = TermTable::new();
        let ctx = ConversionContext::new(&table, "%Y");
        let stages: [(&'static str, Stage); 3] = [("ok", ok), ("fail", fail), ("never", never)];

        match run_stages(&person, &ctx, &stages) {
            PersonOutcome::Stopped { record, stage, .. } => {
                assert_eq!(stage, "fail");
                assert_eq!(record.sex.as_deref(), Some("M"));
                assert!(record.id.is_none());
            }
            other => panic!("expected a stopped outcome, got {other:?}"),
        }
    }

    #[test]
    fn version_mismatch_still_converts() {
        let table = terms();
        let records = convert_text(r#"{"JSON_version": "2.0", "GG": [{"id": 0, "prop": {}}]}"#, &table);
        assert_eq!(records.len(), 1);
    }
}
