//! Ontology term resolution.
//!
//! Pedigrees reference phenotypes and disorders by short codes (`HP:0001250`, `MIM:143100`).
//! Converted records carry the full term object instead, resolved through an
//! [`OntologyService`]. Unknown codes resolve to `None`; only a failing service is an error.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The ontology a code is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OntologyDomain {
    Phenotype,
    Disorder,
}

impl OntologyDomain {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phenotype => "phenotype-ontology",
            Self::Disorder => "disorder-ontology",
        }
    }
}

impl fmt::Display for OntologyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OntologyError {
    #[error("ontology service unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read term table: {0}")]
    FileRead(std::io::Error),
    #[error("term table does not match schema: {0}")]
    Schema(String),
}

/// Resolves ontology codes to term objects.
pub trait OntologyService {
    /// Looks up `code` in `domain`.
    ///
    /// Returns `Ok(None)` when the code is unknown.
    fn term(&self, domain: OntologyDomain, code: &str) -> Result<Option<Value>, OntologyError>;
}

impl<T: OntologyService + ?Sized> OntologyService for &T {
    fn term(&self, domain: OntologyDomain, code: &str) -> Result<Option<Value>, OntologyError> {
        (**self).term(domain, code)
    }
}

/// In-process term table, usually loaded from YAML.
///
/// ```yaml
/// phenotype-ontology:
///   HP:0001250:
///     id: HP:0001250
///     name: Seizures
/// disorder-ontology:
///   MIM:143100:
///     id: MIM:143100
///     name: Huntington disease
/// ```
#[derive(Clone, Debug, Default)]
pub struct TermTable {
    phenotypes: BTreeMap<String, Value>,
    disorders: BTreeMap<String, Value>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TermTableWire {
    #[serde(rename = "phenotype-ontology", default)]
    phenotypes: BTreeMap<String, Value>,
    #[serde(rename = "disorder-ontology", default)]
    disorders: BTreeMap<String, Value>,
}

impl TermTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a term.
    pub fn insert(&mut self, domain: OntologyDomain, code: impl Into<String>, term: Value) {
        self.entries_mut(domain).insert(code.into(), term);
    }

    pub fn with_term(mut self, domain: OntologyDomain, code: impl Into<String>, term: Value) -> Self {
        self.insert(domain, code, term);
        self
    }

    pub fn len(&self) -> usize {
        self.phenotypes.len() + self.disorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parses a term table from YAML text.
    ///
    /// Schema errors name the failing path (e.g. `phenotype-ontology`).
    pub fn parse(yaml_text: &str) -> Result<Self, OntologyError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire: TermTableWire = serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            let source = err.into_inner();
            OntologyError::Schema(format!("term table mismatch at {path}: {source}"))
        })?;

        Ok(Self {
            phenotypes: wire.phenotypes,
            disorders: wire.disorders,
        })
    }

    /// Loads a term table from a YAML file.
    pub fn load(path: &Path) -> Result<Self, OntologyError> {
        let text = std::fs::read_to_string(path).map_err(OntologyError::FileRead)?;
        let table = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), terms = table.len(), "loaded ontology term table");
        Ok(table)
    }

    fn entries(&self, domain: OntologyDomain) -> &BTreeMap<String, Value> {
        match domain {
            OntologyDomain::Phenotype => &self.phenotypes,
            OntologyDomain::Disorder => &self.disorders,
        }
    }

    fn entries_mut(&mut self, domain: OntologyDomain) -> &mut BTreeMap<String, Value> {
        match domain {
            OntologyDomain::Phenotype => &mut self.phenotypes,
            OntologyDomain::Disorder => &mut self.disorders,
        }
    }
}

impl OntologyService for TermTable {
    fn term(&self, domain: OntologyDomain, code: &str) -> Result<Option<Value>, OntologyError> {
        Ok(self.entries(domain).get(code.trim()).cloned())
    }
}
