//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Library code never reads process-wide environment variables; the
//! binaries do that and hand the values to the helpers here.

use crate::author::Author;
use crate::constants::{DEFAULT_DATE_FORMAT, FAMILIES_DIR_NAME, PATIENTS_DIR_NAME};
use crate::error::{CoreError, CoreResult};
use crate::ontology::{OntologyError, TermTable};
use chrono::format::{Item, StrftimeItems};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    date_format: String,
    author: Author,
    ontology_file: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if `date_format` is not a usable strftime pattern.
    pub fn new(
        data_dir: PathBuf,
        date_format: String,
        author: Author,
        ontology_file: Option<PathBuf>,
    ) -> CoreResult<Self> {
        validate_date_format(&date_format)?;

        Ok(Self {
            data_dir,
            date_format,
            author,
            ontology_file,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn patients_dir(&self) -> PathBuf {
        self.data_dir.join(PATIENTS_DIR_NAME)
    }

    pub fn families_dir(&self) -> PathBuf {
        self.data_dir.join(FAMILIES_DIR_NAME)
    }

    /// Date format (chrono strftime syntax) for dates in converted records.
    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Optional YAML term table backing the ontology service.
    pub fn ontology_file(&self) -> Option<&Path> {
        self.ontology_file.as_deref()
    }

    /// Loads the configured term table. Without an ontology file every code is unresolved.
    pub fn term_table(&self) -> Result<TermTable, OntologyError> {
        match self.ontology_file() {
            Some(path) => TermTable::load(path),
            None => Ok(TermTable::new()),
        }
    }
}

/// Checks that `format` is a non-empty strftime pattern chrono can render.
pub fn validate_date_format(format: &str) -> CoreResult<()> {
    if format.trim().is_empty() {
        return Err(CoreError::InvalidInput("date format cannot be empty".into()));
    }

    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(CoreError::InvalidInput(format!(
            "date format '{format}' is not a valid strftime pattern"
        )));
    }

    Ok(())
}

/// Parse the date format from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_DATE_FORMAT`].
pub fn date_format_from_env_value(value: Option<String>) -> CoreResult<String> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

    validate_date_format(&value)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Author {
        Author::new("Test Author", "test@example.com").unwrap()
    }

    #[test]
    fn default_date_format_when_unset() {
        assert_eq!(date_format_from_env_value(None).unwrap(), "%Y-%m-%d");
        assert_eq!(
            date_format_from_env_value(Some("   ".into())).unwrap(),
            "%Y-%m-%d"
        );
    }

    #[test]
    fn rejects_broken_date_format() {
        let err = date_format_from_env_value(Some("%Y-%".into())).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn derives_store_directories() {
        let cfg = CoreConfig::new(
            PathBuf::from("/data"),
            "%d/%m/%Y".into(),
            author(),
            None,
        )
        .unwrap();
        assert_eq!(cfg.patients_dir(), PathBuf::from("/data/patients"));
        assert_eq!(cfg.families_dir(), PathBuf::from("/data/families"));
        assert_eq!(cfg.date_format(), "%d/%m/%Y");
        assert!(cfg.ontology_file().is_none());
        assert!(cfg.term_table().unwrap().is_empty());
    }

    #[test]
    fn term_table_comes_from_configured_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("terms.yaml");
        std::fs::write(
            &path,
            "phenotype-ontology:\n  HP:0001250:\n    id: HP:0001250\n    name: Seizure\n",
        )
        .unwrap();

        let cfg = CoreConfig::new(PathBuf::from("/data"), "%Y".into(), author(), Some(path)).unwrap();
        assert_eq!(cfg.term_table().unwrap().len(), 1);

        let missing = CoreConfig::new(
            PathBuf::from("/data"),
            "%Y".into(),
            author(),
            Some(temp_dir.path().join("absent.yaml")),
        )
        .unwrap();
        assert!(missing.term_table().is_err());
    }
}
