use crate::data::datatable_loaders::{load_file_to_datatable, LoadOptions, LoadReport};
use crate::data::registry::TableRegistry;
use crate::data::type_inference::TypeCoercer;
use crate::error::{HeimdallError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One input file and the table name it should be registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub alias: Option<String>,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl FromStr for InputFile {
    type Err = HeimdallError;

    /// Parses `path` or `path:alias`. A colon only separates an alias when what
    /// follows it has no path separator, so `C:\data.csv` stays a path.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(HeimdallError::Schema("empty input file argument".to_string()));
        }

        if let Some((path, alias)) = s.rsplit_once(':') {
            let looks_like_alias = !alias.is_empty()
                && !alias.contains(['/', '\\'])
                && path.len() > 1;
            if looks_like_alias {
                return Ok(InputFile::new(path).with_alias(alias));
            }
        }

        Ok(InputFile::new(s))
    }
}

impl fmt::Display for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}:{}", self.path.display(), alias),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Service responsible for turning input files into registered tables
pub struct DataLoaderService {
    options: LoadOptions,
    coercer: TypeCoercer,
}

impl DataLoaderService {
    pub fn new(options: LoadOptions, coercer: TypeCoercer) -> Self {
        Self { options, coercer }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn coercer(&self) -> &TypeCoercer {
        &self.coercer
    }

    /// Load one file and register it. Without an alias the table gets the
    /// registry's next default name.
    pub fn load_file(&self, input: &InputFile, registry: &mut TableRegistry) -> Result<LoadReport> {
        Self::check_exists(&input.path)?;
        let start = Instant::now();

        let name = input
            .alias
            .clone()
            .unwrap_or_else(|| registry.default_name());
        if registry.contains(&name) {
            return Err(HeimdallError::DuplicateTable(name));
        }

        let loaded = load_file_to_datatable(&input.path, &name, &self.options, &self.coercer)?;
        debug!(table = %name, "Loaded table\n{}", loaded.table.debug_dump());
        let mut report = loaded.report;
        report.table = registry.register(loaded.table, Some(&name))?;

        info!(
            table = %report.table,
            path = %input.path.display(),
            rows = report.rows_loaded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded file"
        );
        if !report.is_clean() {
            warn!(
                table = %report.table,
                anomalies = report.anomaly_count(),
                "Load finished with anomalies"
            );
        }

        Ok(report)
    }

    /// Load every input in argument order
    pub fn load_all(&self, inputs: &[InputFile], registry: &mut TableRegistry) -> Result<Vec<LoadReport>> {
        if inputs.is_empty() {
            return Err(HeimdallError::Schema("no input files given".to_string()));
        }

        inputs
            .iter()
            .map(|input| self.load_file(input, registry))
            .collect()
    }

    fn check_exists(path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(HeimdallError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file not found: {}", path.display()),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_input_file() {
        assert_eq!("data.csv".parse::<InputFile>().unwrap(), InputFile::new("data.csv"));
        assert_eq!(
            "data/users.csv:users".parse::<InputFile>().unwrap(),
            InputFile::new("data/users.csv").with_alias("users")
        );
        assert_eq!(
            "C:\\data\\users.csv".parse::<InputFile>().unwrap(),
            InputFile::new("C:\\data\\users.csv")
        );
        assert_eq!(
            "C:\\data\\users.csv:u".parse::<InputFile>().unwrap(),
            InputFile::new("C:\\data\\users.csv").with_alias("u")
        );
        assert!("".parse::<InputFile>().is_err());
    }

    #[test]
    fn test_load_all_assigns_names_in_order() {
        let first = csv_file("id,name\n1,Alice\n");
        let second = csv_file("ref_id,total\n1,9.5\n");
        let third = csv_file("x\n1\n");

        let service = DataLoaderService::new(LoadOptions::default(), TypeCoercer::default());
        let mut registry = TableRegistry::new();
        let inputs = vec![
            InputFile::new(first.path()),
            InputFile::new(second.path()).with_alias("orders"),
            InputFile::new(third.path()),
        ];

        let reports = service.load_all(&inputs, &mut registry).unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(names, vec!["table_0", "orders", "table_2"]);
        assert_eq!(registry.resolve("orders").unwrap().row_count(), 1);
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let first = csv_file("id\n1\n");
        let second = csv_file("id\n2\n");
        let service = DataLoaderService::new(LoadOptions::default(), TypeCoercer::default());
        let mut registry = TableRegistry::new();

        let inputs = vec![
            InputFile::new(first.path()).with_alias("t"),
            InputFile::new(second.path()).with_alias("T"),
        ];
        let err = service.load_all(&inputs, &mut registry).unwrap_err();
        assert!(matches!(err, HeimdallError::DuplicateTable(_)));
    }

    #[test]
    fn test_missing_file() {
        let service = DataLoaderService::new(LoadOptions::default(), TypeCoercer::default());
        let mut registry = TableRegistry::new();
        let err = service
            .load_file(&InputFile::new("/definitely/not/here.csv"), &mut registry)
            .unwrap_err();
        assert!(matches!(err, HeimdallError::Io(_)));
        assert!(registry.is_empty());
    }
}
