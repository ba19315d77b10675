use crate::data::data_exporter::{ExportOptions, OutputFormat};
use crate::data::datatable_loaders::LoadOptions;
use crate::data::schema_inference::DEFAULT_SAMPLE_ROWS;
use crate::data::type_inference::{CoercionOptions, TypeCoercer};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub loading: LoadingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Data rows sampled per file for type inference, 0 for the whole file
    pub sample_rows: usize,

    /// Boolean vocabulary and date/time formats
    #[serde(flatten)]
    pub coercion: CoercionOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Number of header rows in input files
    pub header_rows: usize,

    /// Separator used when flattening multi-row headers
    pub header_joiner: String,

    /// Detailed anomalies kept per table
    pub anomaly_report_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Format used when none is given on the command line
    pub default_format: OutputFormat,

    /// Marker for null cells in text output
    pub text_null: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            coercion: CoercionOptions::default(),
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        let defaults = LoadOptions::default();
        Self {
            header_rows: defaults.header_rows,
            header_joiner: defaults.header_joiner,
            anomaly_report_limit: defaults.anomaly_report_limit,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Text,
            text_null: "NULL".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("heimdall").join("config.toml"))
    }

    /// Write the commented default config to `path` unless a file is already there
    pub fn init_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, Self::create_default_with_comments())
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(true)
    }

    pub fn coercer(&self) -> TypeCoercer {
        TypeCoercer::new(&self.inference.coercion)
    }

    /// Loader options before command line overrides
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            header_rows: self.loading.header_rows,
            header_joiner: self.loading.header_joiner.clone(),
            sample_rows: Some(self.inference.sample_rows).filter(|n| *n > 0),
            anomaly_report_limit: self.loading.anomaly_report_limit,
            ..LoadOptions::default()
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            include: None,
            text_null: self.output.text_null.clone(),
        }
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# heimdall configuration file
# Location: ~/.config/heimdall/config.toml (Linux)
#           ~/Library/Application Support/heimdall/config.toml (macOS)
#           %APPDATA%\heimdall\config.toml (Windows)

[inference]
# Data rows sampled per file when inferring column types (0 = whole file)
sample_rows = 1000

# Words read as booleans, compared case-insensitively.
# Add "1"/"0" or "yes"/"no" here to treat them as booleans instead of numbers/text.
true_values = ["true"]
false_values = ["false"]

# chrono format strings tried in order after RFC 3339
datetime_formats = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y",
    "%d-%m-%Y",
]

[loading]
# Header rows at the top of each input (after any skipped rows)
header_rows = 1

# Joiner for flattening multi-row headers ("Sales" + "Q1" -> "Sales_Q1")
header_joiner = "_"

# Detailed anomalies listed per table; counts are always complete
anomaly_report_limit = 20

[output]
# json, yaml, markdown, csv, xlsx, html or text
default_format = "text"

# How nulls appear in text output
text_null = "NULL"
"#
        .to_string()
    }
}
