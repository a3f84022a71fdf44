//! Pipeline configuration.
//!
//! Every knob has a default describing the 2022-2023 SESAI exports, so an
//! empty JSON object is a valid configuration file.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::columns::FieldSpec;
use crate::models::indicators::Indicator;
use crate::models::loader::TextEncoding;

/// Path to a JSON configuration file
pub const CONFIG_ENV_VAR: &str = "DSEI_COVERAGE_CONFIG";
/// Overrides `data_dir`
pub const DATA_DIR_ENV_VAR: &str = "DSEI_DATA_DIR";
/// Overrides `output_dir`
pub const OUTPUT_DIR_ENV_VAR: &str = "DSEI_OUTPUT_DIR";

/// One input file and how to read it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub indicator: Indicator,
    /// Relative to `data_dir` unless absolute
    pub file: PathBuf,
    /// Year the file covers; added to every row as the period column
    #[serde(default)]
    pub period: Option<i32>,
    /// Title rows above the header
    #[serde(default)]
    pub skip_rows: usize,
}

impl SourceSpec {
    pub fn new(name: &str, indicator: Indicator, file: &str, period: Option<i32>, skip_rows: usize) -> Self {
        Self {
            name: name.to_string(),
            indicator,
            file: PathBuf::from(file),
            period,
            skip_rows,
        }
    }
}

/// Candidate header substrings for every semantic field the pipeline uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCatalog {
    pub district: FieldSpec,
    pub pregnant: FieldSpec,
    pub prenatal_visits: FieldSpec,
    pub ultrasound: FieldSpec,
    pub live_births: FieldSpec,
    pub infant_deaths: FieldSpec,
    pub maternal_deaths: FieldSpec,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self {
            district: FieldSpec::required("district", &["dsei", "distrito"]),
            pregnant: FieldSpec::required("pregnant", &["gestante", "no_gestantes"]),
            prenatal_visits: FieldSpec::required("prenatal_visits", &["6 ou mais", "≥6", ">=6"]),
            ultrasound: FieldSpec::required(
                "ultrasound",
                &["ultrassom", "ultrassonografia", "acesso ao exame", "acesso"],
            ),
            live_births: FieldSpec::required("live_births", &["nascidos vivos", "nascidos"]),
            infant_deaths: FieldSpec::required("infant_deaths", &["obitos infantis", "infantil", "infantis"]),
            maternal_deaths: FieldSpec::optional("maternal_deaths", &["obitos maternos", "materno", "maternos"]),
        }
    }
}

impl FieldCatalog {
    pub fn all(&self) -> [&FieldSpec; 7] {
        [
            &self.district,
            &self.pregnant,
            &self.prenatal_visits,
            &self.ultrasound,
            &self.live_births,
            &self.infant_deaths,
            &self.maternal_deaths,
        ]
    }
}

/// Top-level configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Rows in each top/bottom selection
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Rows in the mortality rankings
    #[serde(default = "default_mortality_top_n")]
    pub mortality_top_n: usize,

    /// Largest and smallest gaps to highlight
    #[serde(default = "default_gap_highlights")]
    pub gap_highlights: usize,

    /// Largest period-over-period increases to highlight
    #[serde(default = "default_change_highlights")]
    pub change_highlights: usize,

    /// Reference coverage line (national target)
    #[serde(default = "default_benchmark")]
    pub benchmark: f64,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default)]
    pub encoding: TextEncoding,

    /// Name of the column that carries each source's period
    #[serde(default = "default_period_column")]
    pub period_column: String,

    #[serde(default)]
    pub fields: FieldCatalog,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSpec>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_top_n() -> usize {
    5
}

fn default_mortality_top_n() -> usize {
    10
}

fn default_gap_highlights() -> usize {
    3
}

fn default_change_highlights() -> usize {
    10
}

fn default_benchmark() -> f64 {
    0.45
}

fn default_delimiter() -> char {
    ','
}

fn default_period_column() -> String {
    "ano".to_string()
}

fn default_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec::new("Pré-natal 2022", Indicator::Prenatal, "prenatal2022.csv", Some(2022), 0),
        SourceSpec::new("Pré-natal 2023", Indicator::Prenatal, "prenatal2023.csv", Some(2023), 0),
        SourceSpec::new("Ultrassom 2022", Indicator::Ultrasound, "ultrassom2022.csv", Some(2022), 0),
        SourceSpec::new("Ultrassom 2023", Indicator::Ultrasound, "ultrassom 2023.csv", Some(2023), 0),
        SourceSpec::new("Óbitos 2022", Indicator::Mortality, "obitos 2022.csv", Some(2022), 3),
        SourceSpec::new("Óbitos 2023", Indicator::Mortality, "obitos 2023.csv", Some(2023), 3),
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            top_n: default_top_n(),
            mortality_top_n: default_mortality_top_n(),
            gap_highlights: default_gap_highlights(),
            change_highlights: default_change_highlights(),
            benchmark: default_benchmark(),
            delimiter: default_delimiter(),
            encoding: TextEncoding::default(),
            period_column: default_period_column(),
            fields: FieldCatalog::default(),
            sources: default_sources(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file (JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Defaults, or the file named by `DSEI_COVERAGE_CONFIG`, with directory
    /// overrides from `DSEI_DATA_DIR` and `DSEI_OUTPUT_DIR` applied on top
    pub fn from_env() -> AnalysisResult<Self> {
        let mut config = match env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading configuration from {}", path);
                Self::from_file(path.trim())?
            }
            _ => Self::default(),
        };
        if let Ok(dir) = env::var(DATA_DIR_ENV_VAR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var(OUTPUT_DIR_ENV_VAR) {
            config.output_dir = PathBuf::from(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.top_n == 0 {
            return Err(AnalysisError::Config("top_n must be at least 1".to_string()));
        }
        if !self.benchmark.is_finite() || self.benchmark < 0.0 {
            return Err(AnalysisError::Config(format!(
                "benchmark must be a non-negative number, got {}",
                self.benchmark
            )));
        }
        if !self.delimiter.is_ascii() {
            return Err(AnalysisError::Config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        if self.period_column.trim().is_empty() {
            return Err(AnalysisError::Config("period_column must not be blank".to_string()));
        }
        for field in self.fields.all() {
            if field.candidates.iter().all(|c| c.trim().is_empty()) {
                return Err(AnalysisError::EmptyCandidates(field.name.clone()));
            }
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    pub fn sources_for(&self, indicator: Indicator) -> Vec<&SourceSpec> {
        self.sources.iter().filter(|s| s.indicator == indicator).collect()
    }
}
