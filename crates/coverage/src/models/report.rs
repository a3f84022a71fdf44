use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::coverage::{CoverageRecord, CoverageResult};
use crate::models::indicators::Indicator;
use crate::models::mortality::MortalityReport;
use crate::models::ranking::Extremes;
use crate::models::regions::{MapPoint, RegionalMean};
use crate::models::summary::{GapReport, PeriodComparison, PeriodSummary};

/// File name written by [`JsonFileSink`]
pub const REPORT_FILE_NAME: &str = "coverage_report.json";

/// A source that could not be loaded or resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// An indicator whose processing was aborted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFailure {
    pub indicator: Indicator,
    pub error: String,
}

/// Everything computed for one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub indicator: Indicator,
    /// Sources that contributed rows
    pub sources: Vec<String>,
    pub records: Vec<CoverageRecord>,
    pub results: Vec<CoverageResult>,
    pub periods: Vec<PeriodSummary>,
    /// Present when the data spans at least two periods (first vs last)
    pub comparison: Option<PeriodComparison>,
    /// Mean of each district's coverage across periods
    pub averaged: Extremes<CoverageResult>,
    pub regional: Vec<RegionalMean>,
    /// Coverage above 100%, for data-quality review
    pub over_unity: Vec<CoverageResult>,
    pub skipped_rows: usize,
    pub coerced_cells: usize,
}

/// The full output of a pipeline run, handed to a [`ReportSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// RFC 3339 local timestamp
    pub generated_at: String,
    pub benchmark: f64,
    pub indicators: Vec<IndicatorReport>,
    /// Prenatal minus ultrasound coverage, pooled over all periods
    pub gap: Option<GapReport>,
    pub mortality: Option<MortalityReport>,
    pub map_period: Option<i32>,
    pub map: Vec<MapPoint>,
    pub source_failures: Vec<SourceFailure>,
    pub indicator_failures: Vec<IndicatorFailure>,
    pub warnings: Vec<String>,
}

impl PipelineReport {
    pub fn new(benchmark: f64) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            benchmark,
            indicators: Vec::new(),
            gap: None,
            mortality: None,
            map_period: None,
            map: Vec::new(),
            source_failures: Vec::new(),
            indicator_failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn indicator(&self, indicator: Indicator) -> Option<&IndicatorReport> {
        self.indicators.iter().find(|r| r.indicator == indicator)
    }

    /// Record a warning and log it
    pub fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn has_failures(&self) -> bool {
        !self.source_failures.is_empty() || !self.indicator_failures.is_empty()
    }
}

/// Consumer of a finished report (chart renderer, file export, ...)
pub trait ReportSink {
    fn publish(&self, report: &PipelineReport) -> AnalysisResult<()>;
}

/// Writes the report as pretty-printed JSON into an output directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }
}

impl ReportSink for JsonFileSink {
    fn publish(&self, report: &PipelineReport) -> AnalysisResult<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| AnalysisError::io(&self.output_dir, e))?;
        let path = self.path();
        let file = fs::File::create(&path).map_err(|e| AnalysisError::io(&path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), report)?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ratio::Ratio;
    use tempfile::TempDir;

    #[test]
    fn test_new_report_is_empty() {
        let report = PipelineReport::new(0.45);
        assert!(report.indicators.is_empty());
        assert!(!report.has_failures());
        assert!(chrono::DateTime::parse_from_rfc3339(&report.generated_at).is_ok());
    }

    #[test]
    fn test_json_sink_writes_report() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested").join("out");
        let sink = JsonFileSink::new(&output);

        let mut report = PipelineReport::new(0.45);
        report.warn("source 'x' has no data rows".to_string());
        report.map.push(MapPoint {
            group_key: "XINGU".to_string(),
            region: crate::models::regions::Region::CentroOeste,
            latitude: -11.0,
            longitude: -52.0,
            prenatal: Ratio::new(0.5),
            ultrasound: Ratio::UNDEFINED,
        });
        sink.publish(&report).unwrap();

        let text = fs::read_to_string(output.join(REPORT_FILE_NAME)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["benchmark"], 0.45);
        assert_eq!(value["map"][0]["region"], "Centro-Oeste");
        assert!(value["map"][0]["ultrasound"].is_null());
        assert_eq!(value["warnings"].as_array().unwrap().len(), 1);

        let back: PipelineReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
    }
}
