use serde::{Deserialize, Serialize};

use crate::models::ratio::Ratio;

/// Summed numerator and denominator counts for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub group_key: String,
    /// Qualifying events, e.g. pregnant women with six or more consultations
    pub numerator: f64,
    /// Eligible population; expected to be >= numerator but not enforced
    pub denominator: f64,
    pub period: Option<i32>,
}

impl CoverageRecord {
    pub fn new(group_key: &str, numerator: f64, denominator: f64, period: Option<i32>) -> Self {
        Self {
            group_key: group_key.to_string(),
            numerator,
            denominator,
            period,
        }
    }

    pub fn coverage(&self) -> CoverageResult {
        CoverageResult {
            group_key: self.group_key.clone(),
            coverage: Ratio::of(self.numerator, self.denominator),
            period: self.period,
        }
    }

    /// Numerator per `per` units of denominator, e.g. deaths per 1,000 live births
    pub fn rate_per(&self, per: f64) -> Ratio {
        Ratio::of(self.numerator, self.denominator).scaled(per)
    }

    /// Complement rate: `(denominator - numerator) / denominator * per`
    pub fn complement_rate_per(&self, per: f64) -> Ratio {
        Ratio::of(self.denominator - self.numerator, self.denominator).scaled(per)
    }
}

/// Coverage ratio for one group; undefined when the denominator was zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub group_key: String,
    pub coverage: Ratio,
    pub period: Option<i32>,
}

impl CoverageResult {
    pub fn new(group_key: &str, coverage: Ratio, period: Option<i32>) -> Self {
        Self {
            group_key: group_key.to_string(),
            coverage,
            period,
        }
    }
}

/// Coverage for every record, in input order. Values are never clamped.
pub fn compute_coverage(records: &[CoverageRecord]) -> Vec<CoverageResult> {
    let results: Vec<CoverageResult> = records.iter().map(CoverageRecord::coverage).collect();
    let undefined = results.iter().filter(|r| !r.coverage.is_defined()).count();
    if undefined > 0 {
        log::debug!("{} of {} groups have an undefined coverage (zero denominator)", undefined, results.len());
    }
    results
}

/// Results whose coverage exceeds 100%, kept for manual data-quality review
pub fn over_unity(results: &[CoverageResult]) -> Vec<CoverageResult> {
    results
        .iter()
        .filter(|r| r.coverage.exceeds_unity())
        .cloned()
        .collect()
}

/// Results for a single period, preserving order
pub fn for_period(results: &[CoverageResult], period: i32) -> Vec<CoverageResult> {
    results
        .iter()
        .filter(|r| r.period == Some(period))
        .cloned()
        .collect()
}

/// Distinct periods present, ascending
pub fn periods(results: &[CoverageResult]) -> Vec<i32> {
    let mut periods: Vec<i32> = results.iter().filter_map(|r| r.period).collect();
    periods.sort_unstable();
    periods.dedup();
    periods
}
