use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::coverage::{CoverageRecord, CoverageResult};
use crate::models::ranking::{rank_by, top_n, Direction, Ranked};
use crate::models::ratio::Ratio;

/// Rates are expressed per this many live births
pub const PER_THOUSAND: f64 = 1_000.0;

/// Summed vital counts for one district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityCounts {
    pub group_key: String,
    pub live_births: f64,
    pub infant_deaths: f64,
    /// Present only when the source carried a maternal deaths column
    pub maternal_deaths: Option<f64>,
}

impl MortalityCounts {
    fn record(&self) -> CoverageRecord {
        CoverageRecord::new(&self.group_key, self.infant_deaths, self.live_births, None)
    }
}

/// One district's mortality next to its prenatal coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityRow {
    pub group_key: String,
    pub live_births: f64,
    pub infant_deaths: f64,
    pub maternal_deaths: Option<f64>,
    pub mortality_per_1000: Ratio,
    pub survival_per_1000: Ratio,
    pub prenatal_coverage: Ratio,
}

impl Ranked for MortalityRow {
    fn rank_value(&self) -> Ratio {
        self.mortality_per_1000
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityReport {
    pub rows: Vec<MortalityRow>,
    pub top_by_births: Vec<MortalityRow>,
    pub top_by_mortality: Vec<MortalityRow>,
    /// Districts with counts but no prenatal coverage to join against
    pub unmatched: Vec<String>,
}

/// Join per-district vital counts with prenatal coverage (inner join on the
/// district, in the order of `counts`) and rank the result.
///
/// # Example
/// ```rust
/// use coverage::models::coverage::CoverageResult;
/// use coverage::models::mortality::{mortality_report, MortalityCounts};
/// use coverage::models::ratio::Ratio;
///
/// let counts = vec![MortalityCounts {
///     group_key: "YANOMAMI".to_string(),
///     live_births: 800.0,
///     infant_deaths: 40.0,
///     maternal_deaths: None,
/// }];
/// let prenatal = vec![CoverageResult::new("YANOMAMI", Ratio::new(0.2), None)];
/// let report = mortality_report(&counts, &prenatal, 10);
/// assert_eq!(report.rows[0].mortality_per_1000.value(), Some(50.0));
/// assert_eq!(report.rows[0].survival_per_1000.value(), Some(950.0));
/// ```
pub fn mortality_report(counts: &[MortalityCounts], prenatal: &[CoverageResult], n: usize) -> MortalityReport {
    let mut coverage: HashMap<&str, Ratio> = HashMap::new();
    for result in prenatal {
        coverage.entry(result.group_key.as_str()).or_insert(result.coverage);
    }

    let mut rows = Vec::with_capacity(counts.len());
    let mut unmatched = Vec::new();
    for count in counts {
        let Some(&prenatal_coverage) = coverage.get(count.group_key.as_str()) else {
            unmatched.push(count.group_key.clone());
            continue;
        };
        let record = count.record();
        rows.push(MortalityRow {
            group_key: count.group_key.clone(),
            live_births: count.live_births,
            infant_deaths: count.infant_deaths,
            maternal_deaths: count.maternal_deaths,
            mortality_per_1000: record.rate_per(PER_THOUSAND),
            survival_per_1000: record.complement_rate_per(PER_THOUSAND),
            prenatal_coverage,
        });
    }
    if !unmatched.is_empty() {
        log::warn!(
            "{} districts have mortality data but no prenatal coverage: {}",
            unmatched.len(),
            unmatched.join(", ")
        );
    }

    let mut top_by_births = rank_by(&rows, Direction::Top, |r| Ratio::new(r.live_births));
    top_by_births.truncate(n);
    let top_by_mortality = top_n(&rows, n);

    MortalityReport {
        rows,
        top_by_births,
        top_by_mortality,
        unmatched,
    }
}
