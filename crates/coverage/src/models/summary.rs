//! Summaries built on top of the coverage and ranking primitives: per-period
//! totals, two-period comparisons and gap statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::coverage::{compute_coverage, CoverageRecord, CoverageResult};
use crate::models::ranking::{compute_gaps, extremes, period_changes, rank, Direction, Extremes, GapResult, PeriodChange};
use crate::models::ratio::{mean_defined, Ratio};

/// Totals and rankings for one period of one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Option<i32>,
    pub numerator: f64,
    pub denominator: f64,
    /// Pooled ratio over every district: sum of numerators / sum of denominators
    pub overall: Ratio,
    /// Unweighted mean of the defined district ratios
    pub mean_coverage: Ratio,
    pub districts: usize,
    /// Districts at or above the benchmark; `None` when no benchmark applies
    pub meeting_benchmark: Option<usize>,
    pub rankings: Extremes<CoverageResult>,
}

/// Pooled ratio of a set of records
pub fn overall_ratio(records: &[CoverageRecord]) -> Ratio {
    let numerator: f64 = records.iter().map(|r| r.numerator).sum();
    let denominator: f64 = records.iter().map(|r| r.denominator).sum();
    Ratio::of(numerator, denominator)
}

/// Summarize the records of a single period
pub fn summarize_period(
    records: &[CoverageRecord],
    period: Option<i32>,
    top_n: usize,
    benchmark: Option<f64>,
) -> PeriodSummary {
    let selected: Vec<CoverageRecord> = records.iter().filter(|r| r.period == period).cloned().collect();
    let results = compute_coverage(&selected);

    PeriodSummary {
        period,
        numerator: selected.iter().map(|r| r.numerator).sum(),
        denominator: selected.iter().map(|r| r.denominator).sum(),
        overall: overall_ratio(&selected),
        mean_coverage: mean_defined(results.iter().map(|r| r.coverage)),
        districts: results.len(),
        meeting_benchmark: benchmark.map(|b| results.iter().filter(|r| r.coverage.meets(b)).count()),
        rankings: extremes(&results, top_n),
    }
}

/// One summary per distinct period in `records`, ascending. Records without a
/// period are summarized together under `None`, after the dated ones.
pub fn summarize_periods(records: &[CoverageRecord], top_n: usize, benchmark: Option<f64>) -> Vec<PeriodSummary> {
    let mut periods: Vec<Option<i32>> = records.iter().map(|r| r.period).collect();
    periods.sort_by_key(|p| (p.is_none(), *p));
    periods.dedup();
    periods
        .into_iter()
        .map(|period| summarize_period(records, period, top_n, benchmark))
        .collect()
}

/// How an indicator moved between two periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub earlier_period: i32,
    pub later_period: i32,
    pub overall_earlier: Ratio,
    pub overall_later: Ratio,
    /// Relative change of the pooled ratio
    pub overall_change: Ratio,
    /// Later-period coverage of the districts present in both periods
    pub paired: Extremes<CoverageResult>,
    /// Every paired district, largest relative change first; undefined
    /// changes are kept at the end in input order
    pub changes: Vec<PeriodChange>,
    pub largest_increases: Vec<PeriodChange>,
}

/// Compare two periods of the same indicator
///
/// # Arguments
/// * `records` - summed counts for every (district, period)
/// * `earlier`, `later` - the periods to compare
/// * `top_n` - size of the paired top/bottom selections
/// * `highlights` - number of largest increases to single out
pub fn compare_periods(
    records: &[CoverageRecord],
    earlier: i32,
    later: i32,
    top_n: usize,
    highlights: usize,
) -> PeriodComparison {
    let results = compute_coverage(records);
    let changes = period_changes(&results, earlier, later);

    let paired_keys: HashSet<&str> = changes.iter().map(|c| c.group_key.as_str()).collect();
    let paired_later: Vec<CoverageResult> = results
        .iter()
        .filter(|r| r.period == Some(later) && paired_keys.contains(r.group_key.as_str()))
        .cloned()
        .collect();

    let mut sorted = rank(&changes, Direction::Top);
    let largest_increases: Vec<PeriodChange> = sorted
        .iter()
        .filter(|c| c.change.value().is_some_and(|v| v > 0.0))
        .take(highlights)
        .cloned()
        .collect();
    sorted.extend(changes.iter().filter(|c| !c.change.is_defined()).cloned());

    let in_period = |period: i32| -> Vec<CoverageRecord> {
        records.iter().filter(|r| r.period == Some(period)).cloned().collect()
    };
    let overall_earlier = overall_ratio(&in_period(earlier));
    let overall_later = overall_ratio(&in_period(later));

    PeriodComparison {
        earlier_period: earlier,
        later_period: later,
        overall_earlier,
        overall_later,
        overall_change: overall_earlier.relative_change_to(overall_later),
        paired: extremes(&paired_later, top_n),
        changes: sorted,
        largest_increases,
    }
}

/// Counts and means over a set of gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub groups: usize,
    pub positive: usize,
    pub negative: usize,
    pub mean_a: Ratio,
    pub mean_b: Ratio,
    pub mean_gap: Ratio,
}

pub fn summarize_gaps(gaps: &[GapResult]) -> GapSummary {
    let positive = gaps.iter().filter(|g| g.gap.value().is_some_and(|v| v > 0.0)).count();
    let negative = gaps.iter().filter(|g| g.gap.value().is_some_and(|v| v < 0.0)).count();
    GapSummary {
        groups: gaps.len(),
        positive,
        negative,
        mean_a: mean_defined(gaps.iter().map(|g| g.coverage_a)),
        mean_b: mean_defined(gaps.iter().map(|g| g.coverage_b)),
        mean_gap: mean_defined(gaps.iter().map(|g| g.gap)),
    }
}

/// Gap between two coverage series with its highlights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Largest gap first; undefined gaps last
    pub rows: Vec<GapResult>,
    pub summary: GapSummary,
    pub largest: Vec<GapResult>,
    pub smallest: Vec<GapResult>,
}

/// Join `a` and `b`, sort by gap and pick the `highlights` extremes
///
/// # Example
/// ```rust
/// use coverage::models::coverage::CoverageResult;
/// use coverage::models::ratio::Ratio;
/// use coverage::models::summary::gap_report;
///
/// let prenatal = vec![
///     CoverageResult::new("X", Ratio::new(0.6), None),
///     CoverageResult::new("Y", Ratio::new(0.3), None),
/// ];
/// let ultrasound = vec![CoverageResult::new("X", Ratio::new(0.4), None)];
/// let report = gap_report(&prenatal, &ultrasound, 3);
/// assert_eq!(report.rows.len(), 1);
/// assert_eq!(report.summary.positive, 1);
/// ```
pub fn gap_report(a: &[CoverageResult], b: &[CoverageResult], highlights: usize) -> GapReport {
    let gaps = compute_gaps(a, b);
    let summary = summarize_gaps(&gaps);
    let chosen = extremes(&gaps, highlights);

    let mut rows = rank(&gaps, Direction::Top);
    rows.extend(gaps.iter().filter(|g| !g.gap.is_defined()).cloned());

    GapReport {
        rows,
        summary,
        largest: chosen.top,
        smallest: chosen.bottom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<CoverageRecord> {
        vec![
            CoverageRecord::new("A", 20.0, 100.0, Some(2022)),
            CoverageRecord::new("B", 50.0, 100.0, Some(2022)),
            CoverageRecord::new("C", 0.0, 0.0, Some(2022)),
            CoverageRecord::new("D", 10.0, 40.0, Some(2022)),
            CoverageRecord::new("A", 30.0, 100.0, Some(2023)),
            CoverageRecord::new("B", 40.0, 100.0, Some(2023)),
            CoverageRecord::new("C", 5.0, 10.0, Some(2023)),
        ]
    }

    #[test]
    fn test_period_summary() {
        let summary = summarize_period(&records(), Some(2022), 2, Some(0.45));
        assert_eq!(summary.districts, 4);
        assert_eq!(summary.numerator, 80.0);
        assert_eq!(summary.denominator, 240.0);
        assert!((summary.overall.value().unwrap() - 80.0 / 240.0).abs() < 1e-12);
        assert_eq!(summary.meeting_benchmark, Some(1));
        assert_eq!(summary.rankings.top[0].group_key, "B");
        assert_eq!(summary.rankings.bottom[0].group_key, "A");
        assert_eq!(summary.rankings.bottom.len(), 2);
    }

    #[test]
    fn test_mean_excludes_undefined() {
        let summary = summarize_period(&records(), Some(2022), 5, None);
        let expected = (0.2 + 0.5 + 0.25) / 3.0;
        assert!((summary.mean_coverage.value().unwrap() - expected).abs() < 1e-12);
        assert_eq!(summary.meeting_benchmark, None);
    }

    #[test]
    fn test_summaries_per_period_in_order() {
        let mut input = records();
        input.push(CoverageRecord::new("E", 1.0, 2.0, None));
        let summaries = summarize_periods(&input, 5, None);
        let periods: Vec<Option<i32>> = summaries.iter().map(|s| s.period).collect();
        assert_eq!(periods, vec![Some(2022), Some(2023), None]);
    }

    #[test]
    fn test_compare_periods() {
        let comparison = compare_periods(&records(), 2022, 2023, 5, 10);
        assert_eq!(comparison.changes.len(), 3);
        assert_eq!(comparison.changes[0].group_key, "A");
        assert!((comparison.changes[0].change.value().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(comparison.changes[1].group_key, "B");
        assert!(!comparison.changes[2].change.is_defined());

        assert_eq!(comparison.largest_increases.len(), 1);
        assert_eq!(comparison.paired.top.len(), 3);
        assert_eq!(comparison.paired.top[0].group_key, "C");
        assert!(comparison.paired.top.iter().all(|r| r.period == Some(2023)));

        let expected = (75.0 / 210.0) / (80.0 / 240.0) - 1.0;
        assert!((comparison.overall_change.value().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_gap_report() {
        let a = vec![
            CoverageResult::new("X", Ratio::new(0.6), None),
            CoverageResult::new("Y", Ratio::new(0.3), None),
            CoverageResult::new("Z", Ratio::UNDEFINED, None),
            CoverageResult::new("W", Ratio::new(0.1), None),
        ];
        let b = vec![
            CoverageResult::new("W", Ratio::new(0.2), None),
            CoverageResult::new("Z", Ratio::new(0.2), None),
            CoverageResult::new("Y", Ratio::new(0.3), None),
            CoverageResult::new("X", Ratio::new(0.4), None),
        ];
        let report = gap_report(&a, &b, 1);
        let order: Vec<&str> = report.rows.iter().map(|g| g.group_key.as_str()).collect();
        assert_eq!(order, vec!["X", "Y", "W", "Z"]);
        assert_eq!(report.summary.groups, 4);
        assert_eq!(report.summary.positive, 1);
        assert_eq!(report.summary.negative, 1);
        assert_eq!(report.largest[0].group_key, "X");
        assert_eq!(report.smallest[0].group_key, "W");
        assert!((report.summary.mean_gap.value().unwrap() - (0.2 + 0.0 - 0.1) / 3.0).abs() < 1e-9);
    }
}
