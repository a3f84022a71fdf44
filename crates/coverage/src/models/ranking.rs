use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::coverage::CoverageResult;
use crate::models::ratio::{mean_defined, Ratio};

/// Anything that can be ordered by a possibly-undefined value
pub trait Ranked {
    fn rank_value(&self) -> Ratio;
}

impl Ranked for CoverageResult {
    fn rank_value(&self) -> Ratio {
        self.coverage
    }
}

/// Coverage comparison between two series for the same group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapResult {
    pub group_key: String,
    pub coverage_a: Ratio,
    pub coverage_b: Ratio,
    /// `coverage_a - coverage_b`
    pub gap: Ratio,
}

impl Ranked for GapResult {
    fn rank_value(&self) -> Ratio {
        self.gap
    }
}

/// Coverage for the same group in two periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodChange {
    pub group_key: String,
    pub earlier_period: i32,
    pub later_period: i32,
    pub earlier: Ratio,
    pub later: Ratio,
    /// `(later - earlier) / earlier`
    pub change: Ratio,
}

impl Ranked for PeriodChange {
    fn rank_value(&self) -> Ratio {
        self.change
    }
}

/// Sort direction for [`rank`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Top,
    Bottom,
}

/// All items with a defined rank value, sorted descending (`Top`) or
/// ascending (`Bottom`). The sort is stable: ties keep input order.
pub fn rank<T: Ranked + Clone>(items: &[T], direction: Direction) -> Vec<T> {
    rank_by(items, direction, T::rank_value)
}

/// Like [`rank`] but ordered by an arbitrary key
pub fn rank_by<T, F>(items: &[T], direction: Direction, key: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> Ratio,
{
    let mut defined: Vec<(f64, &T)> = items
        .iter()
        .filter_map(|item| key(item).value().map(|v| (v, item)))
        .collect();
    match direction {
        Direction::Top => defined.sort_by(|a, b| b.0.total_cmp(&a.0)),
        Direction::Bottom => defined.sort_by(|a, b| a.0.total_cmp(&b.0)),
    }
    defined.into_iter().map(|(_, item)| item.clone()).collect()
}

/// The `n` items with the greatest defined value, descending.
/// Undefined values are never selected.
///
/// # Example
/// ```rust
/// use coverage::models::coverage::CoverageRecord;
/// use coverage::models::ranking::top_n;
///
/// let results = vec![
///     CoverageRecord::new("A", 50.0, 100.0, None).coverage(),
///     CoverageRecord::new("B", 0.0, 0.0, None).coverage(),
/// ];
/// let top = top_n(&results, 1);
/// assert_eq!(top.len(), 1);
/// assert_eq!(top[0].group_key, "A");
/// ```
pub fn top_n<T: Ranked + Clone>(items: &[T], n: usize) -> Vec<T> {
    let mut ranked = rank(items, Direction::Top);
    ranked.truncate(n);
    ranked
}

/// The `n` items with the least defined value, ascending
pub fn bottom_n<T: Ranked + Clone>(items: &[T], n: usize) -> Vec<T> {
    let mut ranked = rank(items, Direction::Bottom);
    ranked.truncate(n);
    ranked
}

/// Top and bottom selections labelled for a combined chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extremes<T> {
    pub top: Vec<T>,
    pub bottom: Vec<T>,
}

pub fn extremes<T: Ranked + Clone>(items: &[T], n: usize) -> Extremes<T> {
    Extremes {
        top: top_n(items, n),
        bottom: bottom_n(items, n),
    }
}

/// Inner join of two coverage series on `group_key`, with `gap = a - b`.
///
/// Output follows the order of `a`. Groups missing from either side are
/// dropped. If `b` repeats a key, its first occurrence is used.
pub fn compute_gaps(a: &[CoverageResult], b: &[CoverageResult]) -> Vec<GapResult> {
    let mut lookup: HashMap<&str, Ratio> = HashMap::new();
    for result in b {
        lookup.entry(result.group_key.as_str()).or_insert(result.coverage);
    }

    let gaps: Vec<GapResult> = a
        .iter()
        .filter_map(|left| {
            lookup.get(left.group_key.as_str()).map(|&right| GapResult {
                group_key: left.group_key.clone(),
                coverage_a: left.coverage,
                coverage_b: right,
                gap: left.coverage - right,
            })
        })
        .collect();

    let dropped = a.len() - gaps.len();
    if dropped > 0 {
        log::debug!("{} groups had no counterpart and were dropped from the gap", dropped);
    }
    gaps
}

/// Pair coverage across two periods for groups present in both.
///
/// Output follows the order of the groups in the earlier period.
pub fn period_changes(results: &[CoverageResult], earlier: i32, later: i32) -> Vec<PeriodChange> {
    let mut later_lookup: HashMap<&str, Ratio> = HashMap::new();
    for result in results.iter().filter(|r| r.period == Some(later)) {
        later_lookup.entry(result.group_key.as_str()).or_insert(result.coverage);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    results
        .iter()
        .filter(|r| r.period == Some(earlier))
        .filter(|r| seen.insert(r.group_key.as_str()))
        .filter_map(|r| {
            later_lookup.get(r.group_key.as_str()).map(|&later_coverage| PeriodChange {
                group_key: r.group_key.clone(),
                earlier_period: earlier,
                later_period: later,
                earlier: r.coverage,
                later: later_coverage,
                change: r.coverage.relative_change_to(later_coverage),
            })
        })
        .collect()
}

/// Mean of each group's coverage across periods, undefined periods excluded.
///
/// Output follows first-occurrence order; `period` is `None` on every result.
pub fn mean_across_periods(results: &[CoverageResult]) -> Vec<CoverageResult> {
    let mut order: Vec<&str> = Vec::new();
    let mut values: HashMap<&str, Vec<Ratio>> = HashMap::new();
    for result in results {
        let key = result.group_key.as_str();
        values
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(result.coverage);
    }

    order
        .into_iter()
        .map(|key| CoverageResult {
            group_key: key.to_string(),
            coverage: mean_defined(values[key].iter().copied()),
            period: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(key: &str, value: f64) -> CoverageResult {
        CoverageResult::new(key, Ratio::new(value), None)
    }

    fn keys(items: &[CoverageResult]) -> Vec<String> {
        items.iter().map(|r| r.group_key.clone()).collect()
    }

    #[test]
    fn test_top_excludes_undefined() {
        let results = vec![
            result("A", 0.5),
            CoverageResult::new("B", Ratio::UNDEFINED, None),
        ];
        let top = top_n(&results, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].group_key, "A");
        assert_eq!(top_n(&results, 5).len(), 1);
        assert_eq!(bottom_n(&results, 5).len(), 1);
    }

    #[test]
    fn test_top_and_bottom_order() {
        let results = vec![result("A", 0.3), result("B", 0.9), result("C", 0.1), result("D", 0.6)];
        assert_eq!(keys(&top_n(&results, 2)), vec!["B", "D"]);
        assert_eq!(keys(&bottom_n(&results, 2)), vec!["C", "A"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let results = vec![result("A", 0.5), result("B", 0.5), result("C", 0.7), result("D", 0.5)];
        assert_eq!(keys(&top_n(&results, 4)), vec!["C", "A", "B", "D"]);
        assert_eq!(keys(&bottom_n(&results, 3)), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_top_and_bottom_do_not_overlap() {
        let results: Vec<CoverageResult> = (0..9)
            .map(|i| result(&format!("G{}", i), (i * 37 % 9) as f64 / 10.0))
            .collect();
        let n = results.len() / 2;
        let chosen = extremes(&results, n);
        for item in &chosen.top {
            assert!(!chosen.bottom.iter().any(|b| b.group_key == item.group_key));
        }
        assert_eq!(chosen.top.len(), n);
        assert_eq!(chosen.bottom.len(), n);
    }

    #[test]
    fn test_gap_inner_join() {
        let a = vec![result("X", 0.6), result("Y", 0.3)];
        let b = vec![result("X", 0.4)];
        let gaps = compute_gaps(&a, &b);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].group_key, "X");
        assert!((gaps[0].gap.value().unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_gap_antisymmetry() {
        let a = vec![result("X", 0.6), result("Y", 0.35), result("Z", 0.1)];
        let b = vec![result("Z", 0.4), result("X", 0.45), result("Y", 0.35)];
        let forward = compute_gaps(&a, &b);
        let backward = compute_gaps(&b, &a);
        for gap in &forward {
            let other = backward.iter().find(|g| g.group_key == gap.group_key).unwrap();
            assert_eq!(gap.gap.value().unwrap(), -other.gap.value().unwrap());
        }
    }

    #[test]
    fn test_gap_with_undefined_side() {
        let a = vec![CoverageResult::new("X", Ratio::UNDEFINED, None)];
        let b = vec![result("X", 0.4)];
        let gaps = compute_gaps(&a, &b);
        assert_eq!(gaps.len(), 1);
        assert!(!gaps[0].gap.is_defined());
        assert!(top_n(&gaps, 1).is_empty());
    }

    #[test]
    fn test_period_change() {
        let results = vec![
            CoverageResult::new("A", Ratio::new(0.20), Some(2022)),
            CoverageResult::new("B", Ratio::new(0.0), Some(2022)),
            CoverageResult::new("C", Ratio::new(0.5), Some(2022)),
            CoverageResult::new("A", Ratio::new(0.30), Some(2023)),
            CoverageResult::new("B", Ratio::new(0.10), Some(2023)),
        ];
        let changes = period_changes(&results, 2022, 2023);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].group_key, "A");
        assert!((changes[0].change.value().unwrap() - 0.5).abs() < 1e-9);
        assert!(!changes[1].change.is_defined());
        assert_eq!(top_n(&changes, 10).len(), 1);
    }

    #[test]
    fn test_mean_across_periods() {
        let results = vec![
            CoverageResult::new("A", Ratio::new(0.2), Some(2022)),
            CoverageResult::new("B", Ratio::UNDEFINED, Some(2022)),
            CoverageResult::new("A", Ratio::new(0.4), Some(2023)),
            CoverageResult::new("B", Ratio::new(0.6), Some(2023)),
        ];
        let means = mean_across_periods(&results);
        assert_eq!(keys(&means), vec!["A", "B"]);
        assert!((means[0].coverage.value().unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(means[1].coverage.value(), Some(0.6));
    }

    #[test]
    fn test_rank_by_custom_key() {
        let results = vec![result("A", 0.3), result("B", 0.9)];
        let ranked = rank_by(&results, Direction::Bottom, |r| r.coverage.scaled(-1.0));
        assert_eq!(ranked[0].group_key, "B");
    }
}
