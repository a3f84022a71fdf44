use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::coverage::CoverageRecord;
use crate::models::table::{Cell, RawTable};

/// Summed values for one (group key, period) combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub key: String,
    pub period: Option<i32>,
    /// One sum per value column, in the order the columns were requested
    pub sums: Vec<f64>,
}

/// Output of [`aggregate`]: one row per distinct group, in first-occurrence order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub key_column: String,
    pub period_column: Option<String>,
    pub value_columns: Vec<String>,
    pub groups: Vec<GroupTotals>,
    /// Rows skipped because their group key was blank or missing
    pub skipped_rows: usize,
    /// Value cells that were blank or non-numeric and counted as zero
    pub coerced_cells: usize,
}

impl Aggregation {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Position of `column` in each group's `sums`
    pub fn value_index(&self, column: &str) -> AnalysisResult<usize> {
        self.value_columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| AnalysisError::UnknownColumn(column.to_string()))
    }

    /// Pair two value columns into coverage records
    pub fn records(&self, numerator: &str, denominator: &str) -> AnalysisResult<Vec<CoverageRecord>> {
        let num_idx = self.value_index(numerator)?;
        let den_idx = self.value_index(denominator)?;
        Ok(self
            .groups
            .iter()
            .map(|g| CoverageRecord {
                group_key: g.key.clone(),
                numerator: g.sums[num_idx],
                denominator: g.sums[den_idx],
                period: g.period,
            })
            .collect())
    }
}

/// Group `table` by `key_column` (and optionally `period_column`) and sum each
/// of `value_columns`.
///
/// * Keys are trimmed, never case-folded; rows without a key are skipped.
/// * Blank and non-numeric value cells contribute zero.
/// * Periods are coerced to integers; unusable periods group under `None`.
///
/// # Example
/// ```rust
/// use coverage::models::aggregate::aggregate;
/// use coverage::models::table::{Cell, RawTable};
///
/// let table = RawTable::from_rows(
///     vec!["dsei".to_string(), "gestantes".to_string()],
///     vec![
///         vec![Cell::from("XINGU"), Cell::Int(10)],
///         vec![Cell::from("YANOMAMI"), Cell::Int(4)],
///         vec![Cell::from("XINGU "), Cell::Int(5)],
///     ],
/// );
/// let totals = aggregate(&table, "dsei", None, &["gestantes"]).unwrap();
/// assert_eq!(totals.groups[0].key, "XINGU");
/// assert_eq!(totals.groups[0].sums, vec![15.0]);
/// assert_eq!(totals.groups[1].key, "YANOMAMI");
/// ```
pub fn aggregate(
    table: &RawTable,
    key_column: &str,
    period_column: Option<&str>,
    value_columns: &[&str],
) -> AnalysisResult<Aggregation> {
    let key_idx = table.column_index(key_column)?;
    let period_idx = period_column.map(|c| table.column_index(c)).transpose()?;
    let value_idx = value_columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<AnalysisResult<Vec<usize>>>()?;

    let mut groups: Vec<GroupTotals> = Vec::new();
    let mut positions: HashMap<(String, Option<i32>), usize> = HashMap::new();
    let mut skipped_rows = 0;
    let mut coerced_cells = 0;

    for row in table.rows() {
        let Some(key) = row[key_idx].as_key() else {
            skipped_rows += 1;
            continue;
        };
        let period = period_idx.and_then(|idx| period_of(&row[idx]));

        let slot = *positions.entry((key.clone(), period)).or_insert_with(|| {
            groups.push(GroupTotals {
                key,
                period,
                sums: vec![0.0; value_idx.len()],
            });
            groups.len() - 1
        });

        for (sum, &idx) in groups[slot].sums.iter_mut().zip(&value_idx) {
            match row[idx].as_number() {
                Some(value) => *sum += value,
                None => coerced_cells += 1,
            }
        }
    }

    if skipped_rows > 0 {
        log::debug!("Skipped {} rows with no '{}' value", skipped_rows, key_column);
    }
    if coerced_cells > 0 {
        log::debug!("Counted {} blank or non-numeric cells as zero", coerced_cells);
    }

    Ok(Aggregation {
        key_column: key_column.to_string(),
        period_column: period_column.map(str::to_string),
        value_columns: value_columns.iter().map(|c| c.to_string()).collect(),
        groups,
        skipped_rows,
        coerced_cells,
    })
}

fn period_of(cell: &Cell) -> Option<i32> {
    cell.as_integer().and_then(|v| i32::try_from(v).ok())
}
