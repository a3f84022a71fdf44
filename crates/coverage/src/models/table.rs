use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::errors::{AnalysisError, AnalysisResult};

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Type a raw text value the way a spreadsheet reader would.
    ///
    /// Blank text is [`Cell::Missing`]; integers and decimals become numeric
    /// cells; anything else stays text (trimmed).
    ///
    /// # Example
    /// ```rust
    /// use coverage::models::table::Cell;
    ///
    /// assert_eq!(Cell::parse(" 42 "), Cell::Int(42));
    /// assert_eq!(Cell::parse("0.5"), Cell::Float(0.5));
    /// assert_eq!(Cell::parse(""), Cell::Missing);
    /// assert_eq!(Cell::parse("YANOMAMI"), Cell::Text("YANOMAMI".to_string()));
    /// ```
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Cell::Int(value);
        }
        match parse_decimal(trimmed) {
            Some(value) => Cell::Float(value),
            None => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Float(value) => value.is_nan(),
            Cell::Int(_) => false,
        }
    }

    /// Numeric value with coercion; `None` for missing or non-numeric cells
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Int(value) => Some(*value as f64),
            Cell::Float(value) if value.is_finite() => Some(*value),
            Cell::Float(_) => None,
            Cell::Text(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .map(|v| v as f64)
                    .ok()
                    .or_else(|| parse_decimal(trimmed))
            }
            Cell::Missing => None,
        }
    }

    /// Integral value (e.g. a year); floats must have no fractional part
    pub fn as_integer(&self) -> Option<i64> {
        let value = self.as_number()?;
        if value.fract() == 0.0 {
            Some(value as i64)
        } else {
            None
        }
    }

    /// Text form used for group keys; trimmed, `None` when blank or missing
    pub fn as_key(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        let key = self.to_string();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(value) => write!(f, "{}", value),
            Cell::Float(value) => write!(f, "{}", value),
            Cell::Text(text) => write!(f, "{}", text),
            Cell::Missing => Ok(()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

/// Decimal parsing tolerant of a comma decimal separator ("12,5")
fn parse_decimal(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse::<f64>() {
        return value.is_finite().then_some(value);
    }
    if text.contains(',') && !text.contains('.') {
        if let Ok(value) = text.replace(',', ".").parse::<f64>() {
            return value.is_finite().then_some(value);
        }
    }
    None
}

/// An in-memory table with uncontrolled column names.
///
/// Rows are stored positionally and always have exactly one cell per column.
/// Transformations return new tables; the source table is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, padding short rows with [`Cell::Missing`]
    /// and truncating long ones
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = RawTable::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> AnalysisResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalysisError::UnknownColumn(name.to_string()))
    }

    /// Cells of one column, in row order
    pub fn column(&self, name: &str) -> AnalysisResult<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Copy of this table with a column holding `value` on every row.
    /// An existing column of the same name is overwritten in the copy.
    pub fn with_constant_column(&self, name: &str, value: Cell) -> RawTable {
        let mut table = self.clone();
        match table.columns.iter().position(|c| c == name) {
            Some(idx) => {
                for row in &mut table.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                table.columns.push(name.to_string());
                for row in &mut table.rows {
                    row.push(value.clone());
                }
            }
        }
        table
    }

    /// Stack tables vertically, aligning columns by exact name.
    ///
    /// The output columns are the union of all inputs in first-seen order;
    /// cells a table lacks are [`Cell::Missing`].
    pub fn concat(tables: &[RawTable]) -> RawTable {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for table in tables {
            for column in &table.columns {
                if !positions.contains_key(column) {
                    positions.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
            }
        }

        let mut combined = RawTable::new(columns);
        for table in tables {
            let mapping: Vec<usize> = table.columns.iter().map(|c| positions[c]).collect();
            for row in &table.rows {
                let mut out = vec![Cell::Missing; combined.columns.len()];
                for (cell, &target) in row.iter().zip(&mapping) {
                    out[target] = cell.clone();
                }
                combined.rows.push(out);
            }
        }
        combined
    }

    /// Copy of selected columns under new names.
    ///
    /// Each `(target, source)` pair names an output column and the column it
    /// is copied from; a `None` source yields a column of [`Cell::Missing`].
    pub fn project(&self, mapping: &[(&str, Option<&str>)]) -> AnalysisResult<RawTable> {
        let sources = mapping
            .iter()
            .map(|(_, source)| source.map(|name| self.column_index(name)).transpose())
            .collect::<AnalysisResult<Vec<Option<usize>>>>()?;

        let mut projected = RawTable::new(mapping.iter().map(|(target, _)| target.to_string()).collect());
        for row in &self.rows {
            projected.rows.push(
                sources
                    .iter()
                    .map(|source| source.map(|idx| row[idx].clone()).unwrap_or(Cell::Missing))
                    .collect(),
            );
        }
        Ok(projected)
    }
}
