//! Domain models for the stock report pipeline.
//!
//! - [`RowSet`] - Ordered columns plus rows, the unit every stage works on
//! - [`Record`] - One inventory item, column name to cell value
//! - [`Selection`] - Drill-down selection (`All` or an explicit set)
//! - [`GroupTotal`] - One group of an aggregation
//! - [`Table`] - A projected, display-ready table
//!
//! Cells are `serde_json::Value`s: `Null` for missing or empty cells, strings
//! for text, numbers once a column has been coerced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeSet, HashSet};

use crate::error::ReportError;

/// One inventory row.
pub type Record = Map<String, Value>;

// =============================================================================
// Canonical columns
// =============================================================================

/// Column names found in the inventory exports.
pub mod columns {
    pub const ITEM_BAR_CODE: &str = "Item Bar Code";
    pub const ITEM_NAME: &str = "Item Name";
    pub const ITEM_NO: &str = "Item No";
    pub const STOCK: &str = "Stock";
    pub const STOCK_VALUE: &str = "Stock Value";
    pub const MARGIN_PCT: &str = "Margin%";
    pub const PROFIT: &str = "Profit";
    pub const COST: &str = "Cost";
    pub const SELLING: &str = "Selling";
    pub const LP_PRICE: &str = "LP Price";
    pub const LP_DATE: &str = "LP Date";
    pub const LP_SUPPLIER: &str = "LP Supplier";
    pub const LP_QTY: &str = "LP Qty";
    pub const CF: &str = "CF";
    pub const UNIT: &str = "Unit";
    pub const CATEGORY: &str = "Category";
    pub const PRE_RETURN: &str = "Pre Return";
    pub const TOTAL_SALES: &str = "Total Sales";

    /// Columns holding quantities or money, coerced to numbers on load.
    pub const NUMERIC: [&str; 9] = [
        STOCK_VALUE,
        STOCK,
        PROFIT,
        MARGIN_PCT,
        TOTAL_SALES,
        COST,
        SELLING,
        LP_PRICE,
        LP_QTY,
    ];

    /// Suffix of display-only fields produced by clipping.
    pub const DISPLAY_SUFFIX: &str = " Display";

    /// Name of the display field derived from `column`.
    pub fn display_of(column: &str) -> String {
        format!("{}{}", column, DISPLAY_SUFFIX)
    }
}

// =============================================================================
// Cell helpers
// =============================================================================

/// Coerce a cell to a finite number. Anything unparseable is zero.
pub fn to_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// Build a JSON number from a float, falling back to zero for non-finite input.
pub fn number_value(n: f64) -> Value {
    Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Number(0.into()))
}

/// Text form of a cell, `None` for null.
///
/// Whole floats print without a fraction so that a supplier code read as
/// `1042.0` from a workbook groups with `"1042"` from a CSV.
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

// =============================================================================
// RowSet
// =============================================================================

/// An ordered set of rows sharing one column list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names in first-appearance order.
    pub columns: Vec<String>,
    /// Rows; every row holds a key for every column.
    pub rows: Vec<Record>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with `MissingColumn` unless `name` is part of the row set.
    pub fn require_column(&self, name: &str) -> Result<(), ReportError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(ReportError::MissingColumn(name.to_string()))
        }
    }

    /// A row set with the same columns and the given rows.
    pub fn with_rows(&self, rows: Vec<Record>) -> Self {
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Append `name` to the column list (no-op if present).
    pub fn add_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Concatenate row sets, first set's rows first.
    ///
    /// The column list is the union in first-appearance order; a row whose
    /// source lacked a column gets `null` for it.
    pub fn concat(sets: Vec<RowSet>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for set in &sets {
            for col in &set.columns {
                if seen.insert(col.clone()) {
                    columns.push(col.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(sets.iter().map(RowSet::len).sum());
        for set in sets {
            for mut row in set.rows {
                for col in &columns {
                    if !row.contains_key(col) {
                        row.insert(col.clone(), Value::Null);
                    }
                }
                rows.push(row);
            }
        }

        Self { columns, rows }
    }

    /// Distinct non-null values of a column, in first-appearance order.
    pub fn distinct_values(&self, column: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(display_value))
            .filter(|v| seen.insert(v.clone()))
            .collect()
    }

    /// Sum of a column with numeric coercion (zero if the column is absent).
    pub fn sum(&self, column: &str) -> f64 {
        self.rows
            .iter()
            .map(|row| row.get(column).map(to_number).unwrap_or(0.0))
            .sum()
    }
}

// =============================================================================
// Selection
// =============================================================================

/// A drill-down selection.
///
/// Serialized as `"All"`, a single string, or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SelectionRepr", into = "SelectionRepr")]
pub enum Selection {
    /// No restriction.
    #[default]
    All,
    /// Keep rows whose value is one of these (exact, case-sensitive).
    Values(BTreeSet<String>),
}

/// Sentinel used by single-select controls.
pub const ALL_SENTINEL: &str = "All";

impl Selection {
    /// Single-select value; `"All"` means no restriction.
    pub fn one(value: impl Into<String>) -> Self {
        let value = value.into();
        if value == ALL_SENTINEL {
            Self::All
        } else {
            Self::Values(BTreeSet::from([value]))
        }
    }

    /// Multi-select set. An empty set matches nothing.
    pub fn many<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether a cell passes the selection. Null never matches a value set.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::All => true,
            Self::Values(set) => value
                .and_then(display_value)
                .is_some_and(|v| set.contains(&v)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    One(String),
    Many(Vec<String>),
}

impl From<SelectionRepr> for Selection {
    fn from(repr: SelectionRepr) -> Self {
        match repr {
            SelectionRepr::One(v) => Selection::one(v),
            SelectionRepr::Many(vs) => Selection::many(vs),
        }
    }
}

impl From<Selection> for SelectionRepr {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::All => SelectionRepr::One(ALL_SENTINEL.to_string()),
            Selection::Values(set) => SelectionRepr::Many(set.into_iter().collect()),
        }
    }
}

// =============================================================================
// Aggregation and presentation
// =============================================================================

/// One group of an aggregation; `key` is `None` for the null group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTotal {
    pub key: Option<String>,
    pub total: f64,
}

/// A display table: column headers plus cell rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Project `rows` onto the wanted columns that exist in `available`,
    /// keeping the wanted order.
    pub fn project(available: &[String], wanted: &[String], rows: &[Record]) -> Self {
        let columns: Vec<String> = wanted
            .iter()
            .filter(|c| available.contains(c))
            .cloned()
            .collect();
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
