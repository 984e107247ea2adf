//! Row predicates: a conjunction of `column op literal` comparisons.
//!
//! ```text
//! Total Sales == 0
//! Stock > 0 && LP Qty > 0 && Total Sales == 0
//! Total Sales == 0 AND LP Date < 2025-01-01
//! ```
//!
//! Number literals compare against the numerically coerced cell. Date
//! literals (`YYYY-MM-DD`) compare against the cell read as a date; a cell
//! that cannot be read as a date fails the clause.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::PredicateError;
use crate::models::{to_number, Record};

static CLAUSE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*&&\s*|\s+and\s+").expect("valid clause separator regex"));

static CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<column>\S.*?)\s*(?P<op>==|!=|>=|<=|>|<)\s*(?P<literal>\S.*?)\s*$")
        .expect("valid clause regex")
});

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// Right-hand side of a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Date(NaiveDate),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub column: String,
    pub op: CompareOp,
    pub literal: Literal,
}

impl Clause {
    pub fn new(column: impl Into<String>, op: CompareOp, literal: Literal) -> Self {
        Self {
            column: column.into(),
            op,
            literal,
        }
    }

    fn parse(text: &str) -> Result<Self, PredicateError> {
        let caps = CLAUSE
            .captures(text)
            .ok_or_else(|| PredicateError::InvalidClause(text.trim().to_string()))?;

        let column = caps["column"].to_string();
        let op = CompareOp::parse(&caps["op"])
            .ok_or_else(|| PredicateError::InvalidClause(text.trim().to_string()))?;
        let raw = &caps["literal"];

        let literal = if let Ok(n) = raw.parse::<f64>() {
            Literal::Number(n)
        } else if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Literal::Date(d)
        } else {
            return Err(PredicateError::InvalidLiteral {
                clause: text.trim().to_string(),
                literal: raw.to_string(),
            });
        };

        Ok(Self { column, op, literal })
    }

    /// Evaluate against one row. An absent key is treated as null.
    pub fn matches(&self, row: &Record) -> bool {
        let cell = row.get(&self.column).unwrap_or(&Value::Null);
        match &self.literal {
            Literal::Number(rhs) => to_number(cell)
                .partial_cmp(rhs)
                .is_some_and(|ord| self.op.holds(ord)),
            Literal::Date(rhs) => {
                parse_cell_date(cell).is_some_and(|lhs| self.op.holds(lhs.cmp(rhs)))
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op.symbol(), self.literal)
    }
}

/// A conjunction of clauses. The empty predicate keeps every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    /// Keeps every row.
    pub fn always() -> Self {
        Self::default()
    }

    pub fn parse(expression: &str) -> Result<Self, PredicateError> {
        if expression.trim().is_empty() {
            return Ok(Self::always());
        }
        let clauses = CLAUSE_SPLIT
            .split(expression)
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Columns referenced by the clauses, deduplicated, in order.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for clause in &self.clauses {
            if !cols.contains(&clause.column.as_str()) {
                cols.push(&clause.column);
            }
        }
        cols
    }

    pub fn matches(&self, row: &Record) -> bool {
        self.clauses.iter().all(|c| c.matches(row))
    }
}

impl FromStr for Predicate {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Predicate {
    type Error = PredicateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Predicate> for String {
    fn from(predicate: Predicate) -> Self {
        predicate.to_string()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        write!(f, "{}", parts.join(" && "))
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Read a cell as a date: ISO or day-first text, or an Excel serial number.
pub fn parse_cell_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n.as_f64().and_then(excel_serial_to_date),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(serial) = s.parse::<f64>() {
                return excel_serial_to_date(serial);
            }
            // Drop fractional seconds and timezone suffixes before matching.
            let s = s.split(['.', '+', 'Z']).next().unwrap_or(s);
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    DATETIME_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|dt| dt.date())
                })
        }
        _ => None,
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}
