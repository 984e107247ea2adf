//! Pipeline stages.
//!
//! Each stage takes a row set by reference and returns a new one, so the
//! loaded base set is never mutated by filtering or narrowing.

use serde_json::Value;
use std::collections::HashMap;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{PipelineResult, ReportError};
use crate::models::{
    columns, display_value, number_value, to_number, GroupTotal, Record, RowSet, Selection,
};
use crate::parser::{read_source, SourceInfo, SourceSpec};

use super::predicate::Predicate;

/// Read every source and concatenate them, first source's rows first.
///
/// Columns absent from a source are `null` in that source's rows.
pub fn load_and_combine(sources: &[SourceSpec]) -> PipelineResult<(RowSet, Vec<SourceInfo>)> {
    if sources.is_empty() {
        return Err(ReportError::NoSources);
    }

    let mut sets = Vec::with_capacity(sources.len());
    let mut infos = Vec::with_capacity(sources.len());
    for spec in sources {
        log_info(format!("Reading {}", spec));
        let loaded =
            read_source(spec).map_err(|e| ReportError::source_unavailable(spec.to_string(), e))?;
        log_success(format!(
            "{}: {} rows, {} columns",
            loaded.info.name,
            loaded.info.row_count,
            loaded.info.columns.len()
        ));
        infos.push(loaded.info);
        sets.push(loaded.rows);
    }

    Ok((RowSet::concat(sets), infos))
}

/// Trim surrounding whitespace from every column name.
///
/// Names that collapse onto the same trimmed name merge into one column,
/// taking the first non-null value of each row.
pub fn normalize(set: &RowSet) -> RowSet {
    let mut columns: Vec<String> = Vec::with_capacity(set.columns.len());
    for col in &set.columns {
        let trimmed = col.trim().to_string();
        if !columns.contains(&trimmed) {
            columns.push(trimmed);
        }
    }

    let rows = set
        .rows
        .iter()
        .map(|row| {
            let mut out = Record::new();
            for col in &set.columns {
                let value = row.get(col).cloned().unwrap_or(Value::Null);
                let trimmed = col.trim().to_string();
                match out.get(&trimmed) {
                    Some(existing) if !existing.is_null() => {}
                    _ => {
                        out.insert(trimmed, value);
                    }
                }
            }
            out
        })
        .collect();

    RowSet::new(columns, rows)
}

/// Coerce every value of the named fields that are present to a finite number.
pub fn derive_numeric(set: &RowSet, fields: &[String]) -> RowSet {
    let present: Vec<&String> = fields.iter().filter(|f| set.has_column(f)).collect();
    let rows = set
        .rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            for field in &present {
                let n = row.get(field.as_str()).map(to_number).unwrap_or(0.0);
                row.insert((*field).clone(), number_value(n));
            }
            row
        })
        .collect();
    set.with_rows(rows)
}

/// Fill `Stock Value` as `Cost × Stock` when the column is absent or wholly null.
///
/// A partially populated column is left as it is; its nulls become zero once
/// the column is coerced.
pub fn derive_stock_value(set: &RowSet) -> PipelineResult<RowSet> {
    let absent = !set.has_column(columns::STOCK_VALUE);
    let all_null = !absent
        && set
            .rows
            .iter()
            .all(|row| row.get(columns::STOCK_VALUE).map_or(true, Value::is_null));

    if !absent && !all_null {
        return Ok(set.clone());
    }

    set.require_column(columns::COST)?;
    set.require_column(columns::STOCK)?;

    let mut out = set.clone();
    out.add_column(columns::STOCK_VALUE);
    for row in &mut out.rows {
        let cost = row.get(columns::COST).map(to_number).unwrap_or(0.0);
        let stock = row.get(columns::STOCK).map(to_number).unwrap_or(0.0);
        row.insert(columns::STOCK_VALUE.to_string(), number_value(cost * stock));
    }
    Ok(out)
}

/// Add a display-only copy of `field` clipped at zero, named `<field> Display`.
pub fn clip_non_negative(set: &RowSet, field: &str) -> PipelineResult<RowSet> {
    set.require_column(field)?;
    let display = columns::display_of(field);

    let mut out = set.clone();
    out.add_column(&display);
    for row in &mut out.rows {
        let v = row.get(field).map(to_number).unwrap_or(0.0);
        row.insert(display.clone(), number_value(v.max(0.0)));
    }
    Ok(out)
}

/// Keep the rows matching `predicate`, in their original order.
pub fn filter(set: &RowSet, predicate: &Predicate) -> PipelineResult<RowSet> {
    for column in predicate.columns() {
        set.require_column(column)?;
    }
    let rows = set
        .rows
        .iter()
        .filter(|row| predicate.matches(row))
        .cloned()
        .collect();
    Ok(set.with_rows(rows))
}

/// Keep rows whose `column` value is in `selection`. `All` is a no-op.
pub fn narrow(set: &RowSet, column: &str, selection: &Selection) -> PipelineResult<RowSet> {
    if selection.is_all() {
        return Ok(set.clone());
    }
    set.require_column(column)?;
    let rows = set
        .rows
        .iter()
        .filter(|row| selection.matches(row.get(column)))
        .cloned()
        .collect();
    Ok(set.with_rows(rows))
}

pub fn narrow_by_category(set: &RowSet, selection: &Selection) -> PipelineResult<RowSet> {
    narrow(set, columns::CATEGORY, selection)
}

pub fn narrow_by_item(set: &RowSet, selection: &Selection) -> PipelineResult<RowSet> {
    narrow(set, columns::ITEM_NAME, selection)
}

pub fn narrow_by_supplier(set: &RowSet, supplier: &str) -> PipelineResult<RowSet> {
    narrow(set, columns::LP_SUPPLIER, &Selection::one(supplier))
}

/// The first `n` rows by `key`, descending unless `descending` is false.
///
/// The sort is stable: ties keep their original relative order.
pub fn rank_top_n(
    set: &RowSet,
    key: &str,
    n: usize,
    descending: bool,
) -> PipelineResult<Vec<Record>> {
    if n == 0 {
        return Err(ReportError::InvalidLimit(n));
    }
    set.require_column(key)?;

    let mut keyed: Vec<(f64, &Record)> = set
        .rows
        .iter()
        .map(|row| (row.get(key).map(to_number).unwrap_or(0.0), row))
        .collect();
    if descending {
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    } else {
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    }

    Ok(keyed.into_iter().take(n).map(|(_, row)| row.clone()).collect())
}

/// Sum `sum_field` per distinct `group_key` value.
///
/// Null keys form their own group. Groups come out in first-appearance order.
pub fn aggregate_by(
    set: &RowSet,
    group_key: &str,
    sum_field: &str,
) -> PipelineResult<Vec<GroupTotal>> {
    set.require_column(group_key)?;
    set.require_column(sum_field)?;

    let mut index: HashMap<Option<String>, usize> = HashMap::new();
    let mut groups: Vec<GroupTotal> = Vec::new();
    for row in &set.rows {
        let key = row.get(group_key).and_then(display_value);
        let value = row.get(sum_field).map(to_number).unwrap_or(0.0);
        match index.get(&key) {
            Some(&i) => groups[i].total += value,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(GroupTotal { key, total: value });
            }
        }
    }
    Ok(groups)
}

pub fn aggregate_by_supplier(set: &RowSet, sum_field: &str) -> PipelineResult<Vec<GroupTotal>> {
    aggregate_by(set, columns::LP_SUPPLIER, sum_field)
}

pub fn aggregate_by_category(set: &RowSet, sum_field: &str) -> PipelineResult<Vec<GroupTotal>> {
    aggregate_by(set, columns::CATEGORY, sum_field)
}

/// Sort groups by total, largest first, keeping first-appearance order on ties.
pub fn rank_groups(mut groups: Vec<GroupTotal>) -> Vec<GroupTotal> {
    groups.sort_by(|a, b| b.total.total_cmp(&a.total));
    groups
}

/// Warn when a drill-down leaves nothing to show.
pub(crate) fn note_if_empty(set: &RowSet, stage: &str) {
    if set.is_empty() {
        log_warning(format!("No rows left after {stage}"));
    }
}
