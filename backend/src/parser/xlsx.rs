use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::Value;

use crate::error::{SourceError, SourceResult};
use crate::models::{number_value, Record, RowSet};

/// Convert a workbook cell to a row value. Empty and error cells are null.
pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(v) if v.is_empty() => Value::Null,
        Data::String(v) => Value::String(v.to_string()),
        Data::Float(v) => number_value(*v),
        Data::Int(v) => Value::Number((*v).into()),
        Data::Bool(v) => Value::Bool(*v),
        Data::DateTime(v) => number_value(v.as_f64()),
        Data::DateTimeIso(v) => Value::String(v.to_string()),
        Data::DurationIso(v) => Value::String(v.to_string()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

fn header_name(cell: &Data, idx: usize) -> String {
    match cell_to_value(cell) {
        Value::Null => format!("Unnamed: {idx}"),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Read one sheet (the first one unless `sheet` is given).
///
/// The first row is the header. Returns the sheet name actually read.
pub fn read_workbook(path: &Path, sheet: Option<&str>) -> SourceResult<(String, RowSet)> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| SourceError::Workbook(format!("{}: {}", path.display(), e)))?;

    let sheet_name = match sheet {
        Some(name) => {
            if !workbook.sheet_names().iter().any(|s| s == name) {
                return Err(SourceError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SourceError::Empty)?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SourceError::Workbook(format!("sheet {sheet_name}: {e}")))?;

    let mut grid = range.rows();
    let header_row = grid.next().ok_or(SourceError::Empty)?;
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| header_name(cell, idx))
        .collect();

    let rows = grid
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| rows_to_record(&headers, cells))
        .collect();

    let mut columns = Vec::with_capacity(headers.len());
    for header in headers {
        if !columns.contains(&header) {
            columns.push(header);
        }
    }

    Ok((sheet_name, RowSet::new(columns, rows)))
}

fn rows_to_record(headers: &[String], cells: &[Data]) -> Record {
    let mut row = Record::new();
    for (idx, header) in headers.iter().enumerate() {
        let value = cells.get(idx).map(cell_to_value).unwrap_or(Value::Null);
        row.entry(header.clone()).or_insert(value);
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::display_value;
    use crate::transform::predicate::{parse_cell_date, Predicate};
    use chrono::NaiveDate;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    #[test]
    fn test_cell_to_value() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::String(String::new())), Value::Null);
        assert_eq!(cell_to_value(&Data::String("Oud".into())), Value::String("Oud".into()));
        assert_eq!(cell_to_value(&Data::Int(7)), serde_json::json!(7));
        assert_eq!(cell_to_value(&Data::Float(2.5)), serde_json::json!(2.5));
        assert_eq!(cell_to_value(&Data::Bool(true)), Value::Bool(true));
    }

    #[test]
    fn test_header_name_placeholder() {
        assert_eq!(header_name(&Data::Empty, 3), "Unnamed: 3");
        assert_eq!(header_name(&Data::String("Stock".into()), 0), "Stock");
    }

    #[test]
    fn test_rows_to_record_pads_short_rows() {
        let headers = vec!["Item Name".to_string(), "Stock".to_string()];
        let row = rows_to_record(&headers, &[Data::String("X".into())]);
        assert_eq!(row["Item Name"], "X");
        assert_eq!(row["Stock"], Value::Null);
    }

    /// Two sheets: `Stock` (with a dated column) and `Archive`.
    fn write_workbook(path: &Path) {
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");

        let stock = workbook.add_worksheet();
        stock.set_name("Stock").unwrap();
        for (col, header) in ["Item Name", "Stock", "Cost", "LP Date", "LP Supplier"]
            .iter()
            .enumerate()
        {
            stock.write_string(0, col as u16, *header).unwrap();
        }
        stock.write_string(1, 0, "Oud Royal").unwrap();
        stock.write_number(1, 1, 5.0).unwrap();
        stock.write_number(1, 2, 12.5).unwrap();
        let bought = ExcelDateTime::from_ymd(2024, 6, 1).unwrap();
        stock.write_datetime_with_format(1, 3, &bought, &date_format).unwrap();
        stock.write_number(1, 4, 1042.0).unwrap();
        stock.write_string(3, 0, "Musk Rose").unwrap();
        stock.write_number(3, 1, 2.0).unwrap();

        let archive = workbook.add_worksheet();
        archive.set_name("Archive").unwrap();
        archive.write_string(0, 0, "Item Name").unwrap();
        archive.write_string(1, 0, "Amber").unwrap();

        workbook.save(path).unwrap();
    }

    #[test]
    fn test_read_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead_stock1.xlsx");
        write_workbook(&path);

        let (sheet, rows) = read_workbook(&path, None).unwrap();
        assert_eq!(sheet, "Stock");
        assert_eq!(
            rows.columns,
            vec!["Item Name", "Stock", "Cost", "LP Date", "LP Supplier"]
        );
        // The blank row in between is skipped
        assert_eq!(rows.len(), 2);

        let first = &rows.rows[0];
        assert_eq!(first["Item Name"], "Oud Royal");
        assert_eq!(first["Stock"].as_f64(), Some(5.0));
        assert_eq!(first["Cost"].as_f64(), Some(12.5));
        assert_eq!(display_value(&first["LP Supplier"]).as_deref(), Some("1042"));
        assert_eq!(rows.rows[1]["Cost"], Value::Null);

        assert_eq!(
            parse_cell_date(&first["LP Date"]),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        let aged = Predicate::parse("LP Date < 2025-01-01").unwrap();
        assert!(aged.matches(first));
        assert!(!aged.matches(&rows.rows[1]));
    }

    #[test]
    fn test_read_named_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead_stock2.xlsx");
        write_workbook(&path);

        let (sheet, rows) = read_workbook(&path, Some("Archive")).unwrap();
        assert_eq!(sheet, "Archive");
        assert_eq!(rows.columns, vec!["Item Name"]);
        assert_eq!(rows.rows[0]["Item Name"], "Amber");

        assert!(matches!(
            read_workbook(&path, Some("Sheet9")),
            Err(SourceError::SheetNotFound(name)) if name == "Sheet9"
        ));
    }

    #[test]
    fn test_missing_workbook_is_error() {
        let err = read_workbook(Path::new("missing.xlsx"), None).unwrap_err();
        assert!(matches!(err, SourceError::Workbook(_)));
    }
}
