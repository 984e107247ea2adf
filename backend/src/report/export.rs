//! CSV export of report tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::error::PipelineResult;
use crate::models::{display_value, Table};

fn cell_text(value: &Value) -> String {
    display_value(value).unwrap_or_default()
}

/// Write `table` as comma-separated text with a header row.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> PipelineResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(cell_text))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_bytes(table: &Table) -> PipelineResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    Ok(buf)
}

pub fn export_to_file(table: &Table, path: &Path) -> PipelineResult<()> {
    let file = File::create(path)?;
    write_csv(table, BufWriter::new(file))
}
