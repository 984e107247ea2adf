//! Plain-text rendering of a report for the terminal.

use std::fmt::Write;

use serde_json::Value;

use crate::models::{display_value, GroupTotal, Table};

use super::ReportResult;

const MAX_CELL_WIDTH: usize = 28;

fn cell_text(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() != 0.0 => format!("{:.2}", f),
            _ => display_value(value).unwrap_or_default(),
        },
        _ => display_value(value).unwrap_or_default(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{cut}…")
    }
}

/// Render a table with padded columns. `limit` caps the rows printed.
pub fn render_table(table: &Table, limit: Option<usize>) -> String {
    if table.columns.is_empty() {
        return "   (no columns)\n".to_string();
    }

    let shown = limit.unwrap_or(table.rows.len()).min(table.rows.len());
    let cells: Vec<Vec<String>> = table.rows[..shown]
        .iter()
        .map(|row| row.iter().map(|v| truncate(&cell_text(v))).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    let _ = writeln!(out, "   {}", header.join(" | "));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "   {}", rule.join("-+-"));

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect();
        let _ = writeln!(out, "   {}", line.join(" | "));
    }

    if cells.is_empty() {
        let _ = writeln!(out, "   (no rows)");
    } else if shown < table.rows.len() {
        let _ = writeln!(out, "   … {} more rows", table.rows.len() - shown);
    }
    out
}

fn render_groups(groups: &[GroupTotal], out: &mut String) {
    for group in groups {
        let _ = writeln!(
            out,
            "   {:<30} {:>14.2}",
            truncate(group.key.as_deref().unwrap_or("(none)")),
            group.total
        );
    }
}

/// Render the whole report. `detail_rows` caps the detail table.
pub fn render_report(report: &ReportResult, detail_rows: usize) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "📊 {}", report.title);
    let _ = writeln!(out, "{rule}");
    for source in &report.sources {
        let _ = writeln!(out, "   Source: {} ({} rows)", source.name, source.row_count);
    }
    let _ = writeln!(out, "   Items:        {}", report.metrics.item_count);
    let _ = writeln!(out, "   Total stock:  {:.0}", report.metrics.total_stock);
    let _ = writeln!(out, "   Stock value:  {:.2}", report.metrics.total_stock_value);
    if let Some(supplier) = &report.selected_supplier {
        let _ = writeln!(out, "   Supplier:     {supplier}");
    }

    if !report.supplier_totals.is_empty() {
        let _ = writeln!(out, "\n🏭 Stock value by supplier");
        render_groups(&report.supplier_totals, &mut out);
    }

    let _ = writeln!(out, "\n🔥 High priority");
    out.push_str(&render_table(&report.high_priority, None));

    if !report.top_items.is_empty() {
        let _ = writeln!(out, "\n📈 Top items");
        for (rank, bar) in report.top_items.iter().enumerate() {
            let _ = writeln!(
                out,
                "   {:>2}. {:<30} {:>14.2}  (stock {:.0})",
                rank + 1,
                truncate(&bar.label),
                bar.value,
                bar.stock
            );
        }
    }

    if !report.category_share.is_empty() {
        let _ = writeln!(out, "\n🥧 Stock value by category");
        render_groups(&report.category_share, &mut out);
    }

    let _ = writeln!(out, "\n📋 Details");
    out.push_str(&render_table(&report.detail, Some(detail_rows)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_table_pads_and_limits() {
        let table = Table {
            columns: vec!["Item Name".into(), "Stock".into()],
            rows: vec![
                vec![json!("Oud"), json!(5.0)],
                vec![json!("Musk"), json!(2.25)],
                vec![json!("Amber"), Value::Null],
            ],
        };
        let text = render_table(&table, Some(2));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   Item Name | Stock");
        assert_eq!(lines[2], "   Oud       | 5    ");
        assert_eq!(lines[3], "   Musk      | 2.25 ");
        assert_eq!(lines[4], "   … 1 more rows");
    }

    #[test]
    fn test_render_empty_table() {
        let table = Table {
            columns: vec!["Item Name".into()],
            rows: Vec::new(),
        };
        assert!(render_table(&table, None).contains("(no rows)"));
    }

    #[test]
    fn test_truncate_long_names() {
        let long = "x".repeat(40);
        assert_eq!(truncate(&long).chars().count(), MAX_CELL_WIDTH);
    }
}
