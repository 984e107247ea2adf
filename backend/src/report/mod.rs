//! Report assembly.
//!
//! Turns the narrowed row set of one run into everything a dashboard shows:
//! summary metrics, the high-priority table, the top-items chart, category
//! share, supplier totals and the detail table.

pub mod export;
pub mod render;

use serde::Serialize;
use uuid::Uuid;

use crate::error::PipelineResult;
use crate::models::{columns, display_value, to_number, GroupTotal, Record, RowSet, Table};
use crate::parser::SourceInfo;
use crate::profiles::ReportProfile;
use crate::transform::pipeline::Selections;
use crate::transform::stages::{aggregate_by_category, rank_groups, rank_top_n};

/// Headline numbers of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub item_count: usize,
    /// Sum of raw stock, negatives included
    pub total_stock: f64,
    pub total_stock_value: f64,
}

impl SummaryMetrics {
    pub fn of(set: &RowSet) -> Self {
        Self {
            item_count: set.len(),
            total_stock: set.sum(columns::STOCK),
            total_stock_value: set.sum(columns::STOCK_VALUE),
        }
    }
}

/// One bar of the top-items chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBar {
    pub label: String,
    /// Rank key value (bar length)
    pub value: f64,
    /// Stock clipped at zero
    pub stock: f64,
    /// Hover detail
    pub details: Record,
}

/// Drill-down state gathered by the pipeline before assembly.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub sources: Vec<SourceInfo>,
    pub selections: Selections,
    /// Categories offered by the category control
    pub categories: Vec<String>,
    /// Items offered by the item control
    pub items: Vec<String>,
    pub supplier_totals: Vec<GroupTotal>,
    pub selected_supplier: Option<String>,
}

/// Output of one report run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResult {
    pub report_id: String,
    pub profile_id: String,
    pub title: String,
    pub generated_at: String,
    pub sources: Vec<SourceInfo>,
    pub selections: Selections,
    pub metrics: SummaryMetrics,
    pub high_priority: Table,
    pub top_items: Vec<ChartBar>,
    /// Empty when the profile has no category share or the sources no categories
    pub category_share: Vec<GroupTotal>,
    /// Empty unless the profile drills down by supplier
    pub supplier_totals: Vec<GroupTotal>,
    pub selected_supplier: Option<String>,
    pub categories: Vec<String>,
    pub items: Vec<String>,
    pub detail: Table,
    pub export_file_name: String,
}

impl ReportResult {
    /// CSV of the detail table.
    pub fn export_csv(&self) -> PipelineResult<Vec<u8>> {
        export::to_csv_bytes(&self.detail)
    }
}

/// Assemble the report for `scope`, the fully narrowed row set.
pub fn build(
    profile: &ReportProfile,
    scope: &RowSet,
    context: ReportContext,
) -> PipelineResult<ReportResult> {
    let priority_rows = rank_top_n(scope, &profile.rank_key, profile.priority_limit, true)?;
    let high_priority = Table::project(&scope.columns, &profile.priority_columns, &priority_rows);

    let top_items = chart_series(scope, profile)?;

    // Exports without a Category column simply have no share breakdown.
    let category_share = if profile.category_share && scope.has_column(columns::CATEGORY) {
        rank_groups(aggregate_by_category(scope, columns::STOCK_VALUE)?)
    } else {
        Vec::new()
    };

    let detail = Table::project(&scope.columns, &profile.detail_columns, &scope.rows);

    Ok(ReportResult {
        report_id: Uuid::new_v4().to_string(),
        profile_id: profile.id.clone(),
        title: profile.title.clone(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        sources: context.sources,
        selections: context.selections,
        metrics: SummaryMetrics::of(scope),
        high_priority,
        top_items,
        category_share,
        supplier_totals: context.supplier_totals,
        selected_supplier: context.selected_supplier,
        categories: context.categories,
        items: context.items,
        detail,
        export_file_name: profile.export_file_name.clone(),
    })
}

/// Top rows by the rank key, one bar each.
pub fn chart_series(scope: &RowSet, profile: &ReportProfile) -> PipelineResult<Vec<ChartBar>> {
    let stock_display = columns::display_of(columns::STOCK);
    let top = rank_top_n(scope, &profile.rank_key, profile.chart_limit, true)?;

    Ok(top
        .into_iter()
        .map(|row| {
            let stock = row
                .get(&stock_display)
                .or_else(|| row.get(columns::STOCK))
                .map(to_number)
                .unwrap_or(0.0)
                .max(0.0);
            let details = profile
                .hover_columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect();
            ChartBar {
                label: row
                    .get(columns::ITEM_NAME)
                    .and_then(display_value)
                    .unwrap_or_default(),
                value: row.get(&profile.rank_key).map(to_number).unwrap_or(0.0),
                stock,
                details,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use serde_json::{json, Value};

    fn scope(rows: Vec<Value>) -> RowSet {
        let rows: Vec<Record> = rows
            .into_iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect();
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        RowSet::new(columns, rows)
    }

    fn items(n: usize) -> RowSet {
        scope(
            (0..n)
                .map(|i| {
                    json!({
                        "Item Name": format!("item-{i}"),
                        "Stock": i as f64 - 2.0,
                        "Stock Display": (i as f64 - 2.0).max(0.0),
                        "Stock Value": (i * 10) as f64,
                        "Category": if i % 2 == 0 { "Oud" } else { "Musk" },
                        "Cost": 1.0,
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn test_metrics() {
        let metrics = SummaryMetrics::of(&items(4));
        assert_eq!(metrics.item_count, 4);
        assert_eq!(metrics.total_stock, -2.0);
        assert_eq!(metrics.total_stock_value, 60.0);
    }

    #[test]
    fn test_build_limits_and_ordering() {
        let profile = ReportProfile::builtin("dead-stock").unwrap();
        let report = build(&profile, &items(25), ReportContext::default()).unwrap();

        assert_eq!(report.high_priority.len(), 10);
        assert_eq!(report.top_items.len(), 20);
        assert_eq!(report.top_items[0].label, "item-24");
        assert_eq!(report.top_items[0].value, 240.0);
        assert_eq!(report.detail.len(), 25);
        assert_eq!(
            report.high_priority.columns,
            vec!["Item Name", "Stock", "Stock Value", "Cost"]
        );
        assert_eq!(report.export_file_name, "dead_stock_full.csv");
    }

    #[test]
    fn test_chart_uses_clipped_stock_and_hover_columns() {
        let profile = ReportProfile::builtin("dead-stock").unwrap();
        let bars = chart_series(&items(3), &profile).unwrap();
        let last = bars.last().unwrap();
        assert_eq!(last.label, "item-0");
        assert_eq!(last.stock, 0.0);
        assert_eq!(last.details["Stock"], json!(-2.0));
        assert!(!last.details.contains_key("Category"));
    }

    #[test]
    fn test_category_share_ranked() {
        let profile = ReportProfile::builtin("dead-stock").unwrap();
        let report = build(&profile, &items(4), ReportContext::default()).unwrap();
        assert_eq!(
            report.category_share,
            vec![
                GroupTotal { key: Some("Musk".into()), total: 40.0 },
                GroupTotal { key: Some("Oud".into()), total: 20.0 },
            ]
        );
    }

    #[test]
    fn test_category_share_skipped_without_category_column() {
        let profile = ReportProfile::builtin("dead-stock").unwrap();
        let set = scope(vec![json!({
            "Item Name": "X",
            "Stock": 5.0,
            "Stock Value": 50.0,
        })]);
        let report = build(&profile, &set, ReportContext::default()).unwrap();
        assert!(report.category_share.is_empty());
        assert_eq!(report.metrics.total_stock_value, 50.0);
    }

    #[test]
    fn test_empty_scope_gives_empty_report() {
        let profile = ReportProfile::builtin("dead-stock").unwrap();
        let empty = items(3).with_rows(Vec::new());
        let report = build(&profile, &empty, ReportContext::default()).unwrap();
        assert!(report.high_priority.is_empty());
        assert!(report.top_items.is_empty());
        assert!(report.category_share.is_empty());
        assert_eq!(report.metrics, SummaryMetrics::default());
    }

    #[test]
    fn test_missing_rank_key_is_fatal() {
        let profile = ReportProfile::builtin("dead-stock").unwrap();
        let set = scope(vec![json!({"Item Name": "X", "Category": "Oud"})]);
        assert!(matches!(
            build(&profile, &set, ReportContext::default()),
            Err(ReportError::MissingColumn(c)) if c == "Stock Value"
        ));
    }
}
