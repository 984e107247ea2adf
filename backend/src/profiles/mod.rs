//! Report profiles.
//!
//! A profile is the whole difference between one stock dashboard and
//! another: which rows count (predicate), what they are ranked by, which
//! columns each table shows and which drill-downs are offered. Profiles are
//! plain JSON so new dashboards need no code.

pub mod registry;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::PredicateError;
use crate::models::columns;
use crate::transform::predicate::{Clause, CompareOp, Literal, Predicate};

pub use registry::{ProfileRegistry, StoredProfile};

/// How the category control selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    /// One category or `All`.
    #[default]
    Single,
    /// An explicit set, defaulting to every category present.
    Multi,
}

/// Configuration of one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportProfile {
    /// Stable identifier (slug)
    pub id: String,

    /// Heading shown above the report
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Rows kept by the report, e.g. `Total Sales == 0`
    #[serde(default)]
    pub predicate: Predicate,

    /// Column the priority table and chart are ranked by
    #[serde(default = "default_rank_key")]
    pub rank_key: String,

    /// Rows in the high-priority table
    #[serde(default = "default_priority_limit")]
    pub priority_limit: usize,

    /// Bars in the top-items chart
    #[serde(default = "default_chart_limit")]
    pub chart_limit: usize,

    /// Columns coerced to numbers before filtering
    #[serde(default = "default_numeric_fields")]
    pub numeric_fields: Vec<String>,

    #[serde(default = "default_priority_columns")]
    pub priority_columns: Vec<String>,

    /// Extra fields carried by each chart bar
    #[serde(default = "default_hover_columns")]
    pub hover_columns: Vec<String>,

    #[serde(default = "default_detail_columns")]
    pub detail_columns: Vec<String>,

    /// Show stock value share per category
    #[serde(default = "default_true")]
    pub category_share: bool,

    /// Rank suppliers and narrow to one of them
    #[serde(default)]
    pub supplier_drilldown: bool,

    #[serde(default)]
    pub category_mode: SelectMode,

    #[serde(default = "default_export_file_name")]
    pub export_file_name: String,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_rank_key() -> String {
    columns::STOCK_VALUE.to_string()
}

fn default_priority_limit() -> usize {
    10
}

fn default_chart_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_export_file_name() -> String {
    "stock_report.csv".to_string()
}

fn default_numeric_fields() -> Vec<String> {
    strings(&columns::NUMERIC)
}

fn default_priority_columns() -> Vec<String> {
    strings(&[
        columns::ITEM_BAR_CODE,
        columns::ITEM_NAME,
        columns::STOCK,
        columns::STOCK_VALUE,
        columns::MARGIN_PCT,
        columns::PROFIT,
        columns::COST,
        columns::SELLING,
        columns::LP_PRICE,
        columns::LP_DATE,
        columns::LP_SUPPLIER,
    ])
}

fn default_hover_columns() -> Vec<String> {
    strings(&[
        columns::ITEM_BAR_CODE,
        columns::ITEM_NAME,
        columns::STOCK,
        columns::STOCK_VALUE,
        columns::MARGIN_PCT,
        columns::PROFIT,
        columns::COST,
        columns::SELLING,
        columns::LP_PRICE,
    ])
}

fn default_detail_columns() -> Vec<String> {
    strings(&[
        columns::ITEM_BAR_CODE,
        columns::ITEM_NAME,
        columns::ITEM_NO,
        columns::STOCK,
        columns::STOCK_VALUE,
        columns::MARGIN_PCT,
        columns::PROFIT,
        columns::COST,
        columns::SELLING,
        columns::LP_PRICE,
        columns::LP_DATE,
        columns::LP_SUPPLIER,
        columns::CF,
        columns::UNIT,
        columns::CATEGORY,
        columns::PRE_RETURN,
    ])
}

impl ReportProfile {
    /// A profile with default columns and limits.
    pub fn new(id: &str, title: &str, predicate: &str) -> Result<Self, PredicateError> {
        Ok(Self::with_predicate(id, title, Predicate::parse(predicate)?))
    }

    /// Like [`new`](Self::new) with an already built predicate.
    pub fn with_predicate(id: &str, title: &str, predicate: Predicate) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            predicate,
            rank_key: default_rank_key(),
            priority_limit: default_priority_limit(),
            chart_limit: default_chart_limit(),
            numeric_fields: default_numeric_fields(),
            priority_columns: default_priority_columns(),
            hover_columns: default_hover_columns(),
            detail_columns: default_detail_columns(),
            category_share: true,
            supplier_drilldown: false,
            category_mode: SelectMode::Single,
            export_file_name: default_export_file_name(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_supplier_drilldown(mut self) -> Self {
        self.supplier_drilldown = true;
        self
    }

    pub fn with_category_mode(mut self, mode: SelectMode) -> Self {
        self.category_mode = mode;
        self
    }

    pub fn with_export_file_name(mut self, name: &str) -> Self {
        self.export_file_name = name.to_string();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Look up a built-in profile.
    pub fn builtin(id: &str) -> Option<Self> {
        builtin_profiles().into_iter().find(|p| p.id == id)
    }
}

/// Id of the profile used when none is named.
pub const DEFAULT_PROFILE: &str = "dead-stock";

/// Last purchases before this date count as aged.
static AGED_CUTOFF: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid aged cutoff date"));

fn compare(column: &str, op: CompareOp, value: f64) -> Clause {
    Clause::new(column, op, Literal::Number(value))
}

fn zero_sales() -> Clause {
    compare(columns::TOTAL_SALES, CompareOp::Eq, 0.0)
}

/// The stock dashboards shipped with the tool.
pub fn builtin_profiles() -> Vec<ReportProfile> {
    vec![
        ReportProfile::with_predicate(
            "dead-stock",
            "Dead Stock (Zero Sales)",
            Predicate::new(vec![zero_sales()]),
        )
        .with_description("Items with no recorded sales")
        .with_export_file_name("dead_stock_full.csv"),
        ReportProfile::with_predicate(
            "aged-dead-stock",
            "Dead Stock (Zero Sales, Last Purchase before 2025)",
            Predicate::new(vec![
                zero_sales(),
                Clause::new(columns::LP_DATE, CompareOp::Lt, Literal::Date(*AGED_CUTOFF)),
            ]),
        )
        .with_description("Zero-sales items whose last purchase predates 2025")
        .with_export_file_name("aged_dead_stock_full.csv"),
        ReportProfile::with_predicate(
            "unwanted-purchase",
            "Unwanted Purchases",
            Predicate::new(vec![compare(columns::LP_QTY, CompareOp::Gt, 0.0), zero_sales()]),
        )
        .with_description("Purchased items that never sold")
        .with_category_mode(SelectMode::Multi)
        .with_export_file_name("unwanted_purchase.csv"),
        ReportProfile::with_predicate(
            "unwanted-repurchase",
            "Unwanted Re-purchases",
            Predicate::new(vec![
                compare(columns::STOCK, CompareOp::Gt, 0.0),
                compare(columns::LP_QTY, CompareOp::Gt, 0.0),
                zero_sales(),
            ]),
        )
        .with_description("Items already in stock, bought again, still unsold")
        .with_category_mode(SelectMode::Multi)
        .with_export_file_name("unwanted_repurchase.csv"),
        ReportProfile::with_predicate(
            "supplier-dead-stock",
            "Dead Stock by Supplier",
            Predicate::new(vec![zero_sales()]),
        )
        .with_description("Zero-sales stock ranked by supplier with per-supplier drill-down")
        .with_supplier_drilldown()
        .with_export_file_name("supplier_dead_stock.csv"),
    ]
}

/// A documented custom profile, for `stockreport example-profile`.
pub fn example_profile() -> ReportProfile {
    ReportProfile {
        id: "negative-stock".to_string(),
        title: "Negative Stock Audit".to_string(),
        description: "Items whose book stock went below zero".to_string(),
        predicate: Predicate::new(vec![compare(columns::STOCK, CompareOp::Lt, 0.0)]),
        rank_key: columns::COST.to_string(),
        priority_limit: 10,
        chart_limit: 20,
        numeric_fields: default_numeric_fields(),
        priority_columns: strings(&[
            columns::ITEM_BAR_CODE,
            columns::ITEM_NAME,
            columns::STOCK,
            columns::COST,
            columns::LP_SUPPLIER,
        ]),
        hover_columns: default_hover_columns(),
        detail_columns: default_detail_columns(),
        category_share: false,
        supplier_drilldown: false,
        category_mode: SelectMode::Single,
        export_file_name: "negative_stock.csv".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_every_dashboard() {
        let ids: Vec<String> = builtin_profiles().into_iter().map(|p| p.id).collect();
        assert_eq!(
            ids,
            vec![
                "dead-stock",
                "aged-dead-stock",
                "unwanted-purchase",
                "unwanted-repurchase",
                "supplier-dead-stock"
            ]
        );
    }

    #[test]
    fn test_builtin_predicates() {
        let repurchase = ReportProfile::builtin("unwanted-repurchase").unwrap();
        assert_eq!(
            repurchase.predicate.to_string(),
            "Stock > 0 && LP Qty > 0 && Total Sales == 0"
        );
        assert_eq!(repurchase.category_mode, SelectMode::Multi);
        assert!(ReportProfile::builtin("supplier-dead-stock")
            .unwrap()
            .supplier_drilldown);
        assert!(ReportProfile::builtin("nope").is_none());
    }

    #[test]
    fn test_builtin_predicates_read_back() {
        let expected = [
            ("dead-stock", "Total Sales == 0"),
            ("aged-dead-stock", "Total Sales == 0 && LP Date < 2025-01-01"),
            ("unwanted-purchase", "LP Qty > 0 && Total Sales == 0"),
            ("unwanted-repurchase", "Stock > 0 && LP Qty > 0 && Total Sales == 0"),
            ("supplier-dead-stock", "Total Sales == 0"),
        ];
        for (id, text) in expected {
            let profile = ReportProfile::builtin(id).unwrap();
            assert_eq!(profile.predicate, Predicate::parse(text).unwrap(), "{id}");
        }
        assert_eq!(example_profile().predicate.to_string(), "Stock < 0");
    }

    #[test]
    fn test_defaults_match_dashboard_limits() {
        let profile = ReportProfile::builtin(DEFAULT_PROFILE).unwrap();
        assert_eq!(profile.priority_limit, 10);
        assert_eq!(profile.chart_limit, 20);
        assert_eq!(profile.rank_key, "Stock Value");
        assert_eq!(profile.detail_columns.len(), 16);
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let profile = ReportProfile::from_json(
            r#"{"id": "slow", "title": "Slow Movers", "predicate": "Total Sales < 3"}"#,
        )
        .unwrap();
        assert_eq!(profile.chart_limit, 20);
        assert!(profile.category_share);
        assert!(!profile.supplier_drilldown);
        assert_eq!(profile.predicate.to_string(), "Total Sales < 3");
    }

    #[test]
    fn test_json_roundtrip_of_example() {
        let profile = example_profile();
        let parsed = ReportProfile::from_json(&profile.to_json().unwrap()).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_bad_predicate_rejected() {
        assert!(ReportProfile::from_json(r#"{"id": "x", "title": "X", "predicate": "Stock >"}"#).is_err());
    }
}
