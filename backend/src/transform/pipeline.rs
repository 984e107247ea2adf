//! High-level report pipeline.
//!
//! A run is two halves. [`prepare`] reads and cleans the sources and depends
//! only on the files, so its output can be cached across interactions.
//! [`run_prepared`] applies a profile and the current selections to a
//! prepared row set and assembles the report.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockreport::{run, ReportProfile, RunConfig, SourceSpec};
//!
//! let config = RunConfig::new(
//!     vec![SourceSpec::new("dead_stock1.xlsx"), SourceSpec::new("dead_stock2.xlsx")],
//!     ReportProfile::builtin("dead-stock").unwrap(),
//! );
//! let report = run(&config)?;
//! println!("{} items, value {}", report.metrics.item_count, report.metrics.total_stock_value);
//! ```

use serde::{Deserialize, Serialize};

use crate::api::logs::{log_info, log_success};
use crate::error::PipelineResult;
use crate::models::{columns, RowSet, Selection};
use crate::parser::{SourceInfo, SourceSpec};
use crate::profiles::{ReportProfile, SelectMode};
use crate::report::{self, ReportContext, ReportResult};

use super::stages::{
    aggregate_by_supplier, clip_non_negative, derive_numeric, derive_stock_value, filter,
    load_and_combine, narrow_by_category, narrow_by_item, narrow_by_supplier, normalize,
    note_if_empty, rank_groups,
};

/// Current state of the interactive controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selections {
    #[serde(default)]
    pub category: Selection,
    #[serde(default)]
    pub item: Selection,
    /// `None` selects the supplier with the largest total
    #[serde(default)]
    pub supplier: Option<String>,
}

/// Everything one report run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sources: Vec<SourceSpec>,
    pub profile: ReportProfile,
    pub selections: Selections,
}

impl RunConfig {
    pub fn new(sources: Vec<SourceSpec>, profile: ReportProfile) -> Self {
        Self {
            sources,
            profile,
            selections: Selections::default(),
        }
    }

    pub fn with_selections(mut self, selections: Selections) -> Self {
        self.selections = selections;
        self
    }
}

/// Sources loaded, combined and cleaned; independent of any profile.
#[derive(Debug, Clone)]
pub struct PreparedRows {
    pub rows: RowSet,
    pub sources: Vec<SourceInfo>,
}

/// Load, combine, normalize and derive.
///
/// `Stock Value` is filled before it is coerced so that a wholly empty column
/// is still recognised as empty.
pub fn prepare(sources: &[SourceSpec]) -> PipelineResult<PreparedRows> {
    let (raw, infos) = load_and_combine(sources)?;
    let rows = normalize(&raw);

    let numeric: Vec<String> = columns::NUMERIC
        .iter()
        .filter(|c| **c != columns::STOCK_VALUE)
        .map(|c| c.to_string())
        .collect();
    let rows = derive_numeric(&rows, &numeric);
    let rows = derive_stock_value(&rows)?;
    let rows = derive_numeric(&rows, &[columns::STOCK_VALUE.to_string()]);
    let rows = clip_non_negative(&rows, columns::STOCK)?;

    log_success(format!(
        "Prepared {} rows from {} source(s)",
        rows.len(),
        infos.len()
    ));
    Ok(PreparedRows {
        rows,
        sources: infos,
    })
}

/// Run a full report: prepare the sources, then apply the profile.
pub fn run(config: &RunConfig) -> PipelineResult<ReportResult> {
    let prepared = prepare(&config.sources)?;
    run_prepared(&prepared, &config.profile, &config.selections)
}

/// Apply a profile and selections to an already prepared row set.
pub fn run_prepared(
    prepared: &PreparedRows,
    profile: &ReportProfile,
    selections: &Selections,
) -> PipelineResult<ReportResult> {
    log_info(format!("Running report '{}'", profile.id));

    let rows = derive_numeric(&prepared.rows, &profile.numeric_fields);
    let filtered = filter(&rows, &profile.predicate)?;
    log_info(format!(
        "{} of {} rows match {}",
        filtered.len(),
        rows.len(),
        profile.predicate
    ));
    note_if_empty(&filtered, "filtering");

    let categories = options_for(&filtered, columns::CATEGORY);
    let category = match (&selections.category, profile.category_mode) {
        (Selection::All, SelectMode::Multi) if filtered.has_column(columns::CATEGORY) => {
            Selection::many(categories.iter().cloned())
        }
        (selection, _) => selection.clone(),
    };
    let scope = narrow_by_category(&filtered, &category)?;
    note_if_empty(&scope, "category selection");

    let items = options_for(&scope, columns::ITEM_NAME);
    let scope = narrow_by_item(&scope, &selections.item)?;
    note_if_empty(&scope, "item selection");

    let mut supplier_totals = Vec::new();
    let mut selected_supplier = selections.supplier.clone();
    if profile.supplier_drilldown {
        supplier_totals = rank_groups(aggregate_by_supplier(&scope, &profile.rank_key)?);
        if selected_supplier.is_none() {
            selected_supplier = supplier_totals.iter().find_map(|g| g.key.clone());
        }
    }
    let scope = match &selected_supplier {
        Some(supplier) => {
            let narrowed = narrow_by_supplier(&scope, supplier)?;
            note_if_empty(&narrowed, "supplier selection");
            narrowed
        }
        None => scope,
    };

    let context = ReportContext {
        sources: prepared.sources.clone(),
        selections: Selections {
            category,
            item: selections.item.clone(),
            supplier: selected_supplier.clone(),
        },
        categories,
        items,
        supplier_totals,
        selected_supplier,
    };
    let result = report::build(profile, &scope, context)?;

    log_success(format!(
        "Report ready: {} items, stock value {:.2}",
        result.metrics.item_count, result.metrics.total_stock_value
    ));
    Ok(result)
}

/// Distinct values a control can offer; empty when the column is absent.
fn options_for(set: &RowSet, column: &str) -> Vec<String> {
    if set.has_column(column) {
        set.distinct_values(column)
    } else {
        Vec::new()
    }
}
