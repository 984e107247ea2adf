//! End-to-end runs over CSV sources on disk.

use std::fs;
use std::path::{Path, PathBuf};

use stockreport::transform::stages::{aggregate_by_supplier, filter};
use stockreport::{
    columns, prepare, run, GroupTotal, Predicate, ReportError, ReportProfile, RunConfig,
    Selections, SourceSpec,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn two_sources(dir: &Path) -> Vec<SourceSpec> {
    let first = write(
        dir,
        "dead_stock1.csv",
        "Item Name,Cost,Stock,Total Sales,LP Supplier\nX,10,5,0,S1\n",
    );
    let second = write(
        dir,
        "dead_stock2.csv",
        "Item Name;Cost;Stock;Total Sales;LP Supplier\nY;4;0;2;S2\n",
    );
    vec![SourceSpec::new(first), SourceSpec::new(second)]
}

#[test]
fn zero_sales_rows_and_supplier_totals() {
    let dir = tempfile::tempdir().unwrap();
    let prepared = prepare(&two_sources(dir.path())).unwrap();

    assert_eq!(prepared.rows.len(), 2);
    assert_eq!(prepared.rows.rows[0]["Item Name"], "X");
    assert_eq!(prepared.rows.rows[1]["Item Name"], "Y");

    let zero_sales = filter(&prepared.rows, &Predicate::parse("Total Sales == 0").unwrap()).unwrap();
    assert_eq!(zero_sales.len(), 1);
    assert_eq!(zero_sales.rows[0]["Item Name"], "X");
    assert_eq!(zero_sales.rows[0][columns::STOCK_VALUE].as_f64(), Some(50.0));

    let totals = aggregate_by_supplier(&zero_sales, columns::STOCK_VALUE).unwrap();
    assert_eq!(
        totals,
        vec![GroupTotal {
            key: Some("S1".into()),
            total: 50.0
        }]
    );
}

#[test]
fn supplier_profile_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let profile = ReportProfile::builtin("supplier-dead-stock").unwrap();

    let report = run(&RunConfig::new(two_sources(dir.path()), profile)).unwrap();

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.metrics.item_count, 1);
    assert_eq!(report.metrics.total_stock_value, 50.0);
    assert_eq!(report.selected_supplier.as_deref(), Some("S1"));
    assert_eq!(report.top_items[0].label, "X");
    assert_eq!(report.top_items[0].stock, 5.0);

    let csv = String::from_utf8(report.export_csv().unwrap()).unwrap();
    assert_eq!(
        csv,
        "Item Name,Stock,Stock Value,Cost,LP Supplier\nX,5,50,10,S1\n"
    );
}

#[test]
fn empty_selection_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let profile = ReportProfile::builtin("supplier-dead-stock").unwrap();
    let config = RunConfig::new(two_sources(dir.path()), profile).with_selections(Selections {
        supplier: Some("S9".into()),
        ..Selections::default()
    });

    let report = run(&config).unwrap();
    assert_eq!(report.metrics.item_count, 0);
    assert!(report.high_priority.is_empty());
    assert!(report.detail.is_empty());
}

#[test]
fn default_profile_runs_without_category_column() {
    let dir = tempfile::tempdir().unwrap();
    let only = write(dir.path(), "stock.csv", "Item Name,Cost,Stock,Total Sales\nX,10,5,0\n");

    let report = run(&RunConfig::new(
        vec![SourceSpec::new(only)],
        ReportProfile::builtin(stockreport::profiles::DEFAULT_PROFILE).unwrap(),
    ))
    .unwrap();

    assert_eq!(report.metrics.item_count, 1);
    assert_eq!(report.metrics.total_stock_value, 50.0);
    assert!(report.category_share.is_empty());
    assert!(report.categories.is_empty());
}

#[test]
fn missing_source_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = two_sources(dir.path());
    sources.push(SourceSpec::new(dir.path().join("missing.csv")));

    let err = run(&RunConfig::new(
        sources,
        ReportProfile::builtin("dead-stock").unwrap(),
    ))
    .unwrap_err();

    match err {
        ReportError::SourceUnavailable { source_name, .. } => {
            assert!(source_name.ends_with("missing.csv"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_cost_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let only = write(dir.path(), "stock.csv", "Item Name,Stock,Total Sales\nX,5,0\n");

    let err = prepare(&[SourceSpec::new(only)]).unwrap_err();
    assert!(matches!(err, ReportError::MissingColumn(c) if c == "Cost"));
}
