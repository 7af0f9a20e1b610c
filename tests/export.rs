use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use gridiron_metrics::adjust::AdjustedMetricRecord;
use gridiron_metrics::export::export_metrics;
use gridiron_metrics::fill::{FillPolicy, fill_missing};
use gridiron_metrics::games::GameKey;

fn scratch_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("gridiron_metrics_{}_{name}", std::process::id()));
    path
}

fn sample() -> BTreeMap<GameKey, AdjustedMetricRecord> {
    let mut a = AdjustedMetricRecord::new();
    a.insert("home_adjusted_epa", Some(0.25));
    a.insert("home_adjusted_success", None);
    let mut b = AdjustedMetricRecord::new();
    b.insert("home_adjusted_success", Some(0.1));

    let mut out = BTreeMap::new();
    out.insert(GameKey::Id(401520102), a);
    out.insert(GameKey::Derived("2023_3_Rice_Texas".to_string()), b);
    out
}

#[test]
fn csv_export_leaves_absent_cells_blank() {
    let path = scratch_path("metrics.csv");
    let report = export_metrics(&path, &sample()).expect("export should succeed");
    assert_eq!(report.games, 2);
    assert_eq!(report.columns, 2);
    assert_eq!(report.empty_cells, 2);

    let raw = fs::read_to_string(&path).expect("export should be readable");
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines[0], "game_key,home_adjusted_epa,home_adjusted_success");
    assert_eq!(lines[1], "401520102,0.25,");
    assert_eq!(lines[2], "2023_3_Rice_Texas,,0.1");
    fs::remove_file(&path).ok();
}

#[test]
fn filled_export_has_no_blank_cells() {
    let mut metrics = sample();
    let filled = fill_missing(&mut metrics, FillPolicy::Zero);
    assert_eq!(filled, 2);

    let path = scratch_path("filled.csv");
    let report = export_metrics(&path, &metrics).expect("export should succeed");
    assert_eq!(report.empty_cells, 0);
    fs::remove_file(&path).ok();
}

#[test]
fn xlsx_extension_writes_workbook() {
    let path = scratch_path("metrics.xlsx");
    let report = export_metrics(&path, &sample()).expect("export should succeed");
    assert_eq!(report.games, 2);
    let bytes = fs::read(&path).expect("workbook should exist");
    // xlsx is a zip container
    assert_eq!(&bytes[..2], b"PK");
    fs::remove_file(&path).ok();
}
