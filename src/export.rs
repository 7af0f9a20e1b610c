use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::adjust::AdjustedMetricRecord;
use crate::games::GameKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub games: usize,
    pub columns: usize,
    pub empty_cells: usize,
}

/// A metrics table: one row per game, one column per metric key.
pub struct MetricsTable {
    pub headers: Vec<String>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl MetricsTable {
    pub fn build(metrics: &BTreeMap<GameKey, AdjustedMetricRecord>) -> Self {
        let columns: BTreeSet<&str> = metrics.values().flat_map(|r| r.keys()).collect();
        let headers: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = metrics
            .iter()
            .map(|(key, record)| {
                let cells = columns.iter().map(|c| record.get(c)).collect();
                (key.to_string(), cells)
            })
            .collect();
        Self { headers, rows }
    }

    fn empty_cells(&self) -> usize {
        self.rows
            .iter()
            .map(|(_, cells)| cells.iter().filter(|c| c.is_none()).count())
            .sum()
    }
}

/// Write `game_key` plus sorted metric columns. `.xlsx` paths get a workbook,
/// anything else is CSV. Absent values are left blank.
pub fn export_metrics(
    path: &Path,
    metrics: &BTreeMap<GameKey, AdjustedMetricRecord>,
) -> Result<ExportReport> {
    let table = MetricsTable::build(metrics);
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }

    if is_xlsx {
        write_workbook(path, &table)?;
    } else {
        write_csv(path, &table)?;
    }

    Ok(ExportReport {
        games: table.rows.len(),
        columns: table.headers.len(),
        empty_cells: table.empty_cells(),
    })
}

fn write_csv(path: &Path, table: &MetricsTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed creating {}", path.display()))?;
    let mut header = vec!["game_key".to_string()];
    header.extend(table.headers.iter().cloned());
    writer.write_record(&header).context("write csv header")?;
    for (key, cells) in &table.rows {
        let mut record = Vec::with_capacity(cells.len() + 1);
        record.push(key.clone());
        record.extend(cells.iter().map(|c| opt_to_string(*c)));
        writer
            .write_record(&record)
            .with_context(|| format!("write csv row {key}"))?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}

fn write_workbook(path: &Path, table: &MetricsTable) -> Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("AdjustedMetrics")?;
        write_table(sheet, table)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &MetricsTable) -> Result<()> {
    worksheet
        .write_string(0, 0, "game_key")
        .context("write header cell")?;
    for (col_idx, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string(0, col_idx as u16 + 1, header)
            .with_context(|| format!("write header cell {col_idx}"))?;
    }
    for (idx, (key, cells)) in table.rows.iter().enumerate() {
        let row_idx = idx as u32 + 1;
        worksheet
            .write_string(row_idx, 0, key)
            .with_context(|| format!("write cell ({row_idx},0)"))?;
        for (col_idx, cell) in cells.iter().enumerate() {
            if let Some(value) = cell {
                worksheet
                    .write_number(row_idx, col_idx as u16 + 1, *value)
                    .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
            }
        }
    }
    Ok(())
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::MetricsTable;
    use crate::adjust::AdjustedMetricRecord;
    use crate::games::GameKey;

    #[test]
    fn table_is_rectangular_over_union_of_keys() {
        let mut a = AdjustedMetricRecord::new();
        a.insert("home_adjusted_epa", Some(0.25));
        let mut b = AdjustedMetricRecord::new();
        b.insert("away_adjusted_epa", Some(-0.1));
        b.insert("home_adjusted_epa", None);

        let mut metrics = BTreeMap::new();
        metrics.insert(GameKey::Id(2), b);
        metrics.insert(GameKey::Id(1), a);

        let table = MetricsTable::build(&metrics);
        assert_eq!(table.headers, vec!["away_adjusted_epa", "home_adjusted_epa"]);
        assert_eq!(table.rows[0].0, "1");
        assert_eq!(table.rows[0].1, vec![None, Some(0.25)]);
        assert_eq!(table.rows[1].1, vec![Some(-0.1), None]);
        assert_eq!(table.empty_cells(), 2);
    }
}
