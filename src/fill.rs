use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::adjust::AdjustedMetricRecord;
use crate::games::GameKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    Zero,
    ColumnMean,
}

impl FillPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "zero" | "0" => Some(FillPolicy::Zero),
            "mean" | "column-mean" | "column_mean" => Some(FillPolicy::ColumnMean),
            _ => None,
        }
    }
}

/// Replace absent values, adding every key seen in any record to every
/// record first so the output is rectangular. Returns how many cells were
/// filled. Under `ColumnMean`, a column with no present value stays absent.
pub fn fill_missing(
    records: &mut BTreeMap<GameKey, AdjustedMetricRecord>,
    policy: FillPolicy,
) -> usize {
    let columns: BTreeSet<String> = records
        .values()
        .flat_map(|r| r.keys().map(str::to_string))
        .collect();

    let means: HashMap<&str, f64> = match policy {
        FillPolicy::Zero => HashMap::new(),
        FillPolicy::ColumnMean => columns
            .iter()
            .filter_map(|col| {
                let present: Vec<f64> = records.values().filter_map(|r| r.get(col)).collect();
                if present.is_empty() {
                    return None;
                }
                Some((col.as_str(), present.iter().sum::<f64>() / present.len() as f64))
            })
            .collect(),
    };

    let mut filled = 0usize;
    for record in records.values_mut() {
        for col in &columns {
            if !record.contains_key(col) {
                record.insert(col.clone(), None);
            }
        }
        for (col, value) in record.values_mut() {
            if value.is_some() {
                continue;
            }
            let replacement = match policy {
                FillPolicy::Zero => Some(0.0),
                FillPolicy::ColumnMean => means.get(col.as_str()).copied(),
            };
            if replacement.is_some() {
                *value = replacement;
                filled += 1;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{FillPolicy, fill_missing};
    use crate::adjust::AdjustedMetricRecord;
    use crate::games::GameKey;

    fn sample() -> BTreeMap<GameKey, AdjustedMetricRecord> {
        let mut a = AdjustedMetricRecord::new();
        a.insert("x", Some(1.0));
        a.insert("y", None);
        let mut b = AdjustedMetricRecord::new();
        b.insert("x", Some(3.0));
        BTreeMap::from([(GameKey::Id(1), a), (GameKey::Id(2), b)])
    }

    #[test]
    fn zero_fills_every_gap() {
        let mut records = sample();
        let filled = fill_missing(&mut records, FillPolicy::Zero);
        assert_eq!(filled, 2);
        assert_eq!(records[&GameKey::Id(2)].get("y"), Some(0.0));
    }

    #[test]
    fn mean_leaves_empty_columns_absent() {
        let mut records = sample();
        records
            .get_mut(&GameKey::Id(2))
            .unwrap()
            .insert("x", None);
        let filled = fill_missing(&mut records, FillPolicy::ColumnMean);
        assert_eq!(filled, 1);
        assert_eq!(records[&GameKey::Id(2)].get("x"), Some(1.0));
        assert!(records[&GameKey::Id(1)].contains_key("y"));
        assert_eq!(records[&GameKey::Id(1)].get("y"), None);
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!(FillPolicy::parse("Mean"), Some(FillPolicy::ColumnMean));
        assert_eq!(FillPolicy::parse("zero"), Some(FillPolicy::Zero));
        assert_eq!(FillPolicy::parse("median"), None);
    }
}
