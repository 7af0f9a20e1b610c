use std::collections::BTreeMap;

use crate::metrics::{Metric, MetricRecord};

/// Differenced stats: `(output suffix, source metric)`.
pub const ADJUSTED_STATS: &[(&str, Metric)] = &[
    ("epa", Metric::Ppa),
    ("success", Metric::SuccessRate),
    ("explosiveness", Metric::Explosiveness),
    ("rush_epa", Metric::RushPpa),
    ("rush_success", Metric::RushSuccess),
    ("rush_explosiveness", Metric::RushExplosiveness),
    ("pass_epa", Metric::PassPpa),
    ("pass_success", Metric::PassSuccess),
    ("pass_explosiveness", Metric::PassExplosiveness),
    ("standard_downs_success", Metric::StandardSuccess),
    ("passing_downs_success", Metric::PassingDownSuccess),
    ("line_yards", Metric::LineYards),
    ("second_level_yards", Metric::SecondLevelYards),
    ("open_field_yards", Metric::OpenFieldYards),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

// key present with None: computed from absent inputs; key missing: never computed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustedMetricRecord {
    values: BTreeMap<String, Option<f64>>,
}

impl AdjustedMetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied().flatten()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<f64>) {
        self.values.insert(key.into(), value.filter(|v| v.is_finite()));
    }

    pub fn extend(&mut self, other: AdjustedMetricRecord) {
        self.values.extend(other.values);
    }

    pub fn merge_missing_from(&mut self, other: &AdjustedMetricRecord) {
        for (key, value) in &other.values {
            let slot = self.values.entry(key.clone()).or_insert(None);
            if slot.is_none() {
                *slot = *value;
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.values.is_empty() && self.values.values().all(Option::is_some)
    }

    pub fn has_any_value(&self) -> bool {
        self.values.values().any(Option::is_some)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut Option<f64>)> + '_ {
        self.values.iter_mut()
    }
}

/// `defense_reference` and `opponent_offense_reference` are the opponent's
/// season-scope records.
pub fn compose(
    side: Side,
    offense_game: &MetricRecord,
    defense_reference: &MetricRecord,
    opponent_offense_reference: &MetricRecord,
    defense_game: &MetricRecord,
) -> AdjustedMetricRecord {
    let p = side.prefix();
    let mut out = AdjustedMetricRecord::new();

    for (stat, metric) in ADJUSTED_STATS {
        out.insert(
            format!("{p}_adjusted_{stat}"),
            difference(offense_game.get(*metric), defense_reference.get(*metric)),
        );
        out.insert(
            format!("{p}_adjusted_{stat}_allowed"),
            difference(defense_game.get(*metric), opponent_offense_reference.get(*metric)),
        );
    }

    out.insert(
        format!("{p}_total_havoc_offense"),
        defense_reference.get(Metric::HavocTotal),
    );
    out.insert(
        format!("{p}_total_havoc_defense"),
        defense_game.get(Metric::HavocTotal),
    );
    out.insert(
        format!("{p}_front_seven_havoc_defense"),
        defense_game.get(Metric::HavocFront),
    );
    out.insert(format!("{p}_db_havoc_defense"), defense_game.get(Metric::HavocDb));
    out.insert(
        format!("{p}_points_per_opportunity_offense"),
        offense_game.get(Metric::PointsPerOpportunity),
    );
    out.insert(
        format!("{p}_points_per_opportunity_defense"),
        defense_game.get(Metric::PointsPerOpportunity),
    );
    out.insert(format!("{p}_avg_start_offense"), offense_game.get(Metric::AvgStart));
    out.insert(format!("{p}_avg_start_defense"), defense_game.get(Metric::AvgStart));

    out
}

fn difference(value: Option<f64>, reference: Option<f64>) -> Option<f64> {
    Some(value? - reference?)
}

#[cfg(test)]
mod tests {
    use super::{AdjustedMetricRecord, Side, compose, difference};
    use crate::metrics::{Metric, MetricRecord};

    fn record(pairs: &[(Metric, f64)]) -> MetricRecord {
        let mut rec = MetricRecord::new();
        for (m, v) in pairs {
            rec.set(*m, Some(*v));
        }
        rec
    }

    #[test]
    fn absent_operand_is_absent() {
        assert_eq!(difference(Some(0.3), None), None);
        assert_eq!(difference(None, Some(0.3)), None);
        assert_eq!(difference(None, None), None);
    }

    #[test]
    fn allowed_uses_opponent_offense_and_own_defense() {
        let offense_game = record(&[(Metric::Ppa, 0.30)]);
        let defense_reference = record(&[(Metric::Ppa, 0.05), (Metric::HavocTotal, 0.2)]);
        let opponent_offense = record(&[(Metric::Ppa, 0.10)]);
        let defense_game = record(&[(Metric::Ppa, 0.02), (Metric::HavocTotal, 0.15)]);

        let out = compose(
            Side::Away,
            &offense_game,
            &defense_reference,
            &opponent_offense,
            &defense_game,
        );
        assert!((out.get("away_adjusted_epa").unwrap() - 0.25).abs() < 1e-12);
        assert!((out.get("away_adjusted_epa_allowed").unwrap() + 0.08).abs() < 1e-12);
        assert_eq!(out.get("away_total_havoc_offense"), Some(0.2));
        assert_eq!(out.get("away_total_havoc_defense"), Some(0.15));
        assert!(out.contains_key("away_adjusted_line_yards"));
        assert_eq!(out.get("away_adjusted_line_yards"), None);
    }

    #[test]
    fn merge_keeps_present_values() {
        let mut first = AdjustedMetricRecord::new();
        first.insert("a", Some(1.0));
        first.insert("b", None);
        let mut second = AdjustedMetricRecord::new();
        second.insert("a", Some(9.0));
        second.insert("b", Some(2.0));
        second.insert("c", Some(3.0));

        first.merge_missing_from(&second);
        assert_eq!(first.get("a"), Some(1.0));
        assert_eq!(first.get("b"), Some(2.0));
        assert_eq!(first.get("c"), Some(3.0));
        assert!(first.is_complete());
    }
}
