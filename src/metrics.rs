use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Ppa,
    SuccessRate,
    Explosiveness,
    RushPpa,
    RushSuccess,
    RushExplosiveness,
    PassPpa,
    PassSuccess,
    PassExplosiveness,
    StandardSuccess,
    PassingDownSuccess,
    LineYards,
    SecondLevelYards,
    OpenFieldYards,
    PointsPerOpportunity,
    AvgStart,
    HavocFront,
    HavocDb,
    HavocTotal,
}

impl Metric {
    pub const ALL: [Metric; 19] = [
        Metric::Ppa,
        Metric::SuccessRate,
        Metric::Explosiveness,
        Metric::RushPpa,
        Metric::RushSuccess,
        Metric::RushExplosiveness,
        Metric::PassPpa,
        Metric::PassSuccess,
        Metric::PassExplosiveness,
        Metric::StandardSuccess,
        Metric::PassingDownSuccess,
        Metric::LineYards,
        Metric::SecondLevelYards,
        Metric::OpenFieldYards,
        Metric::PointsPerOpportunity,
        Metric::AvgStart,
        Metric::HavocFront,
        Metric::HavocDb,
        Metric::HavocTotal,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Ppa => "ppa",
            Metric::SuccessRate => "success_rate",
            Metric::Explosiveness => "explosiveness",
            Metric::RushPpa => "rush_ppa",
            Metric::RushSuccess => "rush_success",
            Metric::RushExplosiveness => "rush_explosiveness",
            Metric::PassPpa => "pass_ppa",
            Metric::PassSuccess => "pass_success",
            Metric::PassExplosiveness => "pass_explosiveness",
            Metric::StandardSuccess => "standard_success",
            Metric::PassingDownSuccess => "passing_down_success",
            Metric::LineYards => "line_yards",
            Metric::SecondLevelYards => "second_level_yards",
            Metric::OpenFieldYards => "open_field_yards",
            Metric::PointsPerOpportunity => "points_per_opportunity",
            Metric::AvgStart => "avg_start",
            Metric::HavocFront => "havoc_front",
            Metric::HavocDb => "havoc_db",
            Metric::HavocTotal => "havoc_total",
        }
    }

    /// Rates bounded to [0, 1] by construction.
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            Metric::SuccessRate
                | Metric::RushSuccess
                | Metric::PassSuccess
                | Metric::StandardSuccess
                | Metric::PassingDownSuccess
                | Metric::HavocFront
                | Metric::HavocDb
        )
    }

    pub fn is_defense_only(self) -> bool {
        matches!(self, Metric::HavocFront | Metric::HavocDb | Metric::HavocTotal)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    values: BTreeMap<Metric, f64>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    /// Stores `value` when present and finite. Rates are clipped to [0, 1].
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                let v = if metric.is_rate() { v.clamp(0.0, 1.0) } else { v };
                self.values.insert(metric, v);
            }
            None => {
                self.values.remove(&metric);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamSides {
    pub offense: MetricRecord,
    pub defense: MetricRecord,
}

#[derive(Debug, Clone)]
pub struct TeamSeasonStats {
    pub team: String,
    pub season: i32,
    pub sides: TeamSides,
}
