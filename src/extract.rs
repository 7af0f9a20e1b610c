use serde_json::Value;

use crate::metrics::{Metric, MetricRecord, TeamSeasonStats, TeamSides};
use crate::payload::{field, field_number, field_text, nested_number, number};

/// Flatten one side (`offense` or `defense`) of a season-stats payload.
///
/// Unparsable or missing fields stay absent; nothing here fails.
pub fn extract_side(side: &Value, is_defense: bool) -> MetricRecord {
    let mut rec = MetricRecord::new();

    rec.set(Metric::Ppa, field_number(side, "ppa"));
    rec.set(Metric::SuccessRate, field_number(side, "success_rate"));
    rec.set(Metric::Explosiveness, field_number(side, "explosiveness"));

    rec.set(Metric::RushPpa, nested_number(side, "rushing_plays", "ppa"));
    rec.set(Metric::RushSuccess, nested_number(side, "rushing_plays", "success_rate"));
    rec.set(
        Metric::RushExplosiveness,
        nested_number(side, "rushing_plays", "explosiveness"),
    );
    rec.set(Metric::PassPpa, nested_number(side, "passing_plays", "ppa"));
    rec.set(Metric::PassSuccess, nested_number(side, "passing_plays", "success_rate"));
    rec.set(
        Metric::PassExplosiveness,
        nested_number(side, "passing_plays", "explosiveness"),
    );

    rec.set(
        Metric::StandardSuccess,
        nested_number(side, "standard_downs", "success_rate"),
    );
    rec.set(
        Metric::PassingDownSuccess,
        nested_number(side, "passing_downs", "success_rate"),
    );

    rec.set(Metric::LineYards, field_number(side, "line_yards"));
    rec.set(Metric::SecondLevelYards, field_number(side, "second_level_yards"));
    rec.set(Metric::OpenFieldYards, field_number(side, "open_field_yards"));
    rec.set(
        Metric::PointsPerOpportunity,
        field_number(side, "points_per_opportunity"),
    );
    rec.set(
        Metric::AvgStart,
        nested_number(side, "field_position", "average_start")
            .or_else(|| field_number(side, "avg_start")),
    );

    if is_defense {
        let front = nested_number(side, "havoc", "front_seven");
        let db = nested_number(side, "havoc", "db");
        rec.set(Metric::HavocFront, front);
        rec.set(Metric::HavocDb, db);
        rec.set(Metric::HavocTotal, havoc_total(front, db));
    }

    rec
}

/// Sum of the two havoc components, present when at least one is.
pub fn havoc_total(front: Option<f64>, db: Option<f64>) -> Option<f64> {
    match (front, db) {
        (None, None) => None,
        (f, d) => Some(f.unwrap_or(0.0) + d.unwrap_or(0.0)),
    }
}

/// Build a team's season record from one provider payload. Returns `None`
/// only when the payload names no team.
pub fn team_season_stats_from_payload(payload: &Value, fallback_season: i32) -> Option<TeamSeasonStats> {
    let team = field_text(payload, &["team", "school"])?;
    let season = field(payload, "season")
        .or_else(|| field(payload, "year"))
        .and_then(number)
        .map(|s| s as i32)
        .unwrap_or(fallback_season);

    let offense = field(payload, "offense")
        .map(|side| extract_side(side, false))
        .unwrap_or_default();
    let defense = field(payload, "defense")
        .map(|side| extract_side(side, true))
        .unwrap_or_default();

    Some(TeamSeasonStats {
        team,
        season,
        sides: TeamSides { offense, defense },
    })
}
