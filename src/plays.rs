use anyhow::{Context, Result};
use serde_json::Value;

use crate::payload::{as_u64_any, field, field_any, field_flag, field_number, field_text, number};

/// One offensive snap as delivered by the play-by-play feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayRecord {
    pub game_id: Option<u64>,
    pub offense: String,
    pub defense: String,
    pub down: Option<u8>,
    pub distance: Option<f64>,
    pub yards_gained: Option<f64>,
    pub ppa: Option<f64>,
    pub success: Option<bool>,
    pub rush: bool,
    pub pass: bool,
    pub sack: bool,
    pub yard_line: Option<f64>,
    pub scoring: bool,
    pub points: Option<f64>,
    pub play_type: String,
}

pub fn parse_plays_json(raw: &str) -> Result<Vec<PlayRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(trimmed).context("invalid plays json")?;
    let rows = value
        .as_array()
        .or_else(|| field(&value, "plays").and_then(|v| v.as_array()))
        .map(|arr| arr.iter().filter_map(parse_play).collect())
        .unwrap_or_default();
    Ok(rows)
}

/// Parse one play row. Rows without both team names, and special-teams or
/// administrative rows, are dropped; other missing fields degrade to absent
/// or are derived.
pub fn parse_play(v: &Value) -> Option<PlayRecord> {
    let offense = field_text(v, &["offense", "offense_team", "pos_team"])?;
    let defense = field_text(v, &["defense", "defense_team", "def_pos_team"])?;
    let play_type = field_text(v, &["play_type", "type"]).unwrap_or_default();
    let lower_type = play_type.to_ascii_lowercase();
    if is_non_scrimmage(&lower_type) {
        return None;
    }

    let down = field_number(v, "down")
        .filter(|d| d.fract() == 0.0 && (1.0..=4.0).contains(d))
        .map(|d| d as u8);
    let distance = field_number(v, "distance");
    let yards_gained = field_any(v, &["yards_gained", "yardage", "yards"]).and_then(number);

    let sack = field_flag(v, "sack").unwrap_or_else(|| lower_type.contains("sack"));
    let rush = field_flag(v, "rush").unwrap_or_else(|| {
        lower_type.contains("rush") || lower_type.contains("run")
    });
    let pass = field_flag(v, "pass").unwrap_or_else(|| {
        lower_type.contains("pass") || lower_type.contains("sack") || lower_type.contains("interception")
    });

    let success = field_flag(v, "success")
        .or_else(|| derive_success(down, distance, yards_gained));

    let scoring = field_flag(v, "scoring").unwrap_or(false);
    let points = field_any(v, &["points", "points_scored"])
        .and_then(number)
        .or_else(|| scoring.then(|| points_from_play_type(&lower_type)).flatten());

    Some(PlayRecord {
        game_id: field_any(v, &["game_id", "id_game"]).and_then(as_u64_any),
        offense,
        defense,
        down,
        distance,
        yards_gained,
        ppa: field_any(v, &["ppa", "epa"]).and_then(number),
        success,
        rush,
        pass,
        sack,
        yard_line: field_any(v, &["yard_line", "yardline", "yards_to_goal"]).and_then(number),
        scoring,
        points,
        play_type,
    })
}

/// 50% of the distance on first down, 70% on second, all of it on third and fourth.
fn derive_success(down: Option<u8>, distance: Option<f64>, gained: Option<f64>) -> Option<bool> {
    let (down, distance, gained) = (down?, distance?, gained?);
    let share = match down {
        1 => 0.5,
        2 => 0.7,
        3 | 4 => 1.0,
        _ => return None,
    };
    Some(gained >= share * distance)
}

const NON_SCRIMMAGE: &[&str] = &[
    "punt",
    "kickoff",
    "timeout",
    "end period",
    "end of",
    "coin toss",
    "extra point",
];

// field goals and two-point tries count as scrimmage plays
fn is_non_scrimmage(lower_type: &str) -> bool {
    lower_type.trim() == "penalty" || NON_SCRIMMAGE.iter().any(|t| lower_type.contains(t))
}

fn points_from_play_type(lower_type: &str) -> Option<f64> {
    if lower_type.contains("touchdown") {
        Some(6.0)
    } else if lower_type.contains("field goal good") {
        Some(3.0)
    } else if lower_type.contains("safety") {
        Some(2.0)
    } else {
        None
    }
}
