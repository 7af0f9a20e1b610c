use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::payload::{as_u64_any, field_number, field_text};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameRow {
    #[serde(default, alias = "id", deserialize_with = "id_or_none")]
    pub game_id: Option<String>,
    #[serde(alias = "year")]
    pub season: i32,
    #[serde(default)]
    pub week: u32,
    #[serde(alias = "homeTeam", alias = "home")]
    pub home_team: String,
    #[serde(alias = "awayTeam", alias = "away")]
    pub away_team: String,
}

impl GameRow {
    pub fn key(&self) -> GameKey {
        resolve_game_key(
            self.game_id.as_deref(),
            self.season,
            self.week,
            &self.home_team,
            &self.away_team,
        )
    }

    pub fn upstream_id(&self) -> Option<u64> {
        match self.key() {
            GameKey::Id(id) => Some(id),
            GameKey::Derived(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameKey {
    Id(u64),
    Derived(String),
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKey::Id(id) => write!(f, "{id}"),
            GameKey::Derived(s) => f.write_str(s),
        }
    }
}

/// Numeric ids (including `"401520281.0"`) become `GameKey::Id`. A blank id
/// becomes `{season}_{week}_{home}_{away}`; any other non-numeric id is kept
/// verbatim.
pub fn resolve_game_key(
    game_id: Option<&str>,
    season: i32,
    week: u32,
    home: &str,
    away: &str,
) -> GameKey {
    let raw = game_id.map(str::trim).filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"));
    match raw {
        Some(raw) => match as_u64_any(&Value::String(raw.to_string())) {
            Some(id) => GameKey::Id(id),
            None => GameKey::Derived(raw.to_string()),
        },
        None => GameKey::Derived(format!("{season}_{week}_{}_{}", home.trim(), away.trim())),
    }
}

pub fn load_games_csv(path: &Path) -> Result<Vec<GameRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open game list {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<GameRow>().enumerate() {
        let row = row.with_context(|| format!("decode game list row {}", idx + 1))?;
        out.push(row);
    }
    Ok(out)
}

/// Parse one `/games` entry. Rows missing either team or the season are dropped.
pub fn parse_game(v: &Value) -> Option<GameRow> {
    let home_team = field_text(v, &["home_team", "home"])?;
    let away_team = field_text(v, &["away_team", "away"])?;
    let season = field_number(v, "season").or_else(|| field_number(v, "year"))? as i32;
    let week = field_number(v, "week").map(|w| w.max(0.0) as u32).unwrap_or(0);
    Some(GameRow {
        game_id: field_text(v, &["id", "game_id"]),
        season,
        week,
        home_team,
        away_team,
    })
}

fn id_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}
