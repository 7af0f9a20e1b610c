use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, SeasonType};
use crate::engine::RawStatsProvider;
use crate::games::{GameRow, parse_game};
use crate::http_cache::{ApiRequest, fetch_json_cached};
use crate::http_client::http_client;
use crate::plays::{PlayRecord, parse_plays_json};

// Completed weeks do not change; the current one may.
const SEASON_STATS_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);
const PLAYS_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

pub struct CfbdClient {
    client: &'static Client,
    base_url: String,
    api_key: Option<String>,
    season_type: SeasonType,
    // game id -> (season, week), needed because /plays is keyed by week
    calendar: HashMap<u64, (i32, u32)>,
}

impl CfbdClient {
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            season_type: cfg.season_type,
            calendar: HashMap::new(),
        })
    }

    /// Remember which week each game belongs to so play requests can be
    /// routed.
    pub fn register_games(&mut self, games: &[GameRow]) {
        for game in games {
            if let Some(id) = game.upstream_id() {
                self.calendar.insert(id, (game.season, game.week));
            }
        }
    }

    pub fn fetch_games(&self, season: i32, week: Option<u32>) -> Result<Vec<GameRow>> {
        let mut url = format!(
            "{}/games?year={season}&seasonType={}",
            self.base_url,
            self.season_type.as_query()
        );
        if let Some(week) = week {
            url.push_str(&format!("&week={week}"));
        }
        let value = self.get_json(&url, None).context("games request failed")?;
        let rows = value
            .as_array()
            .ok_or_else(|| anyhow!("games response is not an array"))?;
        Ok(rows.iter().filter_map(parse_game).collect())
    }

    fn get_json(&self, url: &str, max_age: Option<Duration>) -> Result<Value> {
        let body = self.get_text(url, max_age)?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Value::Array(Vec::new()));
        }
        serde_json::from_str(trimmed).with_context(|| format!("invalid json from {url}"))
    }

    fn get_text(&self, url: &str, max_age: Option<Duration>) -> Result<String> {
        let req = ApiRequest {
            url,
            bearer: self.api_key.as_deref(),
            max_age,
        };
        fetch_json_cached(self.client, &req)
    }
}

impl RawStatsProvider for CfbdClient {
    fn fetch_season_stats(&self, year: i32) -> Result<Vec<Value>> {
        let url = format!("{}/stats/season/advanced?year={year}", self.base_url);
        let value = self
            .get_json(&url, Some(SEASON_STATS_MAX_AGE))
            .context("season stats request failed")?;
        match value {
            Value::Array(rows) => Ok(rows),
            _ => Err(anyhow!("season stats response is not an array")),
        }
    }

    fn fetch_plays(&self, game_ids: &[u64]) -> Result<Vec<PlayRecord>> {
        let wanted: HashSet<u64> = game_ids.iter().copied().collect();
        let mut weeks: BTreeSet<(i32, u32)> = BTreeSet::new();
        for id in &wanted {
            match self.calendar.get(id) {
                Some(slot) => {
                    weeks.insert(*slot);
                }
                None => debug!(game_id = id, "no week known for game, skipping plays"),
            }
        }

        let mut out = Vec::new();
        let mut failures = 0usize;
        for (season, week) in &weeks {
            let url = format!(
                "{}/plays?year={season}&week={week}&seasonType={}",
                self.base_url,
                self.season_type.as_query()
            );
            let rows = self
                .get_text(&url, Some(PLAYS_MAX_AGE))
                .and_then(|body| parse_plays_json(&body));
            match rows {
                Ok(rows) => out.extend(
                    rows.into_iter()
                        .filter(|p| p.game_id.is_some_and(|id| wanted.contains(&id))),
                ),
                Err(err) => {
                    failures += 1;
                    warn!(season, week, error = %format!("{err:#}"), "plays request failed");
                }
            }
        }

        if out.is_empty() && failures > 0 {
            return Err(anyhow!("all {failures} play requests failed"));
        }
        Ok(out)
    }
}
