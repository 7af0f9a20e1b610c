use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};

use crate::http_cache::app_cache_dir;

const DEFAULT_BASE_URL: &str = "https://api.collegefootballdata.com";
const DEFAULT_MIN_INTERVAL_MS: u64 = 250;
const MAX_MIN_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonType {
    Regular,
    Postseason,
    Both,
}

impl SeasonType {
    pub fn as_query(self) -> &'static str {
        match self {
            SeasonType::Regular => "regular",
            SeasonType::Postseason => "postseason",
            SeasonType::Both => "both",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "regular" => Some(SeasonType::Regular),
            "postseason" | "post" => Some(SeasonType::Postseason),
            "both" | "all" => Some(SeasonType::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub season: i32,
    pub week: Option<u32>,
    pub season_type: SeasonType,
    pub min_request_interval: Duration,
    pub fetch_plays: bool,
    pub db_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("CFBD_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let base_url = env::var("CFBD_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let season = env::var("CFB_SEASON")
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or_else(|| detect_season(Local::now().date_naive()));
        let week = env::var("CFB_WEEK")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|w| *w > 0);
        let season_type = env::var("CFB_SEASON_TYPE")
            .ok()
            .and_then(|v| SeasonType::parse(&v))
            .unwrap_or(SeasonType::Regular);
        let interval_ms = env::var("CFBD_MIN_INTERVAL_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_MIN_INTERVAL_MS)
            .min(MAX_MIN_INTERVAL_MS);
        let db_path = env::var("GRIDIRON_DB_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| app_cache_dir().map(|dir| dir.join("games.sqlite")));

        Self {
            api_key,
            base_url,
            season,
            week,
            season_type,
            min_request_interval: Duration::from_millis(interval_ms),
            fetch_plays: env_bool("CFB_FETCH_PLAYS", true),
            db_path,
        }
    }
}

/// The season runs August through January, so before August the most
/// recent season is last year's.
pub fn detect_season(today: NaiveDate) -> i32 {
    if today.month() >= 8 {
        today.year()
    } else {
        today.year() - 1
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
