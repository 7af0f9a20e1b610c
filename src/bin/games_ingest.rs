use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use gridiron_metrics::cfbd::CfbdClient;
use gridiron_metrics::config::PipelineConfig;
use gridiron_metrics::games_store;
use gridiron_metrics::rate_limit::RateLimiter;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = PipelineConfig::from_env();
    let seasons = parse_seasons_arg().unwrap_or_else(|| vec![cfg.season]);
    if seasons.is_empty() {
        return Err(anyhow!("no seasons resolved for ingest"));
    }

    let db_path = parse_db_path_arg()
        .or_else(|| cfg.db_path.clone())
        .context("unable to resolve sqlite path")?;

    let client = CfbdClient::from_config(&cfg)?;
    let mut limiter = RateLimiter::new(cfg.min_request_interval);
    let mut conn = games_store::open_db(&db_path)?;
    let summary = games_store::ingest_seasons(&mut conn, db_path.clone(), &seasons, |season| {
        limiter.wait();
        client.fetch_games(season, None)
    })?;

    println!("Game ingest complete");
    println!("DB: {}", summary.db_path.display());
    println!(
        "Seasons: {}/{}",
        summary.seasons_succeeded, summary.seasons_total
    );
    println!("Games upserted: {}", summary.games_upserted);
    for item in &summary.per_season {
        match item.error.as_deref() {
            Some(err) => println!("season {}: failed: {err}", item.season),
            None => println!("season {}: games={}", item.season, item.games_upserted),
        }
    }

    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

/// `--seasons=2021,2022` or `--seasons 2019-2023`.
fn parse_seasons_arg() -> Option<Vec<i32>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--seasons=") {
            let seasons = parse_seasons(raw);
            if !seasons.is_empty() {
                return Some(seasons);
            }
        }
        if arg == "--seasons"
            && let Some(next) = args.get(idx + 1)
        {
            let seasons = parse_seasons(next);
            if !seasons.is_empty() {
                return Some(seasons);
            }
        }
    }
    None
}

fn parse_seasons(raw: &str) -> Vec<i32> {
    let mut out = Vec::new();
    for part in raw.split([',', ';', ' ']).map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let (Ok(start), Ok(end)) = (start.trim().parse::<i32>(), end.trim().parse::<i32>())
                else {
                    continue;
                };
                out.extend(start.min(end)..=start.max(end));
            }
            None => {
                if let Ok(season) = part.parse::<i32>() {
                    out.push(season);
                }
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}
