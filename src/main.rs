use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use gridiron_metrics::cfbd::CfbdClient;
use gridiron_metrics::config::PipelineConfig;
use gridiron_metrics::engine::MetricsEngine;
use gridiron_metrics::export::export_metrics;
use gridiron_metrics::fill::{FillPolicy, fill_missing};
use gridiron_metrics::games::{GameRow, load_games_csv};
use gridiron_metrics::games_store;
use gridiron_metrics::rate_limit::RateLimiter;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env();
    if let Some(season) = arg_value(&args, "--season") {
        cfg.season = season
            .parse()
            .with_context(|| format!("invalid --season {season}"))?;
    }
    if let Some(week) = arg_value(&args, "--week") {
        let week: u32 = week
            .parse()
            .with_context(|| format!("invalid --week {week}"))?;
        cfg.week = (week > 0).then_some(week);
    }
    if let Some(db) = arg_value(&args, "--db") {
        cfg.db_path = Some(PathBuf::from(db));
    }
    if args.iter().any(|a| a == "--no-plays") {
        cfg.fetch_plays = false;
    }
    let fill = match arg_value(&args, "--fill") {
        Some(raw) => Some(
            FillPolicy::parse(&raw).ok_or_else(|| anyhow!("unknown --fill policy {raw}"))?,
        ),
        None => None,
    };
    let out_path = arg_value(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("adjusted_metrics_{}.csv", cfg.season)));

    let mut client = CfbdClient::from_config(&cfg)?;
    let mut limiter = RateLimiter::new(cfg.min_request_interval);

    let games = match arg_value(&args, "--games") {
        Some(path) => {
            let rows = load_games_csv(Path::new(&path))?;
            filter_week(rows, cfg.week)
        }
        None => resolve_games(&cfg, &client, &mut limiter)?,
    };
    if games.is_empty() {
        return Err(anyhow!(
            "no games for season {} week {}",
            cfg.season,
            cfg.week.map(|w| w.to_string()).unwrap_or_else(|| "all".to_string())
        ));
    }
    info!(season = cfg.season, games = games.len(), "game list ready");

    client.register_games(&games);
    let mut engine = MetricsEngine::new(client, cfg.season, limiter.into_callback());
    let mut output = if cfg.fetch_plays {
        engine.compute_with_fetched_plays(&games)
    } else {
        engine.compute(&games, None)
    };

    if let Some(policy) = fill {
        let filled = fill_missing(&mut output.metrics, policy);
        info!(filled, ?policy, "filled missing values");
    }

    let report = export_metrics(&out_path, &output.metrics)?;

    println!("Adjusted metrics written");
    println!("Out: {}", out_path.display());
    println!(
        "Season: {} (stats from {})",
        engine.season(),
        engine
            .stats_year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "Games: {} requested, {} duplicate, {} season stats, {} play-by-play, {} omitted",
        output.coverage.requested,
        output.coverage.duplicates,
        output.coverage.season_tier,
        output.coverage.play_tier,
        output.coverage.omitted
    );
    println!(
        "Columns: {} (empty cells {})",
        report.columns, report.empty_cells
    );
    let mut missing = engine.missing_teams().collect::<Vec<_>>();
    if !missing.is_empty() {
        missing.sort_unstable();
        println!("Teams without season stats: {}", missing.len());
        for team in missing.iter().take(10) {
            println!("   - {team}");
        }
    }

    Ok(())
}

/// Stored games first; an empty store falls through to the API.
fn resolve_games(
    cfg: &PipelineConfig,
    client: &CfbdClient,
    limiter: &mut RateLimiter,
) -> Result<Vec<GameRow>> {
    if let Some(db_path) = cfg.db_path.as_ref() {
        match games_store::open_db(db_path)
            .and_then(|conn| games_store::load_games(&conn, cfg.season, cfg.week))
        {
            Ok(rows) if !rows.is_empty() => {
                info!(db = %db_path.display(), games = rows.len(), "games loaded from store");
                return Ok(rows);
            }
            Ok(_) => {}
            Err(err) => warn!(error = %format!("{err:#}"), "game store unavailable"),
        }
    }
    limiter.wait();
    client
        .fetch_games(cfg.season, cfg.week)
        .context("fetch game list")
}

fn filter_week(rows: Vec<GameRow>, week: Option<u32>) -> Vec<GameRow> {
    match week {
        Some(week) => rows.into_iter().filter(|g| g.week == week).collect(),
        None => rows,
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg
            .strip_prefix(flag)
            .and_then(|rest| rest.strip_prefix('='))
        {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
