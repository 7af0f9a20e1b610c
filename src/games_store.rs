use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::games::GameRow;

#[derive(Debug, Clone)]
pub struct SeasonIngestSummary {
    pub season: i32,
    pub games_upserted: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub seasons_total: usize,
    pub seasons_succeeded: usize,
    pub games_upserted: usize,
    pub per_season: Vec<SeasonIngestSummary>,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            game_key TEXT PRIMARY KEY,
            game_id TEXT NULL,
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_season_week ON games(season, week);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            seasons_total INTEGER NOT NULL,
            seasons_succeeded INTEGER NOT NULL,
            games_upserted INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Pull each season through `fetch` and upsert its games. A failing season is
/// recorded in the run row and does not stop the others.
pub fn ingest_seasons(
    conn: &mut Connection,
    db_path: PathBuf,
    seasons: &[i32],
    mut fetch: impl FnMut(i32) -> Result<Vec<GameRow>>,
) -> Result<IngestSummary> {
    let mut unique = Vec::new();
    for season in seasons {
        if !unique.contains(season) {
            unique.push(*season);
        }
    }
    if unique.is_empty() {
        return Err(anyhow!("no seasons passed to ingest"));
    }

    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, seasons_total, seasons_succeeded, games_upserted, errors_json)
         VALUES (?1, NULL, ?2, 0, 0, '[]')",
        params![started_at, unique.len() as i64],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut per_season = Vec::with_capacity(unique.len());
    let mut errors: Vec<String> = Vec::new();
    for season in &unique {
        match fetch(*season) {
            Ok(rows) => {
                let tx = conn.transaction().context("begin ingest transaction")?;
                for row in &rows {
                    upsert_game(&tx, row)?;
                }
                tx.commit().context("commit ingest transaction")?;
                per_season.push(SeasonIngestSummary {
                    season: *season,
                    games_upserted: rows.len(),
                    error: None,
                });
            }
            Err(err) => {
                let msg = format!("{err:#}");
                errors.push(format!("season {season}: {msg}"));
                per_season.push(SeasonIngestSummary {
                    season: *season,
                    games_upserted: 0,
                    error: Some(msg),
                });
            }
        }
    }

    let seasons_succeeded = per_season.iter().filter(|s| s.error.is_none()).count();
    let games_upserted: usize = per_season.iter().map(|s| s.games_upserted).sum();

    let finished_at = Utc::now().to_rfc3339();
    let errors_json = serde_json::to_string(&errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, seasons_succeeded = ?2, games_upserted = ?3, errors_json = ?4
         WHERE run_id = ?5",
        params![
            finished_at,
            seasons_succeeded as i64,
            games_upserted as i64,
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;

    Ok(IngestSummary {
        db_path,
        seasons_total: unique.len(),
        seasons_succeeded,
        games_upserted,
        per_season,
    })
}

/// Games for a season, optionally a single week, in week then key order.
pub fn load_games(conn: &Connection, season: i32, week: Option<u32>) -> Result<Vec<GameRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT game_id, season, week, home_team, away_team
            FROM games
            WHERE season = ?1
              AND (?2 IS NULL OR week = ?2)
            ORDER BY week ASC, game_key ASC
            "#,
        )
        .context("prepare load games query")?;

    let rows = stmt
        .query_map(params![season, week.map(i64::from)], |row| {
            Ok(GameRow {
                game_id: row.get(0)?,
                season: row.get(1)?,
                week: row.get::<_, u32>(2)?,
                home_team: row.get(3)?,
                away_team: row.get(4)?,
            })
        })
        .context("query load games")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode game row")?);
    }
    Ok(out)
}

fn upsert_game(tx: &rusqlite::Transaction<'_>, game: &GameRow) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO games (game_key, game_id, season, week, home_team, away_team, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(game_key) DO UPDATE SET
            game_id = excluded.game_id,
            season = excluded.season,
            week = excluded.week,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            updated_at = excluded.updated_at
        "#,
        params![
            game.key().to_string(),
            game.game_id,
            game.season,
            game.week as i64,
            game.home_team,
            game.away_team,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert game")?;
    Ok(())
}
