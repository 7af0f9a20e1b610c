use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use gridiron_metrics::adjust::AdjustedMetricRecord;
use gridiron_metrics::engine::{MetricsEngine, RawStatsProvider};
use gridiron_metrics::games::{GameKey, GameRow};
use gridiron_metrics::plays::{PlayRecord, parse_plays_json};

#[derive(Default)]
struct StubProvider {
    seasons: HashMap<i32, Vec<Value>>,
    plays: Vec<PlayRecord>,
    fail_stats: bool,
    fail_plays: bool,
    stats_calls: RefCell<Vec<i32>>,
    play_calls: RefCell<Vec<Vec<u64>>>,
}

impl RawStatsProvider for StubProvider {
    fn fetch_season_stats(&self, year: i32) -> Result<Vec<Value>> {
        self.stats_calls.borrow_mut().push(year);
        if self.fail_stats {
            return Err(anyhow!("stats endpoint unavailable"));
        }
        Ok(self.seasons.get(&year).cloned().unwrap_or_default())
    }

    fn fetch_plays(&self, game_ids: &[u64]) -> Result<Vec<PlayRecord>> {
        self.play_calls.borrow_mut().push(game_ids.to_vec());
        if self.fail_plays {
            return Err(anyhow!("plays endpoint unavailable"));
        }
        Ok(self
            .plays
            .iter()
            .filter(|p| p.game_id.is_some_and(|id| game_ids.contains(&id)))
            .cloned()
            .collect())
    }
}

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_season() -> Vec<Value> {
    serde_json::from_str(&read_fixture("season_stats.json")).expect("fixture should parse")
}

fn fixture_plays() -> Vec<PlayRecord> {
    parse_plays_json(&read_fixture("plays.json")).expect("fixture should parse")
}

fn game(id: Option<u64>, home: &str, away: &str) -> GameRow {
    GameRow {
        game_id: id.map(|id| id.to_string()),
        season: 2023,
        week: 2,
        home_team: home.to_string(),
        away_team: away.to_string(),
    }
}

fn counter() -> (Rc<Cell<usize>>, impl FnMut() + 'static) {
    let count = Rc::new(Cell::new(0));
    let handle = Rc::clone(&count);
    (count, move || handle.set(handle.get() + 1))
}

fn approx(record: &AdjustedMetricRecord, key: &str, expected: f64) {
    let actual = record
        .get(key)
        .unwrap_or_else(|| panic!("{key} should be present"));
    assert!(
        (actual - expected).abs() < 1e-9,
        "{key}: expected {expected}, got {actual}"
    );
}

#[test]
fn season_stats_round_trip() {
    let provider = StubProvider {
        seasons: HashMap::from([(
            2023,
            vec![
                json!({"team": "Home U", "offense": {"ppa": 0.30}, "defense": {"ppa": 0.12}}),
                json!({"team": "Away U", "offense": {"ppa": 0.20}, "defense": {"ppa": 0.05}}),
            ],
        )]),
        ..StubProvider::default()
    };
    let (calls, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);
    assert!(!engine.is_loaded());

    let out = engine.compute(&[game(Some(1), "Home U", "Away U")], None);
    let record = out.metrics.get(&GameKey::Id(1)).expect("game resolved");
    approx(record, "home_adjusted_epa", 0.25);
    approx(record, "away_adjusted_epa", 0.08);
    approx(record, "home_adjusted_epa_allowed", -0.08);
    assert!(record.contains_key("home_adjusted_line_yards"));
    assert_eq!(record.get("home_adjusted_line_yards"), None);

    assert!(engine.is_loaded());
    assert_eq!(engine.stats_year(), Some(2023));
    assert_eq!(engine.season_team_count(), 2);
    assert_eq!(calls.get(), 1);
    assert_eq!(out.coverage.season_tier, 1);
}

#[test]
fn complete_season_records_skip_play_fetch() {
    let provider = StubProvider {
        seasons: HashMap::from([(2023, fixture_season())]),
        plays: fixture_plays(),
        ..StubProvider::default()
    };
    let (calls, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let out = engine.compute_with_fetched_plays(&[game(Some(401520102), "Texas", "Oklahoma")]);
    let record = out.metrics.get(&GameKey::Id(401520102)).expect("game resolved");
    assert!(record.is_complete());
    approx(record, "home_adjusted_epa", 0.25);
    approx(record, "home_adjusted_epa_allowed", 0.08 - 0.27);
    approx(record, "away_adjusted_epa", 0.27 - 0.08);
    approx(record, "home_total_havoc_offense", 0.16);
    approx(record, "home_total_havoc_defense", 0.18);
    approx(record, "home_avg_start_offense", 70.8);

    assert!(provider.play_calls.borrow().is_empty());
    assert_eq!(calls.get(), 1);
    assert_eq!(out.coverage.play_tier, 0);
}

#[test]
fn play_tier_covers_games_without_season_stats() {
    let provider = StubProvider::default();
    let (_, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let plays = fixture_plays();
    let out = engine.compute(&[game(Some(401520101), "Utah", "Baylor")], Some(&plays));
    let record = out.metrics.get(&GameKey::Id(401520101)).expect("play tier resolved");

    // 0.6 raw success against a Baylor defense that allowed 0.5 across all plays
    approx(record, "home_adjusted_success", 0.1);
    approx(record, "away_adjusted_success", 0.0);
    approx(record, "home_points_per_opportunity_offense", 6.0);
    approx(record, "away_db_havoc_defense", 0.0);
    assert_eq!(out.coverage.season_tier, 0);
    assert_eq!(out.coverage.play_tier, 1);
    assert_eq!(engine.stats_year(), None);
}

#[test]
fn unknown_team_without_plays_is_omitted() {
    let provider = StubProvider {
        seasons: HashMap::from([(2023, fixture_season())]),
        ..StubProvider::default()
    };
    let (_, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let games = [
        game(Some(11), "Texas", "Nowhere State"),
        game(Some(12), "Rice", "Nowhere State"),
        game(Some(13), "texas", "OKLAHOMA"),
        game(Some(14), "nowhere st.", "Texas"),
    ];
    let out = engine.compute_with_fetched_plays(&games);

    assert!(!out.metrics.contains_key(&GameKey::Id(11)));
    assert!(!out.metrics.contains_key(&GameKey::Id(12)));
    assert!(out.metrics.contains_key(&GameKey::Id(13)));
    assert!(!out.metrics.contains_key(&GameKey::Id(14)));
    assert_eq!(out.coverage.omitted, 3);

    // spelling variants of one school are reported once, first spelling kept
    let missing: Vec<&str> = engine.missing_teams().collect();
    assert_eq!(missing, vec!["Nowhere State"]);
    assert_eq!(*provider.play_calls.borrow(), vec![vec![11, 12, 14]]);
}

#[test]
fn play_tier_only_fills_what_season_tier_left_absent() {
    let provider = StubProvider {
        seasons: HashMap::from([(
            2023,
            vec![
                json!({"team": "Utah", "offense": {"ppa": 0.30}, "defense": {"ppa": 0.10}}),
                json!({"team": "Baylor", "offense": {"ppa": 0.20}, "defense": {"ppa": 0.05}}),
            ],
        )]),
        plays: fixture_plays(),
        ..StubProvider::default()
    };
    let (calls, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let out = engine.compute_with_fetched_plays(&[game(Some(401520101), "Utah", "Baylor")]);
    let record = out.metrics.get(&GameKey::Id(401520101)).expect("merged");

    // season value wins over the play-derived 0.57 - reference
    approx(record, "home_adjusted_epa", 0.25);
    // play tier supplies what season stats lacked
    approx(record, "home_adjusted_line_yards", 0.0);
    approx(record, "home_adjusted_success", 0.0);
    assert_eq!(out.coverage.season_tier, 1);
    assert_eq!(out.coverage.play_tier, 1);
    assert_eq!(*provider.play_calls.borrow(), vec![vec![401520101]]);
    assert_eq!(calls.get(), 2);
}

#[test]
fn falls_back_to_previous_season() {
    let provider = StubProvider {
        seasons: HashMap::from([(2022, fixture_season())]),
        ..StubProvider::default()
    };
    let (calls, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let out = engine.compute(&[game(Some(5), "Texas", "Rice")], None);
    assert!(out.metrics.contains_key(&GameKey::Id(5)));
    assert_eq!(engine.stats_year(), Some(2022));
    assert_eq!(*provider.stats_calls.borrow(), vec![2023, 2022]);
    assert_eq!(calls.get(), 2);

    // loaded once per engine
    engine.compute(&[game(Some(6), "Rice", "Texas")], None);
    assert_eq!(provider.stats_calls.borrow().len(), 2);
}

#[test]
fn provider_failures_degrade_to_empty() {
    let provider = StubProvider {
        fail_stats: true,
        fail_plays: true,
        ..StubProvider::default()
    };
    let (_, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let out = engine.compute_with_fetched_plays(&[game(Some(1), "Texas", "Rice")]);
    assert!(out.metrics.is_empty());
    assert_eq!(out.coverage.omitted, 1);
    assert!(engine.is_loaded());
    assert_eq!(engine.season_team_count(), 0);
}

#[test]
fn stats_failure_still_uses_fetched_plays() {
    let provider = StubProvider {
        fail_stats: true,
        plays: fixture_plays(),
        ..StubProvider::default()
    };
    let (_, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let out = engine.compute_with_fetched_plays(&[game(Some(401520101), "Utah", "Baylor")]);
    assert!(out.metrics.contains_key(&GameKey::Id(401520101)));
}

#[test]
fn duplicate_keys_keep_first_and_derived_keys_are_stable() {
    let provider = StubProvider {
        seasons: HashMap::from([(2023, fixture_season())]),
        ..StubProvider::default()
    };
    let (_, rate_limit) = counter();
    let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);

    let games = [
        game(None, "Texas", "Rice"),
        game(None, "Texas", "Rice"),
        game(Some(9), "Oklahoma", "Texas"),
    ];
    let out = engine.compute(&games, None);
    assert_eq!(out.coverage.requested, 3);
    assert_eq!(out.coverage.duplicates, 1);
    assert_eq!(out.metrics.len(), 2);
    assert!(
        out.metrics
            .contains_key(&GameKey::Derived("2023_2_Texas_Rice".to_string()))
    );
}

#[test]
fn identical_inputs_give_identical_output() {
    let provider = StubProvider {
        seasons: HashMap::from([(2023, fixture_season())]),
        plays: fixture_plays(),
        ..StubProvider::default()
    };
    let games = [
        game(Some(401520101), "Utah", "Baylor"),
        game(Some(401520102), "Texas", "Oklahoma"),
        game(None, "Rice", "Texas"),
    ];

    let run = || {
        let (_, rate_limit) = counter();
        let mut engine = MetricsEngine::new(&provider, 2023, rate_limit);
        engine.compute_with_fetched_plays(&games)
    };
    let first = run();
    let second = run();
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.coverage, second.coverage);
    assert_eq!(first.metrics.len(), 3);
}
