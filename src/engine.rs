use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adjust::{AdjustedMetricRecord, Side, compose};
use crate::aggregate::{GroupKey, Grouping, TeamGroups, TeamPlayMetrics, aggregate_plays};
use crate::extract::team_season_stats_from_payload;
use crate::games::{GameKey, GameRow};
use crate::metrics::{TeamSeasonStats, TeamSides};
use crate::plays::PlayRecord;
use crate::team_names::{TeamIndex, normalize_team_name};

/// Source of raw season payloads and play-by-play rows.
pub trait RawStatsProvider {
    fn fetch_season_stats(&self, year: i32) -> Result<Vec<Value>>;

    fn fetch_plays(&self, game_ids: &[u64]) -> Result<Vec<PlayRecord>>;
}

impl<P: RawStatsProvider + ?Sized> RawStatsProvider for &P {
    fn fetch_season_stats(&self, year: i32) -> Result<Vec<Value>> {
        (**self).fetch_season_stats(year)
    }

    fn fetch_plays(&self, game_ids: &[u64]) -> Result<Vec<PlayRecord>> {
        (**self).fetch_plays(game_ids)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    pub requested: usize,
    pub duplicates: usize,
    pub season_tier: usize,
    pub play_tier: usize,
    pub omitted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub metrics: BTreeMap<GameKey, AdjustedMetricRecord>,
    pub coverage: Coverage,
}

struct SeasonStats {
    year: Option<i32>,
    index: TeamIndex<TeamSides>,
}

enum PlaySource<'p> {
    Absent,
    Supplied(&'p [PlayRecord]),
    Fetch,
}

pub struct MetricsEngine<P> {
    provider: P,
    rate_limit: Box<dyn FnMut()>,
    season: i32,
    stats: Option<SeasonStats>,
    // normalized name -> first spelling seen
    missing_teams: HashMap<String, String>,
}

impl<P: RawStatsProvider> MetricsEngine<P> {
    /// `rate_limit` runs before every provider request.
    pub fn new(provider: P, season: i32, rate_limit: impl FnMut() + 'static) -> Self {
        Self {
            provider,
            rate_limit: Box::new(rate_limit),
            season,
            stats: None,
            missing_teams: HashMap::new(),
        }
    }

    pub fn season(&self) -> i32 {
        self.season
    }

    pub fn is_loaded(&self) -> bool {
        self.stats.is_some()
    }

    pub fn stats_year(&self) -> Option<i32> {
        self.stats.as_ref().and_then(|s| s.year)
    }

    pub fn season_team_count(&self) -> usize {
        self.stats.as_ref().map(|s| s.index.len()).unwrap_or(0)
    }

    pub fn missing_teams(&self) -> impl Iterator<Item = &str> + '_ {
        self.missing_teams.values().map(String::as_str)
    }

    /// Season-stats tier, then the supplied plays (if any) for the rest.
    pub fn compute(&mut self, games: &[GameRow], plays: Option<&[PlayRecord]>) -> EngineOutput {
        let source = match plays {
            Some(plays) => PlaySource::Supplied(plays),
            None => PlaySource::Absent,
        };
        self.run(games, source)
    }

    pub fn compute_with_fetched_plays(&mut self, games: &[GameRow]) -> EngineOutput {
        self.run(games, PlaySource::Fetch)
    }

    fn run(&mut self, games: &[GameRow], source: PlaySource<'_>) -> EngineOutput {
        self.ensure_stats_loaded();

        let mut coverage = Coverage {
            requested: games.len(),
            ..Coverage::default()
        };

        let mut seen = HashSet::new();
        let mut unique: Vec<(GameKey, &GameRow)> = Vec::with_capacity(games.len());
        for game in games {
            let key = game.key();
            if seen.insert(key.clone()) {
                unique.push((key, game));
            } else {
                coverage.duplicates += 1;
                warn!(game = %key, "duplicate game key skipped");
            }
        }

        let mut metrics: BTreeMap<GameKey, AdjustedMetricRecord> = BTreeMap::new();
        for (key, game) in &unique {
            if let Some(record) = self.season_tier(game) {
                coverage.season_tier += 1;
                metrics.insert(key.clone(), record);
            }
        }

        let pending: Vec<&(GameKey, &GameRow)> = unique
            .iter()
            .filter(|(key, _)| metrics.get(key).is_none_or(|r| !r.is_complete()))
            .collect();

        if !pending.is_empty() {
            let fetched;
            let plays: Option<&[PlayRecord]> = match source {
                PlaySource::Absent => None,
                PlaySource::Supplied(plays) => Some(plays),
                PlaySource::Fetch => {
                    let ids: Vec<u64> = pending.iter().filter_map(|(_, g)| g.upstream_id()).collect();
                    fetched = self.fetch_plays(&ids);
                    fetched.as_deref()
                }
            };

            if let Some(plays) = plays.filter(|p| !p.is_empty()) {
                let per_game = aggregate_plays(plays, Grouping::PerGame);
                let season_wide: TeamIndex<TeamSides> = aggregate_plays(plays, Grouping::Season)
                    .remove(&GroupKey::Season)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(team, m)| (team, m.sides))
                    .collect();

                for (key, game) in pending {
                    let Some(id) = game.upstream_id() else {
                        continue;
                    };
                    let Some(groups) = per_game.get(&GroupKey::Game(id)) else {
                        continue;
                    };
                    let Some(record) = play_tier(game, groups, &season_wide) else {
                        debug!(game = %key, "play tier missing one side of the game");
                        continue;
                    };
                    coverage.play_tier += 1;
                    match metrics.get_mut(key) {
                        Some(existing) => existing.merge_missing_from(&record),
                        None => {
                            metrics.insert(key.clone(), record);
                        }
                    }
                }
            }
        }

        metrics.retain(|_, record| record.has_any_value());
        coverage.omitted = unique.len() - metrics.len();

        info!(
            requested = coverage.requested,
            season_tier = coverage.season_tier,
            play_tier = coverage.play_tier,
            omitted = coverage.omitted,
            "adjusted metrics computed"
        );

        EngineOutput { metrics, coverage }
    }

    fn ensure_stats_loaded(&mut self) {
        if self.stats.is_some() {
            return;
        }

        let mut year = self.season;
        let mut rows = self.load_year(year);
        if rows.is_empty() {
            year = self.season - 1;
            info!(season = self.season, fallback = year, "no season stats, trying previous year");
            rows = self.load_year(year);
        }

        let loaded_year = (!rows.is_empty()).then_some(year);
        let index: TeamIndex<TeamSides> = rows.into_iter().map(|s| (s.team, s.sides)).collect();
        match loaded_year {
            Some(y) => info!(season = y, teams = index.len(), "season stats loaded"),
            None => warn!(season = self.season, "no season stats; play-by-play only"),
        }
        self.stats = Some(SeasonStats {
            year: loaded_year,
            index,
        });
    }

    fn load_year(&mut self, year: i32) -> Vec<TeamSeasonStats> {
        (self.rate_limit)();
        match self.provider.fetch_season_stats(year) {
            Ok(payloads) => payloads
                .iter()
                .filter_map(|p| team_season_stats_from_payload(p, year))
                .collect(),
            Err(err) => {
                warn!(season = year, error = %format!("{err:#}"), "season stats fetch failed");
                Vec::new()
            }
        }
    }

    fn fetch_plays(&mut self, ids: &[u64]) -> Option<Vec<PlayRecord>> {
        if ids.is_empty() {
            return None;
        }
        (self.rate_limit)();
        match self.provider.fetch_plays(ids) {
            Ok(plays) => {
                debug!(games = ids.len(), plays = plays.len(), "plays fetched");
                Some(plays)
            }
            Err(err) => {
                warn!(games = ids.len(), error = %format!("{err:#}"), "play fetch failed");
                None
            }
        }
    }

    fn season_tier(&mut self, game: &GameRow) -> Option<AdjustedMetricRecord> {
        let stats = self.stats.as_ref()?;
        let home = lookup_team(&stats.index, &mut self.missing_teams, &game.home_team);
        let away = lookup_team(&stats.index, &mut self.missing_teams, &game.away_team);
        let (home, away) = (home?, away?);
        // Season averages stand in for both the game and the reference.
        Some(compose_game(home, away, home, away))
    }
}

/// Cache lookup that warns once per unknown team and then stays silent.
fn lookup_team<'a>(
    index: &'a TeamIndex<TeamSides>,
    missing: &mut HashMap<String, String>,
    team: &str,
) -> Option<&'a TeamSides> {
    let key = normalize_team_name(team);
    if missing.contains_key(&key) {
        return None;
    }
    let found = index.get(team);
    if found.is_none() {
        if !index.is_empty() {
            warn!(team = %team, "team not found in season stats");
        }
        missing.insert(key, team.to_string());
    }
    found
}

fn play_tier(
    game: &GameRow,
    groups: &TeamGroups,
    season_wide: &TeamIndex<TeamSides>,
) -> Option<AdjustedMetricRecord> {
    let game_index: TeamIndex<&TeamPlayMetrics> =
        groups.iter().map(|(team, m)| (team.clone(), m)).collect();
    let home = game_index.get(&game.home_team).filter(|m| m.offense_plays > 0)?;
    let away = game_index.get(&game.away_team).filter(|m| m.offense_plays > 0)?;

    let empty = TeamSides::default();
    let home_ref = season_wide.get(&game.home_team).unwrap_or(&empty);
    let away_ref = season_wide.get(&game.away_team).unwrap_or(&empty);
    Some(compose_game(&home.sides, &away.sides, home_ref, away_ref))
}

fn compose_game(
    home_game: &TeamSides,
    away_game: &TeamSides,
    home_ref: &TeamSides,
    away_ref: &TeamSides,
) -> AdjustedMetricRecord {
    let mut record = compose_side(Side::Home, home_game, away_ref);
    record.extend(compose_side(Side::Away, away_game, home_ref));
    record
}

fn compose_side(side: Side, team_game: &TeamSides, opponent_ref: &TeamSides) -> AdjustedMetricRecord {
    compose(
        side,
        &team_game.offense,
        &opponent_ref.defense,
        &opponent_ref.offense,
        &team_game.defense,
    )
}
