use std::collections::HashMap;

use crate::extract::havoc_total;
use crate::metrics::{Metric, MetricRecord, TeamSides};
use crate::plays::PlayRecord;

const HAVOC_DB_MARKERS: &[&str] = &["interception", "pass breakup", "fumble"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    PerGame,
    Season,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Game(u64),
    Season,
}

/// One team's play-derived records within a group, with the number of
/// snaps behind each side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamPlayMetrics {
    pub offense_plays: usize,
    pub defense_plays: usize,
    pub sides: TeamSides,
}

pub type TeamGroups = HashMap<String, TeamPlayMetrics>;

/// Standard downs: 1st/2nd and 7 or fewer, 3rd/4th and 4 or fewer.
/// Everything else, including plays with no down or distance, is a passing down.
pub fn is_standard_down(down: Option<u8>, distance: Option<f64>) -> bool {
    let (Some(down), Some(distance)) = (down, distance) else {
        return false;
    };
    (down <= 2 && distance <= 7.0) || ((down == 3 || down == 4) && distance <= 4.0)
}

#[derive(Clone, Copy)]
struct ClassifiedPlay<'a> {
    play: &'a PlayRecord,
    standard_down: bool,
}

#[derive(Default)]
struct SideBuckets<'a> {
    offense: Vec<ClassifiedPlay<'a>>,
    defense: Vec<ClassifiedPlay<'a>>,
}

pub fn aggregate_plays(plays: &[PlayRecord], grouping: Grouping) -> HashMap<GroupKey, TeamGroups> {
    let classified = plays.iter().map(|play| ClassifiedPlay {
        play,
        standard_down: is_standard_down(play.down, play.distance),
    });

    let mut buckets: HashMap<GroupKey, HashMap<&str, SideBuckets<'_>>> = HashMap::new();
    for cp in classified {
        let key = match (grouping, cp.play.game_id) {
            (Grouping::Season, _) => GroupKey::Season,
            (Grouping::PerGame, Some(id)) => GroupKey::Game(id),
            (Grouping::PerGame, None) => continue,
        };
        let teams = buckets.entry(key).or_default();
        teams.entry(cp.play.offense.as_str()).or_default().offense.push(cp);
        teams.entry(cp.play.defense.as_str()).or_default().defense.push(cp);
    }

    buckets
        .into_iter()
        .map(|(key, teams)| {
            let teams = teams
                .into_iter()
                .map(|(team, sides)| {
                    (
                        team.to_string(),
                        TeamPlayMetrics {
                            offense_plays: sides.offense.len(),
                            defense_plays: sides.defense.len(),
                            sides: TeamSides {
                                offense: aggregate_classified(&sides.offense, false),
                                defense: aggregate_classified(&sides.defense, true),
                            },
                        },
                    )
                })
                .collect();
            (key, teams)
        })
        .collect()
}

/// Estimators over one team's plays on one side of the ball.
pub fn aggregate_side(plays: &[&PlayRecord], is_defense: bool) -> MetricRecord {
    let classified: Vec<ClassifiedPlay<'_>> = plays
        .iter()
        .map(|&play| ClassifiedPlay {
            play,
            standard_down: is_standard_down(play.down, play.distance),
        })
        .collect();
    aggregate_classified(&classified, is_defense)
}

fn aggregate_classified(plays: &[ClassifiedPlay<'_>], is_defense: bool) -> MetricRecord {
    let mut rec = MetricRecord::new();
    if plays.is_empty() {
        return rec;
    }

    let all: Vec<&PlayRecord> = plays.iter().map(|cp| cp.play).collect();
    let rushes: Vec<&PlayRecord> = all.iter().copied().filter(|p| p.rush).collect();
    let passes: Vec<&PlayRecord> = all.iter().copied().filter(|p| p.pass).collect();

    rec.set(Metric::Ppa, mean(all.iter().filter_map(|p| p.ppa)));
    rec.set(Metric::Explosiveness, population_std(all.iter().filter_map(|p| p.ppa)));
    rec.set(Metric::SuccessRate, success_rate(all.iter().copied()));

    rec.set(Metric::RushPpa, mean(rushes.iter().filter_map(|p| p.ppa)));
    rec.set(
        Metric::RushExplosiveness,
        population_std(rushes.iter().filter_map(|p| p.ppa)),
    );
    rec.set(Metric::RushSuccess, success_rate(rushes.iter().copied()));

    rec.set(Metric::PassPpa, mean(passes.iter().filter_map(|p| p.ppa)));
    rec.set(
        Metric::PassExplosiveness,
        population_std(passes.iter().filter_map(|p| p.ppa)),
    );
    rec.set(Metric::PassSuccess, success_rate(passes.iter().copied()));

    rec.set(
        Metric::StandardSuccess,
        success_rate(plays.iter().filter(|cp| cp.standard_down).map(|cp| cp.play)),
    );
    rec.set(
        Metric::PassingDownSuccess,
        success_rate(plays.iter().filter(|cp| !cp.standard_down).map(|cp| cp.play)),
    );

    let rush_yards = || rushes.iter().filter_map(|p| p.yards_gained);
    rec.set(
        Metric::LineYards,
        mean(rush_yards().map(|y| y.clamp(0.0, 10.0) * 0.5)),
    );
    rec.set(
        Metric::SecondLevelYards,
        mean(rush_yards().map(|y| (y - 5.0).clamp(0.0, 5.0))),
    );
    rec.set(
        Metric::OpenFieldYards,
        mean(rush_yards().map(|y| (y - 10.0).max(0.0))),
    );

    let scoring: Vec<&PlayRecord> = all.iter().copied().filter(|p| p.scoring).collect();
    // scoring plays without a points value count as zero
    rec.set(
        Metric::PointsPerOpportunity,
        (!scoring.is_empty()).then(|| {
            scoring.iter().filter_map(|p| p.points).sum::<f64>() / scoring.len() as f64
        }),
    );
    rec.set(Metric::AvgStart, mean(all.iter().filter_map(|p| p.yard_line)));

    if is_defense {
        let n = all.len() as f64;
        let front = all
            .iter()
            .filter(|p| p.sack || (p.rush && p.yards_gained.is_some_and(|y| y <= 0.0)))
            .count() as f64
            / n;
        let db = all.iter().filter(|p| is_db_havoc(&p.play_type)).count() as f64 / n;
        rec.set(Metric::HavocFront, Some(front));
        rec.set(Metric::HavocDb, Some(db));
        rec.set(Metric::HavocTotal, havoc_total(Some(front), Some(db)));
    }

    rec
}

fn is_db_havoc(play_type: &str) -> bool {
    let lower = play_type.to_ascii_lowercase();
    HAVOC_DB_MARKERS.iter().any(|m| lower.contains(m))
}

fn success_rate<'a>(plays: impl Iterator<Item = &'a PlayRecord>) -> Option<f64> {
    mean(plays.filter_map(|p| p.success).map(|s| if s { 1.0 } else { 0.0 }))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.filter(|v| v.is_finite()) {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}

fn population_std(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    let m = mean(values.iter().copied())?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}
