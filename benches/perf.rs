use std::collections::BTreeMap;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use xgar::combine::{GoalieComponents, SkaterComponents, combine_goalies, combine_skaters};
use xgar::config::EngineConfig;
use xgar::rates::aggregate_season;
use xgar::sequencer::{GameSequence, sequence_game};
use xgar::shots::{FreezeEvent, PenaltyTotals, ShiftInterval, ShotEvent, Strength, ToiTotals};
use xgar::validation::validate_season;

const SEASON: i32 = 2024;
const GAMES: i64 = 60;

/// One game with dense traffic: saves, chained rebounds, freezes, goals,
/// goalies drawn from a shared pool so season benches exercise real
/// aggregation fan-out.
fn game_events(game_id: i64, slot: i64) -> (Vec<ShotEvent>, Vec<FreezeEvent>) {
    let away_goalie = 900 + slot % 15;
    let home_goalie = 930 + slot % 15;
    let mut shots = Vec::new();
    let mut freezes = Vec::new();
    let mut event_idx = 0i64;
    for i in 0..80i64 {
        let team_id = if i % 2 == 0 { 10 } else { 20 };
        let goalie_id = if team_id == 10 { away_goalie } else { home_goalie };
        let t = i as f64 * 14.5;
        let is_goal = i % 13 == 0;
        shots.push(ShotEvent {
            game_id,
            event_idx,
            season: SEASON,
            period: Some(1),
            period_seconds: Some(t),
            team_id,
            shooter_id: team_id * 10 + i % 12,
            goalie_id: Some(goalie_id),
            xg: Some(0.03 + 0.015 * ((i % 6) as f64)),
            is_goal,
            on_goal: is_goal || i % 4 != 3,
            strength: if i % 10 == 7 {
                Strength::PowerPlay
            } else {
                Strength::Even
            },
        });
        event_idx += 1;
        if i % 6 == 0 && !is_goal {
            // Rebound attempt 1.2s after the save.
            shots.push(ShotEvent {
                game_id,
                event_idx,
                season: SEASON,
                period: Some(1),
                period_seconds: Some(t + 1.2),
                team_id,
                shooter_id: team_id * 10 + 5,
                goalie_id: Some(goalie_id),
                xg: Some(0.05),
                is_goal: false,
                on_goal: true,
                strength: Strength::Even,
            });
            event_idx += 1;
        }
        if i % 9 == 4 {
            freezes.push(FreezeEvent {
                game_id,
                event_idx: 1000 + i,
                season: SEASON,
                period: Some(1),
                period_seconds: Some(t + 0.8),
                team_id: if team_id == 10 { 20 } else { 10 },
                goalie_id: Some(goalie_id),
            });
        }
    }
    (shots, freezes)
}

fn season_fixture(
    cfg: &EngineConfig,
) -> (
    Vec<GameSequence>,
    Vec<ShiftInterval>,
    Vec<ToiTotals>,
    Vec<PenaltyTotals>,
) {
    let mut games = Vec::new();
    let mut shifts = Vec::new();
    for g in 0..GAMES {
        let game_id = 3000 + g;
        let (shots, freezes) = game_events(game_id, g);
        games.push(sequence_game(&shots, &freezes, cfg));
        for skater in (100..112).chain(200..212) {
            shifts.push(ShiftInterval {
                game_id,
                season: SEASON,
                player_id: skater,
                team_id: if skater < 200 { 10 } else { 20 },
                period: 1,
                start_seconds: 0.0,
                end_seconds: 1200.0,
            });
        }
    }
    let toi: Vec<ToiTotals> = (100..112)
        .chain(200..212)
        .map(|player_id| ToiTotals {
            player_id,
            season: SEASON,
            ev_minutes: 900.0,
            pp_minutes: 120.0,
            pk_minutes: 120.0,
            total_minutes: 1200.0,
        })
        .collect();
    let penalties: Vec<PenaltyTotals> = (100..112)
        .map(|player_id| PenaltyTotals {
            player_id,
            season: SEASON,
            drawn: (player_id % 5) as i64,
            taken: (player_id % 3) as i64,
        })
        .collect();
    (games, shifts, toi, penalties)
}

fn bench_sequence_dense_game(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let (shots, freezes) = game_events(1, 0);
    c.bench_function("sequence_dense_game", |b| {
        b.iter(|| {
            let seq = sequence_game(black_box(&shots), black_box(&freezes), &cfg);
            black_box(seq.rebounds);
        })
    });
}

fn bench_aggregate_season(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let (games, shifts, toi, penalties) = season_fixture(&cfg);
    c.bench_function("aggregate_season", |b| {
        b.iter(|| {
            let out = aggregate_season(
                black_box(&games),
                black_box(&shifts),
                black_box(&toi),
                black_box(&penalties),
            );
            black_box(out.rates.len());
        })
    });
}

fn bench_combine_scores(c: &mut Criterion) {
    let mut skaters: BTreeMap<i64, SkaterComponents> = BTreeMap::new();
    for id in 0..300i64 {
        let v = id as f64 * 0.01;
        skaters.insert(
            id,
            SkaterComponents {
                ev_offense: Some(2.0 + v),
                ev_defense: Some(2.4 - v),
                pp_offense: Some(5.0 + v),
                pp_defense: Some(6.0 - v),
                penalty: Some(v - 1.5),
            },
        );
    }
    let mut goalies: BTreeMap<i64, GoalieComponents> = BTreeMap::new();
    for id in 0..200i64 {
        let v = id as f64 * 0.002;
        goalies.insert(
            900 + id,
            GoalieComponents {
                gsax_goals: Some(8.0 - id as f64 * 0.08),
                adjrp_raw: Some(0.18 + v),
                adjrp_c5000: Some(0.20 + v * 0.5),
                adjrp_c10000: Some(0.21 + v * 0.25),
            },
        );
    }
    c.bench_function("combine_scores", |b| {
        b.iter(|| {
            let s = combine_skaters(black_box(&skaters));
            let g = combine_goalies(black_box(&goalies));
            black_box(s.len() + g.len());
        })
    });
}

fn bench_split_half_validation(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let (games, _, _, _) = season_fixture(&cfg);
    let mut full: BTreeMap<i64, GoalieComponents> = BTreeMap::new();
    for id in 900..945i64 {
        full.insert(
            id,
            GoalieComponents {
                gsax_goals: Some((id % 17) as f64 - 8.0),
                adjrp_raw: Some(0.15 + (id % 11) as f64 * 0.01),
                adjrp_c5000: Some(0.18 + (id % 11) as f64 * 0.005),
                adjrp_c10000: Some(0.19 + (id % 11) as f64 * 0.003),
            },
        );
    }
    c.bench_function("split_half_validation", |b| {
        b.iter(|| {
            let report = validate_season(black_box(&games), black_box(&full), 0.0, 0.3, &cfg);
            black_box(report.sampled_goalies);
        })
    });
}

criterion_group!(
    perf,
    bench_sequence_dense_game,
    bench_aggregate_season,
    bench_combine_scores,
    bench_split_half_validation
);
criterion_main!(perf);
