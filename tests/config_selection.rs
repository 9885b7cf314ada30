use rusqlite::Connection;

use xgar::config::{CONFIGURATIONS, DEFAULT_PRIMARY_CONFIG, EngineConfig};
use xgar::pipeline;
use xgar::rating_store::{self, PrimaryConfigRow};
use xgar::shot_store;
use xgar::shots::{ShotEvent, Strength, ToiTotals};

const SEASON: i32 = 2025;
const GOALIES: i64 = 12;

/// One game per goalie. Goalie `k` concedes the last `3k` of 60 on-goal
/// shots and yields `k` rebound attempts off early saves, so both components
/// spread monotonically across the population.
fn seed_backtest_season(conn: &mut Connection) {
    let mut shots = Vec::new();
    for k in 1..=GOALIES {
        let game_id = 2000 + k;
        let goalie_id = 900 + k;
        let mut event_idx = 1;
        for i in 1..=60i64 {
            let t = (i * 15) as f64;
            let is_goal = i > 60 - 3 * k;
            shots.push(ShotEvent {
                game_id,
                event_idx,
                season: SEASON,
                period: Some(1),
                period_seconds: Some(t),
                team_id: 10,
                shooter_id: 101 + (i % 2),
                goalie_id: Some(goalie_id),
                xg: Some(0.04 + 0.01 * ((i % 7) as f64)),
                is_goal,
                on_goal: true,
                strength: Strength::Even,
            });
            event_idx += 1;
            if !is_goal && i <= k {
                // Off-goal rebound attempt one second after the save.
                shots.push(ShotEvent {
                    game_id,
                    event_idx,
                    season: SEASON,
                    period: Some(1),
                    period_seconds: Some(t + 1.0),
                    team_id: 10,
                    shooter_id: 103,
                    goalie_id: Some(goalie_id),
                    xg: None,
                    is_goal: false,
                    on_goal: false,
                    strength: Strength::Even,
                });
                event_idx += 1;
            }
        }
    }
    // A token skater pool so every component can anchor a replacement level.
    let toi: Vec<ToiTotals> = [101, 102, 103]
        .into_iter()
        .map(|player_id| ToiTotals {
            player_id,
            season: SEASON,
            ev_minutes: 30.0,
            pp_minutes: 5.0,
            pk_minutes: 5.0,
            total_minutes: 40.0,
        })
        .collect();

    shot_store::upsert_shots(conn, &shots).expect("seed shots");
    shot_store::upsert_toi(conn, &toi).expect("seed toi");
}

fn test_cfg() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.min_population = 2;
    cfg.min_ev_minutes = 1.0;
    cfg.min_pp_minutes = 1.0;
    cfg.min_total_minutes = 1.0;
    cfg.min_shots_faced = 1.0;
    cfg.min_effective_saves = 1.0;
    cfg.split_min_shots = 30;
    cfg
}

#[test]
fn backtest_covers_the_grid_and_repeats_exactly() {
    let mut conn = shot_store::open_in_memory().expect("open");
    seed_backtest_season(&mut conn);
    let cfg = test_cfg();

    let computation = pipeline::compute_season(&conn, SEASON, &cfg).expect("compute");
    let report = pipeline::validation_report(&computation, &cfg).expect("report");

    assert_eq!(report.sampled_goalies, GOALIES as usize);
    assert_eq!(report.configs.len(), CONFIGURATIONS.len());
    for (c, expected) in report.configs.iter().zip(CONFIGURATIONS.iter()) {
        assert_eq!(c.name, expected.name);
        assert_eq!(c.pairs, GOALIES as usize);
        let r = c.stability.unwrap_or_else(|| panic!("no stability for {}", c.name));
        assert!(r > 0.5, "{} split halves disagree: r = {r}", c.name);
    }
    let baseline = report.baseline_stability.expect("baseline");
    assert!(baseline > 0.5, "baseline split halves disagree: r = {baseline}");
    for r in report.independence.iter().flatten() {
        assert!((-1.0..=1.0).contains(r));
    }
    assert!(CONFIGURATIONS.iter().any(|c| c.name == report.selected));

    // Same inputs, same seed, same report.
    let again = pipeline::validation_report(
        &pipeline::compute_season(&conn, SEASON, &cfg).expect("recompute"),
        &cfg,
    )
    .expect("second report");
    assert_eq!(report.sampled_goalies, again.sampled_goalies);
    assert_eq!(report.baseline_stability, again.baseline_stability);
    assert_eq!(report.selected, again.selected);
    assert_eq!(report.below_target, again.below_target);
    assert_eq!(report.independence, again.independence);
    for (a, b) in report.configs.iter().zip(again.configs.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.stability, b.stability);
        assert_eq!(a.pairs, b.pairs);
    }
}

#[test]
fn full_season_independence_ignores_the_split_seed() {
    let mut conn = shot_store::open_in_memory().expect("open");
    seed_backtest_season(&mut conn);
    let cfg = test_cfg();
    let mut reseeded = test_cfg();
    reseeded.split_seed = cfg.split_seed + 1;

    let computation = pipeline::compute_season(&conn, SEASON, &cfg).expect("compute");
    let report_a = pipeline::validation_report(&computation, &cfg).expect("report a");
    let report_b = pipeline::validation_report(&computation, &reseeded).expect("report b");

    assert_eq!(report_a.sampled_goalies, report_b.sampled_goalies);
    assert_eq!(report_a.configs.len(), report_b.configs.len());
    // Full-season independence does not depend on the split at all.
    assert_eq!(report_a.independence, report_b.independence);
}

#[test]
fn selection_registration_round_trips() {
    let mut conn = shot_store::open_in_memory().expect("open");
    seed_backtest_season(&mut conn);
    let cfg = test_cfg();

    let computation = pipeline::compute_season(&conn, SEASON, &cfg).expect("compute");
    let report = pipeline::validation_report(&computation, &cfg).expect("report");
    let stability = report
        .configs
        .iter()
        .find(|c| c.name == report.selected)
        .and_then(|c| c.stability);

    rating_store::set_primary_config(
        &mut conn,
        &PrimaryConfigRow {
            season: SEASON,
            config: report.selected.to_string(),
            stability_r: stability,
            baseline_r: report.baseline_stability,
            independence_r: report.independence[1],
            below_target: report.below_target,
            selected_at: "2025-07-01T12:00:00Z".to_string(),
        },
    )
    .expect("register");

    let stored = rating_store::load_primary_config(&conn, SEASON)
        .expect("load")
        .expect("registered row");
    assert_eq!(stored.config, report.selected);
    assert_eq!(stored.stability_r, stability);
    assert_eq!(stored.baseline_r, report.baseline_stability);
    assert_eq!(stored.below_target, report.below_target);
    assert_eq!(stored.selected_at, "2025-07-01T12:00:00Z");
    assert_eq!(
        rating_store::effective_primary_config(&conn, SEASON).expect("effective"),
        report.selected
    );

    // Unknown names never reach the table.
    let err = rating_store::set_primary_config(
        &mut conn,
        &PrimaryConfigRow {
            season: SEASON,
            config: "c42_1_99".to_string(),
            stability_r: None,
            baseline_r: None,
            independence_r: None,
            below_target: false,
            selected_at: "2025-07-01T12:00:00Z".to_string(),
        },
    )
    .expect_err("unknown config");
    assert!(err.to_string().contains("c42_1_99"), "{err}");
}

#[test]
fn under_sampled_season_falls_back_to_the_default() {
    let mut conn = shot_store::open_in_memory().expect("open");
    seed_backtest_season(&mut conn);
    let mut cfg = test_cfg();
    cfg.split_min_shots = 100_000;

    let computation = pipeline::compute_season(&conn, SEASON, &cfg).expect("compute");
    let report = pipeline::validation_report(&computation, &cfg).expect("report");

    assert_eq!(report.sampled_goalies, 0);
    assert!(report.baseline_stability.is_none());
    for c in &report.configs {
        assert!(c.stability.is_none());
        assert_eq!(c.pairs, 0);
    }
    assert_eq!(report.selected, DEFAULT_PRIMARY_CONFIG);
    assert!(report.below_target);
}
