use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::combine::{GoalieScores, SkaterScores};
use crate::config::DEFAULT_PRIMARY_CONFIG;
use crate::replacement::ReplacementLevel;
use crate::shots::Component;

/// One stored raw-plus-regressed rate. The regressed value is what the
/// combiner consumes; the raw value and denominator stay queryable for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct ComponentRateRow {
    pub player_id: i64,
    pub season: i32,
    pub component: Component,
    pub raw: Option<f64>,
    pub denominator: f64,
    pub regressed: f64,
}

#[derive(Debug, Clone)]
pub struct SeasonReplacementRow {
    pub season: i32,
    pub component: Component,
    pub percentile: f64,
    pub value: f64,
    pub eligible_players: usize,
}

impl SeasonReplacementRow {
    pub fn from_level(season: i32, level: &ReplacementLevel) -> Self {
        Self {
            season,
            component: level.component,
            percentile: level.percentile,
            value: level.value,
            eligible_players: level.eligible_players,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Skater,
    Goalie,
}

impl PlayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerKind::Skater => "skater",
            PlayerKind::Goalie => "goalie",
        }
    }

    pub fn from_str(raw: &str) -> Option<PlayerKind> {
        match raw {
            "skater" => Some(PlayerKind::Skater),
            "goalie" => Some(PlayerKind::Goalie),
            _ => None,
        }
    }
}

/// One row of the final rating table. Skaters fill the five component scores
/// plus `skater_total`; goalies fill the GSAx/AdjRP columns plus the full
/// configuration grid. `rating_primary` is the headline number either way.
#[derive(Debug, Clone, Default)]
pub struct PlayerRatingRow {
    pub player_id: i64,
    pub season: i32,
    pub kind: Option<PlayerKind>,
    pub score_ev_offense: Option<f64>,
    pub score_ev_defense: Option<f64>,
    pub score_pp_offense: Option<f64>,
    pub score_pp_defense: Option<f64>,
    pub score_penalty: Option<f64>,
    pub skater_total: Option<f64>,
    pub gsax_goals: Option<f64>,
    pub score_adjrp_raw: Option<f64>,
    pub score_adjrp_c5000: Option<f64>,
    pub score_adjrp_c10000: Option<f64>,
    /// `CONFIGURATIONS` order.
    pub ratings: [Option<f64>; 7],
    pub rating_primary: Option<f64>,
}

impl PlayerRatingRow {
    pub fn skater(season: i32, scores: &SkaterScores) -> Self {
        Self {
            player_id: scores.player_id,
            season,
            kind: Some(PlayerKind::Skater),
            score_ev_offense: scores.scores[0],
            score_ev_defense: scores.scores[1],
            score_pp_offense: scores.scores[2],
            score_pp_defense: scores.scores[3],
            score_penalty: scores.scores[4],
            skater_total: scores.total,
            rating_primary: scores.total,
            ..Default::default()
        }
    }

    pub fn goalie(season: i32, scores: &GoalieScores, primary_config: &str) -> Self {
        let primary = rating_slot(primary_config)
            .and_then(|slot| scores.ratings[slot]);
        Self {
            player_id: scores.player_id,
            season,
            kind: Some(PlayerKind::Goalie),
            gsax_goals: scores.gsax_goals,
            score_adjrp_raw: scores.adjrp_scores[0],
            score_adjrp_c5000: scores.adjrp_scores[1],
            score_adjrp_c10000: scores.adjrp_scores[2],
            ratings: scores.ratings,
            rating_primary: primary,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrimaryConfigRow {
    pub season: i32,
    pub config: String,
    pub stability_r: Option<f64>,
    pub baseline_r: Option<f64>,
    pub independence_r: Option<f64>,
    pub below_target: bool,
    pub selected_at: String,
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS component_rates (
            player_id INTEGER NOT NULL,
            season INTEGER NOT NULL,
            component TEXT NOT NULL,
            raw_rate REAL NULL,
            denominator REAL NOT NULL,
            regressed_rate REAL NOT NULL,
            PRIMARY KEY (player_id, season, component)
        );
        CREATE INDEX IF NOT EXISTS idx_component_rates_season ON component_rates(season);

        CREATE TABLE IF NOT EXISTS replacement_levels (
            season INTEGER NOT NULL,
            component TEXT NOT NULL,
            percentile REAL NOT NULL,
            value REAL NOT NULL,
            eligible_players INTEGER NOT NULL,
            PRIMARY KEY (season, component)
        );

        CREATE TABLE IF NOT EXISTS player_ratings (
            player_id INTEGER NOT NULL,
            season INTEGER NOT NULL,
            kind TEXT NOT NULL,
            score_ev_offense REAL NULL,
            score_ev_defense REAL NULL,
            score_pp_offense REAL NULL,
            score_pp_defense REAL NULL,
            score_penalty REAL NULL,
            skater_total REAL NULL,
            gsax_goals REAL NULL,
            score_adjrp_raw REAL NULL,
            score_adjrp_c5000 REAL NULL,
            score_adjrp_c10000 REAL NULL,
            rating_raw_30_70 REAL NULL,
            rating_c5000_30_70 REAL NULL,
            rating_c5000_10_90 REAL NULL,
            rating_c5000_5_95 REAL NULL,
            rating_c10000_30_70 REAL NULL,
            rating_c10000_10_90 REAL NULL,
            rating_c10000_5_95 REAL NULL,
            rating_primary REAL NULL,
            PRIMARY KEY (player_id, season)
        );
        CREATE INDEX IF NOT EXISTS idx_player_ratings_season ON player_ratings(season);

        CREATE TABLE IF NOT EXISTS primary_config (
            season INTEGER PRIMARY KEY,
            config TEXT NOT NULL,
            stability_r REAL NULL,
            baseline_r REAL NULL,
            independence_r REAL NULL,
            below_target INTEGER NOT NULL,
            selected_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            season INTEGER NOT NULL,
            games INTEGER NOT NULL,
            shots INTEGER NOT NULL,
            rebounds INTEGER NOT NULL,
            frozen_chains INTEGER NOT NULL,
            unmatchable INTEGER NOT NULL,
            skaters_rated INTEGER NOT NULL,
            goalies_rated INTEGER NOT NULL,
            warnings_json TEXT NOT NULL
        );
        "#,
    )
    .context("create rating schema")?;
    Ok(())
}

/// Rating column backing a configuration name. The match is the single place
/// that ties grid entries to schema columns.
pub fn rating_column(config: &str) -> Option<&'static str> {
    match config {
        "raw_30_70" => Some("rating_raw_30_70"),
        "c5000_30_70" => Some("rating_c5000_30_70"),
        "c5000_10_90" => Some("rating_c5000_10_90"),
        "c5000_5_95" => Some("rating_c5000_5_95"),
        "c10000_30_70" => Some("rating_c10000_30_70"),
        "c10000_10_90" => Some("rating_c10000_10_90"),
        "c10000_5_95" => Some("rating_c10000_5_95"),
        _ => None,
    }
}

pub fn rating_slot(config: &str) -> Option<usize> {
    crate::config::CONFIGURATIONS
        .iter()
        .position(|c| c.name == config)
}

/// The configuration whose column feeds `rating_primary` for a season:
/// whatever the backtest registered, otherwise the shipped default.
pub fn effective_primary_config(conn: &Connection, season: i32) -> Result<String> {
    Ok(load_primary_config(conn, season)?
        .map(|row| row.config)
        .unwrap_or_else(|| DEFAULT_PRIMARY_CONFIG.to_string()))
}

pub fn load_primary_config(conn: &Connection, season: i32) -> Result<Option<PrimaryConfigRow>> {
    conn.query_row(
        r#"
        SELECT season, config, stability_r, baseline_r, independence_r, below_target, selected_at
        FROM primary_config
        WHERE season = ?1
        "#,
        params![season],
        |row| {
            Ok(PrimaryConfigRow {
                season: row.get(0)?,
                config: row.get(1)?,
                stability_r: row.get(2)?,
                baseline_r: row.get(3)?,
                independence_r: row.get(4)?,
                below_target: row.get::<_, i64>(5)? != 0,
                selected_at: row.get(6)?,
            })
        },
    )
    .optional()
    .context("query primary config")
}

/// Register the season's primary configuration and repoint every goalie's
/// `rating_primary` at the matching column, atomically.
pub fn set_primary_config(conn: &mut Connection, row: &PrimaryConfigRow) -> Result<()> {
    let column = rating_column(&row.config)
        .ok_or_else(|| anyhow!("unknown rating configuration {}", row.config))?;
    let tx = conn.transaction().context("begin primary config update")?;
    tx.execute(
        r#"
        INSERT INTO primary_config (
            season, config, stability_r, baseline_r, independence_r, below_target, selected_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(season) DO UPDATE SET
            config = excluded.config,
            stability_r = excluded.stability_r,
            baseline_r = excluded.baseline_r,
            independence_r = excluded.independence_r,
            below_target = excluded.below_target,
            selected_at = excluded.selected_at
        "#,
        params![
            row.season,
            row.config,
            row.stability_r,
            row.baseline_r,
            row.independence_r,
            bool_to_i64(row.below_target),
            row.selected_at,
        ],
    )
    .context("upsert primary config")?;
    tx.execute(
        &format!(
            "UPDATE player_ratings SET rating_primary = {column} WHERE season = ?1 AND kind = 'goalie'"
        ),
        params![row.season],
    )
    .context("repoint primary ratings")?;
    tx.commit().context("commit primary config update")?;
    Ok(())
}

/// Replace a season's rating artifacts in one transaction. Delete-then-insert
/// keeps reruns from leaving rows behind for players who dropped out of the
/// inputs.
pub fn persist_season(
    conn: &mut Connection,
    season: i32,
    rates: &[ComponentRateRow],
    replacement: &[SeasonReplacementRow],
    ratings: &[PlayerRatingRow],
) -> Result<()> {
    let tx = conn.transaction().context("begin season persist")?;
    tx.execute(
        "DELETE FROM component_rates WHERE season = ?1",
        params![season],
    )
    .context("clear component rates")?;
    tx.execute(
        "DELETE FROM replacement_levels WHERE season = ?1",
        params![season],
    )
    .context("clear replacement levels")?;
    tx.execute(
        "DELETE FROM player_ratings WHERE season = ?1",
        params![season],
    )
    .context("clear player ratings")?;

    for r in rates {
        tx.execute(
            r#"
            INSERT INTO component_rates (
                player_id, season, component, raw_rate, denominator, regressed_rate
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                r.player_id,
                r.season,
                r.component.as_str(),
                r.raw,
                r.denominator,
                r.regressed,
            ],
        )
        .context("insert component rate")?;
    }
    for level in replacement {
        tx.execute(
            r#"
            INSERT INTO replacement_levels (
                season, component, percentile, value, eligible_players
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                level.season,
                level.component.as_str(),
                level.percentile,
                level.value,
                level.eligible_players as i64,
            ],
        )
        .context("insert replacement level")?;
    }
    for row in ratings {
        let kind = row
            .kind
            .ok_or_else(|| anyhow!("rating row for player {} has no kind", row.player_id))?;
        tx.execute(
            r#"
            INSERT INTO player_ratings (
                player_id, season, kind,
                score_ev_offense, score_ev_defense, score_pp_offense, score_pp_defense,
                score_penalty, skater_total, gsax_goals,
                score_adjrp_raw, score_adjrp_c5000, score_adjrp_c10000,
                rating_raw_30_70, rating_c5000_30_70, rating_c5000_10_90, rating_c5000_5_95,
                rating_c10000_30_70, rating_c10000_10_90, rating_c10000_5_95,
                rating_primary
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )
            "#,
            params![
                row.player_id,
                row.season,
                kind.as_str(),
                row.score_ev_offense,
                row.score_ev_defense,
                row.score_pp_offense,
                row.score_pp_defense,
                row.score_penalty,
                row.skater_total,
                row.gsax_goals,
                row.score_adjrp_raw,
                row.score_adjrp_c5000,
                row.score_adjrp_c10000,
                row.ratings[0],
                row.ratings[1],
                row.ratings[2],
                row.ratings[3],
                row.ratings[4],
                row.ratings[5],
                row.ratings[6],
                row.rating_primary,
            ],
        )
        .context("insert player rating")?;
    }
    tx.commit().context("commit season persist")?;
    Ok(())
}

pub fn load_season_ratings(conn: &Connection, season: i32) -> Result<Vec<PlayerRatingRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                player_id, season, kind,
                score_ev_offense, score_ev_defense, score_pp_offense, score_pp_defense,
                score_penalty, skater_total, gsax_goals,
                score_adjrp_raw, score_adjrp_c5000, score_adjrp_c10000,
                rating_raw_30_70, rating_c5000_30_70, rating_c5000_10_90, rating_c5000_5_95,
                rating_c10000_30_70, rating_c10000_10_90, rating_c10000_5_95,
                rating_primary
            FROM player_ratings
            WHERE season = ?1
            ORDER BY player_id ASC
            "#,
        )
        .context("prepare rating load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            let kind: String = row.get(2)?;
            Ok(PlayerRatingRow {
                player_id: row.get(0)?,
                season: row.get(1)?,
                kind: PlayerKind::from_str(&kind),
                score_ev_offense: row.get(3)?,
                score_ev_defense: row.get(4)?,
                score_pp_offense: row.get(5)?,
                score_pp_defense: row.get(6)?,
                score_penalty: row.get(7)?,
                skater_total: row.get(8)?,
                gsax_goals: row.get(9)?,
                score_adjrp_raw: row.get(10)?,
                score_adjrp_c5000: row.get(11)?,
                score_adjrp_c10000: row.get(12)?,
                ratings: [
                    row.get(13)?,
                    row.get(14)?,
                    row.get(15)?,
                    row.get(16)?,
                    row.get(17)?,
                    row.get(18)?,
                    row.get(19)?,
                ],
                rating_primary: row.get(20)?,
            })
        })
        .context("query rating load")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode rating row")?);
    }
    Ok(out)
}

pub fn load_season_component_rates(
    conn: &Connection,
    season: i32,
) -> Result<Vec<ComponentRateRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT player_id, season, component, raw_rate, denominator, regressed_rate
            FROM component_rates
            WHERE season = ?1
            ORDER BY player_id ASC, component ASC
            "#,
        )
        .context("prepare component rate load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })
        .context("query component rate load")?;
    let mut out = Vec::new();
    for row in rows {
        let (player_id, season, name, raw, denominator, regressed) =
            row.context("decode component rate row")?;
        let component = Component::from_str(&name)
            .ok_or_else(|| anyhow!("unknown component {name} in component_rates"))?;
        out.push(ComponentRateRow {
            player_id,
            season,
            component,
            raw,
            denominator,
            regressed,
        });
    }
    Ok(out)
}

pub fn load_season_replacement(
    conn: &Connection,
    season: i32,
) -> Result<Vec<SeasonReplacementRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT season, component, percentile, value, eligible_players
            FROM replacement_levels
            WHERE season = ?1
            ORDER BY component ASC
            "#,
        )
        .context("prepare replacement load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .context("query replacement load")?;
    let mut out = Vec::new();
    for row in rows {
        let (season, name, percentile, value, eligible) =
            row.context("decode replacement row")?;
        let component = Component::from_str(&name)
            .ok_or_else(|| anyhow!("unknown component {name} in replacement_levels"))?;
        out.push(SeasonReplacementRow {
            season,
            component,
            percentile,
            value,
            eligible_players: eligible as usize,
        });
    }
    Ok(out)
}

/// Open a run record before any season work starts.
pub fn start_run(conn: &Connection, season: i32) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO pipeline_runs (
            started_at, finished_at, season, games, shots, rebounds, frozen_chains,
            unmatchable, skaters_rated, goalies_rated, warnings_json
        ) VALUES (?1, NULL, ?2, 0, 0, 0, 0, 0, 0, 0, '[]')
        "#,
        params![Utc::now().to_rfc3339(), season],
    )
    .context("insert pipeline run")?;
    Ok(conn.last_insert_rowid())
}

#[derive(Debug, Clone, Default)]
pub struct RunCounts {
    pub games: usize,
    pub shots: usize,
    pub rebounds: usize,
    pub frozen_chains: usize,
    pub unmatchable: usize,
    pub skaters_rated: usize,
    pub goalies_rated: usize,
    pub warnings: Vec<String>,
}

pub fn finish_run(conn: &Connection, run_id: i64, counts: &RunCounts) -> Result<()> {
    let warnings_json =
        serde_json::to_string(&counts.warnings).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        r#"
        UPDATE pipeline_runs
        SET finished_at = ?1, games = ?2, shots = ?3, rebounds = ?4, frozen_chains = ?5,
            unmatchable = ?6, skaters_rated = ?7, goalies_rated = ?8, warnings_json = ?9
        WHERE run_id = ?10
        "#,
        params![
            Utc::now().to_rfc3339(),
            counts.games as i64,
            counts.shots as i64,
            counts.rebounds as i64,
            counts.frozen_chains as i64,
            counts.unmatchable as i64,
            counts.skaters_rated as i64,
            counts.goalies_rated as i64,
            warnings_json,
            run_id,
        ],
    )
    .context("update pipeline run")?;
    Ok(())
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIGURATIONS;
    use crate::shot_store::open_in_memory;

    #[test]
    fn every_configuration_has_a_column_and_slot() {
        for c in &CONFIGURATIONS {
            assert!(rating_column(c.name).is_some(), "{} missing column", c.name);
            assert!(rating_slot(c.name).is_some(), "{} missing slot", c.name);
        }
        assert!(rating_column("c1_50_50").is_none());
    }

    fn goalie_row(player_id: i64, season: i32) -> PlayerRatingRow {
        let scores = GoalieScores {
            player_id,
            gsax_goals: Some(4.2),
            adjrp_scores: [Some(0.3), Some(0.2), Some(0.1)],
            ratings: [
                Some(1.0),
                Some(2.0),
                Some(3.0),
                Some(4.0),
                Some(5.0),
                Some(6.0),
                Some(7.0),
            ],
        };
        PlayerRatingRow::goalie(season, &scores, DEFAULT_PRIMARY_CONFIG)
    }

    #[test]
    fn persist_and_reload_round_trip() {
        let mut conn = open_in_memory().unwrap();
        let rates = vec![ComponentRateRow {
            player_id: 9,
            season: 2024,
            component: Component::Gsax,
            raw: Some(0.01),
            denominator: 700.0,
            regressed: 0.008,
        }];
        let repl = vec![SeasonReplacementRow {
            season: 2024,
            component: Component::Gsax,
            percentile: 75.0,
            value: -0.004,
            eligible_players: 31,
        }];
        let ratings = vec![goalie_row(9, 2024)];
        persist_season(&mut conn, 2024, &rates, &repl, &ratings).unwrap();

        let loaded = load_season_ratings(&conn, 2024).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, Some(PlayerKind::Goalie));
        assert_eq!(loaded[0].gsax_goals, Some(4.2));
        // Default primary is c5000_30_70, slot 1 of the grid.
        assert_eq!(loaded[0].rating_primary, Some(2.0));

        let rates_back = load_season_component_rates(&conn, 2024).unwrap();
        assert_eq!(rates_back.len(), 1);
        assert_eq!(rates_back[0].component, Component::Gsax);
        assert_eq!(rates_back[0].raw, Some(0.01));

        let repl_back = load_season_replacement(&conn, 2024).unwrap();
        assert_eq!(repl_back[0].eligible_players, 31);
    }

    #[test]
    fn persist_replaces_rather_than_accumulates() {
        let mut conn = open_in_memory().unwrap();
        let ratings = vec![goalie_row(9, 2024), goalie_row(10, 2024)];
        persist_season(&mut conn, 2024, &[], &[], &ratings).unwrap();
        // Second run with one goalie gone.
        persist_season(&mut conn, 2024, &[], &[], &ratings[..1]).unwrap();
        let loaded = load_season_ratings(&conn, 2024).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].player_id, 9);
    }

    #[test]
    fn set_primary_repoints_goalie_rows() {
        let mut conn = open_in_memory().unwrap();
        persist_season(&mut conn, 2024, &[], &[], &[goalie_row(9, 2024)]).unwrap();
        set_primary_config(
            &mut conn,
            &PrimaryConfigRow {
                season: 2024,
                config: "c10000_5_95".to_string(),
                stability_r: Some(0.61),
                baseline_r: Some(0.55),
                independence_r: Some(0.12),
                below_target: false,
                selected_at: "2024-07-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();

        assert_eq!(
            effective_primary_config(&conn, 2024).unwrap(),
            "c10000_5_95"
        );
        let loaded = load_season_ratings(&conn, 2024).unwrap();
        // c10000_5_95 is the last grid slot, stored as 7.0 in the fixture.
        assert_eq!(loaded[0].rating_primary, Some(7.0));

        let registered = load_primary_config(&conn, 2024).unwrap().unwrap();
        assert!(!registered.below_target);
        assert_eq!(registered.stability_r, Some(0.61));
    }

    #[test]
    fn unknown_primary_config_is_rejected() {
        let mut conn = open_in_memory().unwrap();
        let err = set_primary_config(
            &mut conn,
            &PrimaryConfigRow {
                season: 2024,
                config: "bogus".to_string(),
                stability_r: None,
                baseline_r: None,
                independence_r: None,
                below_target: true,
                selected_at: "2024-07-01T00:00:00Z".to_string(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn run_records_open_and_close() {
        let conn = open_in_memory().unwrap();
        let run_id = start_run(&conn, 2024).unwrap();
        finish_run(
            &conn,
            run_id,
            &RunCounts {
                games: 3,
                shots: 120,
                rebounds: 9,
                frozen_chains: 4,
                unmatchable: 1,
                skaters_rated: 40,
                goalies_rated: 4,
                warnings: vec!["player 7 on ice without toi totals".to_string()],
            },
        )
        .unwrap();
        let (shots, warnings): (i64, String) = conn
            .query_row(
                "SELECT shots, warnings_json FROM pipeline_runs WHERE run_id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(shots, 120);
        assert!(warnings.contains("player 7"));
    }
}
