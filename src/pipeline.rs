use std::collections::BTreeMap;

use anyhow::{Result, anyhow, bail};
use rayon::prelude::*;
use rusqlite::Connection;

use crate::combine::{GoalieComponents, SkaterComponents, combine_goalies, combine_skaters};
use crate::config::{ADJRP_CONSTANTS, EngineConfig};
use crate::rates::{AggregateOutput, aggregate_season};
use crate::rating_store::{
    self, ComponentRateRow, PlayerRatingRow, RunCounts, SeasonReplacementRow,
};
use crate::regression::shrink_toward;
use crate::replacement::{ReplacementLevel, replacement_level};
use crate::sequencer::{GameSequence, sequence_game};
use crate::shot_store;
use crate::shots::{ALL_COMPONENTS, Component, FreezeEvent, ShotEvent};
use crate::validation::{ValidationReport, validate_season};

/// Everything a season run derives before anything is written: sequenced
/// games, raw and regressed rates, replacement levels, and the per-player
/// component maps the combiner consumes.
pub struct SeasonComputation {
    pub season: i32,
    pub games: Vec<GameSequence>,
    pub aggregate: AggregateOutput,
    pub replacement: BTreeMap<Component, ReplacementLevel>,
    pub component_rows: Vec<ComponentRateRow>,
    pub skater_components: BTreeMap<i64, SkaterComponents>,
    pub goalie_components: BTreeMap<i64, GoalieComponents>,
}

#[derive(Debug, Clone)]
pub struct SeasonRunSummary {
    pub season: i32,
    pub games: usize,
    pub shots: usize,
    pub rebounds: usize,
    pub frozen_chains: usize,
    pub unmatchable: usize,
    pub skaters_rated: usize,
    pub goalies_rated: usize,
    pub primary_config: String,
    pub warnings: Vec<String>,
}

/// Compute a season end to end without touching the rating tables. Fails
/// before any caller would write if a component's eligible population is too
/// thin to set a replacement level.
pub fn compute_season(
    conn: &Connection,
    season: i32,
    cfg: &EngineConfig,
) -> Result<SeasonComputation> {
    cfg.validate()?;

    let shots = shot_store::load_season_shots(conn, season)?;
    if shots.is_empty() {
        bail!("no shot events stored for season {season}");
    }
    let freezes = shot_store::load_season_freezes(conn, season)?;
    let shifts = shot_store::load_season_shifts(conn, season)?;
    let toi = shot_store::load_season_toi(conn, season)?;
    let penalties = shot_store::load_season_penalties(conn, season)?;

    let mut by_game: BTreeMap<i64, (Vec<ShotEvent>, Vec<FreezeEvent>)> = BTreeMap::new();
    for shot in shots {
        by_game.entry(shot.game_id).or_default().0.push(shot);
    }
    for freeze in freezes {
        by_game.entry(freeze.game_id).or_default().1.push(freeze);
    }
    // Games sequence independently; the grouped Vec keeps game_id order so
    // the parallel collect lands in a stable order.
    let grouped: Vec<(Vec<ShotEvent>, Vec<FreezeEvent>)> = by_game.into_values().collect();
    let games: Vec<GameSequence> = grouped
        .par_iter()
        .map(|(shots, freezes)| sequence_game(shots, freezes, cfg))
        .collect();

    let aggregate = aggregate_season(&games, &shifts, &toi, &penalties);

    let mut replacement = BTreeMap::new();
    for component in ALL_COMPONENTS {
        let level = replacement_level(component, &aggregate.rates, cfg)?;
        replacement.insert(component, level);
    }

    let mut component_rows = Vec::with_capacity(aggregate.rates.len());
    let mut skater_components: BTreeMap<i64, SkaterComponents> = BTreeMap::new();
    let mut goalie_components: BTreeMap<i64, GoalieComponents> = BTreeMap::new();

    for rate in &aggregate.rates {
        let level = replacement
            .get(&rate.component)
            .ok_or_else(|| anyhow!("no replacement level for {}", rate.component.as_str()))?;
        let regressed = shrink_toward(
            rate.raw,
            rate.denominator,
            cfg.stabilization(rate.component),
            level.value,
        );
        component_rows.push(ComponentRateRow {
            player_id: rate.player_id,
            season,
            component: rate.component,
            raw: rate.raw,
            denominator: rate.denominator,
            regressed,
        });

        match rate.component {
            Component::EvOffense => {
                skater_components
                    .entry(rate.player_id)
                    .or_default()
                    .ev_offense = Some(regressed);
            }
            Component::EvDefense => {
                skater_components
                    .entry(rate.player_id)
                    .or_default()
                    .ev_defense = Some(regressed);
            }
            Component::PpOffense => {
                skater_components
                    .entry(rate.player_id)
                    .or_default()
                    .pp_offense = Some(regressed);
            }
            Component::PpDefense => {
                skater_components
                    .entry(rate.player_id)
                    .or_default()
                    .pp_defense = Some(regressed);
            }
            Component::Penalty => {
                skater_components.entry(rate.player_id).or_default().penalty = Some(regressed);
            }
            Component::Gsax => {
                // The stored rate is per shot; ratings want cumulative goals.
                // A goalie who never faced an on-goal shot has no GSAx at all.
                let g = goalie_components.entry(rate.player_id).or_default();
                g.gsax_goals = if rate.denominator > 0.0 {
                    Some(regressed * rate.denominator)
                } else {
                    None
                };
            }
            Component::ReboundControl => {
                let g = goalie_components.entry(rate.player_id).or_default();
                g.adjrp_raw = rate.raw;
                g.adjrp_c5000 = Some(regressed);
                g.adjrp_c10000 = Some(shrink_toward(
                    rate.raw,
                    rate.denominator,
                    ADJRP_CONSTANTS[1],
                    level.value,
                ));
            }
        }
    }

    Ok(SeasonComputation {
        season,
        games,
        aggregate,
        replacement,
        component_rows,
        skater_components,
        goalie_components,
    })
}

/// Run the validation harness over an already-computed season.
pub fn validation_report(
    computation: &SeasonComputation,
    cfg: &EngineConfig,
) -> Result<ValidationReport> {
    let gsax = computation
        .replacement
        .get(&Component::Gsax)
        .ok_or_else(|| anyhow!("no gsax replacement level computed"))?;
    let rc = computation
        .replacement
        .get(&Component::ReboundControl)
        .ok_or_else(|| anyhow!("no rebound-control replacement level computed"))?;
    Ok(validate_season(
        &computation.games,
        &computation.goalie_components,
        gsax.value,
        rc.value,
        cfg,
    ))
}

/// Compute one season and replace its stored rating artifacts. The write is a
/// single transaction, so a failed run leaves the previous tables intact; the
/// run record is the only trace of an aborted attempt.
pub fn run_season(
    conn: &mut Connection,
    season: i32,
    cfg: &EngineConfig,
) -> Result<SeasonRunSummary> {
    let run_id = rating_store::start_run(conn, season)?;
    let computation = compute_season(conn, season, cfg)?;
    let primary = rating_store::effective_primary_config(conn, season)?;

    let skater_scores = combine_skaters(&computation.skater_components);
    let goalie_scores = combine_goalies(&computation.goalie_components);

    let mut ratings: Vec<PlayerRatingRow> =
        Vec::with_capacity(skater_scores.len() + goalie_scores.len());
    for s in &skater_scores {
        ratings.push(PlayerRatingRow::skater(season, s));
    }
    for g in &goalie_scores {
        ratings.push(PlayerRatingRow::goalie(season, g, &primary));
    }
    ratings.sort_by_key(|r| r.player_id);

    let replacement_rows: Vec<SeasonReplacementRow> = computation
        .replacement
        .values()
        .map(|level| SeasonReplacementRow::from_level(season, level))
        .collect();

    rating_store::persist_season(
        conn,
        season,
        &computation.component_rows,
        &replacement_rows,
        &ratings,
    )?;

    let summary = SeasonRunSummary {
        season,
        games: computation.games.len(),
        shots: computation.games.iter().map(|g| g.shots.len()).sum(),
        rebounds: computation.games.iter().map(|g| g.rebounds).sum(),
        frozen_chains: computation.games.iter().map(|g| g.frozen_chains).sum(),
        unmatchable: computation.games.iter().map(|g| g.unmatchable).sum(),
        skaters_rated: skater_scores.len(),
        goalies_rated: goalie_scores.len(),
        primary_config: primary,
        warnings: computation.aggregate.warnings.clone(),
    };
    rating_store::finish_run(
        conn,
        run_id,
        &RunCounts {
            games: summary.games,
            shots: summary.shots,
            rebounds: summary.rebounds,
            frozen_chains: summary.frozen_chains,
            unmatchable: summary.unmatchable,
            skaters_rated: summary.skaters_rated,
            goalies_rated: summary.goalies_rated,
            warnings: summary.warnings.clone(),
        },
    )?;
    Ok(summary)
}
