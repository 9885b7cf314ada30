use std::collections::BTreeMap;

use crate::config::{AdjrpVariant, CONFIGURATIONS};
use crate::shots::{Component, SKATER_COMPONENTS};

pub const STDEV_EPSILON: f64 = 1e-9;

/// Every component contributes on the same z-scored scale, so the skater fold
/// weights them equally. The goalie weights live in the configuration grid.
const SKATER_WEIGHTS: [f64; 5] = [1.0, 1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Mean and population standard deviation. `None` for an empty pool; a
/// degenerate pool (all identical) comes back with stdev 0 and z-scores of 0.
pub fn pool_stats(values: &[f64]) -> Option<PoolStats> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(PoolStats {
        mean,
        stdev: var.sqrt(),
    })
}

pub fn zscore(value: f64, stats: &PoolStats) -> f64 {
    if stats.stdev < STDEV_EPSILON {
        0.0
    } else {
        (value - stats.mean) / stats.stdev
    }
}

/// Regressed per-60 values for one skater. A `None` means the player has no
/// record for that component this season, which excludes them from the
/// combined rating rather than silently counting as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkaterComponents {
    pub ev_offense: Option<f64>,
    pub ev_defense: Option<f64>,
    pub pp_offense: Option<f64>,
    pub pp_defense: Option<f64>,
    pub penalty: Option<f64>,
}

impl SkaterComponents {
    fn get(&self, component: Component) -> Option<f64> {
        match component {
            Component::EvOffense => self.ev_offense,
            Component::EvDefense => self.ev_defense,
            Component::PpOffense => self.pp_offense,
            Component::PpDefense => self.pp_defense,
            Component::Penalty => self.penalty,
            _ => None,
        }
    }
}

/// Goalie inputs to the configuration grid. `gsax_goals` is already expanded
/// back to cumulative goals saved above expectation; it enters ratings in
/// those units, un-z-scored. The AdjRP slots hold the raw ratio plus its two
/// shrunk variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalieComponents {
    pub gsax_goals: Option<f64>,
    pub adjrp_raw: Option<f64>,
    pub adjrp_c5000: Option<f64>,
    pub adjrp_c10000: Option<f64>,
}

impl GoalieComponents {
    fn adjrp(&self, variant: AdjrpVariant) -> Option<f64> {
        match variant {
            AdjrpVariant::Raw => self.adjrp_raw,
            AdjrpVariant::Shrunk5000 => self.adjrp_c5000,
            AdjrpVariant::Shrunk10000 => self.adjrp_c10000,
        }
    }
}

/// Sign-corrected z-scores per skater component (order of
/// `SKATER_COMPONENTS`) and the weighted total. The total is `None` whenever
/// any component is absent.
#[derive(Debug, Clone)]
pub struct SkaterScores {
    pub player_id: i64,
    pub scores: [Option<f64>; 5],
    pub total: Option<f64>,
}

/// Scores and the seven candidate ratings (order of `CONFIGURATIONS`) for one
/// goalie. `adjrp_scores` is raw/c5000/c10000, sign-corrected so higher is
/// better.
#[derive(Debug, Clone)]
pub struct GoalieScores {
    pub player_id: i64,
    pub gsax_goals: Option<f64>,
    pub adjrp_scores: [Option<f64>; 3],
    pub ratings: [Option<f64>; 7],
}

/// Standardize each component over the skater population, flip the
/// lower-is-better ones, and fold into one total per player.
pub fn combine_skaters(players: &BTreeMap<i64, SkaterComponents>) -> Vec<SkaterScores> {
    let mut stats: [Option<PoolStats>; 5] = [None; 5];
    for (slot, component) in SKATER_COMPONENTS.iter().enumerate() {
        let pool: Vec<f64> = players.values().filter_map(|p| p.get(*component)).collect();
        stats[slot] = pool_stats(&pool);
    }

    players
        .iter()
        .map(|(player_id, comps)| {
            let mut scores = [None; 5];
            for (slot, component) in SKATER_COMPONENTS.iter().enumerate() {
                if let (Some(v), Some(st)) = (comps.get(*component), stats[slot].as_ref()) {
                    scores[slot] = Some(zscore(v, st) * component.direction().sign());
                }
            }
            let total = if scores.iter().all(|s| s.is_some()) {
                Some(
                    scores
                        .iter()
                        .zip(SKATER_WEIGHTS.iter())
                        .map(|(s, w)| w * s.unwrap_or(0.0))
                        .sum(),
                )
            } else {
                None
            };
            SkaterScores {
                player_id: *player_id,
                scores,
                total,
            }
        })
        .collect()
}

/// Standardize each AdjRP variant over the goalie population, flip the sign
/// (lower AdjRP is better), and fold the configuration grid. GSAx stays in
/// goals units. A configuration misses its rating when either side is absent
/// for the player.
pub fn combine_goalies(players: &BTreeMap<i64, GoalieComponents>) -> Vec<GoalieScores> {
    const VARIANTS: [AdjrpVariant; 3] = [
        AdjrpVariant::Raw,
        AdjrpVariant::Shrunk5000,
        AdjrpVariant::Shrunk10000,
    ];
    let mut stats: [Option<PoolStats>; 3] = [None; 3];
    for (slot, variant) in VARIANTS.iter().enumerate() {
        let pool: Vec<f64> = players.values().filter_map(|p| p.adjrp(*variant)).collect();
        stats[slot] = pool_stats(&pool);
    }
    let rc_sign = Component::ReboundControl.direction().sign();

    players
        .iter()
        .map(|(player_id, comps)| {
            let mut adjrp_scores = [None; 3];
            for (slot, variant) in VARIANTS.iter().enumerate() {
                if let (Some(v), Some(st)) = (comps.adjrp(*variant), stats[slot].as_ref()) {
                    adjrp_scores[slot] = Some(zscore(v, st) * rc_sign);
                }
            }
            let mut ratings = [None; 7];
            for (slot, cfg) in CONFIGURATIONS.iter().enumerate() {
                let variant_slot = VARIANTS.iter().position(|v| *v == cfg.adjrp).unwrap_or(0);
                if let (Some(rc), Some(gsax)) = (adjrp_scores[variant_slot], comps.gsax_goals) {
                    ratings[slot] = Some(cfg.rebound_weight * rc + cfg.gsax_weight * gsax);
                }
            }
            GoalieScores {
                player_id: *player_id,
                gsax_goals: comps.gsax_goals,
                adjrp_scores,
                ratings,
            }
        })
        .collect()
}
