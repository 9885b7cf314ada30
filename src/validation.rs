use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::combine::{GoalieComponents, combine_goalies};
use crate::config::{ADJRP_CONSTANTS, CONFIGURATIONS, DEFAULT_PRIMARY_CONFIG, EngineConfig};
use crate::regression::shrink_toward;
use crate::sequencer::GameSequence;

/// Two combined components should measure distinct skills; above this
/// absolute correlation they start to look redundant.
pub const INDEPENDENCE_TARGET: f64 = 0.30;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
pub struct ConfigStability {
    pub name: &'static str,
    pub stability: Option<f64>,
    pub pairs: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub sampled_goalies: usize,
    /// Split-half correlation of the GSAx-only metric, the bar every
    /// configuration has to clear.
    pub baseline_stability: Option<f64>,
    /// Aligned with `CONFIGURATIONS`.
    pub configs: Vec<ConfigStability>,
    /// Full-season correlation between each AdjRP variant and GSAx goals,
    /// in raw/c5000/c10000 order.
    pub independence: [Option<f64>; 3],
    pub selected: &'static str,
    pub below_target: bool,
}

/// Pearson correlation. `None` when fewer than two pairs exist or either
/// side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = xs[..n].iter().sum::<f64>() / nf;
    let mean_y = ys[..n].iter().sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[derive(Debug, Clone, Copy, Default)]
struct GoalieHalf {
    shots: f64,
    xg: f64,
    goals: f64,
    saves: f64,
    freezes: f64,
    rebounds: f64,
}

/// Deterministically partition each goalie's faced shots into two halves.
/// Each goalie gets its own seeded stream, so adding one goalie to a season
/// never reshuffles another's split.
fn split_goalie_halves(
    games: &[GameSequence],
    cfg: &EngineConfig,
) -> BTreeMap<i64, (GoalieHalf, GoalieHalf)> {
    let mut rngs: BTreeMap<i64, StdRng> = BTreeMap::new();
    let mut halves: BTreeMap<i64, (GoalieHalf, GoalieHalf)> = BTreeMap::new();

    for game in games {
        let triggered: HashSet<usize> = game.shots.iter().filter_map(|s| s.rebound_of).collect();
        for (idx, s) in game.shots.iter().enumerate() {
            let Some(goalie_id) = s.shot.goalie_id else {
                continue;
            };
            if !s.shot.on_goal {
                continue;
            }
            let rng = rngs.entry(goalie_id).or_insert_with(|| {
                StdRng::seed_from_u64(cfg.split_seed ^ (goalie_id as u64).wrapping_mul(SEED_MIX))
            });
            let entry = halves.entry(goalie_id).or_default();
            let half = if rng.gen_bool(0.5) {
                &mut entry.0
            } else {
                &mut entry.1
            };
            half.shots += 1.0;
            half.xg += s.shot.xg_or_zero();
            if s.shot.is_goal {
                half.goals += 1.0;
            }
            if s.is_save {
                half.saves += 1.0;
                if s.froze_after {
                    half.freezes += 1.0;
                }
                // Save-anchored: a rebound belongs to the half holding the
                // save that yielded it.
                if triggered.contains(&idx) {
                    half.rebounds += 1.0;
                }
            }
        }
    }
    halves
}

/// Goalie components for one half, regressed against the full-season
/// replacement levels. Recomputing the prior per half would move the target
/// mid-experiment.
fn half_components(
    h: &GoalieHalf,
    gsax_replacement: f64,
    rc_replacement: f64,
    cfg: &EngineConfig,
) -> GoalieComponents {
    let gsax_raw = if h.shots > 0.0 {
        Some((h.xg - h.goals) / h.shots)
    } else {
        None
    };
    let gsax_rate = shrink_toward(gsax_raw, h.shots, cfg.c_gsax, gsax_replacement);
    let effective_saves = (h.saves - h.freezes).max(0.0);
    let adjrp_raw = if effective_saves > 0.0 {
        Some(h.rebounds / effective_saves)
    } else {
        None
    };
    GoalieComponents {
        gsax_goals: if h.shots > 0.0 {
            Some(gsax_rate * h.shots)
        } else {
            None
        },
        adjrp_raw,
        adjrp_c5000: Some(shrink_toward(
            adjrp_raw,
            effective_saves,
            ADJRP_CONSTANTS[0],
            rc_replacement,
        )),
        adjrp_c10000: Some(shrink_toward(
            adjrp_raw,
            effective_saves,
            ADJRP_CONSTANTS[1],
            rc_replacement,
        )),
    }
}

/// Split-half stability per configuration plus component independence, and
/// the primary pick.
///
/// `full` holds the full-season goalie components the independence check
/// reads; halves are rebuilt here from the sequenced games.
pub fn validate_season(
    games: &[GameSequence],
    full: &BTreeMap<i64, GoalieComponents>,
    gsax_replacement: f64,
    rc_replacement: f64,
    cfg: &EngineConfig,
) -> ValidationReport {
    let halves = split_goalie_halves(games, cfg);
    let sampled: BTreeMap<i64, (GoalieHalf, GoalieHalf)> = halves
        .into_iter()
        .filter(|(_, (a, b))| a.shots + b.shots >= cfg.split_min_shots as f64)
        .collect();

    let mut map_a: BTreeMap<i64, GoalieComponents> = BTreeMap::new();
    let mut map_b: BTreeMap<i64, GoalieComponents> = BTreeMap::new();
    for (goalie_id, (a, b)) in &sampled {
        map_a.insert(
            *goalie_id,
            half_components(a, gsax_replacement, rc_replacement, cfg),
        );
        map_b.insert(
            *goalie_id,
            half_components(b, gsax_replacement, rc_replacement, cfg),
        );
    }
    let scores_a = combine_goalies(&map_a);
    let scores_b = combine_goalies(&map_b);

    let mut baseline_xs = Vec::new();
    let mut baseline_ys = Vec::new();
    for (a, b) in scores_a.iter().zip(scores_b.iter()) {
        if let (Some(x), Some(y)) = (a.gsax_goals, b.gsax_goals) {
            baseline_xs.push(x);
            baseline_ys.push(y);
        }
    }
    let baseline_stability = pearson(&baseline_xs, &baseline_ys);

    let mut configs = Vec::with_capacity(CONFIGURATIONS.len());
    for (slot, c) in CONFIGURATIONS.iter().enumerate() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (a, b) in scores_a.iter().zip(scores_b.iter()) {
            if let (Some(x), Some(y)) = (a.ratings[slot], b.ratings[slot]) {
                xs.push(x);
                ys.push(y);
            }
        }
        configs.push(ConfigStability {
            name: c.name,
            stability: pearson(&xs, &ys),
            pairs: xs.len(),
        });
    }

    let independence = independence_by_variant(full);
    let (selected, below_target) = select_primary(&configs, baseline_stability);

    ValidationReport {
        sampled_goalies: sampled.len(),
        baseline_stability,
        configs,
        independence,
        selected,
        below_target,
    }
}

/// Correlation of each AdjRP variant with GSAx goals over the full season.
fn independence_by_variant(full: &BTreeMap<i64, GoalieComponents>) -> [Option<f64>; 3] {
    let variants = [
        |g: &GoalieComponents| g.adjrp_raw,
        |g: &GoalieComponents| g.adjrp_c5000,
        |g: &GoalieComponents| g.adjrp_c10000,
    ];
    let mut out = [None; 3];
    for (slot, pick) in variants.iter().enumerate() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for g in full.values() {
            if let (Some(x), Some(y)) = (pick(g), g.gsax_goals) {
                xs.push(x);
                ys.push(y);
            }
        }
        out[slot] = pearson(&xs, &ys);
    }
    out
}

/// Among configurations whose stability clears the baseline, take the
/// highest; if none clear it, take the best available and flag it. With no
/// usable stabilities at all, fall back to the shipped default.
pub fn select_primary(
    configs: &[ConfigStability],
    baseline: Option<f64>,
) -> (&'static str, bool) {
    let mut best_above: Option<(&'static str, f64)> = None;
    let mut best_any: Option<(&'static str, f64)> = None;
    for c in configs {
        let Some(s) = c.stability else {
            continue;
        };
        if best_any.map(|(_, b)| s > b).unwrap_or(true) {
            best_any = Some((c.name, s));
        }
        if let Some(b) = baseline
            && s > b
            && best_above.map(|(_, prev)| s > prev).unwrap_or(true)
        {
            best_above = Some((c.name, s));
        }
    }
    if let Some((name, _)) = best_above {
        return (name, false);
    }
    if let Some((name, _)) = best_any {
        return (name, true);
    }
    (DEFAULT_PRIMARY_CONFIG, true)
}
