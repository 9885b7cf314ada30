use std::collections::{BTreeMap, BTreeSet};

use crate::sequencer::GameSequence;
use crate::shots::{
    Component, PenaltyTotals, ShiftInterval, Strength, ToiTotals, per_60,
};

/// One player's raw rate for one component, before regression. `raw` is
/// `None` when the denominator is zero; downstream that means "regress to
/// replacement exactly", never an error.
#[derive(Debug, Clone)]
pub struct RawComponentRate {
    pub player_id: i64,
    pub component: Component,
    pub raw: Option<f64>,
    pub denominator: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOutput {
    /// Sorted by (player_id, component); aggregation order is deterministic
    /// so repeated runs reproduce identical floats.
    pub rates: Vec<RawComponentRate>,
    pub skaters: usize,
    pub goalies: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct OnIceSums {
    ev_for: f64,
    ev_against: f64,
    pp_for: f64,
    pk_against: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct GoalieSums {
    shots_faced: f64,
    xg_sum: f64,
    goals: f64,
    saves: f64,
    freezes: f64,
    rebounds_allowed: f64,
}

/// Roll one season of sequenced games into raw component rates.
///
/// Skater on-ice credit joins each shot against the shift intervals covering
/// its timestamp: every on-ice player of the shooting team is credited "for"
/// and every on-ice opponent "against", each exactly once per shot. The
/// shooter never lands in the against set, and goalies (any id that defended
/// a shot this season) are kept out of skater components entirely; their work
/// is measured by the goalie components.
pub fn aggregate_season(
    games: &[GameSequence],
    shifts: &[ShiftInterval],
    toi: &[ToiTotals],
    penalties: &[PenaltyTotals],
) -> AggregateOutput {
    let goalie_ids: BTreeSet<i64> = games
        .iter()
        .flat_map(|g| g.shots.iter())
        .filter_map(|s| s.shot.goalie_id)
        .collect();

    let mut shift_index: BTreeMap<(i64, i32), Vec<&ShiftInterval>> = BTreeMap::new();
    for shift in shifts {
        shift_index
            .entry((shift.game_id, shift.period))
            .or_default()
            .push(shift);
    }

    let mut on_ice: BTreeMap<i64, OnIceSums> = BTreeMap::new();
    let mut goalie_sums: BTreeMap<i64, GoalieSums> = BTreeMap::new();
    let mut unlocatable = 0usize;

    for game in games {
        for seq in &game.shots {
            let shot = &seq.shot;

            if let Some(goalie_id) = shot.goalie_id
                && shot.on_goal
            {
                let g = goalie_sums.entry(goalie_id).or_default();
                g.shots_faced += 1.0;
                g.xg_sum += shot.xg_or_zero();
                if shot.is_goal {
                    g.goals += 1.0;
                }
                if seq.is_save {
                    g.saves += 1.0;
                    if seq.froze_after {
                        g.freezes += 1.0;
                    }
                }
            }

            // Rebounds count against the goalie who yielded them, via the
            // triggering save.
            if let Some(save_idx) = seq.rebound_of
                && let Some(goalie_id) = game.shots[save_idx].shot.goalie_id
            {
                goalie_sums.entry(goalie_id).or_default().rebounds_allowed += 1.0;
            }

            let bucket = match shot.strength {
                Strength::Even | Strength::PowerPlay => shot.strength,
                Strength::ShortHanded | Strength::Other => continue,
            };
            let (Some(period), Some(seconds)) = (shot.period, shot.period_seconds) else {
                unlocatable += 1;
                continue;
            };

            let mut for_ids: BTreeSet<i64> = BTreeSet::new();
            let mut against_ids: BTreeSet<i64> = BTreeSet::new();
            if let Some(candidates) = shift_index.get(&(shot.game_id, period)) {
                for shift in candidates {
                    if !shift.covers(period, seconds) || goalie_ids.contains(&shift.player_id) {
                        continue;
                    }
                    if shift.team_id == shot.team_id {
                        for_ids.insert(shift.player_id);
                    } else {
                        against_ids.insert(shift.player_id);
                    }
                }
            }
            against_ids.remove(&shot.shooter_id);

            let xg = shot.xg_or_zero();
            for id in for_ids {
                let sums = on_ice.entry(id).or_default();
                match bucket {
                    Strength::Even => sums.ev_for += xg,
                    Strength::PowerPlay => sums.pp_for += xg,
                    _ => {}
                }
            }
            for id in against_ids {
                let sums = on_ice.entry(id).or_default();
                match bucket {
                    Strength::Even => sums.ev_against += xg,
                    Strength::PowerPlay => sums.pk_against += xg,
                    _ => {}
                }
            }
        }
    }

    let penalty_index: BTreeMap<i64, &PenaltyTotals> =
        penalties.iter().map(|p| (p.player_id, p)).collect();

    let mut rates: Vec<RawComponentRate> = Vec::new();
    let mut skaters = 0usize;

    let mut toi_sorted: Vec<&ToiTotals> = toi.iter().collect();
    toi_sorted.sort_by_key(|t| t.player_id);
    let toi_ids: BTreeSet<i64> = toi.iter().map(|t| t.player_id).collect();

    for t in toi_sorted {
        if goalie_ids.contains(&t.player_id) {
            continue;
        }
        skaters += 1;
        let sums = on_ice.get(&t.player_id).copied().unwrap_or_default();
        let ev_minutes = t.ev_minutes.max(0.0);
        let pp_minutes = t.pp_minutes.max(0.0);
        let pk_minutes = t.pk_minutes.max(0.0);
        let total_minutes = t.total_minutes.max(0.0);

        rates.push(RawComponentRate {
            player_id: t.player_id,
            component: Component::EvOffense,
            raw: per_60(sums.ev_for, ev_minutes),
            denominator: ev_minutes,
        });
        rates.push(RawComponentRate {
            player_id: t.player_id,
            component: Component::EvDefense,
            raw: per_60(sums.ev_against, ev_minutes),
            denominator: ev_minutes,
        });
        rates.push(RawComponentRate {
            player_id: t.player_id,
            component: Component::PpOffense,
            raw: per_60(sums.pp_for, pp_minutes),
            denominator: pp_minutes,
        });
        rates.push(RawComponentRate {
            player_id: t.player_id,
            component: Component::PpDefense,
            raw: per_60(sums.pk_against, pk_minutes),
            denominator: pk_minutes,
        });

        let (drawn, taken) = penalty_index
            .get(&t.player_id)
            .map(|p| (p.drawn, p.taken))
            .unwrap_or((0, 0));
        rates.push(RawComponentRate {
            player_id: t.player_id,
            component: Component::Penalty,
            raw: per_60((drawn - taken) as f64, total_minutes),
            denominator: total_minutes,
        });
    }

    let mut goalies = 0usize;
    for (goalie_id, g) in &goalie_sums {
        goalies += 1;
        rates.push(RawComponentRate {
            player_id: *goalie_id,
            component: Component::Gsax,
            raw: if g.shots_faced > 0.0 {
                Some((g.xg_sum - g.goals) / g.shots_faced)
            } else {
                None
            },
            denominator: g.shots_faced,
        });
        let effective_saves = (g.saves - g.freezes).max(0.0);
        rates.push(RawComponentRate {
            player_id: *goalie_id,
            component: Component::ReboundControl,
            raw: if effective_saves > 0.0 {
                Some(g.rebounds_allowed / effective_saves)
            } else {
                None
            },
            denominator: effective_saves,
        });
    }

    rates.sort_by_key(|r| (r.player_id, r.component));

    let mut warnings = Vec::new();
    let uncredited = on_ice
        .keys()
        .filter(|id| !toi_ids.contains(id) && !goalie_ids.contains(id))
        .count();
    if uncredited > 0 {
        warnings.push(format!(
            "{uncredited} players with on-ice credit have no time-on-ice totals and were skipped"
        ));
    }
    if unlocatable > 0 {
        warnings.push(format!(
            "{unlocatable} shots without a usable clock took no part in on-ice credit"
        ));
    }

    AggregateOutput {
        rates,
        skaters,
        goalies,
        warnings,
    }
}

/// Convenience lookup used by the combiner and tests.
pub fn rate_for(rates: &[RawComponentRate], player_id: i64, component: Component) -> Option<&RawComponentRate> {
    rates
        .iter()
        .find(|r| r.player_id == player_id && r.component == component)
}
