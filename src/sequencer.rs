use std::collections::{BTreeMap, HashSet};

use crate::config::EngineConfig;
use crate::shots::{FreezeEvent, ShotEvent};

/// How a save picks its rebound among qualifying shots in the window.
///
/// `FirstWithinWindow` is the historical behavior: the scan stops at the
/// first qualifying shot in stream order, which is not necessarily the
/// closest in time when a feed delivers events slightly out of order.
/// `ClosestWithinWindow` examines the whole window and takes the smallest
/// elapsed time. Neither has been validated against ground truth as the
/// better choice, so the default stays with the historical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReboundPolicy {
    FirstWithinWindow,
    ClosestWithinWindow,
}

/// A ShotEvent with its sequencing annotations. Input order is preserved;
/// nothing is duplicated or dropped.
#[derive(Debug, Clone)]
pub struct SequencedShot {
    pub shot: ShotEvent,
    pub is_save: bool,
    /// Index into the game's shot slice of the save this shot rebounded.
    pub rebound_of: Option<usize>,
    pub seconds_after_save: Option<f64>,
    /// Set on a save whose chain ended with the goalie covering the puck.
    pub froze_after: bool,
    /// False when the period or clock was unusable. The shot still counts in
    /// save and shot totals but takes no part in rebound matching.
    pub matchable: bool,
}

impl SequencedShot {
    pub fn is_rebound(&self) -> bool {
        self.rebound_of.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GameSequence {
    pub shots: Vec<SequencedShot>,
    pub rebounds: usize,
    pub frozen_chains: usize,
    pub unmatchable: usize,
}

/// Annotate one game's shots with save/rebound/freeze relationships.
///
/// Caller contract: `shots` and `freezes` belong to a single game. Events are
/// grouped by period internally; the claimed-rebound set is local to one
/// period pass, so games (and periods) can be sequenced independently.
pub fn sequence_game(
    shots: &[ShotEvent],
    freezes: &[FreezeEvent],
    cfg: &EngineConfig,
) -> GameSequence {
    let mut out: Vec<SequencedShot> = shots
        .iter()
        .map(|shot| {
            let matchable = usable_clock(shot.period, shot.period_seconds);
            SequencedShot {
                is_save: shot.is_save(),
                rebound_of: None,
                seconds_after_save: None,
                froze_after: false,
                matchable,
                shot: shot.clone(),
            }
        })
        .collect();

    // Stream-ordered shot indices per period. event_idx is the feed order.
    let mut by_period: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, s) in out.iter().enumerate() {
        if !s.matchable {
            continue;
        }
        if let Some(period) = s.shot.period {
            by_period.entry(period).or_default().push(idx);
        }
    }
    for indices in by_period.values_mut() {
        indices.sort_by_key(|&i| out[i].shot.event_idx);
    }

    let mut freezes_by_period: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for f in freezes {
        if !usable_clock(f.period, f.period_seconds) {
            continue;
        }
        if let (Some(period), Some(seconds)) = (f.period, f.period_seconds) {
            freezes_by_period.entry(period).or_default().push(seconds);
        }
    }
    for times in freezes_by_period.values_mut() {
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    }

    let mut rebounds = 0usize;
    let mut frozen_chains = 0usize;

    for (period, indices) in &by_period {
        let freeze_times = freezes_by_period
            .get(period)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        // One exclusion set per period pass; a shot can rebound at most one
        // save, and nothing leaks across periods or games.
        let mut claimed: HashSet<usize> = HashSet::new();

        for pos in 0..indices.len() {
            let save_idx = indices[pos];
            if !out[save_idx].is_save {
                continue;
            }
            let save_team = out[save_idx].shot.team_id;
            let save_t = match out[save_idx].shot.period_seconds {
                Some(t) => t,
                None => continue,
            };
            let freeze_t = first_freeze_after(freeze_times, save_t, cfg.rebound_window_seconds);

            let mut chosen: Option<(usize, f64)> = None;
            for (scanned, &cand_idx) in indices[pos + 1..].iter().enumerate() {
                if scanned >= cfg.rebound_scan_events {
                    break;
                }
                let cand_t = match out[cand_idx].shot.period_seconds {
                    Some(t) => t,
                    None => continue,
                };
                let dt = cand_t - save_t;
                if dt <= 0.0 {
                    continue;
                }
                if dt > cfg.rebound_window_seconds {
                    break;
                }
                // A whistle beats any shot at or after it.
                if let Some(ft) = freeze_t
                    && ft <= cand_t
                {
                    break;
                }
                if out[cand_idx].shot.team_id != save_team {
                    continue;
                }
                if claimed.contains(&cand_idx) {
                    continue;
                }
                match cfg.rebound_policy {
                    ReboundPolicy::FirstWithinWindow => {
                        chosen = Some((cand_idx, dt));
                        break;
                    }
                    ReboundPolicy::ClosestWithinWindow => {
                        let better = match chosen {
                            None => true,
                            Some((_, best_dt)) => dt < best_dt,
                        };
                        if better {
                            chosen = Some((cand_idx, dt));
                        }
                    }
                }
            }

            if let Some((cand_idx, dt)) = chosen {
                out[cand_idx].rebound_of = Some(save_idx);
                out[cand_idx].seconds_after_save = Some(dt);
                claimed.insert(cand_idx);
                rebounds += 1;
            } else if freeze_t.is_some() {
                out[save_idx].froze_after = true;
                frozen_chains += 1;
            }
        }
    }

    let unmatchable = out.iter().filter(|s| !s.matchable).count();
    GameSequence {
        shots: out,
        rebounds,
        frozen_chains,
        unmatchable,
    }
}

fn usable_clock(period: Option<i32>, seconds: Option<f64>) -> bool {
    let Some(period) = period else {
        return false;
    };
    let Some(seconds) = seconds else {
        return false;
    };
    period > 0 && seconds.is_finite() && seconds >= 0.0
}

/// Earliest freeze strictly after `save_t` and within the window, if any.
fn first_freeze_after(freeze_times: &[f64], save_t: f64, window: f64) -> Option<f64> {
    freeze_times
        .iter()
        .copied()
        .find(|&t| t > save_t && t - save_t <= window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shots::Strength;

    fn shot(event_idx: i64, team_id: i64, t: f64, on_goal: bool, is_goal: bool) -> ShotEvent {
        ShotEvent {
            game_id: 1,
            event_idx,
            season: 2024,
            period: Some(1),
            period_seconds: Some(t),
            team_id,
            shooter_id: 100 + event_idx,
            goalie_id: Some(if team_id == 10 { 900 } else { 901 }),
            xg: Some(0.06),
            is_goal,
            on_goal,
            strength: Strength::Even,
        }
    }

    fn save(event_idx: i64, team_id: i64, t: f64) -> ShotEvent {
        shot(event_idx, team_id, t, true, false)
    }

    fn freeze(event_idx: i64, t: f64) -> FreezeEvent {
        FreezeEvent {
            game_id: 1,
            event_idx,
            season: 2024,
            period: Some(1),
            period_seconds: Some(t),
            team_id: 20,
            goalie_id: Some(900),
        }
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn chain_attributes_one_rebound_and_respects_window() {
        // Save at 0, save at 1.5 (rebound of the first), shot at 4.0 which is
        // 2.5s after the second save and outside the window.
        let shots = vec![save(0, 10, 0.0), save(1, 10, 1.5), save(2, 10, 4.0)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.rebounds, 1);
        assert_eq!(seq.shots[1].rebound_of, Some(0));
        assert_eq!(seq.shots[1].seconds_after_save, Some(1.5));
        assert!(seq.shots[2].rebound_of.is_none());
    }

    #[test]
    fn freeze_terminates_chain_inside_window() {
        let shots = vec![save(0, 10, 0.0), save(1, 10, 1.5)];
        let freezes = vec![freeze(100, 1.0)];
        let seq = sequence_game(&shots, &freezes, &cfg());
        assert_eq!(seq.rebounds, 0);
        assert!(seq.shots[1].rebound_of.is_none());
        assert!(seq.shots[0].froze_after);
        assert_eq!(seq.frozen_chains, 1);
    }

    #[test]
    fn freeze_after_rebound_does_not_undo_it() {
        let shots = vec![save(0, 10, 0.0), save(1, 10, 0.5)];
        let freezes = vec![freeze(100, 1.0)];
        let seq = sequence_game(&shots, &freezes, &cfg());
        assert_eq!(seq.rebounds, 1);
        assert_eq!(seq.shots[1].rebound_of, Some(0));
        assert!(!seq.shots[0].froze_after);
        // The second save's own chain was then cut by the freeze.
        assert!(seq.shots[1].froze_after);
    }

    #[test]
    fn freeze_with_no_shot_still_counts_for_the_save() {
        let shots = vec![save(0, 10, 0.0)];
        let freezes = vec![freeze(100, 1.2)];
        let seq = sequence_game(&shots, &freezes, &cfg());
        assert!(seq.shots[0].froze_after);
        assert_eq!(seq.frozen_chains, 1);
    }

    #[test]
    fn window_edge_is_inclusive_and_zero_dt_is_not() {
        let shots = vec![save(0, 10, 0.0), save(1, 10, 2.0)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.shots[1].rebound_of, Some(0));

        let shots = vec![save(0, 10, 5.0), save(1, 10, 5.0)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.rebounds, 0);
    }

    #[test]
    fn opponent_shot_neither_rebounds_nor_breaks_the_chain() {
        let shots = vec![save(0, 10, 0.0), save(1, 20, 0.5), save(2, 10, 1.0)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert!(seq.shots[1].rebound_of.is_none());
        assert_eq!(seq.shots[2].rebound_of, Some(0));
    }

    #[test]
    fn first_match_stops_the_scan_even_for_a_goal() {
        // The first qualifying shot is a goal; it takes the rebound and the
        // scan stops, so the later shot is not attributed to the save.
        let shots = vec![
            save(0, 10, 0.0),
            shot(1, 10, 0.5, true, true),
            save(2, 10, 1.0),
        ];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.shots[1].rebound_of, Some(0));
        assert!(seq.shots[2].rebound_of.is_none());
        assert_eq!(seq.rebounds, 1);
    }

    #[test]
    fn missed_attempt_can_still_be_the_rebound() {
        let shots = vec![save(0, 10, 0.0), shot(1, 10, 1.0, false, false)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.shots[1].rebound_of, Some(0));
        // A miss is not a save, so it cannot start a chain of its own.
        assert!(!seq.shots[1].is_save);
    }

    #[test]
    fn chains_do_not_cross_periods() {
        let mut early = save(0, 10, 1190.0);
        let mut late = save(1, 10, 0.5);
        early.period = Some(1);
        late.period = Some(2);
        let seq = sequence_game(&[early, late], &[], &cfg());
        assert_eq!(seq.rebounds, 0);
    }

    #[test]
    fn unusable_clock_is_counted_but_never_matched() {
        let mut broken = save(1, 10, 1.0);
        broken.period_seconds = None;
        let shots = vec![save(0, 10, 0.0), broken, save(2, 10, 1.5)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.unmatchable, 1);
        assert!(!seq.shots[1].matchable);
        assert!(seq.shots[1].is_save);
        assert!(seq.shots[1].rebound_of.is_none());
        // The usable shot at 1.5 still rebounds the save at 0.
        assert_eq!(seq.shots[2].rebound_of, Some(0));

        let negative = save(1, 10, -3.0);
        let seq = sequence_game(&[save(0, 10, 0.0), negative], &[], &cfg());
        assert_eq!(seq.unmatchable, 1);
    }

    #[test]
    fn each_shot_rebounds_at_most_one_save() {
        // A rebound that is itself a save starts its own chain; every
        // attribution is unique on both sides.
        let shots = vec![save(0, 10, 0.0), save(1, 10, 1.0), save(2, 10, 1.8)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.shots[1].rebound_of, Some(0));
        assert_eq!(seq.shots[2].rebound_of, Some(1));
        let mut seen = std::collections::HashSet::new();
        for s in &seq.shots {
            if let Some(origin) = s.rebound_of {
                assert!(seen.insert(origin), "save {origin} credited twice");
            }
        }
    }

    #[test]
    fn closest_policy_matches_first_on_ordered_data() {
        let shots = vec![save(0, 10, 0.0), save(1, 10, 0.8), save(2, 10, 1.6)];
        let mut closest_cfg = cfg();
        closest_cfg.rebound_policy = ReboundPolicy::ClosestWithinWindow;
        let first = sequence_game(&shots, &[], &cfg());
        let closest = sequence_game(&shots, &[], &closest_cfg);
        for (a, b) in first.shots.iter().zip(closest.shots.iter()) {
            assert_eq!(a.rebound_of, b.rebound_of);
        }
    }

    #[test]
    fn output_preserves_input_order_and_length() {
        let shots = vec![save(3, 10, 9.0), save(1, 20, 2.0), save(2, 10, 7.5)];
        let seq = sequence_game(&shots, &[], &cfg());
        assert_eq!(seq.shots.len(), shots.len());
        for (a, b) in seq.shots.iter().zip(shots.iter()) {
            assert_eq!(a.shot.event_idx, b.event_idx);
        }
    }
}
