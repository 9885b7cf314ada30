use anyhow::{Result, bail};

use crate::config::EngineConfig;
use crate::rates::RawComponentRate;
use crate::shots::{Component, Direction};

/// Season baseline for one component, kept for auditing next to the ratings
/// it anchored.
#[derive(Debug, Clone)]
pub struct ReplacementLevel {
    pub component: Component,
    pub percentile: f64,
    pub value: f64,
    pub eligible_players: usize,
}

/// Linear-interpolation percentile over an ascending-sorted slice.
/// `pct` is in [0, 100]; rank `pct/100 * (len - 1)` interpolates between the
/// two neighboring order statistics.
pub fn percentile_linear(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Fringe-percentile baseline over the eligible raw-rate pool for one
/// component.
///
/// The configured percentile is read against the worse tail of the
/// distribution: directly for lower-is-better components, mirrored to
/// `100 - pct` for higher-is-better ones, so replacement level always sits
/// below average performance. Players below the eligibility floor (or with no
/// denominator at all) do not vote, though they are still rated downstream.
///
/// Fails when the pool is too small to anchor a baseline; every regressed
/// value for the season would inherit the error, so this is not a
/// degrade-gracefully path.
pub fn replacement_level(
    component: Component,
    rates: &[RawComponentRate],
    cfg: &EngineConfig,
) -> Result<ReplacementLevel> {
    let floor = cfg.eligibility_floor(component);
    let mut pool: Vec<f64> = rates
        .iter()
        .filter(|r| r.component == component && r.denominator >= floor)
        .filter_map(|r| r.raw)
        .filter(|v| v.is_finite())
        .collect();

    if pool.len() < cfg.min_population {
        bail!(
            "cannot set replacement level for {}: {} eligible players, need {}",
            component.as_str(),
            pool.len(),
            cfg.min_population
        );
    }

    pool.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let effective_pct = match component.direction() {
        Direction::LowerBetter => cfg.replacement_percentile,
        Direction::HigherBetter => 100.0 - cfg.replacement_percentile,
    };
    let value = match percentile_linear(&pool, effective_pct) {
        Some(v) => v,
        None => bail!(
            "empty replacement pool for {} after filtering",
            component.as_str()
        ),
    };

    Ok(ReplacementLevel {
        component,
        percentile: cfg.replacement_percentile,
        value,
        eligible_players: pool.len(),
    })
}
