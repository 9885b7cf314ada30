use std::env;

use anyhow::{Result, bail};
use once_cell::sync::OnceCell;

use crate::sequencer::ReboundPolicy;
use crate::shots::Component;

const DEFAULT_REPLACEMENT_PCTL: f64 = 75.0;
const DEFAULT_MIN_POPULATION: usize = 10;
const DEFAULT_REBOUND_WINDOW_SECS: f64 = 2.0;
const DEFAULT_REBOUND_SCAN_EVENTS: usize = 10;
const DEFAULT_C_EV: f64 = 500.0;
const DEFAULT_C_PP: f64 = 100.0;
const DEFAULT_C_PENALTY: f64 = 1000.0;
const DEFAULT_C_GSAX: f64 = 500.0;
const DEFAULT_SPLIT_SEED: u64 = 271_828_459;
const DEFAULT_SPLIT_MIN_SHOTS: usize = 100;

/// The two rebound-control stabilization constants computed side by side.
/// Both are deliberately heavy; raw AdjRP is noisy at a season of saves.
pub const ADJRP_CONSTANTS: [f64; 2] = [5000.0, 10000.0];

/// Knobs for one engine run. Defaults are the production values; a handful can
/// be overridden through `XGAR_*` environment variables for experiments.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Percentile of the eligible raw-rate pool that defines replacement
    /// level. Taken on the worse tail of each component's distribution.
    pub replacement_percentile: f64,
    /// Minimum eligible players needed to form a replacement baseline.
    pub min_population: usize,
    pub rebound_window_seconds: f64,
    /// Cap on events examined past a save before giving up the scan.
    pub rebound_scan_events: usize,
    pub rebound_policy: ReboundPolicy,
    pub c_ev: f64,
    pub c_pp: f64,
    pub c_penalty: f64,
    /// Tunable within roughly 500-1000; see the backtest binary.
    pub c_gsax: f64,
    /// Eligibility floors for the replacement pool, in each component's
    /// denominator units. Players below the floor still get rated; they just
    /// do not vote on where replacement level sits.
    pub min_ev_minutes: f64,
    pub min_pp_minutes: f64,
    pub min_total_minutes: f64,
    pub min_shots_faced: f64,
    pub min_effective_saves: f64,
    pub split_seed: u64,
    pub split_min_shots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replacement_percentile: DEFAULT_REPLACEMENT_PCTL,
            min_population: DEFAULT_MIN_POPULATION,
            rebound_window_seconds: DEFAULT_REBOUND_WINDOW_SECS,
            rebound_scan_events: DEFAULT_REBOUND_SCAN_EVENTS,
            rebound_policy: ReboundPolicy::FirstWithinWindow,
            c_ev: DEFAULT_C_EV,
            c_pp: DEFAULT_C_PP,
            c_penalty: DEFAULT_C_PENALTY,
            c_gsax: DEFAULT_C_GSAX,
            min_ev_minutes: 60.0,
            min_pp_minutes: 10.0,
            min_total_minutes: 60.0,
            min_shots_faced: 100.0,
            min_effective_saves: 50.0,
            split_seed: DEFAULT_SPLIT_SEED,
            split_min_shots: DEFAULT_SPLIT_MIN_SHOTS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.replacement_percentile = env_f64("XGAR_REPLACEMENT_PCTL", cfg.replacement_percentile);
        cfg.min_population = env_usize("XGAR_MIN_POPULATION", cfg.min_population);
        cfg.rebound_window_seconds = env_f64("XGAR_REBOUND_WINDOW_SECS", cfg.rebound_window_seconds);
        cfg.c_gsax = env_f64("XGAR_GSAX_C", cfg.c_gsax);
        cfg.split_seed = env_u64("XGAR_SPLIT_SEED", cfg.split_seed);
        cfg.split_min_shots = env_usize("XGAR_SPLIT_MIN_SHOTS", cfg.split_min_shots);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject nonsensical knobs before any computation runs.
    pub fn validate(&self) -> Result<()> {
        if !self.replacement_percentile.is_finite()
            || self.replacement_percentile <= 0.0
            || self.replacement_percentile >= 100.0
        {
            bail!(
                "replacement percentile {} outside (0, 100)",
                self.replacement_percentile
            );
        }
        if self.min_population < 2 {
            bail!("min population {} must be at least 2", self.min_population);
        }
        if !self.rebound_window_seconds.is_finite()
            || self.rebound_window_seconds <= 0.0
            || self.rebound_window_seconds > 60.0
        {
            bail!(
                "rebound window {}s outside (0, 60]",
                self.rebound_window_seconds
            );
        }
        if self.rebound_scan_events == 0 {
            bail!("rebound scan cap must be positive");
        }
        for (name, c) in [
            ("ev", self.c_ev),
            ("pp", self.c_pp),
            ("penalty", self.c_penalty),
            ("gsax", self.c_gsax),
        ] {
            if !c.is_finite() || c <= 0.0 {
                bail!("stabilization constant {name}={c} must be positive");
            }
        }
        for (name, floor) in [
            ("ev minutes", self.min_ev_minutes),
            ("pp minutes", self.min_pp_minutes),
            ("total minutes", self.min_total_minutes),
            ("shots faced", self.min_shots_faced),
            ("effective saves", self.min_effective_saves),
        ] {
            if !floor.is_finite() || floor < 0.0 {
                bail!("eligibility floor {name}={floor} must be non-negative");
            }
        }
        if self.split_min_shots < 2 {
            bail!(
                "split-half minimum shots {} must be at least 2",
                self.split_min_shots
            );
        }
        Ok(())
    }

    /// Default stabilization constant for a component. Rebound control reports
    /// the lighter of its two candidate constants; the heavier one only exists
    /// inside the configuration grid.
    pub fn stabilization(&self, component: Component) -> f64 {
        match component {
            Component::EvOffense | Component::EvDefense => self.c_ev,
            Component::PpOffense | Component::PpDefense => self.c_pp,
            Component::Penalty => self.c_penalty,
            Component::Gsax => self.c_gsax,
            Component::ReboundControl => ADJRP_CONSTANTS[0],
        }
    }

    /// Replacement-pool eligibility floor, in the component's denominator
    /// units.
    pub fn eligibility_floor(&self, component: Component) -> f64 {
        match component {
            Component::EvOffense | Component::EvDefense => self.min_ev_minutes,
            Component::PpOffense | Component::PpDefense => self.min_pp_minutes,
            Component::Penalty => self.min_total_minutes,
            Component::Gsax => self.min_shots_faced,
            Component::ReboundControl => self.min_effective_saves,
        }
    }
}

static CONFIG: OnceCell<EngineConfig> = OnceCell::new();

/// Process-wide config, environment overrides applied once.
pub fn engine_config() -> Result<&'static EngineConfig> {
    CONFIG.get_or_try_init(EngineConfig::from_env)
}

/// Which rebound-control value feeds a rating configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjrpVariant {
    Raw,
    Shrunk5000,
    Shrunk10000,
}

impl AdjrpVariant {
    pub fn constant(&self) -> Option<f64> {
        match self {
            AdjrpVariant::Raw => None,
            AdjrpVariant::Shrunk5000 => Some(ADJRP_CONSTANTS[0]),
            AdjrpVariant::Shrunk10000 => Some(ADJRP_CONSTANTS[1]),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdjrpVariant::Raw => "raw",
            AdjrpVariant::Shrunk5000 => "c5000",
            AdjrpVariant::Shrunk10000 => "c10000",
        }
    }
}

/// One candidate way of folding goalie components into a rating: which
/// rebound-control variant to use and how to split weight between it and
/// GSAx.
#[derive(Debug, Clone, Copy)]
pub struct RatingConfiguration {
    pub name: &'static str,
    pub adjrp: AdjrpVariant,
    pub rebound_weight: f64,
    pub gsax_weight: f64,
}

/// The closed set of candidate configurations, all computed and persisted on
/// every run. Exactly one is flagged primary after validation. Adding an
/// entry here (plus its rating column) is the whole change needed for a new
/// candidate.
pub const CONFIGURATIONS: [RatingConfiguration; 7] = [
    RatingConfiguration {
        name: "raw_30_70",
        adjrp: AdjrpVariant::Raw,
        rebound_weight: 0.30,
        gsax_weight: 0.70,
    },
    RatingConfiguration {
        name: "c5000_30_70",
        adjrp: AdjrpVariant::Shrunk5000,
        rebound_weight: 0.30,
        gsax_weight: 0.70,
    },
    RatingConfiguration {
        name: "c5000_10_90",
        adjrp: AdjrpVariant::Shrunk5000,
        rebound_weight: 0.10,
        gsax_weight: 0.90,
    },
    RatingConfiguration {
        name: "c5000_5_95",
        adjrp: AdjrpVariant::Shrunk5000,
        rebound_weight: 0.05,
        gsax_weight: 0.95,
    },
    RatingConfiguration {
        name: "c10000_30_70",
        adjrp: AdjrpVariant::Shrunk10000,
        rebound_weight: 0.30,
        gsax_weight: 0.70,
    },
    RatingConfiguration {
        name: "c10000_10_90",
        adjrp: AdjrpVariant::Shrunk10000,
        rebound_weight: 0.10,
        gsax_weight: 0.90,
    },
    RatingConfiguration {
        name: "c10000_5_95",
        adjrp: AdjrpVariant::Shrunk10000,
        rebound_weight: 0.05,
        gsax_weight: 0.95,
    },
];

/// Configuration mirrored into `rating_primary` until a backtest has picked
/// one for the season.
pub const DEFAULT_PRIMARY_CONFIG: &str = "c5000_30_70";

pub fn configuration_by_name(name: &str) -> Option<&'static RatingConfiguration> {
    CONFIGURATIONS.iter().find(|c| c.name == name)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
        .unwrap_or(default)
}
