use serde::{Deserialize, Serialize};

/// Strength state of a shot attempt, seen from the shooting team's side.
/// Upstream feeds tag situations with a mix of labels ("5v5", "pp",
/// "power-play-defense", ...); ingestion normalizes them into this enum so the
/// engine never has to re-interpret strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    Even,
    PowerPlay,
    ShortHanded,
    Other,
}

impl Strength {
    pub fn parse(raw: &str) -> Strength {
        let s = raw.trim().to_ascii_lowercase();
        if s.is_empty() {
            return Strength::Other;
        }
        if s == "5v5" || s == "ev" || s == "even" || s == "even-strength" || s == "es" {
            return Strength::Even;
        }
        if s == "pp" || s == "5v4" || s == "power-play" || s == "power-play-offense" || s == "powerplay" {
            return Strength::PowerPlay;
        }
        // A shot taken while defending a power play is a shorthanded attempt.
        if s == "pk" || s == "sh" || s == "4v5" || s == "penalty-kill" || s == "power-play-defense" || s == "shorthanded" {
            return Strength::ShortHanded;
        }
        Strength::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Even => "ev",
            Strength::PowerPlay => "pp",
            Strength::ShortHanded => "sh",
            Strength::Other => "other",
        }
    }
}

/// One shot or goal attempt, as ingested. Immutable once stored; the engine
/// reads these and never writes them back.
///
/// `xg` is the externally modeled expected-goal value. It is only defined for
/// attempts that reached the net or scored; missed attempts carry `None`.
/// `goalie_id` is `None` for empty-net attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotEvent {
    pub game_id: i64,
    /// Ordinal of the event within its game feed. Breaks timestamp ties so
    /// sequencing and aggregation stay reproducible.
    pub event_idx: i64,
    pub season: i32,
    pub period: Option<i32>,
    /// Elapsed seconds within the period. `None` when the feed lacked a clock.
    pub period_seconds: Option<f64>,
    pub team_id: i64,
    pub shooter_id: i64,
    pub goalie_id: Option<i64>,
    pub xg: Option<f64>,
    pub is_goal: bool,
    pub on_goal: bool,
    pub strength: Strength,
}

impl ShotEvent {
    /// A save is an on-goal attempt the goalie stopped.
    pub fn is_save(&self) -> bool {
        self.on_goal && !self.is_goal
    }

    /// Shots a goalie actually faced: on goal, net not empty.
    pub fn is_faced(&self) -> bool {
        self.on_goal && self.goalie_id.is_some()
    }

    pub fn xg_or_zero(&self) -> f64 {
        self.xg.unwrap_or(0.0)
    }
}

/// A goalie covering the puck for a stoppage. Terminates any pending rebound
/// chain in its period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeEvent {
    pub game_id: i64,
    pub event_idx: i64,
    pub season: i32,
    pub period: Option<i32>,
    pub period_seconds: Option<f64>,
    pub team_id: i64,
    pub goalie_id: Option<i64>,
}

/// One on-ice stint for one player, `[start_seconds, end_seconds)` within a
/// period. Used only to resolve who was on the ice at a shot's timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftInterval {
    pub game_id: i64,
    pub season: i32,
    pub player_id: i64,
    pub team_id: i64,
    pub period: i32,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl ShiftInterval {
    pub fn covers(&self, period: i32, seconds: f64) -> bool {
        self.period == period && self.start_seconds <= seconds && seconds < self.end_seconds
    }
}

/// Season time-on-ice totals per player, broken out by situation. These are
/// the regression denominators for the skater components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToiTotals {
    pub player_id: i64,
    pub season: i32,
    pub ev_minutes: f64,
    pub pp_minutes: f64,
    pub pk_minutes: f64,
    pub total_minutes: f64,
}

/// Season penalties drawn and taken per player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PenaltyTotals {
    pub player_id: i64,
    pub season: i32,
    pub drawn: i64,
    pub taken: i64,
}

/// Which way a component's raw rate points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherBetter,
    LowerBetter,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::HigherBetter => 1.0,
            Direction::LowerBetter => -1.0,
        }
    }
}

/// The rated components. Skaters carry the first five, goalies the last two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Even-strength on-ice expected goals for, per 60.
    EvOffense,
    /// Even-strength on-ice expected goals against, per 60.
    EvDefense,
    /// Power-play on-ice expected goals for, per 60.
    PpOffense,
    /// Penalty-kill on-ice expected goals against, per 60.
    PpDefense,
    /// Penalties drawn minus taken, per 60 of total ice time.
    Penalty,
    /// Rebound attempts allowed per effective save (AdjRP). Lower is better.
    ReboundControl,
    /// Goals saved above expectation, regressed as a per-shot rate.
    Gsax,
}

pub const ALL_COMPONENTS: [Component; 7] = [
    Component::EvOffense,
    Component::EvDefense,
    Component::PpOffense,
    Component::PpDefense,
    Component::Penalty,
    Component::ReboundControl,
    Component::Gsax,
];

pub const SKATER_COMPONENTS: [Component; 5] = [
    Component::EvOffense,
    Component::EvDefense,
    Component::PpOffense,
    Component::PpDefense,
    Component::Penalty,
];

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::EvOffense => "ev_offense",
            Component::EvDefense => "ev_defense",
            Component::PpOffense => "pp_offense",
            Component::PpDefense => "pp_defense",
            Component::Penalty => "penalty",
            Component::ReboundControl => "rebound_control",
            Component::Gsax => "gsax",
        }
    }

    pub fn from_str(raw: &str) -> Option<Component> {
        ALL_COMPONENTS.iter().copied().find(|c| c.as_str() == raw)
    }

    pub fn direction(&self) -> Direction {
        match self {
            Component::EvOffense | Component::PpOffense | Component::Penalty | Component::Gsax => {
                Direction::HigherBetter
            }
            Component::EvDefense | Component::PpDefense | Component::ReboundControl => {
                Direction::LowerBetter
            }
        }
    }

    pub fn is_goalie(&self) -> bool {
        matches!(self, Component::ReboundControl | Component::Gsax)
    }
}

/// Scale a summed quantity into a per-60-minutes rate. `None` when there are
/// no minutes to divide by; callers treat that as a missing denominator, not
/// as zero.
pub fn per_60(sum: f64, minutes: f64) -> Option<f64> {
    if minutes > 0.0 {
        Some(sum / minutes * 60.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_parse_normalizes_feed_labels() {
        assert_eq!(Strength::parse("5v5"), Strength::Even);
        assert_eq!(Strength::parse(" EV "), Strength::Even);
        assert_eq!(Strength::parse("power-play-offense"), Strength::PowerPlay);
        assert_eq!(Strength::parse("power-play-defense"), Strength::ShortHanded);
        assert_eq!(Strength::parse("penalty-kill"), Strength::ShortHanded);
        assert_eq!(Strength::parse("3v3"), Strength::Other);
        assert_eq!(Strength::parse(""), Strength::Other);
    }

    #[test]
    fn save_requires_on_goal_and_no_goal() {
        let mut shot = ShotEvent {
            game_id: 1,
            event_idx: 0,
            season: 2024,
            period: Some(1),
            period_seconds: Some(10.0),
            team_id: 10,
            shooter_id: 100,
            goalie_id: Some(900),
            xg: Some(0.05),
            is_goal: false,
            on_goal: true,
            strength: Strength::Even,
        };
        assert!(shot.is_save());
        assert!(shot.is_faced());
        shot.is_goal = true;
        assert!(!shot.is_save());
        shot.is_goal = false;
        shot.on_goal = false;
        assert!(!shot.is_save());
        assert!(!shot.is_faced());
    }

    #[test]
    fn empty_net_is_not_faced() {
        let shot = ShotEvent {
            game_id: 1,
            event_idx: 0,
            season: 2024,
            period: Some(3),
            period_seconds: Some(1150.0),
            team_id: 10,
            shooter_id: 100,
            goalie_id: None,
            xg: Some(0.9),
            is_goal: true,
            on_goal: true,
            strength: Strength::Even,
        };
        assert!(!shot.is_faced());
    }

    #[test]
    fn per_60_scales_and_rejects_zero_minutes() {
        assert_eq!(per_60(3.0, 60.0), Some(3.0));
        assert_eq!(per_60(1.0, 30.0), Some(2.0));
        assert_eq!(per_60(1.0, 0.0), None);
        assert_eq!(per_60(1.0, -5.0), None);
    }

    #[test]
    fn component_names_round_trip() {
        for c in ALL_COMPONENTS {
            assert_eq!(Component::from_str(c.as_str()), Some(c));
        }
        assert_eq!(Component::from_str("nope"), None);
    }

    #[test]
    fn shift_cover_is_half_open() {
        let shift = ShiftInterval {
            game_id: 1,
            season: 2024,
            player_id: 5,
            team_id: 10,
            period: 2,
            start_seconds: 100.0,
            end_seconds: 145.0,
        };
        assert!(shift.covers(2, 100.0));
        assert!(shift.covers(2, 144.9));
        assert!(!shift.covers(2, 145.0));
        assert!(!shift.covers(1, 120.0));
    }
}
