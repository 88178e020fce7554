//! Simulation tuning.
//!
//! [`SimConfig`] holds every constant the systems read. All fields have
//! defaults, so a config file only needs to name what it overrides. Config
//! files are RON; levels may further override the battle fields (see
//! [`LevelData`](crate::level::LevelData)).

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed};

/// Tunable constants for a battle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Radius within which a blocker claims enemies.
    #[serde(with = "fixed_serde")]
    pub block_radius: Fixed,
    /// Distance at which an enemy counts as having reached a waypoint.
    #[serde(with = "fixed_serde")]
    pub arrival_epsilon: Fixed,
    /// Seconds before the first wave starts.
    #[serde(with = "fixed_serde")]
    pub first_wave_delay: Fixed,
    /// Seconds between the end of one wave and the start of the next.
    #[serde(with = "fixed_serde")]
    pub wave_interval: Fixed,
    /// Enemies that may reach home before defeat.
    pub home_hp: u32,
    /// Cost available when the battle starts.
    #[serde(with = "fixed_serde")]
    pub initial_cost: Fixed,
    /// Base cost regeneration per second.
    #[serde(with = "fixed_serde")]
    pub cost_gen_per_second: Fixed,
    /// Share of a unit's cost refunded on retreat.
    #[serde(with = "fixed_serde")]
    pub retreat_refund_ratio: Fixed,
    /// Flight time for ranged attacks without a projectile blueprint.
    #[serde(with = "fixed_serde")]
    pub default_projectile_flight_time: Fixed,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            block_radius: Fixed::from_num(24),
            arrival_epsilon: Fixed::ONE / Fixed::from_num(100),
            first_wave_delay: Fixed::ZERO,
            wave_interval: Fixed::from_num(10),
            home_hp: 5,
            initial_cost: Fixed::from_num(10),
            cost_gen_per_second: Fixed::ONE,
            retreat_refund_ratio: Fixed::from_num(0.5),
            default_projectile_flight_time: Fixed::from_num(0.5),
        }
    }
}

impl SimConfig {
    /// Parse a RON config. Missing fields take their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "config".to_string(),
            message: e.to_string(),
        })
    }

    /// Render this config as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize config: {e}")))
    }
}
