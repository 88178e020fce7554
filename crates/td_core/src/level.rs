//! Level layout and wave schedule.
//!
//! A level is parsed from JSON once at scene setup and validated with
//! [`LevelData::validate`]; any problem there is fatal and the battle never
//! starts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::pathing::{NodeId, Waypoint, WaypointGraph};

fn first() -> u32 {
    1
}

/// A waypoint as written in level data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaypointData {
    /// X position.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y position.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Following node; absent on the home node.
    #[serde(default)]
    pub next: Option<NodeId>,
}

/// One enemy in a wave.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpawnEntry {
    /// Enemy blueprint class.
    pub enemy: String,
    /// Seconds after the previous entry (or wave start) before spawning.
    #[serde(with = "fixed_serde", default)]
    pub delay: Fixed,
    /// Start node to spawn on.
    pub start: NodeId,
    /// Enemy level.
    #[serde(default = "first")]
    pub level: u32,
    /// Enemy rarity.
    #[serde(default = "first")]
    pub rarity: u32,
}

/// An ordered batch of spawns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveData {
    /// Entries in spawn order.
    pub entries: Vec<SpawnEntry>,
}

/// Battle constants after applying level overrides to a [`SimConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleRules {
    /// Seconds before the first wave.
    #[serde(with = "fixed_serde")]
    pub first_wave_delay: Fixed,
    /// Seconds between waves.
    #[serde(with = "fixed_serde")]
    pub wave_interval: Fixed,
    /// Starting home health.
    pub home_hp: u32,
    /// Starting cost.
    #[serde(with = "fixed_serde")]
    pub initial_cost: Fixed,
    /// Base cost regeneration per second.
    #[serde(with = "fixed_serde")]
    pub cost_gen_per_second: Fixed,
}

/// A level file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelData {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Waypoint graph, keyed by node id.
    pub waypoints: BTreeMap<NodeId, WaypointData>,
    /// Nodes enemies may spawn on.
    pub start_nodes: Vec<NodeId>,
    /// Waves in order.
    #[serde(default)]
    pub waves: Vec<WaveData>,
    /// Overrides [`SimConfig::first_wave_delay`].
    #[serde(default, with = "option_fixed_serde")]
    pub first_wave_delay: Option<Fixed>,
    /// Overrides [`SimConfig::wave_interval`].
    #[serde(default, with = "option_fixed_serde")]
    pub wave_interval: Option<Fixed>,
    /// Overrides [`SimConfig::home_hp`].
    #[serde(default)]
    pub home_hp: Option<u32>,
    /// Overrides [`SimConfig::initial_cost`].
    #[serde(default, with = "option_fixed_serde")]
    pub initial_cost: Option<Fixed>,
    /// Overrides [`SimConfig::cost_gen_per_second`].
    #[serde(default, with = "option_fixed_serde")]
    pub cost_gen_per_second: Option<Fixed>,
}

impl LevelData {
    /// Parse a level from JSON. `source` names the data in errors.
    pub fn from_json(source: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GameError::DataParseError {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Build and validate the waypoint graph.
    pub fn graph(&self) -> Result<WaypointGraph> {
        let nodes = self
            .waypoints
            .iter()
            .map(|(&id, data)| {
                (
                    id,
                    Waypoint {
                        position: Vec2Fixed::new(data.x, data.y),
                        next: data.next,
                    },
                )
            })
            .collect();
        WaypointGraph::new(nodes, self.start_nodes.clone())
    }

    /// Validate the graph and every wave entry's start node.
    pub fn validate(&self) -> Result<WaypointGraph> {
        let graph = self.graph()?;
        for (wave, data) in self.waves.iter().enumerate() {
            for entry in &data.entries {
                if graph.node(entry.start).is_none() {
                    return Err(GameError::InvalidLevel(format!(
                        "wave {wave} spawns '{}' on unknown node {}",
                        entry.enemy, entry.start
                    )));
                }
                if entry.delay < Fixed::ZERO {
                    return Err(GameError::InvalidLevel(format!(
                        "wave {wave} has a negative spawn delay"
                    )));
                }
            }
        }
        Ok(graph)
    }

    /// Resolve battle constants: level overrides first, then `config`.
    #[must_use]
    pub fn rules(&self, config: &SimConfig) -> BattleRules {
        BattleRules {
            first_wave_delay: self.first_wave_delay.unwrap_or(config.first_wave_delay),
            wave_interval: self.wave_interval.unwrap_or(config.wave_interval),
            home_hp: self.home_hp.unwrap_or(config.home_hp),
            initial_cost: self.initial_cost.unwrap_or(config.initial_cost),
            cost_gen_per_second: self
                .cost_gen_per_second
                .unwrap_or(config.cost_gen_per_second),
        }
    }

    /// Total enemies across every wave.
    #[must_use]
    pub fn enemy_total(&self) -> usize {
        self.waves.iter().map(|wave| wave.entries.len()).sum()
    }
}
