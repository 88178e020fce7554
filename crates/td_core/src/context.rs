//! Battle-scoped state shared by every system and event handler.
//!
//! The [`BattleContext`] is owned by the [`Simulation`](crate::simulation::Simulation)
//! and passed by `&mut` into each system and bus handler. Only the phase
//! that owns a piece of state writes it during a tick.

use serde::{Deserialize, Serialize};

use crate::blueprint::BlueprintRegistry;
use crate::config::SimConfig;
use crate::level::{BattleRules, LevelData};
use crate::math::{fixed_serde, Fixed};
use crate::pathing::WaypointGraph;
use crate::waves::WaveState;
use crate::world::World;

/// How the battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Every spawned enemy was killed or arrived, with home still standing.
    Victory,
    /// Home health reached zero.
    Defeat,
}

/// Counters for one battle scene. Reset on restart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameStats {
    /// Spendable resource.
    #[serde(with = "fixed_serde")]
    pub cost: Fixed,
    /// Base regeneration per second.
    #[serde(with = "fixed_serde")]
    pub cost_gen_per_second: Fixed,
    /// Remaining home health.
    pub home_hp: u32,
    /// Home health at battle start.
    pub max_home_hp: u32,
    /// Enemies spawned so far.
    pub enemy_count: u32,
    /// Enemies killed in combat.
    pub enemy_killed_count: u32,
    /// Enemies that reached home.
    pub enemy_arrived_count: u32,
    /// Set once, when the battle is decided.
    pub outcome: Option<Outcome>,
}

impl GameStats {
    /// Fresh counters for the given rules.
    #[must_use]
    pub fn new(rules: &BattleRules) -> Self {
        Self {
            cost: rules.initial_cost,
            cost_gen_per_second: rules.cost_gen_per_second,
            home_hp: rules.home_hp,
            max_home_hp: rules.home_hp,
            enemy_count: 0,
            enemy_killed_count: 0,
            enemy_arrived_count: 0,
            outcome: None,
        }
    }

    /// Cost rounded down to whole units.
    #[must_use]
    pub fn whole_cost(&self) -> u32 {
        self.cost.saturating_to_num::<u32>()
    }

    /// Enemies that are no longer on the field.
    #[must_use]
    pub fn resolved_enemies(&self) -> u32 {
        self.enemy_killed_count
            .saturating_add(self.enemy_arrived_count)
    }
}

/// Everything a battle owns apart from the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleContext {
    /// Ticks completed.
    pub tick: u64,
    /// Entity store.
    pub world: World,
    /// Battle counters.
    pub stats: GameStats,
    /// Wave schedule and timers.
    pub waves: WaveState,
    /// Validated waypoint graph.
    pub graph: WaypointGraph,
    /// Unit, projectile and skill definitions.
    pub blueprints: BlueprintRegistry,
    /// Tuning constants.
    pub config: SimConfig,
}

impl BattleContext {
    /// Build a context for `level`, whose graph has already been validated.
    #[must_use]
    pub fn new(
        config: SimConfig,
        level: &LevelData,
        graph: WaypointGraph,
        blueprints: BlueprintRegistry,
    ) -> Self {
        let rules = level.rules(&config);
        Self {
            tick: 0,
            world: World::new(),
            stats: GameStats::new(&rules),
            waves: WaveState::new(level.waves.clone(), &rules),
            graph,
            blueprints,
            config,
        }
    }

    /// Discard all battle state and start `level` over. Keeps graph,
    /// blueprints and config.
    pub fn reset(&mut self, level: &LevelData) {
        let rules = level.rules(&self.config);
        self.tick = 0;
        self.world = World::new();
        self.stats = GameStats::new(&rules);
        self.waves = WaveState::new(level.waves.clone(), &rules);
    }
}
