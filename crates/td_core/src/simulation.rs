//! Battle driver.
//!
//! A [`Simulation`] owns one battle: the [`BattleContext`] and the
//! [`EventBus`] its handlers hang off. Each call to [`Simulation::tick`]
//! runs the systems in a fixed order and then flushes the bus.
//!
//! # Determinism
//!
//! - All arithmetic is fixed-point ([`Fixed`]).
//! - Systems iterate entities in ascending id order.
//! - Handlers run in subscription order, events in publish order.
//! - No randomness, clocks or I/O inside a tick.
//!
//! Two simulations built from the same data and fed the same Δt sequence
//! and requests produce identical [`state_hash`](Simulation::state_hash)
//! values on every tick.
//!
//! # Example
//!
//! ```
//! use td_core::blueprint::BlueprintRegistry;
//! use td_core::config::SimConfig;
//! use td_core::level::LevelData;
//! use td_core::math::Fixed;
//! use td_core::simulation::Simulation;
//!
//! let level = LevelData::from_json(
//!     "level",
//!     r#"{ "waypoints": { "0": { "x": 0, "y": 0, "next": 1 },
//!                         "1": { "x": 10, "y": 0 } },
//!          "start_nodes": [0] }"#,
//! )
//! .unwrap();
//! let mut sim = Simulation::new(SimConfig::default(), level, BlueprintRegistry::new()).unwrap();
//!
//! let events = sim.tick(Fixed::ONE);
//! assert_eq!(events.tick, 0);
//! assert_eq!(sim.tick_count(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::blueprint::BlueprintRegistry;
use crate::bus::{EventBus, OwnerId, Publisher, SubscriptionId};
use crate::combat;
use crate::components::{BlockedBy, Blocker, Stats};
use crate::config::SimConfig;
use crate::context::{BattleContext, GameStats};
use crate::error::{GameError, Result};
use crate::events::{BusEvent, Event, EventKind};
use crate::level::LevelData;
use crate::lifecycle;
use crate::math::{Fixed, Vec2Fixed};
use crate::pathing;
use crate::progression;
use crate::projectile;
use crate::rules;
use crate::skills;
use crate::targeting;
use crate::waves::{self, WaveState};
use crate::world::{EntityId, World};

/// Ticks per second for real-time play.
pub const TICK_RATE: u32 = 20;

/// Δt of one tick at [`TICK_RATE`].
#[must_use]
pub fn tick_duration() -> Fixed {
    Fixed::ONE / Fixed::from_num(TICK_RATE)
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Index of the tick that produced these events.
    pub tick: u64,
    /// Entities destroyed by the sweep at the start of the tick.
    pub removed: Vec<EntityId>,
    /// Events dispatched by this tick's flush, in publish order.
    pub events: Vec<Event>,
}

impl TickEvents {
    /// Payloads of type `E`, in publish order.
    #[must_use]
    pub fn of<E: BusEvent>(&self) -> Vec<&E> {
        self.events.iter().filter_map(E::extract).collect()
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    ctx: BattleContext,
    level: LevelData,
    pending: Vec<Event>,
}

/// One battle scene.
///
/// # System order
///
/// 1. Lifecycle sweep (destroy entities tagged dead last tick)
/// 2. Wave spawner, resource regeneration, level-clear check
/// 3. Skill timers
/// 4. Blocking
/// 5. Path following
/// 6. Targeting, then orientation
/// 7. Attack timing
/// 8. Projectile flight
/// 9. Bus flush: combat, rules, progression and skill handlers, then any
///    external subscribers
#[derive(Debug)]
pub struct Simulation {
    ctx: BattleContext,
    bus: EventBus<BattleContext>,
    level: LevelData,
}

impl Simulation {
    /// Set up a battle for `level`.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidLevel`] if the waypoint graph or a wave entry is
    /// invalid.
    pub fn new(config: SimConfig, level: LevelData, blueprints: BlueprintRegistry) -> Result<Self> {
        let graph = level.validate()?;
        for problem in blueprints.dangling_references() {
            tracing::warn!(%problem, "blueprint references unknown data");
        }
        let ctx = BattleContext::new(config, &level, graph, blueprints);
        tracing::info!(
            level = %level.name,
            waves = level.waves.len(),
            enemies = level.enemy_total(),
            "battle created"
        );
        Ok(Self {
            ctx,
            bus: core_bus(),
            level,
        })
    }

    /// Advance the battle by `dt` seconds.
    ///
    /// A negative `dt` is treated as zero. Never fails: per-entity problems
    /// are logged and skipped.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let dt = if dt < Fixed::ZERO {
            tracing::warn!(dt = %dt, "negative dt clamped to zero");
            Fixed::ZERO
        } else {
            dt
        };
        let tick = self.ctx.tick;
        let mut out = Publisher::default();

        let removed = lifecycle::sweep_dead(&mut self.ctx.world);
        waves::spawn_system(&mut self.ctx, dt, &mut out);
        rules::resource_system(&mut self.ctx, dt);
        rules::level_clear_system(&mut self.ctx, &mut out);
        skills::skill_system(&mut self.ctx, dt);
        pathing::blocking_system(&mut self.ctx, &mut out);
        pathing::path_system(&mut self.ctx, dt, &mut out);
        targeting::targeting_system(&mut self.ctx.world);
        targeting::orientation_system(&mut self.ctx.world);
        targeting::attack_system(&mut self.ctx, dt, &mut out);
        projectile::projectile_system(&mut self.ctx, dt, &mut out);

        self.bus.publish_all(&mut out);
        let events = self.bus.flush(&mut self.ctx);
        self.ctx.tick += 1;

        #[cfg(feature = "debug-validation")]
        {
            if let Err(err) = self.check_invariants() {
                tracing::error!(tick, error = %err, "invariant violated");
            }
        }
        tracing::debug!(
            tick,
            entities = self.ctx.world.len(),
            events = events.len(),
            state_hash = self.state_hash(),
            "tick complete"
        );

        TickEvents {
            tick,
            removed,
            events,
        }
    }

    /// Pay for and place a player unit.
    ///
    /// # Errors
    ///
    /// See [`progression::deploy_player`].
    pub fn deploy_player(
        &mut self,
        class: &str,
        position: Vec2Fixed,
        level: u32,
        rarity: u32,
    ) -> Result<EntityId> {
        progression::deploy_player(&mut self.ctx, class, position, level, rarity)
    }

    /// Place an enemy outside the wave schedule. It counts towards the
    /// level-clear total like a wave spawn.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidLevel`] if `start` is not a waypoint.
    pub fn spawn_enemy(&mut self, class: &str, start: u32, level: u32, rarity: u32) -> Result<EntityId> {
        let id = crate::factory::spawn_enemy(&mut self.ctx, class, start, level, rarity)?;
        self.ctx.stats.enemy_count += 1;
        Ok(id)
    }

    /// Queue an event (typically a request such as
    /// [`UpgradeUnitEvent`](crate::events::UpgradeUnitEvent)) for the next flush.
    pub fn publish(&mut self, event: impl Into<Event>) {
        self.bus.publish(event);
    }

    /// Subscribe an external handler.
    pub fn subscribe<E, F>(&mut self, owner: OwnerId, handler: F) -> SubscriptionId
    where
        E: BusEvent,
        F: FnMut(&E, &mut BattleContext, &mut Publisher) + Send + 'static,
    {
        self.bus.subscribe(owner, handler)
    }

    /// Remove every handler registered by `owner`.
    pub fn disconnect(&mut self, owner: OwnerId) -> usize {
        self.bus.disconnect_all(owner)
    }

    /// Start the same level over. Subscriptions survive; queued events do not.
    pub fn restart(&mut self) {
        let pending = self.bus.pending();
        self.bus.clear_pending();
        self.ctx.reset(&self.level);
        tracing::info!(level = %self.level.name, dropped_events = pending, "battle restarted");
    }

    /// Disconnect every handler, including the core ones.
    pub fn teardown(&mut self) {
        self.bus.clear();
        tracing::info!(level = %self.level.name, "battle torn down");
    }

    /// Entity store.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.ctx.world
    }

    /// Battle counters.
    #[must_use]
    pub fn stats(&self) -> &GameStats {
        &self.ctx.stats
    }

    /// Wave schedule.
    #[must_use]
    pub fn waves(&self) -> &WaveState {
        &self.ctx.waves
    }

    /// Full battle context.
    #[must_use]
    pub fn context(&self) -> &BattleContext {
        &self.ctx
    }

    /// Level this battle was built from.
    #[must_use]
    pub fn level(&self) -> &LevelData {
        &self.level
    }

    /// Ticks completed.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ctx.tick
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.bus.pending()
    }

    /// Deterministic hash of all battle state.
    ///
    /// Covers the tick counter, every live entity with its components,
    /// the counters and the wave timers. Blueprints, graph and config are
    /// fixed for a battle and are left out.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.ctx.tick.hash(&mut hasher);
        self.ctx.world.hash_into(&mut hasher);
        self.ctx.stats.hash(&mut hasher);
        self.ctx.waves.hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the battle (context, level and queued events).
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] if encoding fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let snapshot = Snapshot {
            ctx: self.ctx.clone(),
            level: self.level.clone(),
            pending: self.bus.pending_events(),
        };
        bincode::serialize(&snapshot)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize battle: {e}")))
    }

    /// Restore a battle from [`snapshot`](Self::snapshot) bytes.
    ///
    /// Only the core handlers are re-registered; external subscribers must
    /// subscribe again.
    ///
    /// # Errors
    ///
    /// [`GameError::DataParseError`] if the bytes do not decode.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot =
            bincode::deserialize(bytes).map_err(|e| GameError::DataParseError {
                path: "snapshot".to_string(),
                message: e.to_string(),
            })?;
        let mut bus = core_bus();
        for event in snapshot.pending {
            bus.publish(event);
        }
        Ok(Self {
            ctx: snapshot.ctx,
            bus,
            level: snapshot.level,
        })
    }

    /// Check health bounds and blocker bookkeeping.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidState`] describing the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        let world = &self.ctx.world;
        for (id, stats) in world.iter::<Stats>() {
            if stats.hp < Fixed::ZERO || stats.hp > stats.max_hp {
                return Err(GameError::InvalidState(format!(
                    "entity {id} hp {} outside 0..={}",
                    stats.hp, stats.max_hp
                )));
            }
        }
        for (id, blocker) in world.iter::<Blocker>() {
            let held = world
                .iter::<BlockedBy>()
                .filter(|(_, link)| link.blocker == id)
                .count();
            if blocker.current_count > blocker.max_count || held != blocker.current_count as usize {
                return Err(GameError::InvalidState(format!(
                    "blocker {id} holds {held} with count {}/{}",
                    blocker.current_count, blocker.max_count
                )));
            }
        }
        for (enemy, link) in world.iter::<BlockedBy>() {
            if !world.has::<Blocker>(link.blocker) {
                return Err(GameError::InvalidState(format!(
                    "enemy {enemy} blocked by missing blocker {}",
                    link.blocker
                )));
            }
        }
        Ok(())
    }
}

/// Bus with the core gameplay handlers registered under [`OwnerId::CORE`].
fn core_bus() -> EventBus<BattleContext> {
    let mut bus = EventBus::new();
    bus.subscribe(OwnerId::CORE, combat::on_attack);
    bus.subscribe(OwnerId::CORE, combat::on_heal);
    bus.subscribe(OwnerId::CORE, rules::on_enemy_arrive_home);
    bus.subscribe(OwnerId::CORE, progression::on_upgrade);
    bus.subscribe(OwnerId::CORE, progression::on_retreat);
    bus.subscribe(OwnerId::CORE, skills::on_activate_skill);
    bus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Dead, Transform};
    use crate::events::{EnemyArriveHomeEvent, GameEndEvent};
    use std::sync::{Arc, Mutex};

    fn level(json: &str) -> LevelData {
        LevelData::from_json("level", json).unwrap()
    }

    fn straight(length: i32) -> LevelData {
        level(&format!(
            r#"{{ "waypoints": {{ "0": {{ "x": 0, "y": 0, "next": 1 }},
                                 "1": {{ "x": {length}, "y": 0 }} }},
                 "start_nodes": [0], "home_hp": 1 }}"#
        ))
    }

    fn blueprints() -> BlueprintRegistry {
        let mut registry = BlueprintRegistry::new();
        registry
            .load_enemies_json(
                "enemies",
                r#"{ "walker": { "hp": 10, "atk": 1, "def": 0, "range": 1,
                                  "atk_interval": 1, "speed": 1 } }"#,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let bad = level(r#"{ "waypoints": { "0": { "x": 0, "y": 0, "next": 9 } }, "start_nodes": [0] }"#);
        assert!(Simulation::new(SimConfig::default(), bad, blueprints()).is_err());
    }

    #[test]
    fn test_arrival_is_destroyed_next_tick() {
        let mut sim = Simulation::new(SimConfig::default(), straight(3), blueprints()).unwrap();
        let enemy = sim.spawn_enemy("walker", 0, 1, 1).unwrap();

        for _ in 0..2 {
            assert!(sim.tick(Fixed::ONE).of::<EnemyArriveHomeEvent>().is_empty());
        }
        let events = sim.tick(Fixed::ONE);
        assert_eq!(events.of::<EnemyArriveHomeEvent>().len(), 1);
        assert!(sim.world().has::<Dead>(enemy));
        assert_eq!(sim.stats().home_hp, 0);

        let events = sim.tick(Fixed::ONE);
        assert_eq!(events.removed, vec![enemy]);
        assert_eq!(events.of::<GameEndEvent>().len(), 1);
        assert!(!sim.world().is_valid(enemy));
    }

    #[test]
    fn test_negative_dt_is_clamped() {
        let mut sim = Simulation::new(SimConfig::default(), straight(3), blueprints()).unwrap();
        let enemy = sim.spawn_enemy("walker", 0, 1, 1).unwrap();
        sim.tick(Fixed::from_num(-5));
        assert_eq!(
            sim.world().get::<Transform>(enemy).unwrap().position,
            Vec2Fixed::ZERO
        );
    }

    #[test]
    fn test_restart_keeps_subscriptions() {
        let mut sim = Simulation::new(SimConfig::default(), straight(1), blueprints()).unwrap();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        sim.subscribe(OwnerId(7), move |_: &EnemyArriveHomeEvent, _: &mut BattleContext, _: &mut Publisher| {
            *counter.lock().unwrap() += 1;
        });

        sim.spawn_enemy("walker", 0, 1, 1).unwrap();
        sim.tick(Fixed::ONE);
        sim.restart();
        assert!(sim.world().is_empty());
        assert_eq!(sim.tick_count(), 0);

        sim.spawn_enemy("walker", 0, 1, 1).unwrap();
        sim.tick(Fixed::ONE);
        assert_eq!(*seen.lock().unwrap(), 2);

        assert_eq!(sim.disconnect(OwnerId(7)), 1);
    }

    #[test]
    fn test_snapshot_round_trip_preserves_hash() {
        let mut sim = Simulation::new(SimConfig::default(), straight(5), blueprints()).unwrap();
        sim.spawn_enemy("walker", 0, 1, 1).unwrap();
        sim.tick(Fixed::ONE);

        let bytes = sim.snapshot().unwrap();
        let mut restored = Simulation::from_snapshot(&bytes).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());

        for _ in 0..5 {
            sim.tick(Fixed::ONE);
            restored.tick(Fixed::ONE);
            assert_eq!(restored.state_hash(), sim.state_hash());
        }
        assert!(Simulation::from_snapshot(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_tick_duration() {
        let second = tick_duration() * Fixed::from_num(TICK_RATE);
        assert!(second <= Fixed::ONE);
        assert!(Fixed::ONE - second < Fixed::from_num(0.001));
    }
}
