//! Component definitions stored in the [`World`](crate::world::World).
//!
//! Components are plain data: systems in the other modules read and write
//! them. Relations between entities (targets, blockers, projectile
//! endpoints) are stored as [`EntityId`] values, never as references, and
//! are validated before use.

use serde::{Deserialize, Serialize};

use crate::blueprint::{stat_modify, StatsBlueprint};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::pathing::NodeId;
use crate::world::{EntityId, World};

// ============================================================================
// Spatial
// ============================================================================

/// Position, rotation and scale of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec2Fixed,
    /// Rotation in radians.
    #[serde(with = "fixed_serde")]
    pub rotation: Fixed,
    /// Render scale.
    pub scale: Vec2Fixed,
}

impl Transform {
    /// Unrotated, unit-scale transform at `position`.
    #[must_use]
    pub fn at(position: Vec2Fixed) -> Self {
        Self {
            position,
            rotation: Fixed::ZERO,
            scale: Vec2Fixed::new(Fixed::ONE, Fixed::ONE),
        }
    }
}

/// Movement applied during the last tick, in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Velocity {
    /// Velocity vector.
    pub value: Vec2Fixed,
}

/// Horizontal facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Facing negative x.
    Left,
    /// Facing positive x.
    #[default]
    Right,
}

/// Facing derived each tick from target or movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Current facing.
    pub facing: Facing,
}

// ============================================================================
// Combat
// ============================================================================

/// Combat statistics.
///
/// `hp` is only written by combat resolution; `level`, `rarity` and the
/// derived maxima only by the upgrade handler. Invariant: `0 <= hp <= max_hp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stats {
    /// Current health.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub max_hp: Fixed,
    /// Attack (or heal amount for healers).
    #[serde(with = "fixed_serde")]
    pub atk: Fixed,
    /// Defense.
    #[serde(with = "fixed_serde")]
    pub def: Fixed,
    /// Attack range in world units.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_serde")]
    pub atk_interval: Fixed,
    /// Unit level (1-based).
    pub level: u32,
    /// Unit rarity (1-based).
    pub rarity: u32,
}

impl Stats {
    /// Stats scaled from a blueprint for the given level and rarity, at full health.
    #[must_use]
    pub fn scaled(base: &StatsBlueprint, level: u32, rarity: u32) -> Self {
        let max_hp = stat_modify(base.hp, level, rarity);
        Self {
            hp: max_hp,
            max_hp,
            atk: stat_modify(base.atk, level, rarity),
            def: stat_modify(base.def, level, rarity),
            range: base.range,
            atk_interval: base.atk_interval,
            level,
            rarity,
        }
    }

    /// Whether `hp` has reached `max_hp`.
    #[must_use]
    pub fn is_full_health(&self) -> bool {
        self.hp >= self.max_hp
    }

    /// Stats with a skill buff applied. `hp`/`max_hp` are not scaled.
    #[must_use]
    pub fn buffed(&self, buff: &Buff) -> Self {
        Self {
            atk: self.atk.saturating_mul(buff.atk),
            def: self.def.saturating_mul(buff.def),
            range: self.range.saturating_mul(buff.range),
            atk_interval: self.atk_interval.saturating_mul(buff.atk_interval),
            ..*self
        }
    }
}

/// Stats of `id` with its active [`Buff`] applied, if it has [`Stats`].
#[must_use]
pub fn effective_stats(world: &World, id: EntityId) -> Option<Stats> {
    let stats = world.try_get::<Stats>(id)?;
    Some(match world.try_get::<Buff>(id) {
        Some(buff) => stats.buffed(buff),
        None => *stats,
    })
}

/// Remaining cooldown before the next attack, seeded from `atk_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackTimer {
    /// Seconds until the unit may attack again.
    #[serde(with = "fixed_serde")]
    pub remaining: Fixed,
}

/// Current attack or heal target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Targeted entity.
    pub entity: EntityId,
}

/// A projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projectile {
    /// Entity that fired the projectile.
    pub source: EntityId,
    /// Entity the projectile is homing on.
    pub target: EntityId,
    /// Launch position.
    pub start: Vec2Fixed,
    /// Last known target position (kept when the target disappears).
    pub target_position: Vec2Fixed,
    /// Attack value delivered on impact.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Seconds in flight so far.
    #[serde(with = "fixed_serde")]
    pub elapsed: Fixed,
    /// Total seconds from launch to impact.
    #[serde(with = "fixed_serde")]
    pub flight_time: Fixed,
    /// Peak height of the arc above the straight line.
    #[serde(with = "fixed_serde")]
    pub arc_height: Fixed,
}

// ============================================================================
// Blocking
// ============================================================================

/// Melee lane capacity of a defending unit.
///
/// Invariant: `current_count <= max_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blocker {
    /// Enemies currently held.
    pub current_count: u32,
    /// Maximum enemies held at once.
    pub max_count: u32,
    /// Claim radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
}

impl Blocker {
    /// Empty blocker.
    #[must_use]
    pub fn new(max_count: u32, radius: Fixed) -> Self {
        Self {
            current_count: 0,
            max_count,
            radius,
        }
    }

    /// Number of further enemies this blocker may claim.
    #[must_use]
    pub fn spare(&self) -> u32 {
        self.max_count.saturating_sub(self.current_count)
    }
}

/// Non-owning back-reference from a blocked enemy to its blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockedBy {
    /// The blocker holding this enemy.
    pub blocker: EntityId,
}

// ============================================================================
// Factions
// ============================================================================

/// Attack style of a player unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Hits adjacent (blocked or in-range) enemies directly.
    #[default]
    Melee,
    /// Fires projectiles.
    Ranged,
    /// Melee against enemies it blocks, projectiles otherwise.
    Mixed,
}

/// Marks a deployable defending unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerUnit {
    /// Blueprint class name.
    pub class: String,
    /// Attack style.
    pub kind: PlayerKind,
    /// Heals allies instead of attacking.
    pub healer: bool,
    /// Deployment cost.
    pub cost: u32,
    /// Projectile blueprint for ranged attacks.
    pub projectile: Option<String>,
}

/// Marks a path-walking enemy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyUnit {
    /// Blueprint class name.
    pub class: String,
    /// Attacks players in range with projectiles.
    pub ranged: bool,
    /// Projectile blueprint for ranged attacks.
    pub projectile: Option<String>,
}

/// Cursor into the waypoint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathFollower {
    /// Node the enemy is walking towards.
    pub target_node: NodeId,
    /// Units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
}

// ============================================================================
// Skills
// ============================================================================

/// Multiplicative stat modifiers granted by an active skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buff {
    /// Heal on activation: `(hp - 1) * max_hp`.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Attack multiplier.
    #[serde(with = "fixed_serde")]
    pub atk: Fixed,
    /// Defense multiplier.
    #[serde(with = "fixed_serde")]
    pub def: Fixed,
    /// Range multiplier.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Attack interval multiplier.
    #[serde(with = "fixed_serde")]
    pub atk_interval: Fixed,
    /// Cost regenerated per second while active.
    #[serde(with = "fixed_serde")]
    pub cost_regen: Fixed,
}

impl Default for Buff {
    fn default() -> Self {
        Self {
            hp: Fixed::ONE,
            atk: Fixed::ONE,
            def: Fixed::ONE,
            range: Fixed::ONE,
            atk_interval: Fixed::ONE,
            cost_regen: Fixed::ZERO,
        }
    }
}

/// A unit's skill and its timers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skill {
    /// Skill blueprint id.
    pub id: String,
    /// Always active from spawn.
    pub passive: bool,
    /// Seconds to charge before the skill is ready.
    #[serde(with = "fixed_serde")]
    pub cooldown: Fixed,
    /// Seconds the skill stays active.
    #[serde(with = "fixed_serde")]
    pub duration: Fixed,
    /// Charge accumulated since the last activation.
    #[serde(with = "fixed_serde")]
    pub cooldown_timer: Fixed,
    /// Time spent active.
    #[serde(with = "fixed_serde")]
    pub duration_timer: Fixed,
    /// Buff attached while active.
    pub effect: Buff,
}

/// Per-unit cost regeneration, summed by the resource rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostRegen {
    /// Cost per second.
    #[serde(with = "fixed_serde")]
    pub rate: Fixed,
}

// ============================================================================
// Status tags
// ============================================================================

/// Below maximum health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Injured;

/// Terminal state. Inert to every gameplay system until swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dead;

/// Skill charged and waiting for activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SkillReady;

/// Skill currently applying its buff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SkillActive;
