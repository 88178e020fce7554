//! Target acquisition, facing and attack timing.
//!
//! Selection rules, nearest first with ties broken by entity id:
//!
//! | Attacker           | Candidates                                         |
//! |--------------------|----------------------------------------------------|
//! | healer             | injured allies in range, never itself              |
//! | melee / mixed unit | enemies it blocks, else enemies in range           |
//! | ranged unit        | enemies in range                                   |
//! | enemy              | its blocker, else (ranged only) players in range   |
//!
//! A target stays selected while it remains valid under the same rules;
//! otherwise a new one is acquired or the [`Target`] component is removed.

use crate::bus::Publisher;
use crate::components::{
    effective_stats, AttackTimer, BlockedBy, EnemyUnit, Facing, Injured, Orientation, PlayerKind,
    PlayerUnit, Stats, Target, Transform, Velocity,
};
use crate::context::BattleContext;
use crate::events::{
    AnimationKind, AttackEvent, HealEvent, PlayAnimationEvent, PlaySoundEvent, SoundKind,
};
use crate::factory;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::{EntityId, World};

/// What an entity fights for and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Healer,
    Player(PlayerKind),
    Enemy { ranged: bool },
}

fn role(world: &World, id: EntityId) -> Option<Role> {
    if let Some(unit) = world.try_get::<PlayerUnit>(id) {
        return Some(if unit.healer {
            Role::Healer
        } else {
            Role::Player(unit.kind)
        });
    }
    world
        .try_get::<EnemyUnit>(id)
        .map(|enemy| Role::Enemy {
            ranged: enemy.ranged,
        })
}

fn position(world: &World, id: EntityId) -> Option<Vec2Fixed> {
    world.try_get::<Transform>(id).map(|t| t.position)
}

fn in_range(origin: Vec2Fixed, range: Fixed, world: &World, target: EntityId) -> bool {
    position(world, target)
        .is_some_and(|p| p.distance_squared(origin) <= range.saturating_mul(range))
}

fn blocked_by(world: &World, enemy: EntityId, blocker: EntityId) -> bool {
    world
        .try_get::<BlockedBy>(enemy)
        .is_some_and(|link| link.blocker == blocker)
}

/// Whether `target` is still a legal target for `attacker`.
#[must_use]
pub fn is_valid_target(world: &World, attacker: EntityId, target: EntityId) -> bool {
    if attacker == target || !world.is_active(target) || !world.has::<Stats>(target) {
        return false;
    }
    let (Some(role), Some(stats), Some(origin)) = (
        role(world, attacker),
        effective_stats(world, attacker),
        position(world, attacker),
    ) else {
        return false;
    };

    match role {
        Role::Healer => {
            world.has::<PlayerUnit>(target)
                && world.has::<Injured>(target)
                && world
                    .try_get::<Stats>(target)
                    .is_some_and(|s| !s.is_full_health())
                && in_range(origin, stats.range, world, target)
        }
        Role::Player(_) => {
            world.has::<EnemyUnit>(target)
                && (blocked_by(world, target, attacker)
                    || in_range(origin, stats.range, world, target))
        }
        Role::Enemy { ranged } => {
            world.has::<PlayerUnit>(target)
                && (blocked_by(world, attacker, target)
                    || (ranged && in_range(origin, stats.range, world, target)))
        }
    }
}

/// Nearest of `candidates` to `origin`, ties broken by lower id.
fn nearest(
    world: &World,
    origin: Vec2Fixed,
    candidates: impl Iterator<Item = EntityId>,
) -> Option<EntityId> {
    candidates
        .filter_map(|id| Some((position(world, id)?.distance_squared(origin), id)))
        .min()
        .map(|(_, id)| id)
}

/// Choose a fresh target for `attacker`, if any candidate qualifies.
#[must_use]
pub fn acquire_target(world: &World, attacker: EntityId) -> Option<EntityId> {
    let role = role(world, attacker)?;
    let origin = position(world, attacker)?;
    let valid = |id: &EntityId| is_valid_target(world, attacker, *id);

    match role {
        Role::Healer => nearest(world, origin, world.query::<(PlayerUnit, Injured)>().filter(valid)),
        Role::Player(kind) => {
            let blocked = match kind {
                PlayerKind::Melee | PlayerKind::Mixed => nearest(
                    world,
                    origin,
                    world
                        .query::<(EnemyUnit, BlockedBy)>()
                        .filter(|&enemy| blocked_by(world, enemy, attacker))
                        .filter(valid),
                ),
                PlayerKind::Ranged => None,
            };
            blocked.or_else(|| nearest(world, origin, world.query::<(EnemyUnit,)>().filter(valid)))
        }
        Role::Enemy { ranged } => {
            let blocker = world
                .try_get::<BlockedBy>(attacker)
                .map(|link| link.blocker)
                .filter(valid);
            if blocker.is_some() || !ranged {
                return blocker;
            }
            nearest(world, origin, world.query::<(PlayerUnit,)>().filter(valid))
        }
    }
}

/// Keep or replace each combatant's [`Target`].
pub fn targeting_system(world: &mut World) {
    for id in world.query_sorted::<(Stats, Transform)>() {
        if !world.is_active(id) || role(world, id).is_none() {
            continue;
        }
        let current = world.try_get::<Target>(id).map(|t| t.entity);
        if current.is_some_and(|target| is_valid_target(world, id, target)) {
            continue;
        }
        match acquire_target(world, id) {
            Some(entity) => {
                if current != Some(entity) {
                    tracing::trace!(entity = id, target = entity, "target acquired");
                }
                if let Err(err) = world.attach(id, Target { entity }) {
                    tracing::error!(entity = id, error = %err, "failed to set target");
                }
            }
            None => {
                world.detach::<Target>(id);
            }
        }
    }
}

/// Face the current target, else the direction of travel.
pub fn orientation_system(world: &mut World) {
    for id in world.query_sorted::<(Orientation, Transform)>() {
        if !world.is_active(id) {
            continue;
        }
        let dx = match world.try_get::<Target>(id) {
            Some(target) => match (position(world, target.entity), position(world, id)) {
                (Some(to), Some(from)) => to.x - from.x,
                _ => Fixed::ZERO,
            },
            None => world
                .try_get::<Velocity>(id)
                .map_or(Fixed::ZERO, |v| v.value.x),
        };
        let facing = if dx < Fixed::ZERO {
            Facing::Left
        } else if dx > Fixed::ZERO {
            Facing::Right
        } else {
            continue;
        };
        if let Some(orientation) = world.try_get_mut::<Orientation>(id) {
            orientation.facing = facing;
        }
    }
}

/// How a ready attacker delivers its hit.
enum Delivery {
    Heal,
    Projectile(Option<String>),
    Direct,
}

fn delivery(world: &World, attacker: EntityId, target: EntityId) -> Delivery {
    if let Some(unit) = world.try_get::<PlayerUnit>(attacker) {
        if unit.healer {
            return Delivery::Heal;
        }
        let shoots = match unit.kind {
            PlayerKind::Melee => false,
            PlayerKind::Ranged => true,
            PlayerKind::Mixed => !blocked_by(world, target, attacker),
        };
        if shoots {
            return Delivery::Projectile(unit.projectile.clone());
        }
        return Delivery::Direct;
    }
    match world.try_get::<EnemyUnit>(attacker) {
        Some(enemy) if enemy.ranged && !blocked_by(world, attacker, target) => {
            Delivery::Projectile(enemy.projectile.clone())
        }
        _ => Delivery::Direct,
    }
}

/// Count attack timers down and fire at valid targets.
///
/// Direct hits and heals are published for the combat handlers; ranged
/// attacks spawn a projectile that delivers its [`AttackEvent`] on impact.
pub fn attack_system(ctx: &mut BattleContext, dt: Fixed, out: &mut Publisher) {
    for attacker in ctx.world.query_sorted::<(AttackTimer, Stats)>() {
        if !ctx.world.is_active(attacker) {
            continue;
        }
        let Some(timer) = ctx.world.try_get_mut::<AttackTimer>(attacker) else {
            continue;
        };
        timer.remaining = (timer.remaining - dt).max(Fixed::ZERO);
        if timer.remaining > Fixed::ZERO {
            continue;
        }

        let Some(target) = ctx.world.try_get::<Target>(attacker).map(|t| t.entity) else {
            continue;
        };
        if !is_valid_target(&ctx.world, attacker, target) {
            continue;
        }
        let Some(stats) = effective_stats(&ctx.world, attacker) else {
            continue;
        };

        let sound = match delivery(&ctx.world, attacker, target) {
            Delivery::Heal => {
                out.publish(HealEvent {
                    healer: attacker,
                    target,
                    amount: stats.atk,
                });
                SoundKind::Heal
            }
            Delivery::Projectile(projectile) => {
                if let Err(err) = factory::spawn_projectile(
                    ctx,
                    attacker,
                    target,
                    stats.atk,
                    projectile.as_deref(),
                ) {
                    tracing::error!(attacker, target, error = %err, "projectile launch failed");
                    continue;
                }
                SoundKind::Attack
            }
            Delivery::Direct => {
                out.publish(AttackEvent {
                    attacker,
                    target,
                    damage: stats.atk,
                });
                SoundKind::Attack
            }
        };
        out.publish(PlayAnimationEvent {
            entity: attacker,
            animation: AnimationKind::Attack,
        });
        out.publish(PlaySoundEvent {
            entity: Some(attacker),
            sound,
        });

        if let Some(timer) = ctx.world.try_get_mut::<AttackTimer>(attacker) {
            timer.remaining = stats.atk_interval;
        }
    }
}
