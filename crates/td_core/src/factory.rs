//! Entity construction from blueprints.

use crate::blueprint::ProjectileBlueprint;
use crate::components::{
    AttackTimer, Blocker, CostRegen, EnemyUnit, Orientation, PathFollower, PlayerUnit,
    Projectile, Skill, SkillActive, Stats, Transform, Velocity,
};
use crate::context::BattleContext;
use crate::error::{GameError, Result};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathing::NodeId;
use crate::world::EntityId;

/// Create a player unit of `class` at `position`.
///
/// Unknown classes fall back (with an error log) to a default blueprint.
/// Does not charge cost; see [`crate::progression::deploy_player`].
pub fn spawn_player(
    ctx: &mut BattleContext,
    class: &str,
    position: Vec2Fixed,
    level: u32,
    rarity: u32,
) -> Result<EntityId> {
    let blueprint = ctx.blueprints.player_or_fallback(class);
    let stats = Stats::scaled(&blueprint.stats(), level, rarity);
    let skill = match blueprint.skill.as_deref() {
        Some(id) => match ctx.blueprints.skill(id) {
            Ok(skill) => Some(Skill {
                id: id.to_string(),
                passive: skill.passive,
                cooldown: skill.cooldown,
                duration: skill.duration,
                cooldown_timer: Fixed::ZERO,
                duration_timer: Fixed::ZERO,
                effect: skill.buff(),
            }),
            Err(err) => {
                tracing::error!(class, error = %err, "unit spawned without its skill");
                None
            }
        },
        None => None,
    };

    let world = &mut ctx.world;
    let id = world.create();
    world.attach(id, Transform::at(position))?;
    world.attach(id, stats)?;
    world.attach(
        id,
        AttackTimer {
            remaining: stats.atk_interval,
        },
    )?;
    world.attach(id, Orientation::default())?;
    world.attach(
        id,
        PlayerUnit {
            class: class.to_string(),
            kind: blueprint.kind,
            healer: blueprint.healer,
            cost: blueprint.cost,
            projectile: blueprint.projectile.clone(),
        },
    )?;
    if blueprint.block > 0 {
        world.attach(id, Blocker::new(blueprint.block, ctx.config.block_radius))?;
    }
    if let Some(skill) = skill {
        if skill.passive {
            world.attach(id, SkillActive)?;
            world.attach(id, skill.effect)?;
            if skill.effect.cost_regen > Fixed::ZERO {
                world.attach(
                    id,
                    CostRegen {
                        rate: skill.effect.cost_regen,
                    },
                )?;
            }
        }
        world.attach(id, skill)?;
    }

    tracing::debug!(entity = id, class, level, rarity, "player unit spawned");
    Ok(id)
}

/// Create an enemy of `class` on waypoint `start`, walking towards the
/// node after it.
pub fn spawn_enemy(
    ctx: &mut BattleContext,
    class: &str,
    start: NodeId,
    level: u32,
    rarity: u32,
) -> Result<EntityId> {
    let node = *ctx
        .graph
        .node(start)
        .ok_or_else(|| GameError::InvalidLevel(format!("unknown start node {start}")))?;
    let blueprint = ctx.blueprints.enemy_or_fallback(class);
    let stats = Stats::scaled(&blueprint.stats(), level, rarity);

    let world = &mut ctx.world;
    let id = world.create();
    world.attach(id, Transform::at(node.position))?;
    world.attach(id, stats)?;
    world.attach(
        id,
        AttackTimer {
            remaining: stats.atk_interval,
        },
    )?;
    world.attach(id, Orientation::default())?;
    world.attach(id, Velocity::default())?;
    world.attach(
        id,
        PathFollower {
            target_node: node.next.unwrap_or(start),
            speed: blueprint.speed,
        },
    )?;
    world.attach(
        id,
        EnemyUnit {
            class: class.to_string(),
            ranged: blueprint.ranged,
            projectile: blueprint.projectile,
        },
    )?;

    tracing::debug!(entity = id, class, start, "enemy spawned");
    Ok(id)
}

/// Launch a projectile from `source` at `target`.
///
/// A missing or unknown projectile blueprint falls back to a flat shot
/// with the configured default flight time.
pub fn spawn_projectile(
    ctx: &mut BattleContext,
    source: EntityId,
    target: EntityId,
    damage: Fixed,
    projectile: Option<&str>,
) -> Result<EntityId> {
    let start = ctx.world.get::<Transform>(source)?.position;
    let target_position = ctx.world.get::<Transform>(target)?.position;
    let fallback = ProjectileBlueprint {
        arc_height: Fixed::ZERO,
        total_flight_time: ctx.config.default_projectile_flight_time,
    };
    let blueprint = match projectile {
        Some(name) => match ctx.blueprints.projectile(name) {
            Ok(blueprint) => *blueprint,
            Err(err) => {
                tracing::error!(source, error = %err, "using fallback projectile");
                fallback
            }
        },
        None => fallback,
    };

    let world = &mut ctx.world;
    let id = world.create();
    world.attach(id, Transform::at(start))?;
    world.attach(
        id,
        Projectile {
            source,
            target,
            start,
            target_position,
            damage,
            elapsed: Fixed::ZERO,
            flight_time: blueprint.total_flight_time,
            arc_height: blueprint.arc_height,
        },
    )?;
    Ok(id)
}
