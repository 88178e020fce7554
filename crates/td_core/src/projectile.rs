//! Projectile flight.
//!
//! A projectile homes on its target's latest position for as long as the
//! target lives, then keeps flying to the last known position. On impact it
//! publishes an [`AttackEvent`] on behalf of its source and is tagged
//! [`Dead`]. A shot whose source or target is gone lands harmlessly.

use crate::bus::Publisher;
use crate::components::{Dead, Projectile, Transform};
use crate::context::BattleContext;
use crate::events::AttackEvent;
use crate::math::{Fixed, Vec2Fixed};

/// Flight progress in `[0, 1]`; a zero flight time lands immediately.
#[must_use]
pub fn flight_progress(projectile: &Projectile) -> Fixed {
    if projectile.flight_time <= Fixed::ZERO {
        return Fixed::ONE;
    }
    (projectile.elapsed / projectile.flight_time).clamp(Fixed::ZERO, Fixed::ONE)
}

/// Position along the arc at `progress`.
///
/// Linear from start to target, lifted by a parabola peaking at
/// `arc_height` halfway (negative y is up).
///
/// # Example
///
/// ```
/// use td_core::components::Projectile;
/// use td_core::math::{Fixed, Vec2Fixed};
/// use td_core::projectile::flight_position;
///
/// let shot = Projectile {
///     source: 1,
///     target: 2,
///     start: Vec2Fixed::ZERO,
///     target_position: Vec2Fixed::from_ints(10, 0),
///     damage: Fixed::ONE,
///     elapsed: Fixed::ZERO,
///     flight_time: Fixed::ONE,
///     arc_height: Fixed::from_num(4),
/// };
/// let apex = flight_position(&shot, Fixed::from_num(0.5));
/// assert_eq!(apex, Vec2Fixed::from_ints(5, -4));
/// ```
#[must_use]
pub fn flight_position(projectile: &Projectile, progress: Fixed) -> Vec2Fixed {
    let base = projectile
        .start
        .lerp(projectile.target_position, progress);
    let lift = projectile
        .arc_height
        .saturating_mul(Fixed::from_num(4))
        .saturating_mul(progress)
        .saturating_mul(Fixed::ONE - progress);
    Vec2Fixed::new(base.x, base.y - lift)
}

/// Advance every projectile by `dt` and resolve impacts.
pub fn projectile_system(ctx: &mut BattleContext, dt: Fixed, out: &mut Publisher) {
    let world = &mut ctx.world;
    for id in world.query_sorted::<(Projectile, Transform)>() {
        if world.has::<Dead>(id) {
            continue;
        }
        let Some(mut projectile) = world.try_get::<Projectile>(id).copied() else {
            continue;
        };

        let target_alive = world.is_active(projectile.target);
        if target_alive {
            if let Some(transform) = world.try_get::<Transform>(projectile.target) {
                projectile.target_position = transform.position;
            }
        }
        projectile.elapsed = projectile.elapsed.saturating_add(dt);
        let progress = flight_progress(&projectile);
        let position = flight_position(&projectile, progress);

        if let Some(transform) = world.try_get_mut::<Transform>(id) {
            transform.position = position;
        }
        if let Some(slot) = world.try_get_mut::<Projectile>(id) {
            *slot = projectile;
        }

        if progress >= Fixed::ONE {
            if !target_alive {
                tracing::debug!(projectile = id, target = projectile.target, "projectile landed on nothing");
            } else if !world.is_active(projectile.source) {
                tracing::debug!(projectile = id, source = projectile.source, "projectile source gone; impact dropped");
            } else {
                out.publish(AttackEvent {
                    attacker: projectile.source,
                    target: projectile.target,
                    damage: projectile.damage,
                });
            }
            if let Err(err) = world.attach(id, Dead) {
                tracing::error!(projectile = id, error = %err, "failed to retire projectile");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::BlueprintRegistry;
    use crate::config::SimConfig;
    use crate::events::Event;
    use crate::level::LevelData;
    use crate::pathing::WaypointGraph;
    use crate::world::EntityId;

    fn context() -> BattleContext {
        let level: LevelData =
            serde_json::from_str(r#"{"waypoints":{},"start_nodes":[]}"#).unwrap();
        BattleContext::new(
            SimConfig::default(),
            &level,
            WaypointGraph::default(),
            BlueprintRegistry::new(),
        )
    }

    fn shot(
        ctx: &mut BattleContext,
        source: EntityId,
        target: EntityId,
        flight_time: Fixed,
    ) -> EntityId {
        let id = ctx.world.create();
        ctx.world.attach(id, Transform::at(Vec2Fixed::ZERO)).unwrap();
        ctx.world
            .attach(
                id,
                Projectile {
                    source,
                    target,
                    start: Vec2Fixed::ZERO,
                    target_position: Vec2Fixed::from_ints(10, 0),
                    damage: Fixed::from_num(7),
                    elapsed: Fixed::ZERO,
                    flight_time,
                    arc_height: Fixed::ZERO,
                },
            )
            .unwrap();
        id
    }

    #[test]
    fn test_lands_after_flight_time() {
        let mut ctx = context();
        let target = ctx.world.create();
        ctx.world.attach(target, Transform::at(Vec2Fixed::from_ints(10, 0))).unwrap();
        let archer = ctx.world.create();
        let id = shot(&mut ctx, archer, target, Fixed::ONE);
        let mut out = Publisher::default();

        projectile_system(&mut ctx, Fixed::from_num(0.5), &mut out);
        assert!(out.is_empty());
        assert_eq!(
            ctx.world.get::<Transform>(id).unwrap().position,
            Vec2Fixed::from_ints(5, 0)
        );

        projectile_system(&mut ctx, Fixed::from_num(0.5), &mut out);
        assert!(ctx.world.has::<Dead>(id));
        assert_eq!(
            out.events(),
            &[Event::Attack(AttackEvent {
                attacker: archer,
                target,
                damage: Fixed::from_num(7),
            })]
        );
    }

    #[test]
    fn test_follows_moving_target() {
        let mut ctx = context();
        let target = ctx.world.create();
        ctx.world.attach(target, Transform::at(Vec2Fixed::from_ints(20, 0))).unwrap();
        let archer = ctx.world.create();
        let id = shot(&mut ctx, archer, target, Fixed::from_num(2));
        let mut out = Publisher::default();
        projectile_system(&mut ctx, Fixed::ONE, &mut out);
        assert_eq!(
            ctx.world.get::<Transform>(id).unwrap().position,
            Vec2Fixed::from_ints(10, 0)
        );
    }

    #[test]
    fn test_lost_target_publishes_nothing() {
        let mut ctx = context();
        let target = ctx.world.create();
        let archer = ctx.world.create();
        let id = shot(&mut ctx, archer, target, Fixed::ZERO);
        ctx.world.destroy(target);
        let mut out = Publisher::default();
        projectile_system(&mut ctx, Fixed::from_num(0.05), &mut out);
        assert!(out.is_empty());
        assert!(ctx.world.has::<Dead>(id));
    }

    #[test]
    fn test_dead_source_lands_harmlessly() {
        let mut ctx = context();
        let target = ctx.world.create();
        ctx.world.attach(target, Transform::at(Vec2Fixed::from_ints(10, 0))).unwrap();
        let archer = ctx.world.create();
        let first = shot(&mut ctx, archer, target, Fixed::ONE);
        let mut out = Publisher::default();

        ctx.world.attach(archer, Dead).unwrap();
        projectile_system(&mut ctx, Fixed::ONE, &mut out);
        assert!(out.is_empty());
        assert!(ctx.world.has::<Dead>(first));

        ctx.world.destroy(archer);
        let second = shot(&mut ctx, archer, target, Fixed::ONE);
        projectile_system(&mut ctx, Fixed::ONE, &mut out);
        assert!(out.is_empty());
        assert!(ctx.world.has::<Dead>(second));
    }
}
