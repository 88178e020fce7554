//! Combat resolution.
//!
//! Runs inside the bus flush as handlers for [`AttackEvent`] and
//! [`HealEvent`]. Per combatant the state machine is
//! `Healthy -> Injured -> Dead`, with `Injured <-> Healthy` via healing;
//! `Dead` is terminal.
//!
//! Stale or dead targets are dropped with a log line: attacks and
//! projectiles queued before a target died must not fail the tick.

use crate::bus::Publisher;
use crate::components::{
    effective_stats, BlockedBy, Blocker, Dead, EnemyUnit, Injured, PlayerUnit, Stats,
};
use crate::context::BattleContext;
use crate::events::{
    AnimationKind, AttackEvent, EnemyKilledEvent, HealEvent, PlayAnimationEvent, PlaySoundEvent,
    SoundKind,
};
use crate::math::Fixed;

/// Damage dealt by `atk` against `def`.
///
/// `max(atk - def, atk / 10)`: defense can reduce a hit to a tenth of the
/// attack but never to zero.
///
/// # Example
///
/// ```
/// use td_core::combat::effective_damage;
/// use td_core::math::Fixed;
///
/// let dmg = effective_damage(Fixed::from_num(50), Fixed::from_num(30));
/// assert_eq!(dmg, Fixed::from_num(20));
///
/// let floor = effective_damage(Fixed::from_num(50), Fixed::from_num(500));
/// assert_eq!(floor, Fixed::from_num(5));
/// ```
#[must_use]
pub fn effective_damage(atk: Fixed, def: Fixed) -> Fixed {
    let floor = atk / Fixed::from_num(10);
    atk.saturating_sub(def).max(floor)
}

/// Apply an attack.
pub fn on_attack(event: &AttackEvent, ctx: &mut BattleContext, out: &mut Publisher) {
    let target = event.target;
    let world = &mut ctx.world;

    if !world.is_valid(target) {
        tracing::debug!(target, attacker = event.attacker, "attack on stale entity dropped");
        return;
    }
    if world.has::<Dead>(target) {
        return;
    }
    let Some(defense) = effective_stats(world, target).map(|stats| stats.def) else {
        tracing::error!(target, "attack target has no Stats");
        return;
    };

    let damage = effective_damage(event.damage, defense);
    let (hp, max_hp) = match world.get_mut::<Stats>(target) {
        Ok(stats) => {
            stats.hp = (stats.hp - damage).max(Fixed::ZERO);
            (stats.hp, stats.max_hp)
        }
        Err(err) => {
            tracing::error!(target, error = %err, "attack could not be applied");
            return;
        }
    };
    tracing::trace!(attacker = event.attacker, target, damage = %damage, hp = %hp, "hit");

    if hp == Fixed::ZERO {
        if let Err(err) = world.attach(target, Dead) {
            tracing::error!(target, error = %err, "failed to tag dead entity");
            return;
        }
        world.detach::<Injured>(target);

        if world.has::<EnemyUnit>(target) {
            ctx.stats.enemy_killed_count += 1;
            out.publish(EnemyKilledEvent { enemy: target });
            if let Some(link) = world.detach::<BlockedBy>(target) {
                if let Some(blocker) = world.try_get_mut::<Blocker>(link.blocker) {
                    blocker.current_count = blocker.current_count.saturating_sub(1);
                }
            }
        }
        tracing::debug!(target, attacker = event.attacker, "entity killed");
        out.publish(PlayAnimationEvent {
            entity: target,
            animation: AnimationKind::Dead,
        });
        out.publish(PlaySoundEvent {
            entity: Some(target),
            sound: SoundKind::Death,
        });
    } else {
        if hp < max_hp {
            if let Err(err) = world.attach(target, Injured) {
                tracing::error!(target, error = %err, "failed to tag injured entity");
            }
        } else {
            world.detach::<Injured>(target);
        }
        out.publish(PlaySoundEvent {
            entity: Some(target),
            sound: SoundKind::Hit,
        });
    }
}

/// Apply a heal. Only living player units can be healed; healing a unit at
/// full health changes nothing.
pub fn on_heal(event: &HealEvent, ctx: &mut BattleContext, _out: &mut Publisher) {
    let target = event.target;
    let world = &mut ctx.world;

    if !world.is_active(target) {
        tracing::debug!(target, healer = event.healer, "heal on stale or dead entity dropped");
        return;
    }
    if !world.has::<PlayerUnit>(target) {
        tracing::debug!(target, healer = event.healer, "heal on non-allied entity ignored");
        return;
    }
    let full = match world.get_mut::<Stats>(target) {
        Ok(stats) => {
            if stats.is_full_health() {
                return;
            }
            stats.hp = stats.hp.saturating_add(event.amount).min(stats.max_hp);
            stats.is_full_health()
        }
        Err(err) => {
            tracing::error!(target, error = %err, "heal could not be applied");
            return;
        }
    };
    if full {
        world.detach::<Injured>(target);
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
    use std::collections::BTreeMap;

    fn context() -> BattleContext {
        let level = LevelData {
            name: String::new(),
            waypoints: BTreeMap::new(),
            start_nodes: Vec::new(),
            waves: Vec::new(),
            first_wave_delay: None,
            wave_interval: None,
            home_hp: None,
            initial_cost: None,
            cost_gen_per_second: None,
        };
        BattleContext::new(
            SimConfig::default(),
            &level,
            WaypointGraph::default(),
            BlueprintRegistry::new(),
        )
    }

    fn combatant(ctx: &mut BattleContext, hp: i32, def: i32) -> EntityId {
        let id = ctx.world.create();
        ctx.world
            .attach(
                id,
                Stats {
                    hp: Fixed::from_num(hp),
                    max_hp: Fixed::from_num(hp),
                    atk: Fixed::from_num(10),
                    def: Fixed::from_num(def),
                    range: Fixed::from_num(10),
                    atk_interval: Fixed::ONE,
                    level: 1,
                    rarity: 1,
                },
            )
            .unwrap();
        id
    }

    fn hit(target: EntityId, damage: i32) -> AttackEvent {
        AttackEvent {
            attacker: 0,
            target,
            damage: Fixed::from_num(damage),
        }
    }

    #[test]
    fn test_three_hits_kill_exactly() {
        let mut ctx = context();
        let target = combatant(&mut ctx, 50, 30);
        let mut out = Publisher::default();

        on_attack(&hit(target, 50), &mut ctx, &mut out);
        assert_eq!(ctx.world.get::<Stats>(target).unwrap().hp, Fixed::from_num(30));
        assert!(ctx.world.has::<Injured>(target));

        on_attack(&hit(target, 50), &mut ctx, &mut out);
        on_attack(&hit(target, 50), &mut ctx, &mut out);
        assert_eq!(ctx.world.get::<Stats>(target).unwrap().hp, Fixed::ZERO);
        assert!(ctx.world.has::<Dead>(target));
        assert!(!ctx.world.has::<Injured>(target));
    }

    #[test]
    fn test_dead_target_is_skipped() {
        let mut ctx = context();
        let target = combatant(&mut ctx, 10, 0);
        let mut out = Publisher::default();
        on_attack(&hit(target, 100), &mut ctx, &mut out);
        let events = out.len();
        on_attack(&hit(target, 100), &mut ctx, &mut out);
        assert_eq!(out.len(), events);
    }

    #[test]
    fn test_enemy_death_releases_blocker_once() {
        let mut ctx = context();
        let blocker = combatant(&mut ctx, 100, 0);
        ctx.world.attach(blocker, Blocker::new(2, Fixed::from_num(10))).unwrap();
        ctx.world.get_mut::<Blocker>(blocker).unwrap().current_count = 1;

        let enemy = combatant(&mut ctx, 10, 0);
        ctx.world
            .attach(
                enemy,
                EnemyUnit {
                    class: "slime".into(),
                    ranged: false,
                    projectile: None,
                },
            )
            .unwrap();
        ctx.world.attach(enemy, BlockedBy { blocker }).unwrap();

        let mut out = Publisher::default();
        on_attack(&hit(enemy, 100), &mut ctx, &mut out);
        on_attack(&hit(enemy, 100), &mut ctx, &mut out);

        assert_eq!(ctx.world.get::<Blocker>(blocker).unwrap().current_count, 0);
        assert!(!ctx.world.has::<BlockedBy>(enemy));
        assert_eq!(ctx.stats.enemy_killed_count, 1);
        assert!(out
            .events()
            .contains(&Event::EnemyKilled(EnemyKilledEvent { enemy })));
    }

    #[test]
    fn test_stale_target_is_dropped() {
        let mut ctx = context();
        let target = combatant(&mut ctx, 10, 0);
        ctx.world.destroy(target);
        let mut out = Publisher::default();
        on_attack(&hit(target, 5), &mut ctx, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_heal_clamps_and_clears_injured() {
        let mut ctx = context();
        let ally = combatant(&mut ctx, 100, 0);
        ctx.world
            .attach(
                ally,
                PlayerUnit {
                    class: "knight".into(),
                    kind: crate::components::PlayerKind::Melee,
                    healer: false,
                    cost: 0,
                    projectile: None,
                },
            )
            .unwrap();
        let mut out = Publisher::default();
        on_attack(&hit(ally, 40), &mut ctx, &mut out);
        assert!(ctx.world.has::<Injured>(ally));

        let heal = HealEvent {
            healer: 0,
            target: ally,
            amount: Fixed::from_num(500),
        };
        on_heal(&heal, &mut ctx, &mut out);
        assert_eq!(ctx.world.get::<Stats>(ally).unwrap().hp, Fixed::from_num(100));
        assert!(!ctx.world.has::<Injured>(ally));

        on_heal(&heal, &mut ctx, &mut out);
        assert_eq!(ctx.world.get::<Stats>(ally).unwrap().hp, Fixed::from_num(100));
        assert!(!ctx.world.has::<Injured>(ally));
    }

    #[test]
    fn test_heal_ignores_enemies() {
        let mut ctx = context();
        let enemy = combatant(&mut ctx, 100, 0);
        ctx.world.get_mut::<Stats>(enemy).unwrap().hp = Fixed::from_num(10);
        let mut out = Publisher::default();
        on_heal(
            &HealEvent {
                healer: 0,
                target: enemy,
                amount: Fixed::from_num(50),
            },
            &mut ctx,
            &mut out,
        );
        assert_eq!(ctx.world.get::<Stats>(enemy).unwrap().hp, Fixed::from_num(10));
    }

    #[test]
    fn test_damage_floor() {
        assert_eq!(
            effective_damage(Fixed::from_num(10), Fixed::from_num(100)),
            Fixed::ONE
        );
    }
}
