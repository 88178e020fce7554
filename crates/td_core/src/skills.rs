//! Unit skills: charge, activation and expiry.
//!
//! An active (non-passive) skill charges for `cooldown` seconds, becomes
//! [`SkillReady`], and waits for an [`ActivateSkillEvent`]. Activation
//! attaches the skill's [`Buff`] for `duration` seconds. Passive skills are
//! attached at spawn and never expire.

use crate::bus::Publisher;
use crate::components::{Buff, CostRegen, Skill, SkillActive, SkillReady, Stats};
use crate::context::BattleContext;
use crate::events::{ActivateSkillEvent, HealEvent, PlaySoundEvent, SoundKind};
use crate::math::Fixed;

/// Advance skill timers by `dt`.
pub fn skill_system(ctx: &mut BattleContext, dt: Fixed) {
    let world = &mut ctx.world;
    for id in world.query_sorted::<(Skill,)>() {
        if !world.is_active(id) {
            continue;
        }
        let active = world.has::<SkillActive>(id);
        let ready = world.has::<SkillReady>(id);
        let Some(skill) = world.try_get_mut::<Skill>(id) else {
            continue;
        };
        if skill.passive {
            continue;
        }

        if active {
            skill.duration_timer = skill.duration_timer.saturating_add(dt);
            if skill.duration_timer < skill.duration {
                continue;
            }
            skill.duration_timer = Fixed::ZERO;
            skill.cooldown_timer = Fixed::ZERO;
            let name = skill.id.clone();
            world.detach::<Buff>(id);
            world.detach::<CostRegen>(id);
            world.detach::<SkillActive>(id);
            tracing::debug!(entity = id, skill = %name, "skill expired");
        } else if !ready {
            skill.cooldown_timer = skill.cooldown_timer.saturating_add(dt);
            if skill.cooldown_timer < skill.cooldown {
                continue;
            }
            if let Err(err) = world.attach(id, SkillReady) {
                tracing::error!(entity = id, error = %err, "failed to mark skill ready");
            }
        }
    }
}

/// Activate a charged skill.
pub fn on_activate_skill(event: &ActivateSkillEvent, ctx: &mut BattleContext, out: &mut Publisher) {
    let unit = event.unit;
    let world = &mut ctx.world;
    if !world.is_active(unit) || !world.has::<SkillReady>(unit) {
        tracing::warn!(entity = unit, "skill activation ignored: not ready");
        return;
    }
    let Some(skill) = world.try_get_mut::<Skill>(unit) else {
        tracing::warn!(entity = unit, "skill activation ignored: unit has no skill");
        return;
    };
    skill.cooldown_timer = Fixed::ZERO;
    skill.duration_timer = Fixed::ZERO;
    let effect = skill.effect;
    let name = skill.id.clone();

    world.detach::<SkillReady>(unit);
    let attached = world
        .attach(unit, SkillActive)
        .and_then(|()| world.attach(unit, effect));
    if let Err(err) = attached {
        tracing::error!(entity = unit, error = %err, "skill activation failed");
        return;
    }
    if effect.cost_regen > Fixed::ZERO {
        if let Err(err) = world.attach(unit, CostRegen { rate: effect.cost_regen }) {
            tracing::error!(entity = unit, error = %err, "failed to attach cost regen");
        }
    }
    if effect.hp > Fixed::ONE {
        if let Some(stats) = world.try_get::<Stats>(unit) {
            out.publish(HealEvent {
                healer: unit,
                target: unit,
                amount: (effect.hp - Fixed::ONE).saturating_mul(stats.max_hp),
            });
        }
    }
    tracing::debug!(entity = unit, skill = %name, "skill activated");
    out.publish(PlaySoundEvent {
        entity: Some(unit),
        sound: SoundKind::Skill,
    });
}
