//! Deployment, upgrades and retreat: everything that spends or refunds cost.

use crate::blueprint::stat_modify;
use crate::bus::Publisher;
use crate::components::{Dead, Injured, PlayerUnit, Stats};
use crate::context::BattleContext;
use crate::error::{GameError, Result};
use crate::events::{PlaySoundEvent, RetreatUnitEvent, SoundKind, UpgradeUnitEvent};
use crate::factory;
use crate::math::{Fixed, Vec2Fixed};
use crate::world::EntityId;

/// Pay for and spawn a player unit.
///
/// # Errors
///
/// [`GameError::MissingBlueprint`] for an unknown class and
/// [`GameError::InsufficientCost`] when the cost pool is short; nothing is
/// spent in either case.
pub fn deploy_player(
    ctx: &mut BattleContext,
    class: &str,
    position: Vec2Fixed,
    level: u32,
    rarity: u32,
) -> Result<EntityId> {
    let required = ctx.blueprints.player(class)?.cost;
    let price = Fixed::saturating_from_num(required);
    if ctx.stats.cost < price {
        return Err(GameError::InsufficientCost {
            required,
            available: ctx.stats.whole_cost(),
        });
    }
    let id = factory::spawn_player(ctx, class, position, level, rarity)?;
    ctx.stats.cost -= price;
    tracing::info!(entity = id, class, cost = required, "unit deployed");
    Ok(id)
}

/// Raise a unit's level by one, paying its blueprint cost.
///
/// Current health keeps its proportion of the new maximum.
pub fn on_upgrade(event: &UpgradeUnitEvent, ctx: &mut BattleContext, out: &mut Publisher) {
    let unit = event.unit;
    if !ctx.world.is_active(unit) {
        tracing::debug!(entity = unit, "upgrade ignored: unit gone");
        return;
    }
    let Some(class) = ctx.world.try_get::<PlayerUnit>(unit).map(|p| p.class.clone()) else {
        tracing::warn!(entity = unit, "upgrade ignored: not a player unit");
        return;
    };
    let (blueprint, price) = match ctx.blueprints.player(&class) {
        Ok(blueprint) => (blueprint.stats(), blueprint.cost),
        Err(err) => {
            tracing::error!(entity = unit, error = %err, "upgrade ignored");
            return;
        }
    };
    let price_fixed = Fixed::saturating_from_num(price);
    if ctx.stats.cost < price_fixed {
        tracing::info!(
            entity = unit,
            required = price,
            available = ctx.stats.whole_cost(),
            "upgrade ignored: insufficient cost"
        );
        return;
    }

    let Some(stats) = ctx.world.try_get_mut::<Stats>(unit) else {
        tracing::error!(entity = unit, "upgrade ignored: unit has no Stats");
        return;
    };
    ctx.stats.cost -= price_fixed;

    let level = stats.level.saturating_add(1);
    let max_hp = stat_modify(blueprint.hp, level, stats.rarity);
    let hp = if stats.max_hp > Fixed::ZERO {
        (stats.hp / stats.max_hp).saturating_mul(max_hp)
    } else {
        max_hp
    };
    stats.level = level;
    stats.max_hp = max_hp;
    stats.hp = hp.clamp(Fixed::ZERO, max_hp);
    stats.atk = stat_modify(blueprint.atk, level, stats.rarity);
    stats.def = stat_modify(blueprint.def, level, stats.rarity);
    let full = stats.is_full_health();

    if full {
        ctx.world.detach::<Injured>(unit);
    } else if let Err(err) = ctx.world.attach(unit, Injured) {
        tracing::error!(entity = unit, error = %err, "failed to tag injured unit");
    }
    tracing::info!(entity = unit, class = %class, level, "unit upgraded");
    out.publish(PlaySoundEvent {
        entity: Some(unit),
        sound: SoundKind::Upgrade,
    });
}

/// Withdraw a unit, refunding part of its cost.
pub fn on_retreat(event: &RetreatUnitEvent, ctx: &mut BattleContext, out: &mut Publisher) {
    let unit = event.unit;
    if !ctx.world.is_active(unit) {
        tracing::debug!(entity = unit, "retreat ignored: unit gone");
        return;
    }
    let Some(cost) = ctx.world.try_get::<PlayerUnit>(unit).map(|p| p.cost) else {
        tracing::warn!(entity = unit, "retreat ignored: not a player unit");
        return;
    };
    let refund = Fixed::saturating_from_num(cost)
        .saturating_mul(ctx.config.retreat_refund_ratio)
        .floor();
    ctx.stats.cost = ctx.stats.cost.saturating_add(refund);

    if let Err(err) = ctx.world.attach(unit, Dead) {
        tracing::error!(entity = unit, error = %err, "failed to retire unit");
        return;
    }
    ctx.world.detach::<Injured>(unit);
    tracing::info!(entity = unit, refund = %refund, "unit retreated");
    out.publish(PlaySoundEvent {
        entity: Some(unit),
        sound: SoundKind::Retreat,
    });
}
