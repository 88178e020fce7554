//! Battle rules: cost regeneration, victory and defeat.

use crate::bus::Publisher;
use crate::components::CostRegen;
use crate::context::{BattleContext, Outcome};
use crate::events::{EnemyArriveHomeEvent, GameEndEvent, LevelClearEvent};
use crate::math::Fixed;

/// Regenerate cost: the base rate plus every living unit's [`CostRegen`].
pub fn resource_system(ctx: &mut BattleContext, dt: Fixed) {
    let bonus = ctx
        .world
        .iter::<CostRegen>()
        .filter(|&(id, _)| ctx.world.is_active(id))
        .fold(Fixed::ZERO, |sum, (_, regen)| sum.saturating_add(regen.rate));
    let rate = ctx.stats.cost_gen_per_second.saturating_add(bonus);
    ctx.stats.cost = ctx.stats.cost.saturating_add(rate.saturating_mul(dt));
}

/// Declare victory once every wave has spawned and every spawned enemy has
/// been killed or reached home.
pub fn level_clear_system(ctx: &mut BattleContext, out: &mut Publisher) {
    let stats = &mut ctx.stats;
    if stats.outcome.is_some()
        || !ctx.waves.is_exhausted()
        || stats.enemy_count == 0
        || stats.resolved_enemies() < stats.enemy_count
    {
        return;
    }
    stats.outcome = Some(Outcome::Victory);
    tracing::info!(
        tick = ctx.tick,
        killed = stats.enemy_killed_count,
        arrived = stats.enemy_arrived_count,
        "level clear"
    );
    out.publish(LevelClearEvent {
        enemy_killed_count: stats.enemy_killed_count,
        enemy_arrived_count: stats.enemy_arrived_count,
    });
}

/// An enemy reached home: count it and take one home health.
pub fn on_enemy_arrive_home(
    event: &EnemyArriveHomeEvent,
    ctx: &mut BattleContext,
    out: &mut Publisher,
) {
    let stats = &mut ctx.stats;
    stats.enemy_arrived_count += 1;
    stats.home_hp = stats.home_hp.saturating_sub(1);
    tracing::debug!(enemy = event.enemy, home_hp = stats.home_hp, "home hit");

    if stats.home_hp == 0 && stats.outcome.is_none() {
        stats.outcome = Some(Outcome::Defeat);
        tracing::info!(tick = ctx.tick, "home destroyed");
        out.publish(GameEndEvent { tick: ctx.tick });
    }
}
