//! Property tests: invariants that must hold for any tick sequence.

use proptest::prelude::*;
use td_core::combat::effective_damage;
use td_core::components::{Dead, Stats};
use td_core::events::{AttackEvent, HealEvent, RetreatUnitEvent};
use td_core::math::{Fixed, Vec2Fixed};
use td_core::simulation::Simulation;
use td_core::world::EntityId;
use td_test_utils::determinism::strategies::{
    arb_attack, arb_deployment, arb_dt_sequence, arb_spawn_delays, arb_stat,
};
use td_test_utils::fixtures::{defended_battle, simulation, wave_level};

fn assert_world_sane(sim: &Simulation) -> Result<(), TestCaseError> {
    prop_assert!(sim.check_invariants().is_ok(), "{:?}", sim.check_invariants());
    let stats = sim.stats();
    prop_assert!(stats.cost >= Fixed::ZERO);
    prop_assert!(stats.resolved_enemies() <= stats.enemy_count);
    prop_assert!(stats.home_hp <= stats.max_home_hp);
    for (_, unit) in sim.world().iter::<Stats>() {
        prop_assert!(unit.hp >= Fixed::ZERO && unit.hp <= unit.max_hp);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_damage_stays_between_floor_and_attack(atk in arb_attack(), def in arb_stat()) {
        let damage = effective_damage(atk, def);
        prop_assert!(damage >= atk / Fixed::from_num(10));
        prop_assert!(damage <= atk);
        prop_assert!(damage >= Fixed::ZERO);
    }

    #[test]
    fn prop_invariants_hold_for_any_dt_sequence(dts in arb_dt_sequence(200)) {
        let mut sim = defended_battle();
        for dt in dts {
            sim.tick(dt);
            assert_world_sane(&sim)?;
        }
    }

    #[test]
    fn prop_removed_entities_never_return(dts in arb_dt_sequence(150)) {
        let mut sim = defended_battle();
        let mut removed: Vec<EntityId> = Vec::new();
        for dt in dts {
            let events = sim.tick(dt);
            for id in &events.removed {
                prop_assert!(!removed.contains(id));
            }
            removed.extend(events.removed);
            for id in &removed {
                prop_assert!(!sim.world().is_valid(*id));
            }
        }
    }

    #[test]
    fn prop_random_defences_keep_invariants(
        deployments in prop::collection::vec(arb_deployment(), 1..6),
        delays in arb_spawn_delays(8),
    ) {
        let mut level = wave_level(100, "slime", delays.len(), 0);
        for (entry, delay) in level.waves[0].entries.iter_mut().zip(&delays) {
            entry.delay = Fixed::from_num(*delay);
        }
        let mut sim = simulation(level);
        for (class, position) in deployments {
            // Running out of cost is part of the input space.
            let _ = sim.deploy_player(class, position, 1, 1);
        }
        for _ in 0..200 {
            sim.tick(Fixed::ONE / Fixed::from_num(2));
            assert_world_sane(&sim)?;
            for (id, _) in sim.world().iter::<Dead>() {
                prop_assert!(sim.world().is_valid(id));
            }
        }
        prop_assert_eq!(sim.stats().enemy_count as usize, delays.len());
    }

    #[test]
    fn prop_dead_entities_never_fight(
        units in prop::collection::vec(
            (prop::sample::select(vec!["knight", "archer", "lancer"]), 20i32..90, -10i32..10),
            1..5,
        ),
        retreats in prop::collection::vec(0usize..200, 0..3),
        dts in arb_dt_sequence(200),
    ) {
        let mut sim = simulation(wave_level(100, "slime", 6, 1));
        let mut deployed = Vec::new();
        for (class, x, y) in units {
            deployed.push(sim.deploy_player(class, Vec2Fixed::from_ints(x, y), 1, 1).unwrap());
        }
        let mut dead: Vec<EntityId> = Vec::new();
        for (tick, dt) in dts.into_iter().enumerate() {
            // Withdrawing a ranged unit can leave its shots in the air.
            for (n, _) in retreats.iter().enumerate().filter(|(_, at)| **at == tick) {
                sim.publish(RetreatUnitEvent { unit: deployed[n % deployed.len()] });
            }
            let events = sim.tick(dt);
            for attack in events.of::<AttackEvent>() {
                prop_assert!(!dead.contains(&attack.attacker));
                prop_assert!(!dead.contains(&attack.target));
            }
            for heal in events.of::<HealEvent>() {
                prop_assert!(!dead.contains(&heal.target));
            }
            dead.extend(sim.world().iter::<Dead>().map(|(id, _)| id));
        }
    }

    #[test]
    fn prop_replay_matches_for_any_dt_sequence(dts in arb_dt_sequence(120)) {
        let mut first = defended_battle();
        let mut second = defended_battle();
        for dt in dts {
            let a = first.tick(dt);
            let b = second.tick(dt);
            prop_assert_eq!(a, b);
            prop_assert_eq!(first.state_hash(), second.state_hash());
        }
    }
}
