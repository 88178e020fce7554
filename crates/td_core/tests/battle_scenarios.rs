//! End-to-end battle scenarios driven through `Simulation::tick`.

use td_core::components::{BlockedBy, Blocker, Buff, Dead, Injured, Projectile, SkillReady, Stats, Velocity};
use td_core::context::Outcome;
use td_core::events::{
    ActivateSkillEvent, AttackEvent, EnemyArriveHomeEvent, EnemyKilledEvent, EnemySpawnedEvent,
    GameEndEvent, HealEvent, LevelClearEvent, RetreatUnitEvent, UpgradeUnitEvent,
};
use td_core::level::LevelData;
use td_core::math::Vec2Fixed;
use td_core::simulation::{Simulation, TickEvents};
use td_test_utils::fixtures::{fixed, fixed_f, simulation, straight_level, wave_level};

fn run(sim: &mut Simulation, ticks: usize) -> Vec<TickEvents> {
    (0..ticks).map(|_| sim.tick(fixed(1))).collect()
}

#[test]
fn test_melee_exchange_kills_in_three_hits() {
    let mut sim = simulation(straight_level(100));
    let knight = sim.deploy_player("knight", Vec2Fixed::from_ints(5, 0), 1, 1).unwrap();
    let slime = sim.spawn_enemy("slime", 0, 1, 1).unwrap();

    let first = sim.tick(fixed(1));
    assert_eq!(sim.world().get::<BlockedBy>(slime).unwrap().blocker, knight);
    assert_eq!(
        first.of::<AttackEvent>(),
        vec![
            &AttackEvent { attacker: knight, target: slime, damage: fixed(50) },
            &AttackEvent { attacker: slime, target: knight, damage: fixed(50) },
        ]
    );
    assert_eq!(sim.world().get::<Stats>(slime).unwrap().hp, fixed(30));
    assert_eq!(sim.world().get::<Stats>(knight).unwrap().hp, fixed(180));
    assert!(sim.world().has::<Injured>(slime));

    sim.tick(fixed(1));
    assert_eq!(sim.world().get::<Stats>(slime).unwrap().hp, fixed(10));
    sim.tick(fixed(1));
    assert_eq!(sim.world().get::<Stats>(slime).unwrap().hp, fixed(0));
    assert!(sim.world().has::<Dead>(slime));
    assert_eq!(sim.stats().enemy_killed_count, 1);
    assert_eq!(sim.world().get::<Blocker>(knight).unwrap().current_count, 0);

    let fourth = sim.tick(fixed(1));
    assert_eq!(fourth.removed, vec![slime]);
    assert_eq!(fourth.of::<EnemyKilledEvent>(), vec![&EnemyKilledEvent { enemy: slime }]);
    assert!(fourth.of::<AttackEvent>().iter().all(|e| e.attacker != slime));
    sim.check_invariants().unwrap();
}

#[test]
fn test_walker_reaches_home_after_ten_ticks() {
    let mut sim = simulation(straight_level(10));
    let slime = sim.spawn_enemy("slime", 0, 1, 1).unwrap();

    let ticks = run(&mut sim, 11);
    let arrivals: Vec<usize> = ticks
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.of::<EnemyArriveHomeEvent>().is_empty())
        .map(|(n, _)| n)
        .collect();
    assert_eq!(arrivals, vec![9]);
    assert_eq!(ticks[9].of::<EnemyArriveHomeEvent>(), vec![&EnemyArriveHomeEvent { enemy: slime }]);
    assert!(ticks[..10].iter().all(|t| t.removed.is_empty()));
    assert_eq!(ticks[10].removed, vec![slime]);
    assert!(!sim.world().is_valid(slime));
    assert_eq!(sim.stats().home_hp, 2);
    assert_eq!(sim.stats().enemy_arrived_count, 1);
}

#[test]
fn test_blocker_claims_nearest_and_refills_capacity() {
    let level = LevelData::from_json(
        "fork",
        r#"{ "waypoints": {
                "0": { "x": 0,   "y": 0, "next": 3 },
                "1": { "x": -5,  "y": 0, "next": 3 },
                "2": { "x": -10, "y": 0, "next": 3 },
                "3": { "x": 100, "y": 0 } },
             "start_nodes": [0, 1, 2], "initial_cost": 50 }"#,
    )
    .unwrap();
    let mut sim = simulation(level);
    let knight = sim.deploy_player("knight", Vec2Fixed::from_ints(10, 0), 1, 1).unwrap();
    let near = sim.spawn_enemy("slime", 0, 1, 1).unwrap();
    let middle = sim.spawn_enemy("slime", 1, 1, 1).unwrap();
    let far = sim.spawn_enemy("slime", 2, 1, 1).unwrap();

    sim.tick(fixed(1));
    let world = sim.world();
    assert_eq!(world.get::<Blocker>(knight).unwrap().current_count, 2);
    assert_eq!(world.get::<BlockedBy>(near).unwrap().blocker, knight);
    assert_eq!(world.get::<BlockedBy>(middle).unwrap().blocker, knight);
    assert!(!world.has::<BlockedBy>(far));
    assert_eq!(world.get::<Velocity>(near).unwrap().value, Vec2Fixed::ZERO);
    assert_eq!(world.get::<Velocity>(far).unwrap().value, Vec2Fixed::from_ints(1, 0));

    sim.tick(fixed(1));
    assert!(!sim.world().has::<BlockedBy>(far));

    // The nearest slime dies on the third tick; its slot goes to the walker.
    run(&mut sim, 2);
    assert!(!sim.world().is_valid(near));
    assert_eq!(sim.world().get::<BlockedBy>(far).unwrap().blocker, knight);
    assert_eq!(sim.world().get::<Blocker>(knight).unwrap().current_count, 2);
    sim.check_invariants().unwrap();
}

#[test]
fn test_wave_spawns_one_enemy_per_second() {
    let mut sim = simulation(wave_level(100, "slime", 5, 1));
    let ticks = run(&mut sim, 6);

    let per_tick: Vec<usize> = ticks.iter().map(|t| t.of::<EnemySpawnedEvent>().len()).collect();
    assert_eq!(per_tick, vec![1, 1, 1, 1, 1, 0]);

    let spawned: Vec<u64> = ticks
        .iter()
        .flat_map(|t| t.of::<EnemySpawnedEvent>())
        .map(|e| e.enemy)
        .collect();
    let mut sorted = spawned.clone();
    sorted.sort_unstable();
    assert_eq!(spawned, sorted);
    assert_eq!(sim.stats().enemy_count, 5);
    assert!(sim.waves().is_exhausted());
}

#[test]
fn test_heal_on_full_health_ally_is_noop() {
    let mut sim = simulation(straight_level(100));
    let knight = sim.deploy_player("knight", Vec2Fixed::from_ints(50, 0), 1, 1).unwrap();
    let medic = sim.deploy_player("medic", Vec2Fixed::from_ints(50, 10), 1, 1).unwrap();

    sim.publish(HealEvent { healer: medic, target: knight, amount: fixed(40) });
    sim.tick(fixed(1));
    assert_eq!(sim.world().get::<Stats>(knight).unwrap().hp, fixed(200));
    assert!(!sim.world().has::<Injured>(knight));
}

#[test]
fn test_medic_restores_injured_ally() {
    let mut sim = simulation(straight_level(100));
    let knight = sim.deploy_player("knight", Vec2Fixed::from_ints(50, 0), 1, 1).unwrap();
    sim.deploy_player("medic", Vec2Fixed::from_ints(50, 10), 1, 1).unwrap();

    sim.publish(AttackEvent { attacker: 99, target: knight, damage: fixed(100) });
    sim.tick(fixed(1));
    assert_eq!(sim.world().get::<Stats>(knight).unwrap().hp, fixed(130));
    assert!(sim.world().has::<Injured>(knight));

    run(&mut sim, 20);
    assert_eq!(sim.world().get::<Stats>(knight).unwrap().hp, fixed(200));
    assert!(!sim.world().has::<Injured>(knight));
}

#[test]
fn test_archer_downs_goblin_with_projectiles() {
    let mut sim = simulation(straight_level(200));
    sim.deploy_player("archer", Vec2Fixed::from_ints(30, 0), 1, 1).unwrap();
    let goblin = sim.spawn_enemy("goblin", 0, 1, 1).unwrap();

    let mut saw_projectile = false;
    for _ in 0..80 {
        sim.tick(fixed(1) / fixed(4));
        saw_projectile |= sim.world().iter::<Projectile>().next().is_some();
        if !sim.world().is_valid(goblin) {
            break;
        }
    }
    assert!(saw_projectile);
    assert_eq!(sim.stats().enemy_killed_count, 1);
    assert_eq!(sim.stats().enemy_arrived_count, 0);
}

#[test]
fn test_victory_after_every_enemy_dies() {
    let mut sim = simulation(wave_level(100, "slime", 2, 1));
    sim.deploy_player("knight", Vec2Fixed::from_ints(30, 0), 1, 1).unwrap();

    let ticks = run(&mut sim, 60);
    assert_eq!(sim.stats().outcome, Some(Outcome::Victory));
    let clears: Vec<&LevelClearEvent> = ticks.iter().flat_map(|t| t.of::<LevelClearEvent>()).collect();
    assert_eq!(
        clears,
        vec![&LevelClearEvent { enemy_killed_count: 2, enemy_arrived_count: 0 }]
    );
}

#[test]
fn test_defeat_when_home_falls() {
    let mut sim = simulation(wave_level(10, "slime", 3, 0));
    let ticks = run(&mut sim, 12);
    assert_eq!(sim.stats().outcome, Some(Outcome::Defeat));
    assert_eq!(sim.stats().home_hp, 0);
    let ends: usize = ticks.iter().map(|t| t.of::<GameEndEvent>().len()).sum();
    assert_eq!(ends, 1);
    assert!(ticks.iter().all(|t| t.of::<LevelClearEvent>().is_empty()));
}

#[test]
fn test_retreated_unit_never_attacks_again() {
    let mut sim = simulation(straight_level(100));
    let knight = sim.deploy_player("knight", Vec2Fixed::from_ints(5, 0), 1, 1).unwrap();
    sim.spawn_enemy("slime", 0, 1, 1).unwrap();
    sim.tick(fixed(1));

    sim.publish(RetreatUnitEvent { unit: knight });
    sim.tick(fixed(1));
    assert!(sim.world().has::<Dead>(knight));
    assert_eq!(sim.stats().cost, fixed(95));

    for events in run(&mut sim, 5) {
        assert!(events.of::<AttackEvent>().iter().all(|e| e.attacker != knight && e.target != knight));
    }
    assert!(!sim.world().is_valid(knight));
    sim.check_invariants().unwrap();
}

#[test]
fn test_arrow_in_flight_is_harmless_after_retreat() {
    let mut sim = simulation(straight_level(100));
    let archer = sim.deploy_player("archer", Vec2Fixed::from_ints(20, 0), 1, 1).unwrap();
    let slime = sim.spawn_enemy("slime", 0, 1, 1).unwrap();
    let dt = fixed_f(0.125);

    let mut loosed = false;
    for _ in 0..40 {
        sim.tick(dt);
        if sim.world().iter::<Projectile>().next().is_some() {
            loosed = true;
            break;
        }
    }
    assert!(loosed, "archer never fired");

    sim.publish(RetreatUnitEvent { unit: archer });
    sim.tick(dt);
    assert!(sim.world().has::<Dead>(archer));

    for _ in 0..10 {
        let events = sim.tick(dt);
        assert!(events.of::<AttackEvent>().iter().all(|e| e.attacker != archer));
    }
    assert!(!sim.world().is_valid(archer));
    assert_eq!(sim.world().iter::<Projectile>().count(), 0);
    let stats = sim.world().get::<Stats>(slime).unwrap();
    assert_eq!(stats.hp, stats.max_hp);
    sim.check_invariants().unwrap();
}

#[test]
fn test_upgrade_and_skill_requests() {
    let mut sim = simulation(straight_level(100));
    let lancer = sim.deploy_player("lancer", Vec2Fixed::from_ints(50, 0), 1, 1).unwrap();

    sim.publish(UpgradeUnitEvent { unit: lancer });
    sim.tick(fixed(1));
    assert_eq!(sim.world().get::<Stats>(lancer).unwrap().level, 2);
    assert_eq!(sim.stats().cost, fixed(76));

    run(&mut sim, 4);
    assert!(sim.world().has::<SkillReady>(lancer));
    sim.publish(ActivateSkillEvent { unit: lancer });
    sim.tick(fixed(1));
    assert_eq!(sim.world().get::<Buff>(lancer).unwrap().atk, fixed(2));

    run(&mut sim, 3);
    assert!(!sim.world().has::<Buff>(lancer));
}
