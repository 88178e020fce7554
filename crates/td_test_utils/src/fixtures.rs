//! Test fixtures and helpers.
//!
//! Blueprint tables, levels and ready-to-tick simulations for consistent
//! testing. All numbers are chosen so the scenarios stay exact in
//! fixed-point.

use fixed::types::I32F32;
use td_core::blueprint::BlueprintRegistry;
use td_core::config::SimConfig;
use td_core::level::LevelData;
use td_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Player blueprints: a blocking melee unit, an archer, a healer and a
/// mixed unit with an activatable skill.
pub const PLAYERS_JSON: &str = r#"{
    "knight": { "hp": 200, "atk": 50, "def": 30, "range": 8, "atk_interval": 1,
                "type": "melee", "block": 2, "cost": 10 },
    "archer": { "hp": 80, "atk": 20, "def": 0, "range": 40, "atk_interval": 1,
                "type": "ranged", "cost": 8, "projectile": "arrow" },
    "medic":  { "hp": 100, "atk": 15, "def": 0, "range": 30, "atk_interval": 2,
                "type": "ranged", "healer": true, "cost": 6 },
    "lancer": { "hp": 150, "atk": 30, "def": 10, "range": 30, "atk_interval": 1,
                "type": "mixed", "block": 1, "cost": 12, "skill": "rally",
                "projectile": "javelin" }
}"#;

/// Enemy blueprints: a melee walker and a ranged skirmisher.
pub const ENEMIES_JSON: &str = r#"{
    "slime":  { "hp": 50, "atk": 50, "def": 30, "range": 4, "atk_interval": 1, "speed": 1 },
    "goblin": { "hp": 60, "atk": 10, "def": 0, "range": 30, "atk_interval": 2, "speed": 2,
                "ranged": true, "projectile": "arrow" }
}"#;

/// Projectile blueprints.
pub const PROJECTILES_JSON: &str = r#"{
    "arrow":   { "arc_height": 4, "total_flight_time": 0.5 },
    "javelin": { "total_flight_time": 1 }
}"#;

/// Skill blueprints.
pub const SKILLS_JSON: &str = r#"{
    "rally": { "name": "Rally", "description": "Double attack for a while.",
               "cooldown": 5, "duration": 3, "atk": 2, "hp": 1.5 }
}"#;

/// Registry loaded with every fixture table.
///
/// # Panics
///
/// Panics if a fixture table fails to parse.
#[must_use]
pub fn sample_blueprints() -> BlueprintRegistry {
    let mut registry = BlueprintRegistry::new();
    registry.load_players_json("players", PLAYERS_JSON).unwrap();
    registry.load_enemies_json("enemies", ENEMIES_JSON).unwrap();
    registry
        .load_projectiles_json("projectiles", PROJECTILES_JSON)
        .unwrap();
    registry.load_skills_json("skills", SKILLS_JSON).unwrap();
    registry
}

/// A two-node lane from `(0, 0)` to `(length, 0)` with no waves.
///
/// # Panics
///
/// Panics if the generated JSON fails to parse.
#[must_use]
pub fn straight_level(length: i32) -> LevelData {
    LevelData::from_json(
        "straight",
        &format!(
            r#"{{ "name": "straight",
                 "waypoints": {{ "0": {{ "x": 0, "y": 0, "next": 1 }},
                                "1": {{ "x": {length}, "y": 0 }} }},
                 "start_nodes": [0],
                 "home_hp": 3, "initial_cost": 100, "cost_gen_per_second": 0 }}"#
        ),
    )
    .unwrap()
}

/// [`straight_level`] with one wave of `class` enemies spawning `delay`
/// seconds apart.
///
/// # Panics
///
/// Panics if the generated JSON fails to parse.
#[must_use]
pub fn wave_level(length: i32, class: &str, count: usize, delay: i32) -> LevelData {
    let mut level = straight_level(length);
    let entries = (0..count)
        .map(|_| format!(r#"{{ "enemy": "{class}", "delay": {delay}, "start": 0 }}"#))
        .collect::<Vec<_>>()
        .join(",");
    let waves = format!(r#"[{{ "entries": [{entries}] }}]"#);
    level.waves = serde_json::from_str(&waves).unwrap();
    level
}

/// A simulation over `level` with the sample blueprints and default config.
///
/// # Panics
///
/// Panics if the level is invalid.
#[must_use]
pub fn simulation(level: LevelData) -> Simulation {
    Simulation::new(SimConfig::default(), level, sample_blueprints()).unwrap()
}

/// A small defended battle: a knight and an archer hold a 100-unit lane
/// against a wave of six slimes.
///
/// # Panics
///
/// Panics if deployment fails.
#[must_use]
pub fn defended_battle() -> Simulation {
    let mut sim = simulation(wave_level(100, "slime", 6, 2));
    sim.deploy_player("knight", td_core::math::Vec2Fixed::from_ints(60, 0), 1, 1)
        .unwrap();
    sim.deploy_player("archer", td_core::math::Vec2Fixed::from_ints(70, 10), 1, 1)
        .unwrap();
    sim
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_consistent() {
        assert!(sample_blueprints().dangling_references().is_empty());
        let level = wave_level(10, "slime", 5, 1);
        assert_eq!(level.enemy_total(), 5);
        assert!(level.validate().is_ok());
    }

    #[test]
    fn test_defended_battle_spends_cost() {
        let sim = defended_battle();
        assert_eq!(sim.world().len(), 2);
        assert_eq!(sim.stats().cost, fixed(82));
    }
}
