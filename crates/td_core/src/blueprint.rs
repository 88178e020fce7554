//! Data-driven unit, projectile and skill definitions.
//!
//! Blueprints are keyed by class name and parsed from JSON tables at scene
//! setup. Parse failures are fatal there; lookups during play are not:
//! an unknown class logs an error and falls back to a best-effort default
//! so one bad wave entry cannot stop a battle.
//!
//! # Example
//!
//! ```
//! use td_core::blueprint::BlueprintRegistry;
//!
//! let mut registry = BlueprintRegistry::new();
//! registry
//!     .load_enemies_json(
//!         "enemies",
//!         r#"{ "slime": { "hp": 50, "atk": 10, "def": 0, "range": 20,
//!                         "atk_interval": 1.5, "speed": 40 } }"#,
//!     )
//!     .unwrap();
//! assert!(registry.enemy("slime").is_ok());
//! assert!(registry.enemy("dragon").is_err());
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::components::{Buff, PlayerKind};
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed};

/// Scale a base stat by level and rarity.
///
/// `base * (0.95 + 0.05 * level) * (0.9 + 0.1 * rarity)`, evaluated as
/// `base * (19 + level) * (9 + rarity) / 200` so level 1 / rarity 1 is
/// exactly `base`.
#[must_use]
pub fn stat_modify(base: Fixed, level: u32, rarity: u32) -> Fixed {
    let factor = level
        .saturating_add(19)
        .saturating_mul(rarity.saturating_add(9));
    base.saturating_mul(Fixed::saturating_from_num(factor)) / Fixed::from_num(200)
}

fn one() -> Fixed {
    Fixed::ONE
}

// ============================================================================
// Blueprint records
// ============================================================================

/// Base combat stats shared by players and enemies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsBlueprint {
    /// Maximum health at level 1 / rarity 1.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Attack.
    #[serde(with = "fixed_serde")]
    pub atk: Fixed,
    /// Defense.
    #[serde(with = "fixed_serde")]
    pub def: Fixed,
    /// Attack range.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_serde")]
    pub atk_interval: Fixed,
}

impl Default for StatsBlueprint {
    fn default() -> Self {
        Self {
            hp: Fixed::from_num(100),
            atk: Fixed::from_num(10),
            def: Fixed::ZERO,
            range: Fixed::from_num(32),
            atk_interval: Fixed::ONE,
        }
    }
}

/// A deployable defender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerBlueprint {
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Attack (heal amount for healers).
    #[serde(with = "fixed_serde")]
    pub atk: Fixed,
    /// Defense.
    #[serde(with = "fixed_serde")]
    pub def: Fixed,
    /// Attack range.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_serde")]
    pub atk_interval: Fixed,
    /// Attack style.
    #[serde(rename = "type", default)]
    pub kind: PlayerKind,
    /// Skill blueprint id.
    #[serde(default)]
    pub skill: Option<String>,
    /// Heals allies instead of attacking.
    #[serde(default)]
    pub healer: bool,
    /// How many enemies the unit can block (0 = none).
    #[serde(default)]
    pub block: u32,
    /// Deployment and upgrade cost.
    #[serde(default)]
    pub cost: u32,
    /// Projectile blueprint for ranged attacks.
    #[serde(default)]
    pub projectile: Option<String>,
}

impl PlayerBlueprint {
    /// The stat block of this blueprint.
    #[must_use]
    pub fn stats(&self) -> StatsBlueprint {
        StatsBlueprint {
            hp: self.hp,
            atk: self.atk,
            def: self.def,
            range: self.range,
            atk_interval: self.atk_interval,
        }
    }
}

impl Default for PlayerBlueprint {
    fn default() -> Self {
        let stats = StatsBlueprint::default();
        Self {
            hp: stats.hp,
            atk: stats.atk,
            def: stats.def,
            range: stats.range,
            atk_interval: stats.atk_interval,
            kind: PlayerKind::Melee,
            skill: None,
            healer: false,
            block: 1,
            cost: 0,
            projectile: None,
        }
    }
}

/// A path-walking attacker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnemyBlueprint {
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Attack.
    #[serde(with = "fixed_serde")]
    pub atk: Fixed,
    /// Defense.
    #[serde(with = "fixed_serde")]
    pub def: Fixed,
    /// Attack range.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Seconds between attacks.
    #[serde(with = "fixed_serde")]
    pub atk_interval: Fixed,
    /// Attacks players in range with projectiles.
    #[serde(default)]
    pub ranged: bool,
    /// Walking speed in units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Projectile blueprint for ranged attacks.
    #[serde(default)]
    pub projectile: Option<String>,
}

impl EnemyBlueprint {
    /// The stat block of this blueprint.
    #[must_use]
    pub fn stats(&self) -> StatsBlueprint {
        StatsBlueprint {
            hp: self.hp,
            atk: self.atk,
            def: self.def,
            range: self.range,
            atk_interval: self.atk_interval,
        }
    }
}

impl Default for EnemyBlueprint {
    fn default() -> Self {
        let stats = StatsBlueprint::default();
        Self {
            hp: stats.hp,
            atk: stats.atk,
            def: stats.def,
            range: stats.range,
            atk_interval: stats.atk_interval,
            ranged: false,
            speed: Fixed::from_num(32),
            projectile: None,
        }
    }
}

/// Flight parameters of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectileBlueprint {
    /// Peak height of the arc.
    #[serde(with = "fixed_serde", default)]
    pub arc_height: Fixed,
    /// Seconds from launch to impact.
    #[serde(with = "fixed_serde")]
    pub total_flight_time: Fixed,
}

/// A unit skill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillBlueprint {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display text.
    #[serde(default)]
    pub description: String,
    /// Always active from spawn.
    #[serde(default)]
    pub passive: bool,
    /// Seconds to charge.
    #[serde(with = "fixed_serde", default)]
    pub cooldown: Fixed,
    /// Seconds active.
    #[serde(with = "fixed_serde", default)]
    pub duration: Fixed,
    /// Heal multiplier applied on activation.
    #[serde(with = "fixed_serde", default = "one")]
    pub hp: Fixed,
    /// Attack multiplier.
    #[serde(with = "fixed_serde", default = "one")]
    pub atk: Fixed,
    /// Defense multiplier.
    #[serde(with = "fixed_serde", default = "one")]
    pub def: Fixed,
    /// Range multiplier.
    #[serde(with = "fixed_serde", default = "one")]
    pub range: Fixed,
    /// Attack interval multiplier.
    #[serde(with = "fixed_serde", default = "one")]
    pub atk_interval: Fixed,
    /// Cost regenerated per second while active.
    #[serde(with = "fixed_serde", default)]
    pub cost_regen: Fixed,
}

impl SkillBlueprint {
    /// Buff granted while the skill is active.
    #[must_use]
    pub fn buff(&self) -> Buff {
        Buff {
            hp: self.hp,
            atk: self.atk,
            def: self.def,
            range: self.range,
            atk_interval: self.atk_interval,
            cost_regen: self.cost_regen,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// All blueprints for a battle, keyed by class or id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintRegistry {
    players: BTreeMap<String, PlayerBlueprint>,
    enemies: BTreeMap<String, EnemyBlueprint>,
    projectiles: BTreeMap<String, ProjectileBlueprint>,
    skills: BTreeMap<String, SkillBlueprint>,
}

fn parse_table<T: DeserializeOwned>(source: &str, json: &str) -> Result<BTreeMap<String, T>> {
    serde_json::from_str(json).map_err(|e| GameError::DataParseError {
        path: source.to_string(),
        message: e.to_string(),
    })
}

impl BlueprintRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a JSON table of player blueprints. `source` names the data in errors.
    pub fn load_players_json(&mut self, source: &str, json: &str) -> Result<usize> {
        let table: BTreeMap<String, PlayerBlueprint> = parse_table(source, json)?;
        let count = table.len();
        self.players.extend(table);
        Ok(count)
    }

    /// Merge a JSON table of enemy blueprints.
    pub fn load_enemies_json(&mut self, source: &str, json: &str) -> Result<usize> {
        let table: BTreeMap<String, EnemyBlueprint> = parse_table(source, json)?;
        let count = table.len();
        self.enemies.extend(table);
        Ok(count)
    }

    /// Merge a JSON table of projectile blueprints.
    pub fn load_projectiles_json(&mut self, source: &str, json: &str) -> Result<usize> {
        let table: BTreeMap<String, ProjectileBlueprint> = parse_table(source, json)?;
        let count = table.len();
        self.projectiles.extend(table);
        Ok(count)
    }

    /// Merge a JSON table of skill blueprints.
    pub fn load_skills_json(&mut self, source: &str, json: &str) -> Result<usize> {
        let table: BTreeMap<String, SkillBlueprint> = parse_table(source, json)?;
        let count = table.len();
        self.skills.extend(table);
        Ok(count)
    }

    /// Register a player blueprint.
    pub fn insert_player(&mut self, class: impl Into<String>, blueprint: PlayerBlueprint) {
        self.players.insert(class.into(), blueprint);
    }

    /// Register an enemy blueprint.
    pub fn insert_enemy(&mut self, class: impl Into<String>, blueprint: EnemyBlueprint) {
        self.enemies.insert(class.into(), blueprint);
    }

    /// Register a projectile blueprint.
    pub fn insert_projectile(&mut self, id: impl Into<String>, blueprint: ProjectileBlueprint) {
        self.projectiles.insert(id.into(), blueprint);
    }

    /// Register a skill blueprint.
    pub fn insert_skill(&mut self, id: impl Into<String>, blueprint: SkillBlueprint) {
        self.skills.insert(id.into(), blueprint);
    }

    /// Look up a player blueprint.
    pub fn player(&self, class: &str) -> Result<&PlayerBlueprint> {
        self.players
            .get(class)
            .ok_or_else(|| GameError::MissingBlueprint(format!("player '{class}'")))
    }

    /// Look up an enemy blueprint.
    pub fn enemy(&self, class: &str) -> Result<&EnemyBlueprint> {
        self.enemies
            .get(class)
            .ok_or_else(|| GameError::MissingBlueprint(format!("enemy '{class}'")))
    }

    /// Look up a projectile blueprint.
    pub fn projectile(&self, id: &str) -> Result<&ProjectileBlueprint> {
        self.projectiles
            .get(id)
            .ok_or_else(|| GameError::MissingBlueprint(format!("projectile '{id}'")))
    }

    /// Look up a skill blueprint.
    pub fn skill(&self, id: &str) -> Result<&SkillBlueprint> {
        self.skills
            .get(id)
            .ok_or_else(|| GameError::MissingBlueprint(format!("skill '{id}'")))
    }

    /// Player blueprint, or the first registered one (then the built-in default)
    /// when `class` is unknown.
    #[must_use]
    pub fn player_or_fallback(&self, class: &str) -> PlayerBlueprint {
        match self.player(class) {
            Ok(blueprint) => blueprint.clone(),
            Err(err) => {
                tracing::error!(class, error = %err, "using fallback player blueprint");
                self.players.values().next().cloned().unwrap_or_default()
            }
        }
    }

    /// Enemy blueprint, or the first registered one (then the built-in default)
    /// when `class` is unknown.
    #[must_use]
    pub fn enemy_or_fallback(&self, class: &str) -> EnemyBlueprint {
        match self.enemy(class) {
            Ok(blueprint) => blueprint.clone(),
            Err(err) => {
                tracing::error!(class, error = %err, "using fallback enemy blueprint");
                self.enemies.values().next().cloned().unwrap_or_default()
            }
        }
    }

    /// Registered player class names, sorted.
    pub fn player_classes(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }

    /// Registered enemy class names, sorted.
    pub fn enemy_classes(&self) -> impl Iterator<Item = &str> {
        self.enemies.keys().map(String::as_str)
    }

    /// Dangling skill and projectile references, one message each.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (class, player) in &self.players {
            if let Some(skill) = &player.skill {
                if !self.skills.contains_key(skill) {
                    problems.push(format!("player '{class}' references unknown skill '{skill}'"));
                }
            }
            if let Some(projectile) = &player.projectile {
                if !self.projectiles.contains_key(projectile) {
                    problems.push(format!(
                        "player '{class}' references unknown projectile '{projectile}'"
                    ));
                }
            }
        }
        for (class, enemy) in &self.enemies {
            if let Some(projectile) = &enemy.projectile {
                if !self.projectiles.contains_key(projectile) {
                    problems.push(format!(
                        "enemy '{class}' references unknown projectile '{projectile}'"
                    ));
                }
            }
        }
        problems
    }
}
