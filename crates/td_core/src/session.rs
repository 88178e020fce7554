//! Progression saved between battles.
//!
//! The session file is JSON:
//!
//! ```json
//! { "level": 1, "point": 0, "level_clear": false,
//!   "unit": { "Aria": { "class": "archer", "level": 1, "rarity": 2 } } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::{GameStats, Outcome};
use crate::error::{GameError, Result};

/// One recruited unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Player blueprint class.
    pub class: String,
    /// Unit level.
    pub level: u32,
    /// Unit rarity.
    pub rarity: u32,
}

/// Saved progression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Current level number.
    pub level: u32,
    /// Accumulated points. May go negative after spending.
    pub point: i64,
    /// Whether the current level has been cleared.
    pub level_clear: bool,
    /// Roster keyed by unit name.
    #[serde(default)]
    pub unit: BTreeMap<String, UnitRecord>,
}

impl SessionData {
    /// Parse a session from JSON. `source` names the data in errors.
    pub fn from_json(source: &str, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| GameError::DataParseError {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Pretty-printed JSON for saving.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize session: {e}")))
    }

    /// Add or replace a roster entry.
    pub fn add_unit(&mut self, name: impl Into<String>, record: UnitRecord) {
        self.unit.insert(name.into(), record);
    }

    /// Remove a roster entry, returning it if present.
    pub fn remove_unit(&mut self, name: &str) -> Option<UnitRecord> {
        let removed = self.unit.remove(name);
        if removed.is_none() {
            tracing::error!(name, "no such unit in session");
        }
        removed
    }

    /// Fold a finished battle into the session.
    ///
    /// Victory clears the level and awards one point per kill; defeat
    /// leaves the level uncleared. An undecided battle changes nothing.
    pub fn record_outcome(&mut self, stats: &GameStats) {
        match stats.outcome {
            Some(Outcome::Victory) => {
                self.level_clear = true;
                self.point += i64::from(stats.enemy_killed_count);
            }
            Some(Outcome::Defeat) => self.level_clear = false,
            None => {}
        }
    }
}
