//! Loading game data from disk.
//!
//! All file I/O for a battle happens here, before the simulation starts.
//! Parsing itself is delegated to `td_core`; this module maps paths to
//! source labels so parse errors name the offending file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use td_core::blueprint::BlueprintRegistry;
use td_core::config::SimConfig;
use td_core::error::GameError;
use td_core::level::LevelData;
use td_core::session::SessionData;

/// Error type for data loading.
#[derive(Error, Debug)]
pub enum LoadError {
    /// File not found.
    #[error("Data file not found: {0}")]
    FileNotFound(String),
    /// Failed to read or write a file.
    #[error("Failed to access data file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse a RON config.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Data parsed but was rejected by the simulation.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Result type alias using [`LoadError`].
pub type Result<T> = std::result::Result<T, LoadError>;

fn read(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.display().to_string()));
    }
    let contents = fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "data file read");
    Ok(contents)
}

/// Load the blueprint tables from a data directory.
///
/// `players.json` and `enemies.json` are required; projectile and skill
/// tables are optional.
pub fn load_blueprints(dir: &Path) -> Result<BlueprintRegistry> {
    let mut registry = BlueprintRegistry::new();

    let path = dir.join("players.json");
    let count = registry.load_players_json(&path.display().to_string(), &read(&path)?)?;
    tracing::info!(count, "player blueprints loaded");

    let path = dir.join("enemies.json");
    let count = registry.load_enemies_json(&path.display().to_string(), &read(&path)?)?;
    tracing::info!(count, "enemy blueprints loaded");

    let path = dir.join("projectiles.json");
    if path.exists() {
        let count = registry.load_projectiles_json(&path.display().to_string(), &read(&path)?)?;
        tracing::info!(count, "projectile blueprints loaded");
    }

    let path = dir.join("skills.json");
    if path.exists() {
        let count = registry.load_skills_json(&path.display().to_string(), &read(&path)?)?;
        tracing::info!(count, "skill blueprints loaded");
    }

    Ok(registry)
}

/// Load and validate a level file.
pub fn load_level(path: &Path) -> Result<LevelData> {
    let level = LevelData::from_json(&path.display().to_string(), &read(path)?)?;
    level.validate()?;
    Ok(level)
}

/// Load a RON config, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => {
            let config: SimConfig = ron::from_str(&read(path)?)?;
            tracing::info!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(SimConfig::default()),
    }
}

/// Load a session file.
pub fn load_session(path: &Path) -> Result<SessionData> {
    Ok(SessionData::from_json(&path.display().to_string(), &read(path)?)?)
}

/// Write a session file, replacing any previous contents.
pub fn save_session(path: &Path, session: &SessionData) -> Result<()> {
    fs::write(path, session.to_json_pretty()?)?;
    tracing::info!(path = %path.display(), level = session.level, point = session.point, "session saved");
    Ok(())
}

/// Levels found in a data directory (`level_*.json`), sorted by path.
pub fn level_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(LoadError::FileNotFound(dir.display().to_string()));
    }
    let mut levels = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_level = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("level_") && name.ends_with(".json"));
        if is_level {
            levels.push(path);
        }
    }
    levels.sort();
    Ok(levels)
}

/// Everything a battle needs, loaded together.
#[derive(Debug, Clone)]
pub struct DataSet {
    /// Blueprint tables.
    pub blueprints: BlueprintRegistry,
    /// Level to play.
    pub level: LevelData,
    /// Simulation tuning.
    pub config: SimConfig,
}

impl DataSet {
    /// Load blueprints from `data_dir`, the level at `level`, and the
    /// optional config.
    pub fn load(data_dir: &Path, level: &Path, config: Option<&Path>) -> Result<Self> {
        Ok(Self {
            blueprints: load_blueprints(data_dir)?,
            level: load_level(level)?,
            config: load_config(config)?,
        })
    }
}

/// Findings of a data directory check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Player classes found.
    pub players: usize,
    /// Enemy classes found.
    pub enemies: usize,
    /// Levels that loaded and validated.
    pub levels: Vec<String>,
    /// Every problem found, one message each.
    pub problems: Vec<String>,
}

impl ValidationReport {
    /// Whether no problems were found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check blueprints and every level in `dir`.
///
/// Blueprint tables that fail to load abort the check; per-level problems
/// are collected in the report.
pub fn validate_data_dir(dir: &Path) -> Result<ValidationReport> {
    let blueprints = load_blueprints(dir)?;
    let mut report = ValidationReport {
        players: blueprints.player_classes().count(),
        enemies: blueprints.enemy_classes().count(),
        problems: blueprints.dangling_references(),
        ..ValidationReport::default()
    };

    for path in level_files(dir)? {
        let name = path.display().to_string();
        let level = match load_level(&path) {
            Ok(level) => level,
            Err(err) => {
                report.problems.push(err.to_string());
                continue;
            }
        };
        for wave in &level.waves {
            for entry in &wave.entries {
                if blueprints.enemy(&entry.enemy).is_err() {
                    report
                        .problems
                        .push(format!("{name}: wave references unknown enemy '{}'", entry.enemy));
                }
            }
        }
        report.levels.push(name);
    }

    tracing::info!(
        levels = report.levels.len(),
        problems = report.problems.len(),
        "data directory checked"
    );
    Ok(report)
}
