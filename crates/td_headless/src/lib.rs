//! Headless battle runner for CI verification and balance checks.
//!
//! This crate loads game data from disk, drives a [`td_core`] battle at a
//! fixed Δt without any presentation, and reports the result as JSON. It
//! also folds the outcome into a saved session.
//!
//! - **stdout**: the JSON summary only
//! - **stderr**: logs (human-readable)
//!
//! # Data directory
//!
//! | File               | Contents                     | Required |
//! |--------------------|------------------------------|----------|
//! | `players.json`     | player blueprints            | yes      |
//! | `enemies.json`     | enemy blueprints             | yes      |
//! | `projectiles.json` | projectile blueprints        | no       |
//! | `skills.json`      | skill blueprints             | no       |
//! | `level_*.json`     | levels (checked by `validate`) | no     |
//!
//! # Example
//!
//! ```bash
//! # Run level 1 for two minutes with a knight on the lane
//! cargo run -p td_headless -- run --data data --level data/level_1.json \
//!     --seconds 120 --deploy knight@60,0
//!
//! # Check every data file
//! cargo run -p td_headless -- validate --data data
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod runner;

pub use loader::{DataSet, LoadError};
pub use runner::{run_battle, BattleSummary, Deployment, RunConfig};
