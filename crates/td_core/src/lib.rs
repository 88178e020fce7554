//! # TD Core
//!
//! Deterministic battle simulation for Lane Defense, a lane-based tower
//! defense game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering or audio (presentation cues are emitted as events)
//! - No file IO (data arrives as strings)
//! - No randomness
//! - No floating-point math in the simulation (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`world`] - Entity store with typed component storages and queries
//! - [`bus`] / [`events`] - Deferred typed event bus and the event set
//! - [`components`] - Component definitions
//! - [`blueprint`], [`level`], [`session`], [`config`] - Data model
//! - [`pathing`], [`targeting`], [`projectile`], [`combat`], [`skills`],
//!   [`progression`], [`rules`], [`waves`], [`lifecycle`] - Systems and handlers
//! - [`simulation`] - Battle driver
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod blueprint;
pub mod bus;
pub mod combat;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod factory;
pub mod level;
pub mod lifecycle;
pub mod math;
pub mod pathing;
pub mod progression;
pub mod projectile;
pub mod rules;
pub mod session;
pub mod simulation;
pub mod skills;
pub mod targeting;
pub mod waves;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::blueprint::{
        BlueprintRegistry, EnemyBlueprint, PlayerBlueprint, ProjectileBlueprint, SkillBlueprint,
    };
    pub use crate::bus::{EventBus, OwnerId, Publisher, SubscriptionId};
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::context::{BattleContext, GameStats, Outcome};
    pub use crate::error::{GameError, Result};
    pub use crate::events::*;
    pub use crate::level::LevelData;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::session::SessionData;
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::world::{EntityId, World};
}
