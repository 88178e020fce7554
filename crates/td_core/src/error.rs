//! Error types for the battle simulation.

use thiserror::Error;

use crate::world::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all battle simulation errors.
///
/// Nothing here escapes [`Simulation::tick`](crate::simulation::Simulation::tick);
/// per-entity failures are logged and skipped inside the tick. These errors
/// surface from setup calls and from explicit world access.
#[derive(Debug, Error)]
pub enum GameError {
    /// The entity id was destroyed (or never allocated).
    #[error("Stale entity reference: {0}")]
    StaleEntity(EntityId),

    /// A live entity lacks a component the operation requires.
    #[error("Entity {entity} has no {component} component")]
    MissingComponent {
        /// Entity that was queried.
        entity: EntityId,
        /// Component type name.
        component: &'static str,
    },

    /// Unknown blueprint class or skill id.
    #[error("Missing blueprint: {0}")]
    MissingBlueprint(String),

    /// Level data failed validation.
    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    /// Data file parsing error.
    #[error("Failed to parse data '{path}': {message}")]
    DataParseError {
        /// Path or label of the data that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Not enough cost to deploy or upgrade.
    #[error("Insufficient cost: need {required}, have {available}")]
    InsufficientCost {
        /// Cost required.
        required: u32,
        /// Cost available (floored).
        available: u32,
    },

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
