//! Error types for the capture environment abstraction.

use crate::types::EntityHandle;
use thiserror::Error;

/// Errors raised while building or loading an in-memory world.
///
/// Reads through `EntitySnapshot` never fail; they return `None`.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Handle does not name a live entity
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityHandle),

    /// World serialization/deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Reading or writing a world file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates a serialization error.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::SerializationError(msg.to_string())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
