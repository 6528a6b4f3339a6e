//! Capture Environment Abstraction Layer
//!
//! This crate defines the collaborators the capture trackers read from,
//! so that the same tracker code runs against the live game, an in-memory
//! world, or the deterministic simulation harness.
//!
//! # Collaborators
//!
//! - **Clock**: `CaptureContext` (`now()`, `sleep()`)
//! - **Entities**: `EntitySnapshot` with typed reads by `FieldDescriptor`
//! - **Console variables**: `ConVarStore`, cached through `CachedConVar`
//! - **Level metadata**: `LevelInfo`
//!
//! `World` bundles the three world-facing traits; `MemoryWorld` implements
//! all of them.
//!
//! # Example
//!
//! ```ignore
//! use capture_env::{EntityKind, Field, MemoryWorld, Position};
//!
//! let mut world = MemoryWorld::new("ctf_2fort");
//! let flag = world.spawn(EntityKind::CaptureFlag);
//! world.set_int(flag, Field::Team, 2)?;
//! world.set_origin(flag, Position::new(0.0, 0.0, 0.0))?;
//! ```

mod context;
mod convar;
mod error;
mod memory;
mod snapshot;
mod tokio_impl;
mod types;

pub use context::CaptureContext;
pub use convar::{CachedConVar, ConVarId, ConVarStore};
pub use error::EnvError;
pub use memory::{encode_network_handle, FieldValue, MemoryEntity, MemoryWorld, INVALID_NETWORK_HANDLE};
pub use snapshot::{EntitySnapshot, Field, FieldDescriptor, LevelInfo, World};
pub use tokio_impl::TokioContext;
pub use types::{EntityHandle, EntityKind, Position, Team};
