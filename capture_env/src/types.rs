//! Common types shared by the snapshot interface and the trackers.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// World-space position of an entity.
pub type Position = Vector3<f32>;

/// One of the two opposing sides, or `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    #[default]
    Unknown,
    Red,
    Blu,
}

impl Team {
    /// Both playable sides, in index order.
    pub const SIDES: [Team; 2] = [Team::Red, Team::Blu];

    /// Maps a raw team number from the snapshot (2 = red, 3 = blu).
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            2 => Team::Red,
            3 => Team::Blu,
            _ => Team::Unknown,
        }
    }

    /// The raw team number used by the snapshot's array layouts.
    pub fn raw(&self) -> Option<usize> {
        match self {
            Team::Red => Some(2),
            Team::Blu => Some(3),
            Team::Unknown => None,
        }
    }

    /// Red -> 0, Blu -> 1. Used to index per-side storage.
    pub fn index(&self) -> Option<usize> {
        match self {
            Team::Red => Some(0),
            Team::Blu => Some(1),
            Team::Unknown => None,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Team::Unknown => "unknown",
            Team::Red => "red",
            Team::Blu => "blu",
        };
        write!(f, "{}", name)
    }
}

/// Classification of a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    CaptureFlag,
    CartDispenser,
    ObjectiveResource,
    Other,
}

/// Opaque reference to an entity in the current snapshot.
///
/// A slot index can be reused by a later entity; the serial tells the two
/// apart, so a stale handle never resolves to the newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    pub index: u32,
    pub serial: u32,
}

impl EntityHandle {
    pub fn new(index: u32, serial: u32) -> Self {
        Self { index, serial }
    }
}

impl std::fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}:{}", self.index, self.serial)
    }
}
