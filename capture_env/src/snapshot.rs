//! Read-only view of the live entity snapshot.
//!
//! Field reads go through named descriptors rather than raw offsets; the
//! provider behind the trait is the only code that knows the external
//! layout.

use crate::types::{EntityHandle, EntityKind, Position};
use crate::convar::ConVarStore;
use serde::{Deserialize, Serialize};

/// Named entity fields the trackers read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    // === Any entity ===
    Team,
    Origin,
    OwnerEntity,

    // === Capture flag ===
    FlagType,
    FlagStatus,

    // === Objective resource (array fields) ===
    NumControlPoints,
    OwningTeam,
    BaseControlPoints,
    CpLocked,
    InMiniRound,
    TeamCanCap,
    PreviousPoints,
    PlayingMiniRounds,
    CpPositions,
}

impl Field {
    /// Descriptor for a scalar field (element 0).
    pub fn scalar(self) -> FieldDescriptor {
        FieldDescriptor { field: self, element: 0 }
    }

    /// Descriptor for one element of an array field.
    pub fn at(self, element: usize) -> FieldDescriptor {
        FieldDescriptor { field: self, element }
    }
}

/// A field plus the element index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub field: Field,
    pub element: usize,
}

impl From<Field> for FieldDescriptor {
    fn from(field: Field) -> Self {
        field.scalar()
    }
}

/// The per-tick collection of live entities.
///
/// Every read returns `None` when the handle is stale or the field is
/// absent or of another type; callers degrade rather than fail.
pub trait EntitySnapshot {
    /// All live entities, in stable snapshot order.
    fn entities(&self) -> Vec<EntityHandle>;

    /// True while the handle still refers to a live entity.
    fn is_valid(&self, handle: EntityHandle) -> bool;

    /// Kind of the entity, `None` if the handle is stale.
    fn kind(&self, handle: EntityHandle) -> Option<EntityKind>;

    /// Dormant entities exist but their fields are not being refreshed.
    fn is_dormant(&self, handle: EntityHandle) -> bool;

    fn read_int(&self, handle: EntityHandle, field: FieldDescriptor) -> Option<i32>;

    fn read_bool(&self, handle: EntityHandle, field: FieldDescriptor) -> Option<bool>;

    fn read_vector(&self, handle: EntityHandle, field: FieldDescriptor) -> Option<Position>;

    /// Resolves an opaque network handle (as stored in `OwnerEntity`) to
    /// the entity it names.
    fn resolve_network_handle(&self, raw: i32) -> Option<EntityHandle>;

    /// Valid and not dormant.
    fn is_good(&self, handle: EntityHandle) -> bool {
        self.is_valid(handle) && !self.is_dormant(handle)
    }
}

/// Level metadata collaborator.
pub trait LevelInfo {
    fn level_name(&self) -> String;
}

/// Everything a tick of the capture driver reads from.
pub trait World: EntitySnapshot + ConVarStore + LevelInfo {}

impl<T: EntitySnapshot + ConVarStore + LevelInfo> World for T {}
