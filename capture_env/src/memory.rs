//! In-memory world implementing every collaborator trait.
//!
//! Used by the simulation harness and by unit tests to stand in for the
//! live game. Entities keep insertion order, which is the snapshot order
//! the trackers observe.

use crate::convar::{ConVarId, ConVarStore};
use crate::error::EnvError;
use crate::snapshot::{EntitySnapshot, Field, FieldDescriptor, LevelInfo};
use crate::types::{EntityHandle, EntityKind, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Bit offset of the serial inside an encoded network handle.
const NETWORK_SERIAL_SHIFT: u32 = 16;

/// Sentinel stored in `OwnerEntity` when nobody owns the entity.
pub const INVALID_NETWORK_HANDLE: i32 = -1;

/// A typed field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i32),
    Bool(bool),
    Vector(Position),
}

impl FieldValue {
    /// Zero value of the same type, used to pad array fields.
    fn zeroed(&self) -> Self {
        match self {
            FieldValue::Int(_) => FieldValue::Int(0),
            FieldValue::Bool(_) => FieldValue::Bool(false),
            FieldValue::Vector(_) => FieldValue::Vector(Position::zeros()),
        }
    }
}

/// One entity of the in-memory world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntity {
    pub handle: EntityHandle,
    pub kind: EntityKind,
    pub dormant: bool,
    fields: HashMap<Field, Vec<FieldValue>>,
}

impl MemoryEntity {
    fn new(handle: EntityHandle, kind: EntityKind) -> Self {
        Self {
            handle,
            kind,
            dormant: false,
            fields: HashMap::new(),
        }
    }

    fn get(&self, desc: FieldDescriptor) -> Option<FieldValue> {
        self.fields.get(&desc.field)?.get(desc.element).copied()
    }

    fn set(&mut self, desc: FieldDescriptor, value: FieldValue) {
        let slot = self.fields.entry(desc.field).or_default();
        if slot.len() <= desc.element {
            slot.resize(desc.element + 1, value.zeroed());
        }
        slot[desc.element] = value;
    }
}

/// In-memory entity snapshot, console variables and level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryWorld {
    level_name: String,
    entities: Vec<MemoryEntity>,
    convars: Vec<(String, bool)>,
    next_index: u32,
    next_serial: u32,
}

impl MemoryWorld {
    /// Creates an empty world for the named level.
    pub fn new(level_name: impl Into<String>) -> Self {
        Self {
            level_name: level_name.into(),
            // Index 0 is reserved for the world entity in the engine.
            next_index: 1,
            ..Default::default()
        }
    }

    /// Loads a world previously written with `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, EnvError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, EnvError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), EnvError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    // ========================================================================
    // ENTITY LIFECYCLE
    // ========================================================================

    /// Spawns an entity in a fresh slot.
    pub fn spawn(&mut self, kind: EntityKind) -> EntityHandle {
        let index = self.next_index;
        self.next_index += 1;
        self.spawn_at(index, kind)
    }

    /// Spawns an entity reusing `index`; any current occupant is removed.
    ///
    /// The new entity gets a fresh serial, so handles to the old occupant
    /// go stale.
    pub fn spawn_at(&mut self, index: u32, kind: EntityKind) -> EntityHandle {
        self.entities.retain(|e| e.handle.index != index);
        self.next_serial += 1;
        let handle = EntityHandle::new(index, self.next_serial);
        self.entities.push(MemoryEntity::new(handle, kind));
        handle
    }

    pub fn remove(&mut self, handle: EntityHandle) -> Result<(), EnvError> {
        let before = self.entities.len();
        self.entities.retain(|e| e.handle != handle);
        if self.entities.len() == before {
            return Err(EnvError::UnknownEntity(handle));
        }
        Ok(())
    }

    /// Changes the kind of a live entity in place.
    pub fn set_kind(&mut self, handle: EntityHandle, kind: EntityKind) -> Result<(), EnvError> {
        self.entity_mut(handle)?.kind = kind;
        Ok(())
    }

    pub fn set_dormant(&mut self, handle: EntityHandle, dormant: bool) -> Result<(), EnvError> {
        self.entity_mut(handle)?.dormant = dormant;
        Ok(())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ========================================================================
    // FIELD WRITES
    // ========================================================================

    pub fn set_int(
        &mut self,
        handle: EntityHandle,
        field: impl Into<FieldDescriptor>,
        value: i32,
    ) -> Result<(), EnvError> {
        self.entity_mut(handle)?.set(field.into(), FieldValue::Int(value));
        Ok(())
    }

    pub fn set_bool(
        &mut self,
        handle: EntityHandle,
        field: impl Into<FieldDescriptor>,
        value: bool,
    ) -> Result<(), EnvError> {
        self.entity_mut(handle)?.set(field.into(), FieldValue::Bool(value));
        Ok(())
    }

    pub fn set_vector(
        &mut self,
        handle: EntityHandle,
        field: impl Into<FieldDescriptor>,
        value: Position,
    ) -> Result<(), EnvError> {
        self.entity_mut(handle)?.set(field.into(), FieldValue::Vector(value));
        Ok(())
    }

    /// Writes a whole integer array field starting at element 0.
    pub fn set_int_array(&mut self, handle: EntityHandle, field: Field, values: &[i32]) -> Result<(), EnvError> {
        let entity = self.entity_mut(handle)?;
        for (i, v) in values.iter().enumerate() {
            entity.set(field.at(i), FieldValue::Int(*v));
        }
        Ok(())
    }

    /// Writes a whole boolean array field starting at element 0.
    pub fn set_bool_array(&mut self, handle: EntityHandle, field: Field, values: &[bool]) -> Result<(), EnvError> {
        let entity = self.entity_mut(handle)?;
        for (i, v) in values.iter().enumerate() {
            entity.set(field.at(i), FieldValue::Bool(*v));
        }
        Ok(())
    }

    /// Convenience for the common `Origin` write.
    pub fn set_origin(&mut self, handle: EntityHandle, origin: Position) -> Result<(), EnvError> {
        self.set_vector(handle, Field::Origin, origin)
    }

    /// Stores `owner` as the encoded network handle in `OwnerEntity`;
    /// `None` clears it.
    pub fn set_owner(&mut self, handle: EntityHandle, owner: Option<EntityHandle>) -> Result<(), EnvError> {
        let raw = owner.map_or(INVALID_NETWORK_HANDLE, encode_network_handle);
        self.set_int(handle, Field::OwnerEntity, raw)
    }

    // ========================================================================
    // LEVEL + CONVARS
    // ========================================================================

    pub fn set_level_name(&mut self, name: impl Into<String>) {
        self.level_name = name.into();
    }

    /// Sets (registering if needed) a boolean console variable.
    pub fn set_convar(&mut self, name: &str, value: bool) {
        match self.convars.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.convars.push((name.to_string(), value)),
        }
    }

    fn entity(&self, handle: EntityHandle) -> Option<&MemoryEntity> {
        self.entities.iter().find(|e| e.handle == handle)
    }

    fn entity_mut(&mut self, handle: EntityHandle) -> Result<&mut MemoryEntity, EnvError> {
        self.entities
            .iter_mut()
            .find(|e| e.handle == handle)
            .ok_or(EnvError::UnknownEntity(handle))
    }
}

/// Encodes a handle the way the engine stores entity references.
pub fn encode_network_handle(handle: EntityHandle) -> i32 {
    ((handle.serial << NETWORK_SERIAL_SHIFT) | (handle.index & 0xFFFF)) as i32
}

fn decode_network_handle(raw: i32) -> Option<EntityHandle> {
    if raw == INVALID_NETWORK_HANDLE {
        return None;
    }
    let raw = raw as u32;
    Some(EntityHandle::new(raw & 0xFFFF, raw >> NETWORK_SERIAL_SHIFT))
}

impl EntitySnapshot for MemoryWorld {
    fn entities(&self) -> Vec<EntityHandle> {
        self.entities.iter().map(|e| e.handle).collect()
    }

    fn is_valid(&self, handle: EntityHandle) -> bool {
        self.entity(handle).is_some()
    }

    fn kind(&self, handle: EntityHandle) -> Option<EntityKind> {
        self.entity(handle).map(|e| e.kind)
    }

    fn is_dormant(&self, handle: EntityHandle) -> bool {
        self.entity(handle).is_some_and(|e| e.dormant)
    }

    fn read_int(&self, handle: EntityHandle, field: FieldDescriptor) -> Option<i32> {
        match self.entity(handle)?.get(field)? {
            FieldValue::Int(v) => Some(v),
            _ => None,
        }
    }

    fn read_bool(&self, handle: EntityHandle, field: FieldDescriptor) -> Option<bool> {
        match self.entity(handle)?.get(field)? {
            FieldValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn read_vector(&self, handle: EntityHandle, field: FieldDescriptor) -> Option<Position> {
        match self.entity(handle)?.get(field)? {
            FieldValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    fn resolve_network_handle(&self, raw: i32) -> Option<EntityHandle> {
        let handle = decode_network_handle(raw)?;
        self.entity(handle).map(|e| e.handle)
    }
}

impl ConVarStore for MemoryWorld {
    fn find_convar(&self, name: &str) -> Option<ConVarId> {
        self.convars.iter().position(|(n, _)| n == name).map(ConVarId)
    }

    fn convar_bool(&self, id: ConVarId) -> Option<bool> {
        self.convars.get(id.0).map(|(_, v)| *v)
    }
}

impl LevelInfo for MemoryWorld {
    fn level_name(&self) -> String {
        self.level_name.clone()
    }
}
