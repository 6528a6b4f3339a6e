//! Flag tracker for capture-the-flag rounds.
//!
//! Tracks up to two flags, one per side. Slots are filled in snapshot order
//! (first discovered wins) and never re-ordered; a slot whose entity stops
//! being a flag is reset so it can be rediscovered.

use capture_env::{EntityHandle, EntityKind, EntitySnapshot, Field, Position, Team};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// `FlagType` value of a classic capture-the-flag flag.
pub const FLAG_TYPE_CTF: i32 = 0;

/// Live status of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlagStatus {
    #[default]
    Home,
    Carried,
    Dropped,
}

impl FlagStatus {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(FlagStatus::Home),
            1 => Some(FlagStatus::Carried),
            2 => Some(FlagStatus::Dropped),
            _ => None,
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            FlagStatus::Home => 0,
            FlagStatus::Carried => 1,
            FlagStatus::Dropped => 2,
        }
    }
}

/// What the tracker remembers about one flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
    /// The flag entity; re-validated every refresh
    pub handle: Option<EntityHandle>,

    /// Side the flag belongs to, assigned once observed
    pub team: Team,

    /// Where the flag was first seen at home
    pub home: Option<Position>,
}

impl FlagRecord {
    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }
}

/// Tracks both sides' flags.
#[derive(Debug)]
pub struct FlagTracker {
    slots: [FlagRecord; 2],
    enabled: bool,
}

impl Default for FlagTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A live flag: the entity exists and is still a flag. Dormant flags pass.
fn is_flag_good<S: EntitySnapshot + ?Sized>(snapshot: &S, handle: EntityHandle) -> bool {
    snapshot.is_valid(handle) && snapshot.kind(handle) == Some(EntityKind::CaptureFlag)
}

impl FlagTracker {
    pub fn new() -> Self {
        Self {
            slots: [FlagRecord::default(); 2],
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling turns `refresh` into a no-op until the next level reset.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Discovers flags and updates their records.
    pub fn refresh<S: EntitySnapshot + ?Sized>(&mut self, snapshot: &S) {
        if !self.enabled {
            return;
        }

        if self.slots.iter().any(FlagRecord::is_empty) {
            self.discover(snapshot);
        }

        for (slot_index, slot) in self.slots.iter_mut().enumerate() {
            let Some(handle) = slot.handle else {
                continue;
            };

            if !is_flag_good(snapshot, handle) {
                debug!(slot = slot_index, %handle, "flag entity lost, resetting slot");
                *slot = FlagRecord::default();
                continue;
            }

            // Still potentially valid, just not being updated
            if snapshot.is_dormant(handle) {
                continue;
            }

            if snapshot.read_int(handle, Field::FlagType.scalar()) != Some(FLAG_TYPE_CTF) {
                continue;
            }

            if slot.team == Team::Unknown {
                let team = snapshot
                    .read_int(handle, Field::Team.scalar())
                    .map_or(Team::Unknown, Team::from_raw);
                if team != Team::Unknown {
                    debug!(slot = slot_index, %handle, %team, "flag team assigned");
                    slot.team = team;
                }
            }

            if slot.home.is_none() {
                let status = snapshot
                    .read_int(handle, Field::FlagStatus.scalar())
                    .and_then(FlagStatus::from_raw);
                if status == Some(FlagStatus::Home) {
                    slot.home = snapshot.read_vector(handle, Field::Origin.scalar());
                    trace!(slot = slot_index, home = ?slot.home, "flag home captured");
                }
            }
        }
    }

    fn discover<S: EntitySnapshot + ?Sized>(&mut self, snapshot: &S) {
        for handle in snapshot.entities() {
            if snapshot.kind(handle) != Some(EntityKind::CaptureFlag) {
                continue;
            }
            if self.slots.iter().any(|s| s.handle == Some(handle)) {
                continue;
            }
            match self.slots.iter_mut().find(|s| s.is_empty()) {
                Some(slot) => {
                    debug!(%handle, "flag discovered");
                    slot.handle = Some(handle);
                }
                None => break,
            }
        }
    }

    /// Record of the given side's flag, or an empty record.
    pub fn objective(&self, team: Team) -> FlagRecord {
        if team == Team::Unknown {
            return FlagRecord::default();
        }
        self.slots
            .iter()
            .find(|s| s.team == team)
            .copied()
            .unwrap_or_default()
    }

    /// Handle of the side's flag if it is still a live flag.
    fn live_flag<S: EntitySnapshot + ?Sized>(&self, snapshot: &S, team: Team) -> Option<EntityHandle> {
        self.objective(team)
            .handle
            .filter(|h| is_flag_good(snapshot, *h))
    }

    /// Current position of the side's flag.
    pub fn position<S: EntitySnapshot + ?Sized>(&self, snapshot: &S, team: Team) -> Option<Position> {
        let handle = self.live_flag(snapshot, team)?;
        snapshot.read_vector(handle, Field::Origin.scalar())
    }

    /// Where the side's flag was first seen at home. Never changes once set.
    pub fn home_position(&self, team: Team) -> Option<Position> {
        self.objective(team).home
    }

    /// The player currently carrying the side's flag.
    pub fn carrier<S: EntitySnapshot + ?Sized>(&self, snapshot: &S, team: Team) -> Option<EntityHandle> {
        let flag = self.live_flag(snapshot, team)?;
        let raw = snapshot.read_int(flag, Field::OwnerEntity.scalar())?;
        let carrier = snapshot.resolve_network_handle(raw)?;
        if !snapshot.is_good(carrier) || snapshot.kind(carrier) != Some(EntityKind::Player) {
            return None;
        }
        Some(carrier)
    }

    /// Live status of the side's flag. Reads as `Home` when untracked.
    pub fn status<S: EntitySnapshot + ?Sized>(&self, snapshot: &S, team: Team) -> FlagStatus {
        self.live_flag(snapshot, team)
            .and_then(|h| snapshot.read_int(h, Field::FlagStatus.scalar()))
            .and_then(FlagStatus::from_raw)
            .unwrap_or(FlagStatus::Home)
    }

    /// Both slots, in discovery order.
    pub fn slots(&self) -> &[FlagRecord; 2] {
        &self.slots
    }

    pub fn level_reset(&mut self) {
        self.slots = [FlagRecord::default(); 2];
        self.enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_env::MemoryWorld;

    fn spawn_flag(world: &mut MemoryWorld, team: i32, origin: Position, status: FlagStatus) -> EntityHandle {
        let flag = world.spawn(EntityKind::CaptureFlag);
        world.set_int(flag, Field::Team, team).unwrap();
        world.set_int(flag, Field::FlagType, FLAG_TYPE_CTF).unwrap();
        world.set_int(flag, Field::FlagStatus, status.raw()).unwrap();
        world.set_origin(flag, origin).unwrap();
        world.set_owner(flag, None).unwrap();
        flag
    }

    fn ctf_world() -> (MemoryWorld, EntityHandle, EntityHandle) {
        let mut world = MemoryWorld::new("ctf_2fort");
        world.spawn(EntityKind::Player);
        let red = spawn_flag(&mut world, 2, Position::new(-100.0, 0.0, 0.0), FlagStatus::Home);
        let blu = spawn_flag(&mut world, 3, Position::new(100.0, 0.0, 0.0), FlagStatus::Home);
        (world, red, blu)
    }

    #[test]
    fn test_discovers_both_flags_in_snapshot_order() {
        let (world, red, blu) = ctf_world();
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        assert_eq!(tracker.slots()[0].handle, Some(red));
        assert_eq!(tracker.slots()[1].handle, Some(blu));
        assert_eq!(tracker.objective(Team::Red).handle, Some(red));
        assert_eq!(tracker.objective(Team::Blu).handle, Some(blu));
        assert_eq!(tracker.home_position(Team::Red), Some(Position::new(-100.0, 0.0, 0.0)));
    }

    #[test]
    fn test_home_position_is_immutable() {
        let (mut world, red, _) = ctf_world();
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        world.set_int(red, Field::FlagStatus, FlagStatus::Carried.raw()).unwrap();
        world.set_origin(red, Position::new(0.0, 50.0, 0.0)).unwrap();
        tracker.refresh(&world);

        assert_eq!(tracker.home_position(Team::Red), Some(Position::new(-100.0, 0.0, 0.0)));
        assert_eq!(tracker.position(&world, Team::Red), Some(Position::new(0.0, 50.0, 0.0)));
        assert_eq!(tracker.status(&world, Team::Red), FlagStatus::Carried);

        // Dropped somewhere else, then returned home at a new spot: home stays
        world.set_int(red, Field::FlagStatus, FlagStatus::Home.raw()).unwrap();
        world.set_origin(red, Position::new(7.0, 7.0, 7.0)).unwrap();
        tracker.refresh(&world);
        assert_eq!(tracker.home_position(Team::Red), Some(Position::new(-100.0, 0.0, 0.0)));
    }

    #[test]
    fn test_home_captured_only_when_first_seen_home() {
        let mut world = MemoryWorld::new("ctf_2fort");
        let flag = spawn_flag(&mut world, 2, Position::new(5.0, 0.0, 0.0), FlagStatus::Dropped);
        let mut tracker = FlagTracker::new();

        tracker.refresh(&world);
        assert_eq!(tracker.home_position(Team::Red), None);

        world.set_int(flag, Field::FlagStatus, FlagStatus::Home.raw()).unwrap();
        world.set_origin(flag, Position::new(-100.0, 0.0, 0.0)).unwrap();
        tracker.refresh(&world);
        assert_eq!(tracker.home_position(Team::Red), Some(Position::new(-100.0, 0.0, 0.0)));
    }

    #[test]
    fn test_carrier_resolution() {
        let (mut world, _, blu) = ctf_world();
        let player = world.spawn(EntityKind::Player);
        let sentry = world.spawn(EntityKind::Other);
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        assert_eq!(tracker.carrier(&world, Team::Blu), None);

        world.set_owner(blu, Some(player)).unwrap();
        assert_eq!(tracker.carrier(&world, Team::Blu), Some(player));

        // Owner that is not a player
        world.set_owner(blu, Some(sentry)).unwrap();
        assert_eq!(tracker.carrier(&world, Team::Blu), None);

        // Owner that left the game
        world.set_owner(blu, Some(player)).unwrap();
        world.remove(player).unwrap();
        assert_eq!(tracker.carrier(&world, Team::Blu), None);
    }

    #[test]
    fn test_untracked_side_defaults() {
        let world = MemoryWorld::new("ctf_2fort");
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        assert!(tracker.objective(Team::Red).is_empty());
        assert_eq!(tracker.position(&world, Team::Red), None);
        assert_eq!(tracker.carrier(&world, Team::Red), None);
        assert_eq!(tracker.status(&world, Team::Red), FlagStatus::Home);
        assert!(tracker.objective(Team::Unknown).is_empty());
    }

    #[test]
    fn test_kind_change_resets_slot_and_rediscovers() {
        let (mut world, red, blu) = ctf_world();
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        world.set_kind(red, EntityKind::Other).unwrap();
        tracker.refresh(&world);
        assert!(tracker.slots()[0].is_empty());
        assert_eq!(tracker.slots()[1].handle, Some(blu));
        assert!(tracker.objective(Team::Red).is_empty());

        let new_red = spawn_flag(&mut world, 2, Position::new(-90.0, 0.0, 0.0), FlagStatus::Home);
        tracker.refresh(&world);
        assert_eq!(tracker.slots()[0].handle, Some(new_red));
        assert_eq!(tracker.slots()[1].handle, Some(blu));
        assert_eq!(tracker.home_position(Team::Red), Some(Position::new(-90.0, 0.0, 0.0)));
    }

    #[test]
    fn test_dormant_flag_is_preserved() {
        let (mut world, red, _) = ctf_world();
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        world.set_dormant(red, true).unwrap();
        world.set_origin(red, Position::new(1.0, 1.0, 1.0)).unwrap();
        tracker.refresh(&world);

        assert_eq!(tracker.objective(Team::Red).handle, Some(red));
        assert_eq!(tracker.home_position(Team::Red), Some(Position::new(-100.0, 0.0, 0.0)));
    }

    #[test]
    fn test_non_ctf_flag_type_is_not_assigned() {
        let mut world = MemoryWorld::new("sd_doomsday");
        let flag = spawn_flag(&mut world, 2, Position::zeros(), FlagStatus::Home);
        world.set_int(flag, Field::FlagType, 3).unwrap();
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);

        assert_eq!(tracker.slots()[0].handle, Some(flag));
        assert_eq!(tracker.slots()[0].team, Team::Unknown);
        assert!(tracker.objective(Team::Red).is_empty());
    }

    #[test]
    fn test_disabled_tracker_is_noop_until_reset() {
        let (world, _, _) = ctf_world();
        let mut tracker = FlagTracker::new();
        tracker.set_enabled(false);
        tracker.refresh(&world);
        assert!(tracker.slots().iter().all(FlagRecord::is_empty));

        tracker.level_reset();
        assert!(tracker.is_enabled());
        tracker.refresh(&world);
        assert!(!tracker.objective(Team::Blu).is_empty());
    }

    #[test]
    fn test_level_reset_clears_slots() {
        let (world, _, _) = ctf_world();
        let mut tracker = FlagTracker::new();
        tracker.refresh(&world);
        tracker.level_reset();

        assert!(tracker.slots().iter().all(FlagRecord::is_empty));
        assert_eq!(tracker.home_position(Team::Red), None);
    }
}
