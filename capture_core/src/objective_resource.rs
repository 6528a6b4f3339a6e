//! Typed view over the objective-resource entity.
//!
//! The resource publishes round state as flat arrays. This module is the
//! only place that knows how those arrays are indexed; everything above it
//! works on an owned `RoundState`.

use capture_env::{EntityHandle, EntityKind, EntitySnapshot, Field, Position, Team};
use tracing::debug;

/// Maximum number of control points in a round.
pub const MAX_CONTROL_POINTS: usize = 8;

/// Maximum number of prerequisite entries per point and side.
pub const MAX_PREVIOUS_POINTS: usize = 3;

/// "No point" sentinel in prerequisite and base-point entries.
pub const NO_POINT: i32 = -1;

fn can_cap_element(index: usize, team_raw: usize) -> usize {
    index + team_raw * MAX_CONTROL_POINTS
}

fn previous_point_element(index: usize, team_raw: usize, slot: usize) -> usize {
    slot + index * MAX_PREVIOUS_POINTS + team_raw * MAX_CONTROL_POINTS * MAX_PREVIOUS_POINTS
}

/// Owned copy of the round fields the eligibility rule needs.
///
/// Per-side arrays are indexed with `Team::index()`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub num_points: usize,
    pub owners: [Team; MAX_CONTROL_POINTS],
    pub locked: [bool; MAX_CONTROL_POINTS],
    pub in_mini_round: [bool; MAX_CONTROL_POINTS],
    pub team_can_cap: [[bool; MAX_CONTROL_POINTS]; 2],
    pub previous_points: [[[i32; MAX_PREVIOUS_POINTS]; MAX_CONTROL_POINTS]; 2],
    pub base_points: [i32; 2],
    pub playing_mini_rounds: bool,
}

impl RoundState {
    /// An unowned, unlocked round where both sides may attempt every point
    /// and no prerequisites or bases are set.
    pub fn new(num_points: usize) -> Self {
        Self {
            num_points: num_points.min(MAX_CONTROL_POINTS),
            owners: [Team::Unknown; MAX_CONTROL_POINTS],
            locked: [false; MAX_CONTROL_POINTS],
            in_mini_round: [true; MAX_CONTROL_POINTS],
            team_can_cap: [[true; MAX_CONTROL_POINTS]; 2],
            previous_points: [[[NO_POINT; MAX_PREVIOUS_POINTS]; MAX_CONTROL_POINTS]; 2],
            base_points: [NO_POINT; 2],
            playing_mini_rounds: false,
        }
    }

    /// A linear round: red's base is the first point, blu's the last, and
    /// each base starts owned by its side.
    pub fn linear(num_points: usize) -> Self {
        let mut round = Self::new(num_points);
        if round.num_points > 0 {
            let last = round.num_points - 1;
            round.base_points = [0, last as i32];
            round.owners[0] = Team::Red;
            round.owners[last] = Team::Blu;
        }
        round
    }

    pub fn owner(&self, index: usize) -> Team {
        self.owners.get(index).copied().unwrap_or(Team::Unknown)
    }

    /// Owner of a point named by a raw table entry; out-of-range entries
    /// are owned by nobody.
    pub fn owner_of_entry(&self, entry: i32) -> Team {
        usize::try_from(entry).map_or(Team::Unknown, |index| self.owner(index))
    }

    pub fn team_can_cap(&self, index: usize, team: Team) -> bool {
        match team.index() {
            Some(side) => self.team_can_cap[side].get(index).copied().unwrap_or(false),
            None => false,
        }
    }

    /// Prerequisite entry `slot` of `index` for `team`.
    pub fn previous_point(&self, index: usize, team: Team, slot: usize) -> i32 {
        team.index()
            .and_then(|side| self.previous_points[side].get(index))
            .and_then(|entries| entries.get(slot))
            .copied()
            .unwrap_or(NO_POINT)
    }

    pub fn base_point(&self, team: Team) -> i32 {
        team.index().map_or(NO_POINT, |side| self.base_points[side])
    }

    pub fn set_previous_points(&mut self, index: usize, team: Team, entries: &[i32]) {
        if let Some(side) = team.index() {
            let mut row = [NO_POINT; MAX_PREVIOUS_POINTS];
            for (slot, entry) in row.iter_mut().zip(entries) {
                *slot = *entry;
            }
            self.previous_points[side][index] = row;
        }
    }
}

/// The single handle to the objective resource, re-acquired lazily.
#[derive(Debug, Default)]
pub struct ObjectiveResource {
    handle: Option<EntityHandle>,
}

impl ObjectiveResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<EntityHandle> {
        self.handle
    }

    pub fn release(&mut self) {
        self.handle = None;
    }

    /// Keeps the current handle while it is a live resource; otherwise
    /// scans the snapshot for one.
    ///
    /// A dormant but otherwise valid resource is kept if no replacement is
    /// found.
    pub fn acquire<S: EntitySnapshot + ?Sized>(&mut self, snapshot: &S) -> Option<EntityHandle> {
        let is_resource =
            |h: EntityHandle| snapshot.kind(h) == Some(EntityKind::ObjectiveResource);

        if let Some(handle) = self.handle {
            if snapshot.is_good(handle) && is_resource(handle) {
                return Some(handle);
            }
        }

        let found = snapshot
            .entities()
            .into_iter()
            .find(|&h| is_resource(h));

        match found {
            Some(handle) => {
                if self.handle != Some(handle) {
                    debug!(%handle, "objective resource acquired");
                }
                self.handle = Some(handle);
            }
            None => {
                let keep = self
                    .handle
                    .is_some_and(|h| snapshot.is_valid(h) && is_resource(h));
                if !keep && self.handle.is_some() {
                    debug!("objective resource lost");
                    self.handle = None;
                }
            }
        }
        self.handle
    }

    /// Reported point count, clamped to `MAX_CONTROL_POINTS`. Zero when
    /// there is no resource or the field is unreadable.
    pub fn point_count<S: EntitySnapshot + ?Sized>(&self, snapshot: &S) -> usize {
        self.handle
            .and_then(|h| snapshot.read_int(h, Field::NumControlPoints.scalar()))
            .and_then(|n| usize::try_from(n).ok())
            .map_or(0, |n| n.min(MAX_CONTROL_POINTS))
    }

    pub fn point_position<S: EntitySnapshot + ?Sized>(&self, snapshot: &S, index: usize) -> Option<Position> {
        let handle = self.handle?;
        snapshot.read_vector(handle, Field::CpPositions.at(index))
    }

    /// Reads every round field at once. Unreadable elements fall back to
    /// the neutral value (unowned, unlocked, cannot cap, no prerequisite).
    pub fn read_round_state<S: EntitySnapshot + ?Sized>(&self, snapshot: &S) -> Option<RoundState> {
        let handle = self.handle?;
        let num_points = self.point_count(snapshot);
        let int = |field, element| snapshot.read_int(handle, Field::at(field, element));
        let flag = |field, element| snapshot.read_bool(handle, Field::at(field, element));

        let mut round = RoundState::new(num_points);
        round.playing_mini_rounds = flag(Field::PlayingMiniRounds, 0).unwrap_or(false);

        for index in 0..num_points {
            round.owners[index] = int(Field::OwningTeam, index).map_or(Team::Unknown, Team::from_raw);
            round.locked[index] = flag(Field::CpLocked, index).unwrap_or(false);
            round.in_mini_round[index] = flag(Field::InMiniRound, index).unwrap_or(false);
        }

        for team in Team::SIDES {
            let (Some(side), Some(raw)) = (team.index(), team.raw()) else {
                continue;
            };
            round.base_points[side] = int(Field::BaseControlPoints, raw).unwrap_or(NO_POINT);
            for index in 0..num_points {
                round.team_can_cap[side][index] =
                    flag(Field::TeamCanCap, can_cap_element(index, raw)).unwrap_or(false);
                for slot in 0..MAX_PREVIOUS_POINTS {
                    round.previous_points[side][index][slot] =
                        int(Field::PreviousPoints, previous_point_element(index, raw, slot))
                            .unwrap_or(NO_POINT);
                }
            }
        }

        Some(round)
    }
}

/// Writes a `RoundState` onto a resource entity using the same layout the
/// reader expects. Positions are written separately.
pub fn write_round_state(
    world: &mut capture_env::MemoryWorld,
    handle: EntityHandle,
    round: &RoundState,
) -> Result<(), capture_env::EnvError> {
    world.set_int(handle, Field::NumControlPoints, round.num_points as i32)?;
    world.set_bool(handle, Field::PlayingMiniRounds, round.playing_mini_rounds)?;
    let owners = round.owners.map(|owner| owner.raw().map_or(0, |raw| raw as i32));
    world.set_int_array(handle, Field::OwningTeam, &owners)?;
    world.set_bool_array(handle, Field::CpLocked, &round.locked)?;
    world.set_bool_array(handle, Field::InMiniRound, &round.in_mini_round)?;
    for team in Team::SIDES {
        let (Some(side), Some(raw)) = (team.index(), team.raw()) else {
            continue;
        };
        world.set_int(handle, Field::BaseControlPoints.at(raw), round.base_points[side])?;
        for index in 0..MAX_CONTROL_POINTS {
            world.set_bool(
                handle,
                Field::TeamCanCap.at(can_cap_element(index, raw)),
                round.team_can_cap[side][index],
            )?;
            for slot in 0..MAX_PREVIOUS_POINTS {
                world.set_int(
                    handle,
                    Field::PreviousPoints.at(previous_point_element(index, raw, slot)),
                    round.previous_points[side][index][slot],
                )?;
            }
        }
    }
    Ok(())
}
