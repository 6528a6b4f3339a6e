//! Scripted arena for simulation.
//!
//! The Arena owns the "ground truth" world the trackers observe:
//! - Map layouts (flags, carts, control points) placed from a seed
//! - Kinematics for runners and carts, with carried flags following their carrier
//! - Round-state edits, dormancy and identity churn on demand

use capture_core::flags::{FlagStatus, FLAG_TYPE_CTF};
use capture_core::objective_resource::{write_round_state, RoundState};
use capture_env::{EntityHandle, EntityKind, EntitySnapshot, EnvError, Field, MemoryWorld, Position, Team};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Name of the control-point round variable the arena registers.
pub const CONTROL_POINT_MODE_VAR: &str = "tf_gamemode_cp";

/// Name of the linear-capture variable the arena registers.
pub const LINEAR_CAPTURE_VAR: &str = "tf_caplinear";

/// Distance between neighbouring control points on generated layouts.
pub const POINT_SPACING: f32 = 1000.0;

/// Two flags at opposite ends of the map and one runner per side standing
/// at the enemy flag.
#[derive(Debug, Clone, Copy)]
pub struct CtfLayout {
    pub red_flag: EntityHandle,
    pub blu_flag: EntityHandle,
    pub red_home: Position,
    pub blu_home: Position,
    pub red_runner: EntityHandle,
    pub blu_runner: EntityHandle,
}

impl CtfLayout {
    pub fn flag(&self, team: Team) -> Option<EntityHandle> {
        match team {
            Team::Red => Some(self.red_flag),
            Team::Blu => Some(self.blu_flag),
            Team::Unknown => None,
        }
    }

    pub fn home(&self, team: Team) -> Option<Position> {
        match team {
            Team::Red => Some(self.red_home),
            Team::Blu => Some(self.blu_home),
            Team::Unknown => None,
        }
    }
}

/// One cart per side on parallel tracks.
#[derive(Debug, Clone, Copy)]
pub struct PayloadLayout {
    pub red_cart: EntityHandle,
    pub blu_cart: EntityHandle,
}

/// The objective resource and where its points were placed.
#[derive(Debug, Clone)]
pub struct PointLayout {
    pub resource: EntityHandle,
    pub positions: Vec<Position>,
}

/// The Arena - owns the world and moves things around in it.
pub struct Arena {
    /// Layout seed
    seed: u64,

    /// RNG for placement jitter
    rng: ChaCha8Rng,

    /// The world the trackers read
    world: MemoryWorld,

    /// Entities moving at constant velocity
    movers: Vec<(EntityHandle, Position)>,

    /// (flag, carrier) pairs; the flag follows its carrier
    carried: Vec<(EntityHandle, EntityHandle)>,

    /// Home positions of spawned flags
    flag_homes: Vec<(EntityHandle, Position)>,

    /// Current simulation time (seconds)
    current_time: f64,
}

impl Arena {
    /// Creates an empty arena for the named level.
    ///
    /// Both round variables are registered up front so their ids are the
    /// same on every level.
    pub fn new(seed: u64, level_name: &str) -> Self {
        let mut world = MemoryWorld::new(level_name);
        world.set_convar(CONTROL_POINT_MODE_VAR, false);
        world.set_convar(LINEAR_CAPTURE_VAR, true);

        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            world,
            movers: Vec::new(),
            carried: Vec::new(),
            flag_homes: Vec::new(),
            current_time: 0.0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn world(&self) -> &MemoryWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut MemoryWorld {
        &mut self.world
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.current_time
    }

    /// A random horizontal offset within `spread` units.
    fn jitter(&mut self, spread: f32) -> Position {
        Position::new(
            self.rng.gen_range(-spread..=spread),
            self.rng.gen_range(-spread..=spread),
            0.0,
        )
    }

    pub fn position(&self, handle: EntityHandle) -> Option<Position> {
        self.world.read_vector(handle, Field::Origin.scalar())
    }

    // ========================================================================
    // SPAWNING
    // ========================================================================

    pub fn spawn_player(&mut self, team: Team, position: Position) -> Result<EntityHandle, EnvError> {
        let player = self.world.spawn(EntityKind::Player);
        self.world.set_int(player, Field::Team, team_raw(team))?;
        self.world.set_origin(player, position)?;
        Ok(player)
    }

    /// Spawns a capture flag resting at `home`.
    pub fn spawn_flag(&mut self, team: Team, home: Position) -> Result<EntityHandle, EnvError> {
        let flag = self.world.spawn(EntityKind::CaptureFlag);
        self.world.set_int(flag, Field::Team, team_raw(team))?;
        self.world.set_int(flag, Field::FlagType, FLAG_TYPE_CTF)?;
        self.world.set_int(flag, Field::FlagStatus, FlagStatus::Home.raw())?;
        self.world.set_origin(flag, home)?;
        self.world.set_owner(flag, None)?;
        self.flag_homes.push((flag, home));
        Ok(flag)
    }

    /// Spawns a cart moving at `velocity` units per second.
    pub fn spawn_cart(&mut self, team: Team, position: Position, velocity: Position) -> Result<EntityHandle, EnvError> {
        let cart = self.world.spawn(EntityKind::CartDispenser);
        self.world.set_int(cart, Field::Team, team_raw(team))?;
        self.world.set_origin(cart, position)?;
        self.set_velocity(cart, velocity);
        Ok(cart)
    }

    /// Spawns an objective resource describing `round`, with points laid
    /// out along the x axis starting at `origin`.
    pub fn spawn_objective_resource(&mut self, round: &RoundState, origin: Position) -> Result<PointLayout, EnvError> {
        let resource = self.world.spawn(EntityKind::ObjectiveResource);
        write_round_state(&mut self.world, resource, round)?;

        let mut positions = Vec::with_capacity(round.num_points);
        for index in 0..round.num_points {
            let position = origin + Position::new(index as f32 * POINT_SPACING, 0.0, 0.0) + self.jitter(50.0);
            self.world.set_vector(resource, Field::CpPositions.at(index), position)?;
            positions.push(position);
        }

        self.world.set_convar(CONTROL_POINT_MODE_VAR, true);
        Ok(PointLayout { resource, positions })
    }

    // ========================================================================
    // LAYOUTS
    // ========================================================================

    /// Two flags 3000 units apart, each side's runner waiting at the enemy flag.
    pub fn build_ctf(&mut self) -> Result<CtfLayout, EnvError> {
        let red_home = Position::new(-1500.0, 0.0, 0.0) + self.jitter(100.0);
        let blu_home = Position::new(1500.0, 0.0, 0.0) + self.jitter(100.0);

        let red_flag = self.spawn_flag(Team::Red, red_home)?;
        let blu_flag = self.spawn_flag(Team::Blu, blu_home)?;
        let red_runner = self.spawn_player(Team::Red, blu_home)?;
        let blu_runner = self.spawn_player(Team::Blu, red_home)?;

        Ok(CtfLayout {
            red_flag,
            blu_flag,
            red_home,
            blu_home,
            red_runner,
            blu_runner,
        })
    }

    /// One cart per side, both pushed along +x at `speed`.
    pub fn build_payload(&mut self, speed: f32) -> Result<PayloadLayout, EnvError> {
        let red_start = Position::new(0.0, 0.0, 0.0) + self.jitter(25.0);
        let blu_start = Position::new(0.0, 2000.0, 0.0) + self.jitter(25.0);
        let velocity = Position::new(speed, 0.0, 0.0);

        let red_cart = self.spawn_cart(Team::Red, red_start, velocity)?;
        let blu_cart = self.spawn_cart(Team::Blu, blu_start, velocity)?;
        Ok(PayloadLayout { red_cart, blu_cart })
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    pub fn set_velocity(&mut self, handle: EntityHandle, velocity: Position) {
        match self.movers.iter_mut().find(|(h, _)| *h == handle) {
            Some((_, v)) => *v = velocity,
            None => self.movers.push((handle, velocity)),
        }
    }

    /// `carrier` picks up `flag`.
    pub fn pick_up_flag(&mut self, flag: EntityHandle, carrier: EntityHandle) -> Result<(), EnvError> {
        self.world.set_int(flag, Field::FlagStatus, FlagStatus::Carried.raw())?;
        self.world.set_owner(flag, Some(carrier))?;
        if let Some(position) = self.position(carrier) {
            self.world.set_origin(flag, position)?;
        }
        self.carried.retain(|(f, _)| *f != flag);
        self.carried.push((flag, carrier));
        Ok(())
    }

    /// Drops `flag` where it currently is and returns that position.
    pub fn drop_flag(&mut self, flag: EntityHandle) -> Result<Option<Position>, EnvError> {
        self.carried.retain(|(f, _)| *f != flag);
        self.world.set_int(flag, Field::FlagStatus, FlagStatus::Dropped.raw())?;
        self.world.set_owner(flag, None)?;
        Ok(self.position(flag))
    }

    /// Sends `flag` back to where it was spawned.
    pub fn return_flag(&mut self, flag: EntityHandle) -> Result<(), EnvError> {
        self.carried.retain(|(f, _)| *f != flag);
        let home = self
            .flag_homes
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, home)| *home)
            .ok_or(EnvError::UnknownEntity(flag))?;
        self.world.set_int(flag, Field::FlagStatus, FlagStatus::Home.raw())?;
        self.world.set_owner(flag, None)?;
        self.world.set_origin(flag, home)
    }

    /// Replaces the round fields of an existing resource.
    pub fn set_round(&mut self, resource: EntityHandle, round: &RoundState) -> Result<(), EnvError> {
        write_round_state(&mut self.world, resource, round)
    }

    pub fn set_dormant(&mut self, handle: EntityHandle, dormant: bool) -> Result<(), EnvError> {
        self.world.set_dormant(handle, dormant)
    }

    pub fn remove(&mut self, handle: EntityHandle) -> Result<(), EnvError> {
        self.forget(handle);
        self.world.remove(handle)
    }

    /// Reuses `handle`'s slot for a fresh entity of `kind`, leaving every
    /// reference to the old occupant stale.
    pub fn churn(&mut self, handle: EntityHandle, kind: EntityKind) -> EntityHandle {
        self.forget(handle);
        self.world.spawn_at(handle.index, kind)
    }

    fn forget(&mut self, handle: EntityHandle) {
        self.movers.retain(|(h, _)| *h != handle);
        self.carried.retain(|(f, c)| *f != handle && *c != handle);
    }

    // ========================================================================
    // PHYSICS
    // ========================================================================

    /// Advances kinematics by dt seconds.
    pub fn step(&mut self, dt: f64) -> Result<(), EnvError> {
        self.current_time += dt;

        for &(handle, velocity) in &self.movers {
            if let Some(position) = self.world.read_vector(handle, Field::Origin.scalar()) {
                self.world.set_origin(handle, position + velocity * dt as f32)?;
            }
        }

        for &(flag, carrier) in &self.carried {
            if let Some(position) = self.world.read_vector(carrier, Field::Origin.scalar()) {
                self.world.set_origin(flag, position)?;
            }
        }
        Ok(())
    }
}

fn team_raw(team: Team) -> i32 {
    team.raw().map_or(0, |raw| raw as i32)
}
