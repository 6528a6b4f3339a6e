//! Scenario runner - drives the objective scenarios and checks the trackers.

use crate::arena::LINEAR_CAPTURE_VAR;
use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use capture_core::{CaptureConfig, FlagStatus, ObjectiveSummary, RoundState};
use capture_env::{EntityKind, EnvError, Position, Team};
use thiserror::Error;
use tracing::{debug, info};

/// Why a scenario stopped early.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    #[error("{0}")]
    Assertion(String),
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of entities in the world at end
    pub final_entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// What the trackers believed when the run ended
    pub summary: ObjectiveSummary,
}

/// Runs objective scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Duration budget in seconds; scales the free-running phases
    max_duration_secs: f64,

    /// Tracker configuration under test
    capture: CaptureConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tick_rate_hz: 30,
            max_duration_secs: 10.0,
            capture: CaptureConfig::default(),
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Sets the tracker configuration.
    pub fn with_config(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            tick_rate_hz: self.tick_rate_hz,
            max_duration_secs: self.max_duration_secs,
            capture: self.capture.clone(),
        }
    }

    /// Long enough for an eligibility recompute to land.
    fn settle_secs(&self) -> f64 {
        self.capture.eligibility_interval().as_secs_f64() + 0.5
    }

    /// Length of the free-running phases.
    fn phase_secs(&self) -> f64 {
        (self.max_duration_secs / 4.0).max(1.0)
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None).0
    }

    /// Runs a scenario, recording a summary frame every `every` ticks.
    pub fn run_with_export(&self, scenario: ScenarioId, every: u64) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, Some(every));
        let export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, record_every: Option<u64>) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = SimWorld::new(self.sim_config(), scenario.level());
        if let Some(every) = record_every {
            world.record(scenario.name(), every);
        }

        let outcome = match scenario {
            ScenarioId::FlagCarry => self.run_flag_carry(&mut world),
            ScenarioId::PayloadPush => self.run_payload_push(&mut world),
            ScenarioId::LinearFrontier => self.run_linear_frontier(&mut world),
            ScenarioId::LinearDisabled => self.run_linear_disabled(&mut world),
            ScenarioId::MiniRounds => self.run_mini_rounds(&mut world),
            ScenarioId::ExplicitPrerequisites => self.run_explicit_prerequisites(&mut world),
            ScenarioId::MapException => self.run_map_exception(&mut world),
            ScenarioId::LevelReset => self.run_level_reset(&mut world),
            ScenarioId::EntityChurn => self.run_entity_churn(&mut world),
        };

        let failure_reason = outcome.err().map(|e| e.to_string());
        let passed = failure_reason.is_none();

        let mut export = world.take_export();
        if let Some(export) = &mut export {
            export.finalize(passed, failure_reason.clone());
        }

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            final_entity_count: world.entity_count(),
            failure_reason,
            summary: world.summary(),
        };
        (result, export)
    }

    /// Flag carry: a runner steals the enemy flag, carries it, drops it, and
    /// the flag is returned. The home position never moves.
    fn run_flag_carry(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("flag_carry: steal, carry, drop, return");

        let ctf = world.arena.build_ctf()?;
        world.tick()?;

        for team in Team::SIDES {
            let snapshot = world.arena.world();
            let home = ctf.home(team);
            ensure(world.logic.flag_objective(team).handle == ctf.flag(team), || {
                format!("{team} flag not discovered")
            })?;
            ensure(world.logic.flag_status(snapshot, team) == FlagStatus::Home, || {
                format!("{team} flag should start at home")
            })?;
            ensure(world.logic.flag_home(team) == home, || {
                format!("{team} flag home {:?}, expected {:?}", world.logic.flag_home(team), home)
            })?;
            ensure(world.logic.flag_position(snapshot, team) == home, || {
                format!("{team} flag not resting at home")
            })?;
        }

        world.arena.pick_up_flag(ctf.blu_flag, ctf.red_runner)?;
        world.arena.set_velocity(ctf.red_runner, Position::new(-300.0, 0.0, 0.0));

        run_checked(world, self.phase_secs(), |w| {
            let snapshot = w.arena.world();
            ensure(w.logic.flag_status(snapshot, Team::Blu) == FlagStatus::Carried, || {
                "blu flag should be carried".to_string()
            })?;
            ensure(w.logic.flag_carrier(snapshot, Team::Blu) == Some(ctf.red_runner), || {
                "blu flag carrier lost".to_string()
            })?;
            ensure(w.logic.flag_position(snapshot, Team::Blu) == w.arena.position(ctf.red_runner), || {
                "blu flag not with its carrier".to_string()
            })?;
            ensure(w.logic.flag_home(Team::Blu) == Some(ctf.blu_home), || {
                "blu flag home moved while carried".to_string()
            })?;
            ensure(w.logic.flag_status(snapshot, Team::Red) == FlagStatus::Home, || {
                "red flag left home".to_string()
            })
        })?;

        world.arena.set_velocity(ctf.red_runner, Position::zeros());
        let dropped = world.arena.drop_flag(ctf.blu_flag)?;
        debug!(?dropped, "blu flag dropped");
        world.run_for(0.5)?;

        let snapshot = world.arena.world();
        ensure(world.logic.flag_status(snapshot, Team::Blu) == FlagStatus::Dropped, || {
            "blu flag should be dropped".to_string()
        })?;
        ensure(world.logic.flag_carrier(snapshot, Team::Blu).is_none(), || {
            "dropped flag still has a carrier".to_string()
        })?;
        ensure(world.logic.flag_position(snapshot, Team::Blu) == dropped, || {
            "dropped flag moved".to_string()
        })?;
        ensure(world.logic.flag_home(Team::Blu) == Some(ctf.blu_home), || {
            "blu flag home moved after drop".to_string()
        })?;

        world.arena.return_flag(ctf.blu_flag)?;
        world.tick()?;

        let snapshot = world.arena.world();
        ensure(world.logic.flag_status(snapshot, Team::Blu) == FlagStatus::Home, || {
            "returned flag not at home".to_string()
        })?;
        ensure(world.logic.flag_position(snapshot, Team::Blu) == Some(ctf.blu_home), || {
            "returned flag not at its home position".to_string()
        })
    }

    /// Payload push: carts are read live every tick, buckets are rebuilt on
    /// the cart interval, removed carts disappear at once.
    fn run_payload_push(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("payload_push: moving carts, late spawn, removal");

        let payload = world.arena.build_payload(40.0)?;
        let refresh = self.capture.cart_refresh_interval().as_secs_f64();

        run_checked(world, self.phase_secs(), |w| {
            for (team, cart) in [(Team::Red, payload.red_cart), (Team::Blu, payload.blu_cart)] {
                let live = w.arena.position(cart);
                let found = w.logic.closest_cart(w.arena.world(), &Position::zeros(), team);
                ensure(found == live, || format!("{team} cart reported at {found:?}, expected {live:?}"))?;
            }
            Ok(())
        })?;

        let depot = Position::new(-5000.0, 0.0, 0.0);
        world.arena.spawn_cart(Team::Red, depot, Position::zeros())?;
        let spawned_at = world.time();

        let mut found_at = None;
        for _ in 0..world.ticks_for(refresh + 1.0) {
            world.tick()?;
            if world.logic.closest_cart(world.arena.world(), &depot, Team::Red) == Some(depot) {
                found_at = Some(world.time());
                break;
            }
        }
        let found_at = found_at
            .ok_or_else(|| ScenarioError::Assertion("late red cart never tracked".to_string()))?;
        let latency = found_at - spawned_at;
        debug!(latency, "late cart tracked");
        ensure(latency <= refresh + world.dt() * 1.5, || {
            format!("late cart took {latency:.2}s to appear")
        })?;

        world.arena.remove(payload.red_cart)?;
        world.tick()?;
        ensure(
            world.logic.closest_cart(world.arena.world(), &Position::zeros(), Team::Red) == Some(depot),
            || "removed cart still reported".to_string(),
        )?;

        world.arena.spawn_cart(Team::Unknown, Position::zeros(), Position::zeros())?;
        world.run_for(refresh + 0.5)?;
        let summary = world.summary();
        ensure(summary.carts == [1, 1], || format!("cart buckets {:?}, expected [1, 1]", summary.carts))?;
        ensure(
            world.logic.closest_cart(world.arena.world(), &Position::zeros(), Team::Unknown).is_none(),
            || "neutral cart assigned to a side".to_string(),
        )
    }

    /// Linear frontier: red holds 0-2 from its base, blu holds 4.
    fn run_linear_frontier(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("linear_frontier: 5 points, frontier at 3");

        let mut round = RoundState::linear(5);
        round.owners[1] = Team::Red;
        round.owners[2] = Team::Red;
        let points = world.arena.spawn_objective_resource(&round, Position::zeros())?;
        let at = |i: usize| points.positions[i];
        world.tick()?;

        expect_capturable(world, Team::Red, &[3])?;
        expect_capturable(world, Team::Blu, &[3])?;
        expect_closest(world, &at(0), Team::Red, Some(at(3)))?;
        expect_closest(world, &at(4), Team::Blu, Some(at(3)))?;

        round.owners[3] = Team::Red;
        world.arena.set_round(points.resource, &round)?;
        world.run_for(self.settle_secs())?;

        expect_capturable(world, Team::Red, &[4])?;
        expect_capturable(world, Team::Blu, &[3])?;
        expect_closest(world, &at(0), Team::Red, Some(at(4)))
    }

    /// Linear capture off opens every point a side does not own.
    fn run_linear_disabled(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("linear_disabled: tf_caplinear off, then on");

        world.arena.world_mut().set_convar(LINEAR_CAPTURE_VAR, false);
        let mut round = RoundState::linear(5);
        round.owners[1] = Team::Red;
        round.owners[2] = Team::Red;
        let points = world.arena.spawn_objective_resource(&round, Position::zeros())?;
        let at = |i: usize| points.positions[i];
        world.tick()?;

        expect_capturable(world, Team::Red, &[3, 4])?;
        expect_capturable(world, Team::Blu, &[0, 1, 2, 3])?;
        expect_closest(world, &at(4), Team::Red, Some(at(4)))?;
        expect_closest(world, &at(0), Team::Blu, Some(at(0)))?;

        world.arena.world_mut().set_convar(LINEAR_CAPTURE_VAR, true);
        world.run_for(self.settle_secs())?;

        expect_capturable(world, Team::Red, &[3])?;
        expect_capturable(world, Team::Blu, &[3])
    }

    /// Sectioned round: only the active mini-round's points are open, and
    /// with no prerequisite data every one of them is.
    fn run_mini_rounds(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("mini_rounds: sectioned round, lock, next section");

        let mut round = RoundState::new(6);
        round.playing_mini_rounds = true;
        for (index, active) in round.in_mini_round.iter_mut().enumerate() {
            *active = index == 2 || index == 3;
        }
        round.owners[0] = Team::Red;
        round.owners[1] = Team::Red;
        round.owners[4] = Team::Blu;
        round.owners[5] = Team::Blu;
        let points = world.arena.spawn_objective_resource(&round, Position::zeros())?;
        let at = |i: usize| points.positions[i];
        world.tick()?;

        expect_capturable(world, Team::Red, &[2, 3])?;
        expect_capturable(world, Team::Blu, &[2, 3])?;

        round.locked[3] = true;
        world.arena.set_round(points.resource, &round)?;
        world.run_for(self.settle_secs())?;

        expect_capturable(world, Team::Red, &[2])?;
        expect_capturable(world, Team::Blu, &[2])?;

        // Blu takes the middle; the next section is red's last two points
        round.locked[3] = false;
        round.owners[2] = Team::Blu;
        round.owners[3] = Team::Blu;
        for (index, active) in round.in_mini_round.iter_mut().enumerate() {
            *active = index <= 1;
        }
        world.arena.set_round(points.resource, &round)?;
        world.run_for(self.settle_secs())?;

        expect_capturable(world, Team::Red, &[])?;
        expect_capturable(world, Team::Blu, &[0, 1])?;
        expect_closest(world, &at(3), Team::Red, None)?;
        expect_closest(world, &at(5), Team::Blu, Some(at(1)))
    }

    /// Explicit prerequisite lists per side, including a point that lists
    /// itself first.
    fn run_explicit_prerequisites(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("explicit_prerequisites: chains and a self-prerequisite");

        let mut round = RoundState::new(4);
        round.owners[0] = Team::Red;
        round.owners[3] = Team::Blu;
        round.set_previous_points(1, Team::Red, &[0]);
        round.set_previous_points(2, Team::Red, &[1]);
        round.set_previous_points(3, Team::Red, &[1, 2]);
        round.set_previous_points(0, Team::Blu, &[0]);
        round.set_previous_points(1, Team::Blu, &[2]);
        round.set_previous_points(2, Team::Blu, &[3]);
        let points = world.arena.spawn_objective_resource(&round, Position::zeros())?;
        let at = |i: usize| points.positions[i];
        world.tick()?;

        expect_capturable(world, Team::Red, &[1])?;
        expect_capturable(world, Team::Blu, &[0, 2])?;

        round.owners[1] = Team::Red;
        round.owners[2] = Team::Red;
        world.arena.set_round(points.resource, &round)?;
        world.run_for(self.settle_secs())?;

        expect_capturable(world, Team::Red, &[3])?;
        expect_capturable(world, Team::Blu, &[0, 2])?;
        expect_closest(world, &at(0), Team::Red, Some(at(3)))
    }

    /// The exception map: point 4 is eligible but never returned.
    fn run_map_exception(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("map_exception: cp_steel point 4");

        let mut round = RoundState::linear(5);
        for owner in &mut round.owners[1..=3] {
            *owner = Team::Red;
        }
        let points = world.arena.spawn_objective_resource(&round, Position::zeros())?;
        let at = |i: usize| points.positions[i];
        world.tick()?;

        ensure(world.logic.control_points.excluded_point("cp_steel") == Some(4), || {
            "cp_steel has no excluded point".to_string()
        })?;
        expect_capturable(world, Team::Red, &[4])?;
        expect_capturable(world, Team::Blu, &[3])?;
        expect_closest(world, &at(0), Team::Red, None)?;
        expect_closest(world, &at(4), Team::Blu, Some(at(3)))?;

        world.arena.world_mut().set_level_name("cp_granary");
        world.tick()?;
        expect_closest(world, &at(0), Team::Red, Some(at(4)))
    }

    /// A level change empties every tracker before the next map is seen.
    fn run_level_reset(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("level_reset: ctf then payload");

        world.arena.build_ctf()?;
        world.run_for(1.0)?;
        ensure(world.summary().flags.len() == 2, || "ctf flags not tracked".to_string())?;

        world.load_level("pl_upward");

        let origin = Position::zeros();
        let snapshot = world.arena.world();
        for team in Team::SIDES {
            ensure(world.logic.flag_objective(team).is_empty(), || format!("{team} flag survived level load"))?;
            ensure(world.logic.flag_home(team).is_none(), || format!("{team} flag home survived level load"))?;
            ensure(world.logic.flag_position(snapshot, team).is_none(), || {
                format!("{team} flag position survived level load")
            })?;
            ensure(world.logic.flag_carrier(snapshot, team).is_none(), || {
                format!("{team} flag carrier survived level load")
            })?;
            ensure(world.logic.flag_status(snapshot, team) == FlagStatus::Home, || {
                format!("{team} flag status not reset")
            })?;
            ensure(world.logic.closest_cart(snapshot, &origin, team).is_none(), || {
                format!("{team} cart survived level load")
            })?;
            ensure(world.logic.closest_capturable_point(snapshot, &origin, team).is_none(), || {
                format!("{team} point survived level load")
            })?;
        }
        ensure(world.summary().is_empty(), || "summary not empty after level load".to_string())?;

        let payload = world.arena.build_payload(40.0)?;
        world.tick()?;

        let summary = world.summary();
        ensure(summary.flags.is_empty(), || "flags tracked on a payload map".to_string())?;
        ensure(summary.carts == [1, 1], || format!("cart buckets {:?}, expected [1, 1]", summary.carts))?;
        ensure(
            world.logic.closest_cart(world.arena.world(), &origin, Team::Red) == world.arena.position(payload.red_cart),
            || "red cart not tracked on the new level".to_string(),
        )?;
        ensure(!world.logic.control_points.has_resource(), || {
            "objective resource tracked on a map without one".to_string()
        })
    }

    /// Dormancy keeps a flag; slot reuse drops flags, carriers and the
    /// objective resource until the new occupant is discovered.
    fn run_entity_churn(&self, world: &mut SimWorld) -> Result<(), ScenarioError> {
        info!("entity_churn: dormancy and slot reuse");

        let ctf = world.arena.build_ctf()?;
        world.tick()?;

        world.arena.set_dormant(ctf.red_flag, true)?;
        world.run_for(0.5)?;
        ensure(world.logic.flag_objective(Team::Red).handle == Some(ctf.red_flag), || {
            "dormant flag dropped from tracking".to_string()
        })?;
        ensure(world.logic.flag_home(Team::Red) == Some(ctf.red_home), || {
            "dormant flag lost its home".to_string()
        })?;
        world.arena.set_dormant(ctf.red_flag, false)?;

        world.arena.churn(ctf.blu_flag, EntityKind::Player);
        world.run_for(0.2)?;
        ensure(world.logic.flag_objective(Team::Blu).is_empty(), || {
            "stale blu flag still tracked".to_string()
        })?;
        ensure(world.logic.flag_home(Team::Blu).is_none(), || "stale blu home kept".to_string())?;

        let new_home = ctf.blu_home + Position::new(0.0, 400.0, 0.0);
        let blu_flag = world.arena.spawn_flag(Team::Blu, new_home)?;
        world.run_for(0.2)?;
        ensure(world.logic.flag_objective(Team::Blu).handle == Some(blu_flag), || {
            "replacement blu flag not discovered".to_string()
        })?;
        ensure(world.logic.flag_home(Team::Blu) == Some(new_home), || {
            "replacement blu flag home not captured".to_string()
        })?;

        world.arena.pick_up_flag(blu_flag, ctf.red_runner)?;
        world.tick()?;
        ensure(world.logic.flag_carrier(world.arena.world(), Team::Blu) == Some(ctf.red_runner), || {
            "carrier not resolved".to_string()
        })?;

        world.arena.churn(ctf.red_runner, EntityKind::Player);
        world.tick()?;
        ensure(world.logic.flag_carrier(world.arena.world(), Team::Blu).is_none(), || {
            "stale carrier handle resolved".to_string()
        })?;

        let round = RoundState::linear(3);
        let first = world
            .arena
            .spawn_objective_resource(&round, Position::new(0.0, 3000.0, 0.0))?;
        world.tick()?;
        expect_capturable(world, Team::Red, &[1])?;
        expect_closest(world, &first.positions[0], Team::Red, Some(first.positions[1]))?;

        world.arena.remove(first.resource)?;
        let second = world
            .arena
            .spawn_objective_resource(&round, Position::new(0.0, -3000.0, 0.0))?;
        world.tick()?;
        ensure(world.logic.control_points.has_resource(), || "replacement resource not acquired".to_string())?;
        expect_closest(world, &second.positions[0], Team::Red, Some(second.positions[1]))
    }
}

/// Ticks for `secs` seconds, running `check` after every tick.
fn run_checked<F>(world: &mut SimWorld, secs: f64, mut check: F) -> Result<(), ScenarioError>
where
    F: FnMut(&SimWorld) -> Result<(), ScenarioError>,
{
    for _ in 0..world.ticks_for(secs) {
        world.tick()?;
        check(world)?;
    }
    Ok(())
}

fn capturable_points(world: &SimWorld, team: Team) -> Vec<usize> {
    world
        .logic
        .control_points
        .active_points()
        .filter(|point| point.can_cap(team))
        .filter_map(|point| point.index)
        .collect()
}

fn expect_capturable(world: &SimWorld, team: Team, expected: &[usize]) -> Result<(), ScenarioError> {
    let actual = capturable_points(world, team);
    ensure(actual == expected, || format!("{team} can capture {actual:?}, expected {expected:?}"))
}

fn expect_closest(
    world: &SimWorld,
    source: &Position,
    team: Team,
    expected: Option<Position>,
) -> Result<(), ScenarioError> {
    let actual = world
        .logic
        .closest_capturable_point(world.arena.world(), source, team);
    ensure(actual == expected, || {
        format!("{team} nearest capturable point {actual:?}, expected {expected:?}")
    })
}
