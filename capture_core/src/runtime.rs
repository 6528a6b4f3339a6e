//! Capture Runtime - drives the three trackers from the environment context.
//!
//! This module is the integration layer between the trackers and the
//! collaborators that schedule them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CaptureLogic                           │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: CaptureContext                  │   │
//! │  │  • now() → rate limiter clock                        │   │
//! │  │  • sleep() → tick pacing                             │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                               │
//! │  ┌──────────────┐ ┌────────────────┐ ┌──────────────────┐   │
//! │  │     FLAG     │ │    PAYLOAD     │ │  CONTROL POINT   │   │
//! │  │   Tracker    │ │    Tracker     │ │     Tracker      │   │
//! │  └──────────────┘ └────────────────┘ └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use capture_core::{CaptureLogic, CaptureConfig};
//! use capture_env::TokioContext;
//!
//! let mut logic = CaptureLogic::new(TokioContext::shared(), CaptureConfig::default());
//!
//! // Once per frame, after the snapshot is refreshed
//! logic.on_simulation_tick(&world);
//! let target = logic.closest_capturable_point(&world, &my_position, my_team);
//!
//! // On map change
//! logic.on_level_load();
//! ```

use capture_env::{CaptureContext, EntityHandle, Position, Team, World};
use crate::config::CaptureConfig;
use crate::control_points::ControlPointTracker;
use crate::flags::{FlagRecord, FlagStatus, FlagTracker};
use crate::payload::PayloadTracker;
use crate::summary::{FlagSummary, ObjectiveSummary, PointSummary};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The driver owning all three trackers.
///
/// Generic over the context so the same driver runs against the live
/// clock or the simulation's virtual clock.
pub struct CaptureLogic<Ctx>
where
    Ctx: CaptureContext,
{
    /// Environment context
    pub context: Arc<Ctx>,

    /// Configuration
    pub config: CaptureConfig,

    /// Flag Tracker - capture-the-flag objectives
    pub flags: FlagTracker,

    /// Payload Tracker - carts per side
    pub payloads: PayloadTracker,

    /// Control-Point Tracker - points and eligibility
    pub control_points: ControlPointTracker,

    /// Current tick number
    tick_count: u64,
}

impl<Ctx> CaptureLogic<Ctx>
where
    Ctx: CaptureContext,
{
    /// Creates a new driver with empty trackers.
    pub fn new(context: Arc<Ctx>, config: CaptureConfig) -> Self {
        let payloads = PayloadTracker::new(config.cart_refresh_interval());
        let control_points = ControlPointTracker::new(
            config.eligibility_interval(),
            &config.linear_capture_var,
            &config.control_point_mode_var,
            config.point_exceptions.clone(),
        );

        Self {
            context,
            config,
            flags: FlagTracker::new(),
            payloads,
            control_points,
            tick_count: 0,
        }
    }

    /// Creates a new driver with the default configuration.
    pub fn with_defaults(context: Arc<Ctx>) -> Self {
        Self::new(context, CaptureConfig::default())
    }

    /// Returns the current time from the context.
    pub fn now_secs(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Refreshes flag, payload and control-point trackers, in that order.
    pub fn on_simulation_tick<W: World + ?Sized>(&mut self, world: &W) -> u64 {
        self.tick_count += 1;
        let now = self.context.now();

        self.flags.refresh(world);
        self.payloads.refresh(world, now);
        self.control_points.refresh(world, now);

        self.tick_count
    }

    /// Resets every tracker to its empty state.
    pub fn on_level_load(&mut self) {
        info!(tick = self.tick_count, "level load, resetting objective trackers");
        self.flags.level_reset();
        self.payloads.level_reset();
        self.control_points.level_reset();
    }

    /// Drives `ticks` frames, letting `step` advance the world before each
    /// refresh and sleeping on the context between frames.
    pub async fn run<W, F>(&mut self, world: &mut W, ticks: u64, interval: Duration, mut step: F) -> u64
    where
        W: World,
        F: FnMut(&mut W, Duration),
    {
        for _ in 0..ticks {
            step(world, interval);
            self.on_simulation_tick(world);
            self.context.sleep(interval).await;
        }
        self.tick_count
    }

    // ========================================================================
    // QUERY SURFACE
    // ========================================================================

    pub fn flag_objective(&self, team: Team) -> FlagRecord {
        self.flags.objective(team)
    }

    pub fn flag_position<W: World + ?Sized>(&self, world: &W, team: Team) -> Option<Position> {
        self.flags.position(world, team)
    }

    pub fn flag_home(&self, team: Team) -> Option<Position> {
        self.flags.home_position(team)
    }

    pub fn flag_carrier<W: World + ?Sized>(&self, world: &W, team: Team) -> Option<EntityHandle> {
        self.flags.carrier(world, team)
    }

    pub fn flag_status<W: World + ?Sized>(&self, world: &W, team: Team) -> FlagStatus {
        self.flags.status(world, team)
    }

    pub fn closest_cart<W: World + ?Sized>(&self, world: &W, source: &Position, team: Team) -> Option<Position> {
        self.payloads.closest_to(world, source, team)
    }

    pub fn closest_capturable_point<W: World + ?Sized>(
        &self,
        world: &W,
        source: &Position,
        team: Team,
    ) -> Option<Position> {
        self.control_points.closest_capturable(world, source, team)
    }

    /// Summarizes the current derived state.
    pub fn summary<W: World + ?Sized>(&self, world: &W) -> ObjectiveSummary {
        let flags = Team::SIDES
            .iter()
            .filter(|team| !self.flags.objective(**team).is_empty())
            .map(|&team| FlagSummary {
                team,
                status: self.flags.status(world, team),
                position: self.flags.position(world, team),
                home: self.flags.home_position(team),
                carried: self.flags.carrier(world, team).is_some(),
            })
            .collect();

        let points = self
            .control_points
            .active_points()
            .filter_map(|p| {
                Some(PointSummary {
                    index: p.index?,
                    position: p.position,
                    red_can_cap: p.can_cap(Team::Red),
                    blu_can_cap: p.can_cap(Team::Blu),
                })
            })
            .collect();

        ObjectiveSummary {
            level: world.level_name(),
            tick: self.tick_count,
            flags,
            carts: [
                self.payloads.carts(Team::Red).len(),
                self.payloads.carts(Team::Blu).len(),
            ],
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FLAG_TYPE_CTF;
    use crate::objective_resource::{write_round_state, RoundState};
    use capture_env::{EntityKind, Field, MemoryWorld, TokioContext};
    use std::sync::Mutex;

    /// Manually advanced clock.
    #[derive(Default)]
    struct ManualClock {
        now: Mutex<Duration>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    #[async_trait::async_trait]
    impl CaptureContext for ManualClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    /// A world with every objective type at once.
    fn mixed_world() -> MemoryWorld {
        let mut world = MemoryWorld::new("cp_granary");
        world.set_convar("tf_gamemode_cp", true);

        let flag = world.spawn(EntityKind::CaptureFlag);
        world.set_int(flag, Field::Team, 3).unwrap();
        world.set_int(flag, Field::FlagType, FLAG_TYPE_CTF).unwrap();
        world.set_int(flag, Field::FlagStatus, FlagStatus::Home.raw()).unwrap();
        world.set_origin(flag, Position::new(0.0, 500.0, 0.0)).unwrap();
        world.set_owner(flag, None).unwrap();

        let cart = world.spawn(EntityKind::CartDispenser);
        world.set_int(cart, Field::Team, 2).unwrap();
        world.set_origin(cart, Position::new(50.0, 0.0, 0.0)).unwrap();

        let res = world.spawn(EntityKind::ObjectiveResource);
        let mut round = RoundState::linear(3);
        round.owners[2] = Team::Unknown;
        write_round_state(&mut world, res, &round).unwrap();
        for index in 0..3 {
            world
                .set_vector(res, Field::CpPositions.at(index), Position::new(index as f32 * 10.0, 0.0, 0.0))
                .unwrap();
        }
        world
    }

    #[test]
    fn test_tick_populates_all_trackers() {
        let world = mixed_world();
        let mut logic = CaptureLogic::with_defaults(Arc::new(ManualClock::default()));

        assert_eq!(logic.on_simulation_tick(&world), 1);

        assert_eq!(logic.flag_status(&world, Team::Blu), FlagStatus::Home);
        assert_eq!(logic.flag_home(Team::Blu), Some(Position::new(0.0, 500.0, 0.0)));
        assert_eq!(
            logic.closest_cart(&world, &Position::zeros(), Team::Red),
            Some(Position::new(50.0, 0.0, 0.0))
        );
        assert_eq!(
            logic.closest_capturable_point(&world, &Position::zeros(), Team::Red),
            Some(Position::new(10.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_level_load_resets_every_query() {
        let world = mixed_world();
        let mut logic = CaptureLogic::with_defaults(Arc::new(ManualClock::default()));
        logic.on_simulation_tick(&world);
        logic.flags.set_enabled(false);

        logic.on_level_load();

        assert!(logic.flag_objective(Team::Blu).is_empty());
        assert!(logic.flag_objective(Team::Red).is_empty());
        assert_eq!(logic.flag_position(&world, Team::Blu), None);
        assert_eq!(logic.flag_home(Team::Blu), None);
        assert_eq!(logic.flag_carrier(&world, Team::Blu), None);
        assert_eq!(logic.flag_status(&world, Team::Blu), FlagStatus::Home);
        assert_eq!(logic.closest_cart(&world, &Position::zeros(), Team::Red), None);
        assert_eq!(logic.closest_capturable_point(&world, &Position::zeros(), Team::Red), None);
        assert!(!logic.control_points.has_resource());
        assert!(logic.flags.is_enabled());
        assert!(logic.summary(&world).is_empty());
    }

    #[test]
    fn test_cart_rebuild_follows_context_clock() {
        let mut world = mixed_world();
        let clock = Arc::new(ManualClock::default());
        let mut logic = CaptureLogic::with_defaults(clock.clone());
        logic.on_simulation_tick(&world);

        let cart = world.spawn(EntityKind::CartDispenser);
        world.set_int(cart, Field::Team, 3).unwrap();
        world.set_origin(cart, Position::new(-5.0, 0.0, 0.0)).unwrap();

        clock.advance(Duration::from_millis(1500));
        logic.on_simulation_tick(&world);
        assert_eq!(logic.closest_cart(&world, &Position::zeros(), Team::Blu), None);

        clock.advance(Duration::from_millis(1500));
        logic.on_simulation_tick(&world);
        assert_eq!(
            logic.closest_cart(&world, &Position::zeros(), Team::Blu),
            Some(Position::new(-5.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_sub_floor_config_keeps_cart_rate_limit() {
        let mut world = mixed_world();
        let clock = Arc::new(ManualClock::default());
        let config = CaptureConfig {
            cart_refresh_ms: 0,
            ..Default::default()
        };
        let mut logic = CaptureLogic::new(clock.clone(), config);
        logic.on_simulation_tick(&world);

        let cart = world.spawn(EntityKind::CartDispenser);
        world.set_int(cart, Field::Team, 3).unwrap();
        world.set_origin(cart, Position::new(-5.0, 0.0, 0.0)).unwrap();

        clock.advance(Duration::from_millis(5));
        logic.on_simulation_tick(&world);
        assert!(logic.payloads.carts(Team::Blu).is_empty());

        clock.advance(Duration::from_millis(3000));
        logic.on_simulation_tick(&world);
        assert_eq!(logic.payloads.carts(Team::Blu).len(), 1);
    }

    #[test]
    fn test_summary_reflects_trackers() {
        let world = mixed_world();
        let mut logic = CaptureLogic::with_defaults(Arc::new(ManualClock::default()));
        logic.on_simulation_tick(&world);

        let summary = logic.summary(&world);
        assert_eq!(summary.level, "cp_granary");
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.carts, [1, 0]);
        assert_eq!(summary.points.len(), 3);
        assert!(summary.points[1].red_can_cap);
        assert!(!summary.points[0].red_can_cap);
        let blu = summary.flag(Team::Blu).unwrap();
        assert_eq!(blu.status, FlagStatus::Home);
        assert!(!blu.carried);
        assert!(summary.flag(Team::Red).is_none());
    }

    #[tokio::test]
    async fn test_run_paces_on_context() {
        let mut world = mixed_world();
        let clock = Arc::new(ManualClock::default());
        let mut logic = CaptureLogic::with_defaults(clock.clone());

        let mut steps = 0;
        let ticks = logic
            .run(&mut world, 4, Duration::from_millis(250), |_, _| steps += 1)
            .await;

        assert_eq!(ticks, 4);
        assert_eq!(steps, 4);
        assert_eq!(clock.now(), Duration::from_secs(1));
        assert_eq!(logic.now_secs(), 1.0);
    }

    #[tokio::test]
    async fn test_run_on_wall_clock() {
        let mut world = mixed_world();
        let mut logic = CaptureLogic::with_defaults(TokioContext::shared());

        let ticks = logic.run(&mut world, 3, Duration::from_millis(5), |_, _| {}).await;

        assert_eq!(ticks, 3);
        assert!(logic.now_secs() >= 0.015);
        assert_eq!(
            logic.closest_cart(&world, &Position::zeros(), Team::Red),
            Some(Position::new(50.0, 0.0, 0.0))
        );
    }
}
