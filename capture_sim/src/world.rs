//! SimWorld - The simulation harness container.

use crate::arena::Arena;
use crate::context::SimContext;
use crate::exporter::{SimExport, SimFrame};

use capture_core::{CaptureConfig, CaptureLogic, ObjectiveSummary};
use capture_env::{CaptureContext, EnvError};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Tick rate in Hz
    pub tick_rate_hz: u32,

    /// Maximum simulation duration in seconds
    pub max_duration_secs: f64,

    /// Tracker configuration under test
    pub capture: CaptureConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 30,
            max_duration_secs: 10.0,
            capture: CaptureConfig::default(),
        }
    }
}

/// Frame recording state.
struct Recorder {
    export: SimExport,
    every: u64,
}

/// The SimWorld - arena, virtual clock and the driver under test.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Ground truth arena for the current level
    pub arena: Arena,

    /// The driver under test
    pub logic: CaptureLogic<SimContext>,

    /// Levels loaded so far, the first included
    levels_loaded: u64,

    recorder: Option<Recorder>,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    /// Creates a new SimWorld on the named level.
    pub fn new(config: SimConfig, level_name: &str) -> Self {
        let context = SimContext::shared(config.seed);
        let arena = Arena::new(Self::arena_seed(config.seed, 0), level_name);
        let logic = CaptureLogic::new(context.clone(), config.capture.clone());

        Self {
            config,
            context,
            arena,
            logic,
            levels_loaded: 1,
            recorder: None,
            tick_count: 0,
        }
    }

    /// Layout seeds are derived separately per level so that a level change
    /// does not shift the placement of the next map.
    fn arena_seed(seed: u64, level: u64) -> u64 {
        seed.wrapping_mul(0x9e3779b97f4a7c15).wrapping_add(level)
    }

    /// Seconds per tick.
    pub fn dt(&self) -> f64 {
        1.0 / self.config.tick_rate_hz as f64
    }

    /// Number of ticks covering `secs` seconds (at least one).
    pub fn ticks_for(&self, secs: f64) -> u64 {
        ((secs * self.config.tick_rate_hz as f64).ceil() as u64).max(1)
    }

    /// Advances the clock and the arena, then runs the driver's tick.
    pub fn tick(&mut self) -> Result<(), EnvError> {
        let dt = self.dt();

        self.context.advance_time(Duration::from_secs_f64(dt));
        self.arena.step(dt)?;
        self.logic.on_simulation_tick(self.arena.world());
        self.tick_count += 1;

        if let Some(recorder) = &mut self.recorder {
            if self.tick_count % recorder.every == 0 {
                recorder.export.add_frame(SimFrame {
                    time_sec: self.context.now().as_secs_f64(),
                    tick: self.tick_count,
                    summary: self.logic.summary(self.arena.world()),
                });
            }
        }
        Ok(())
    }

    /// Runs for `secs` seconds of simulated time.
    pub fn run_for(&mut self, secs: f64) -> Result<(), EnvError> {
        for _ in 0..self.ticks_for(secs) {
            self.tick()?;
        }
        Ok(())
    }

    /// Replaces the arena with a fresh level and notifies the driver.
    pub fn load_level(&mut self, level_name: &str) -> &mut Arena {
        let seed = Self::arena_seed(self.config.seed, self.levels_loaded);
        self.levels_loaded += 1;
        self.arena = Arena::new(seed, level_name);
        self.logic.on_level_load();
        &mut self.arena
    }

    /// Starts recording a summary frame every `every` ticks.
    pub fn record(&mut self, scenario: &str, every: u64) {
        self.recorder = Some(Recorder {
            export: SimExport::new(scenario, self.config.seed),
            every: every.max(1),
        });
    }

    /// Stops recording and hands back what was captured.
    pub fn take_export(&mut self) -> Option<SimExport> {
        self.recorder.take().map(|r| r.export)
    }

    pub fn summary(&self) -> ObjectiveSummary {
        self.logic.summary(self.arena.world())
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn entity_count(&self) -> usize {
        self.arena.world().entity_count()
    }
}
