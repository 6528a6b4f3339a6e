//! Capture Deterministic Simulation Harness
//!
//! This crate provides a controlled arena where the capture driver runs
//! against scripted maps with a virtual clock.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advanced one tick at a time
//! - **Layout**: Map placement derived from a single 64-bit seed
//! - **Events**: Captures, pickups, drops and slot churn are scripted
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock)                           │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼──────────────┐        ┌───────────────────────┐     │
//! │  │   CaptureLogic    │◄───────│        Arena          │     │
//! │  │ (driver under     │ reads  │ (MemoryWorld + moves) │     │
//! │  │  test)            │        └───────────────────────┘     │
//! │  └───────────────────┘                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use capture_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::LinearFrontier);
//! assert!(result.passed);
//! ```

mod arena;
mod context;
mod exporter;
mod runner;
mod world;
pub mod scenarios;

pub use arena::{Arena, CtfLayout, PayloadLayout, PointLayout, CONTROL_POINT_MODE_VAR, LINEAR_CAPTURE_VAR};
pub use context::SimContext;
pub use exporter::{SimExport, SimFrame};
pub use runner::{ScenarioError, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
