//! Capture Core - objective awareness for bots
//!
//! Three trackers turn the per-tick entity snapshot into a queryable model
//! of the round's objectives:
//! 1. **Flags**: which capture flag belongs to which side, where it is and who carries it
//! 2. **Payloads**: the carts each side pushes, rebuilt on a timer
//! 3. **Control Points**: positions plus per-side capture eligibility under linear,
//!    sectioned and explicit-prerequisite round rules
//!
//! `CaptureLogic` owns all three and is the surface the rest of the bot talks to.

pub mod config;
pub mod control_points;
pub mod eligibility;
pub mod flags;
pub mod objective_resource;
pub mod payload;
pub mod runtime;
pub mod spatial;
pub mod summary;
pub mod timer;

// Re-export key types for convenience
pub use config::{CaptureConfig, CaptureError, PointException};
pub use control_points::{ControlPointRecord, ControlPointTracker};
pub use eligibility::{evaluate, farthest_owned_point, Verdict};
pub use flags::{FlagRecord, FlagStatus, FlagTracker};
pub use objective_resource::{write_round_state, ObjectiveResource, RoundState};
pub use payload::PayloadTracker;
pub use runtime::CaptureLogic;
pub use summary::{FlagSummary, ObjectiveSummary, PointSummary};
pub use timer::RateLimiter;
