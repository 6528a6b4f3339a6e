//! Core environment context trait for capture trackers.

use async_trait::async_trait;
use std::time::Duration;

/// The clock and pacing interface for the capture driver.
///
/// This trait abstracts the "real world" so that the trackers can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `std::time::Instant` and `tokio::time`
/// - **Simulation**: `SimContext` - a virtual clock advanced by the harness
///
/// # Determinism
///
/// Rate limiters in the trackers only ever read `now()`, so a simulation
/// controls exactly when the expensive recomputations fire.
#[async_trait]
pub trait CaptureContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for the cart rebuild and eligibility timers.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);
}
