//! Runtime configuration for the capture trackers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::objective_resource::MAX_CONTROL_POINTS;

/// Lower bound on the cart rebuild interval (ms).
pub const MIN_CART_REFRESH_MS: u64 = 3000;

/// Lower bound on the eligibility recompute interval (ms).
pub const MIN_ELIGIBILITY_REFRESH_MS: u64 = 1000;

/// A control point whose prerequisite rule on a given map cannot be derived
/// from the general rule set. Matched by substring of the level name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointException {
    pub map: String,
    pub point: usize,
}

impl PointException {
    pub fn new(map: impl Into<String>, point: usize) -> Self {
        Self {
            map: map.into(),
            point,
        }
    }
}

/// Configuration for the capture driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Cart buckets are rebuilt at most this often (default: 3000 ms)
    pub cart_refresh_ms: u64,

    /// Control-point eligibility is recomputed at most this often (default: 1000 ms)
    pub eligibility_refresh_ms: u64,

    /// Console variable that bypasses prerequisite chains when false
    pub linear_capture_var: String,

    /// Console variable that marks a control-point round
    pub control_point_mode_var: String,

    /// Points skipped by the nearest-capturable query on specific maps
    pub point_exceptions: Vec<PointException>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cart_refresh_ms: MIN_CART_REFRESH_MS,
            eligibility_refresh_ms: MIN_ELIGIBILITY_REFRESH_MS,
            linear_capture_var: "tf_caplinear".to_string(),
            control_point_mode_var: "tf_gamemode_cp".to_string(),
            point_exceptions: vec![PointException::new("cp_steel", 4)],
        }
    }
}

impl CaptureConfig {
    /// Cart rebuild interval, never below `MIN_CART_REFRESH_MS` even for
    /// configs built in code without `validate`.
    pub fn cart_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.cart_refresh_ms.max(MIN_CART_REFRESH_MS))
    }

    /// Eligibility interval, never below `MIN_ELIGIBILITY_REFRESH_MS`.
    pub fn eligibility_interval(&self) -> Duration {
        Duration::from_millis(self.eligibility_refresh_ms.max(MIN_ELIGIBILITY_REFRESH_MS))
    }

    /// Parses and validates a JSON configuration. Missing keys take defaults.
    pub fn from_json(text: &str) -> Result<Self, CaptureError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| CaptureError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the interval floors and the exception table.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.cart_refresh_ms < MIN_CART_REFRESH_MS {
            return Err(CaptureError::IntervalTooShort {
                name: "cart_refresh_ms",
                value: self.cart_refresh_ms,
                min: MIN_CART_REFRESH_MS,
            });
        }
        if self.eligibility_refresh_ms < MIN_ELIGIBILITY_REFRESH_MS {
            return Err(CaptureError::IntervalTooShort {
                name: "eligibility_refresh_ms",
                value: self.eligibility_refresh_ms,
                min: MIN_ELIGIBILITY_REFRESH_MS,
            });
        }
        for exception in &self.point_exceptions {
            if exception.map.is_empty() {
                return Err(CaptureError::InvalidConfig(
                    "point exception with empty map name".to_string(),
                ));
            }
            if exception.point >= MAX_CONTROL_POINTS {
                return Err(CaptureError::ExceptionOutOfRange {
                    map: exception.map.clone(),
                    point: exception.point,
                });
            }
        }
        Ok(())
    }
}

/// Errors that can occur while configuring the capture driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("{name} = {value}ms is below the minimum of {min}ms")]
    IntervalTooShort {
        name: &'static str,
        value: u64,
        min: u64,
    },

    #[error("Point exception {point} for map '{map}' is out of range")]
    ExceptionOutOfRange { map: String, point: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
