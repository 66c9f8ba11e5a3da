//! Simulated time for the discrete-event kernel.
//!
//! Time is a real number that only moves when the executive dispatches an
//! event. It never observes the wall clock.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KairosError, KairosResult};

/// A point in simulated time.
///
/// Always finite and non-negative, which is what lets it carry a total
/// order (`Ord`) on top of an `f64`. Construct with [`SimTime::new`];
/// arithmetic goes through [`SimTime::checked_add`] so a bad delay is
/// reported instead of silently producing `NaN` or infinity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SimTime(f64);

impl SimTime {
    /// The start of every replication.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Wrap a raw value. Fails on negative, `NaN` or infinite input.
    pub fn new(value: f64) -> KairosResult<Self> {
        if !value.is_finite() {
            return Err(KairosError::InvalidArgument(format!(
                "simulated time must be finite, got {value}"
            )));
        }
        if value < 0.0 {
            return Err(KairosError::InvalidArgument(format!(
                "simulated time must be non-negative, got {value}"
            )));
        }
        // -0.0 would compare unequal to 0.0 under total_cmp.
        Ok(SimTime(if value == 0.0 { 0.0 } else { value }))
    }

    /// Return the raw value.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// The absolute time `delay` units after `self`.
    ///
    /// Fails with `InvalidArgument` if `delay` is negative, `NaN`, or
    /// the sum overflows to infinity.
    pub fn checked_add(self, delay: f64) -> KairosResult<SimTime> {
        if delay.is_nan() || delay < 0.0 {
            return Err(KairosError::InvalidArgument(format!(
                "delay must be non-negative, got {delay}"
            )));
        }
        SimTime::new(self.0 + delay)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self < other
    }

    /// Elapsed time from `earlier` to `self`, or `None` if `earlier` is later.
    pub fn duration_since(self, earlier: SimTime) -> Option<f64> {
        (self >= earlier).then(|| self.0 - earlier.0)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::ZERO
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<f64> for SimTime {
    type Error = KairosError;

    fn try_from(value: f64) -> KairosResult<Self> {
        SimTime::new(value)
    }
}

impl From<SimTime> for f64 {
    fn from(t: SimTime) -> f64 {
        t.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
