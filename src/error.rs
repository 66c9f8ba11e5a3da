//! Structured error types for the kernel.
//!
//! All fallible public APIs return `Result<T, KairosError>`. The variants
//! split into two families: bad arguments at a call site
//! ([`KairosError::is_invalid_argument`]) and operations on something that
//! is no longer in a usable state ([`KairosError::is_illegal_state`]).
//! Neither family is ever retried by the kernel.

use thiserror::Error;

use crate::event::{EventId, EventStatus};

/// The top-level error type for the simulation kernel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KairosError {
    // ── Invalid arguments ─────────────────────────────────

    /// A delay, time, or other numeric argument was out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Attempted to schedule an event before the current simulated time.
    #[error("cannot schedule event at t={requested} when current time is t={current}")]
    NonCausalEvent { requested: f64, current: f64 },

    /// A priority outside `Priority::HIGHEST..=Priority::LOWEST`.
    #[error("priority {0} is outside the supported range")]
    InvalidPriority(i32),

    // ── Illegal state ─────────────────────────────────────

    /// Cancel or reschedule of an event that is no longer pending.
    #[error("event {event} is no longer live (status: {status})")]
    EventNotLive { event: EventId, status: EventStatus },

    /// The event belongs to a replication whose calendar was cleared.
    #[error("event {event} belongs to replication {replication}, current replication is {current}")]
    StaleEvent {
        event: EventId,
        replication: u64,
        current: u64,
    },

    /// The executive is not in a state that allows the operation.
    #[error("illegal state: {0}")]
    IllegalState(String),

    // ── Configuration ─────────────────────────────────────

    /// A configuration document could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading a configuration file or writing a trace failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl KairosError {
    /// `true` for errors caused by a bad argument at the call site.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            KairosError::InvalidArgument(_)
                | KairosError::NonCausalEvent { .. }
                | KairosError::InvalidPriority(_)
        )
    }

    /// `true` for errors caused by operating on something no longer live.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            KairosError::EventNotLive { .. }
                | KairosError::StaleEvent { .. }
                | KairosError::IllegalState(_)
        )
    }
}

impl From<std::io::Error> for KairosError {
    fn from(e: std::io::Error) -> Self {
        KairosError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for KairosError {
    fn from(e: serde_json::Error) -> Self {
        KairosError::InvalidConfig(e.to_string())
    }
}

/// Convenience alias for `Result<T, KairosError>`.
pub type KairosResult<T> = Result<T, KairosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_non_causal() {
        let e = KairosError::NonCausalEvent {
            requested: 3.0,
            current: 10.0,
        };
        assert!(e.to_string().contains("t=3"));
        assert!(e.to_string().contains("t=10"));
    }

    #[test]
    fn test_error_display_not_live() {
        let e = KairosError::EventNotLive {
            event: EventId::new(7),
            status: EventStatus::Dispatched,
        };
        assert_eq!(e.to_string(), "event E#7 is no longer live (status: dispatched)");
    }

    #[test]
    fn test_categories() {
        assert!(KairosError::InvalidPriority(-4).is_invalid_argument());
        assert!(!KairosError::InvalidPriority(-4).is_illegal_state());
        let stale = KairosError::StaleEvent {
            event: EventId::new(1),
            replication: 1,
            current: 2,
        };
        assert!(stale.is_illegal_state());
        assert!(!KairosError::InvalidConfig("x".into()).is_illegal_state());
        assert!(!KairosError::InvalidConfig("x".into()).is_invalid_argument());
    }

    #[test]
    fn test_error_is_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(KairosError::IllegalState("x".into()));
        assert!(!e.to_string().is_empty());
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(KairosError::from(err), KairosError::InvalidConfig(_)));
    }
}
