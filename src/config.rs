//! Executive configuration and the fluent builder.
//!
//! [`ExecutiveConfig`] is plain serde data so it can come from a JSON
//! file; [`ExecutiveBuilder`] is the code-side way to assemble one and
//! attach observers before the first replication.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarKind;
use crate::error::{KairosError, KairosResult};
use crate::executive::Executive;
use crate::observer::{ExecutiveObserver, SharedObserver};
use crate::time::SimTime;

// ── Settings ──────────────────────────────────────────────────────────

/// Scope of the event creation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceScope {
    /// Restart at zero on every `initialize_replication`, so identical
    /// replications produce identical event IDs.
    #[default]
    PerReplication,
    /// Keep counting across replications of one executive.
    Global,
}

/// Bounds on a single `run_to_completion` call.
///
/// `max_events` and `wall_clock_ms` count from the start of the call;
/// `max_time` is an absolute simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunLimits {
    pub max_events: Option<u64>,
    pub max_time: Option<SimTime>,
    pub wall_clock_ms: Option<u64>,
}

impl RunLimits {
    /// No limits: run until the calendar is empty.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_events(mut self, max: u64) -> Self {
        self.max_events = Some(max);
        self
    }

    pub fn with_max_time(mut self, horizon: SimTime) -> Self {
        self.max_time = Some(horizon);
        self
    }

    pub fn with_wall_clock(mut self, budget: Duration) -> Self {
        self.wall_clock_ms = Some(u64::try_from(budget.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn wall_clock(&self) -> Option<Duration> {
        self.wall_clock_ms.map(Duration::from_millis)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_events.is_none() && self.max_time.is_none() && self.wall_clock_ms.is_none()
    }
}

/// Everything needed to construct an [`Executive`].
///
/// ```json
/// { "calendar": "skew-heap", "sequence": "per-replication",
///   "limits": { "max_time": 1000.0 } }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutiveConfig {
    pub calendar: CalendarKind,
    pub sequence: SequenceScope,
    /// Used by `Executive::run`.
    pub limits: RunLimits,
}

impl ExecutiveConfig {
    pub fn from_json(json: &str) -> KairosResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> KairosResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            KairosError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> KairosResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings that would stop a run before it dispatches anything.
    pub fn validate(&self) -> KairosResult<()> {
        if self.limits.wall_clock_ms == Some(0) {
            return Err(KairosError::InvalidConfig(
                "wall_clock_ms must be positive".into(),
            ));
        }
        if self.limits.max_events == Some(0) {
            return Err(KairosError::InvalidConfig(
                "max_events must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ── ExecutiveBuilder ──────────────────────────────────────────────────

/// Fluent builder for an [`Executive`].
///
/// # Example
/// ```rust
/// use kairos::{CalendarKind, Executive, SequenceScope};
///
/// let exec: Executive = Executive::builder()
///     .calendar(CalendarKind::SkewHeap)
///     .sequence(SequenceScope::Global)
///     .max_events(10_000)
///     .build()
///     .unwrap();
/// ```
pub struct ExecutiveBuilder<P: 'static = ()> {
    config: ExecutiveConfig,
    observers: Vec<SharedObserver<P>>,
}

impl<P: 'static> ExecutiveBuilder<P> {
    pub fn new() -> Self {
        Self::from_config(ExecutiveConfig::default())
    }

    pub fn from_config(config: ExecutiveConfig) -> Self {
        ExecutiveBuilder {
            config,
            observers: Vec::new(),
        }
    }

    // ── Calendar and sequencing ───────────────────────────────

    pub fn calendar(mut self, kind: CalendarKind) -> Self {
        self.config.calendar = kind;
        self
    }

    pub fn sequence(mut self, scope: SequenceScope) -> Self {
        self.config.sequence = scope;
        self
    }

    // ── Limits ────────────────────────────────────────────────

    pub fn limits(mut self, limits: RunLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn max_events(mut self, max: u64) -> Self {
        self.config.limits.max_events = Some(max);
        self
    }

    pub fn max_time(mut self, horizon: SimTime) -> Self {
        self.config.limits.max_time = Some(horizon);
        self
    }

    pub fn wall_clock(mut self, budget: Duration) -> Self {
        self.config.limits = self.config.limits.with_wall_clock(budget);
        self
    }

    // ── Observers ─────────────────────────────────────────────

    /// Attach an observer; keep the returned clone of `observer` to read
    /// it back after the run.
    pub fn observer<O>(mut self, observer: Rc<RefCell<O>>) -> Self
    where
        O: ExecutiveObserver<P> + 'static,
    {
        self.observers.push(observer);
        self
    }

    /// Validate the configuration and create the executive.
    pub fn build(self) -> KairosResult<Executive<P>> {
        self.config.validate()?;
        let mut exec = Executive::new(self.config);
        for observer in self.observers {
            exec.add_shared_observer(observer);
        }
        Ok(exec)
    }
}

impl<P: 'static> Default for ExecutiveBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSpec;
    use crate::trace::TraceRecorder;

    #[test]
    fn test_defaults() {
        let config = ExecutiveConfig::default();
        assert_eq!(config.calendar, CalendarKind::BinaryHeap);
        assert_eq!(config.sequence, SequenceScope::PerReplication);
        assert!(config.limits.is_unbounded());
        assert_eq!(ExecutiveConfig::from_json("{}").unwrap(), config);
    }

    #[test]
    fn test_from_json() {
        let config = ExecutiveConfig::from_json(
            r#"{
                "calendar": "balanced-tree",
                "sequence": "global",
                "limits": { "max_events": 500, "max_time": 120.5, "wall_clock_ms": 2000 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.calendar, CalendarKind::BalancedTree);
        assert_eq!(config.sequence, SequenceScope::Global);
        assert_eq!(config.limits.max_events, Some(500));
        assert_eq!(config.limits.max_time, Some(SimTime::new(120.5).unwrap()));
        assert_eq!(config.limits.wall_clock(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_json_round_trip() {
        let config = ExecutiveConfig {
            calendar: CalendarKind::SortedList,
            sequence: SequenceScope::Global,
            limits: RunLimits::none().with_max_events(9),
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("sorted-list"));
        assert_eq!(ExecutiveConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_config() {
        for json in [
            r#"{ "calendar": "fibonacci-heap" }"#,
            r#"{ "limits": { "max_time": -5.0 } }"#,
            r#"{ "limits": { "wall_clock_ms": 0 } }"#,
            r#"{ "limits": { "max_events": 0 } }"#,
            r#"{ "calender": "skew-heap" }"#,
            "not json",
        ] {
            let err = ExecutiveConfig::from_json(json).unwrap_err();
            assert!(matches!(err, KairosError::InvalidConfig(_)), "{json}: {err}");
        }
    }

    #[test]
    fn test_from_missing_file() {
        let err = ExecutiveConfig::from_file("/nonexistent/kairos.json").unwrap_err();
        assert!(matches!(err, KairosError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder() {
        let recorder = Rc::new(RefCell::new(TraceRecorder::new()));
        let mut exec: Executive = ExecutiveBuilder::new()
            .calendar(CalendarKind::SkewHeap)
            .max_events(2)
            .wall_clock(Duration::from_secs(60))
            .observer(Rc::clone(&recorder))
            .build()
            .unwrap();

        assert_eq!(exec.calendar_kind(), CalendarKind::SkewHeap);
        assert_eq!(exec.config().limits.max_events, Some(2));

        exec.initialize_replication().unwrap();
        for t in [3.0, 1.0, 2.0] {
            exec.schedule_event(t, EventSpec::noop()).unwrap();
        }
        let report = exec.run().unwrap();
        assert_eq!(report.events_executed, 2);
        assert_eq!(recorder.borrow().len(), 2);
    }

    #[test]
    fn test_builder_validates() {
        let result: KairosResult<Executive> = ExecutiveBuilder::new()
            .wall_clock(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }
}
