//! # Kairos: Discrete-Event Scheduling Kernel
//!
//! The scheduling core of a discrete-event simulator. Model code
//! schedules events at future simulated times; the executive dispatches
//! them strictly in `(time, priority, creation sequence)` order and
//! advances the clock to each event's time. Single-threaded and fully
//! deterministic: the same model produces the same dispatch sequence on
//! every run and with every calendar strategy.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │  ModelElement / Scheduling         │ ← model-facing façade
//! │  ┌──────────────────────────────┐  │
//! │  │  Executive                   │  │ ← clock, state machine, dispatch loop
//! │  │  ┌────────────────────────┐  │  │
//! │  │  │  EventCalendar         │  │  │ ← sorted list | binary heap |
//! │  │  │                        │  │  │   skew heap | balanced tree
//! │  │  └────────────────────────┘  │  │
//! │  │  ┌────────────────────────┐  │  │
//! │  │  │  Event                 │  │  │ ← (time, priority, seq) ordered records
//! │  │  └────────────────────────┘  │  │
//! │  │  ┌────────────────────────┐  │  │
//! │  │  │  SimTime               │  │  │ ← finite, non-negative clock value
//! │  │  └────────────────────────┘  │  │
//! │  └──────────────────────────────┘  │
//! │  ExecutiveObserver ← TraceRecorder │ ← lifecycle hooks
//! └────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kairos::{DispatchContext, Event, EventSpec, Executive, RunLimits, Scheduling};
//!
//! let mut exec: Executive = Executive::default();
//! exec.initialize_replication().unwrap();
//! exec.schedule_event(
//!     5.0,
//!     EventSpec::new(|ctx: &mut DispatchContext<'_, ()>, _: &Event| {
//!         ctx.schedule(2.5, EventSpec::noop().with_name("follow-up"))?;
//!         Ok(())
//!     }),
//! )
//! .unwrap();
//!
//! let report = exec.run_to_completion(RunLimits::none()).unwrap();
//! assert!(report.is_completed());
//! assert_eq!(report.events_executed, 2);
//! assert_eq!(exec.now().value(), 7.5);
//! ```

pub mod calendar;
pub mod config;
pub mod element;
pub mod error;
pub mod event;
pub mod executive;
pub mod observer;
pub mod time;
pub mod trace;

// Re-exports for convenience.
pub use calendar::{CalendarKind, EventCalendar};
pub use config::{ExecutiveBuilder, ExecutiveConfig, RunLimits, SequenceScope};
pub use element::{ModelElement, Scheduling, SchedulingElement};
pub use error::{KairosError, KairosResult};
pub use event::{Action, CalendarEntry, Event, EventId, EventIdGen, EventKey, EventSpec, EventStatus, Priority};
pub use executive::{
    DispatchContext, Executive, ExecutiveState, Limit, ReplicationEnd, ReplicationStats,
    ReplicationSummary, RunReport, Step, Termination,
};
pub use observer::{ExecutiveObserver, Notification, SharedObserver};
pub use time::SimTime;
pub use trace::{TraceEntry, TraceRecorder};
