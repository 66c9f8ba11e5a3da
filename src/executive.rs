//! The executive: simulated clock, event calendar and dispatch loop.
//!
//! `execute_next` pops the earliest entry, advances the clock to its
//! time, and runs its action unless it was canceled or superseded by a
//! reschedule. `run_to_completion` repeats that until the calendar is
//! empty or a [`RunLimits`] bound is hit. Everything is synchronous and
//! single-threaded; an action runs to completion before the next event
//! is looked at.
//!
//! Actions get a [`DispatchContext`] that schedules straight into the
//! calendar. Observers get a [`Notification`] whose requests are queued
//! and applied once the current step has finished.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::calendar::{CalendarKind, EventCalendar};
use crate::config::{ExecutiveBuilder, ExecutiveConfig, RunLimits, SequenceScope};
use crate::element::{ElementHook, ModelElement, Scheduling};
use crate::error::{KairosError, KairosResult};
use crate::event::{CalendarEntry, Event, EventIdGen, EventSpec, Priority};
use crate::observer::{Command, ExecutiveObserver, Notification, SharedObserver};
use crate::time::SimTime;

// ── State ─────────────────────────────────────────────────────────────

/// Lifecycle of an executive.
///
/// `Uninitialized → Initialized → Running → (Paused | AfterReplication)`.
/// A paused run resumes on the next `run_to_completion`; a finished
/// replication is followed by `initialize_replication` or `shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutiveState {
    Uninitialized,
    Initialized,
    Running,
    Paused,
    AfterReplication,
    Ended,
}

impl ExecutiveState {
    /// States in which events may be scheduled, canceled or rescheduled.
    pub fn accepts_scheduling(self) -> bool {
        matches!(
            self,
            ExecutiveState::Initialized | ExecutiveState::Running | ExecutiveState::Paused
        )
    }
}

impl fmt::Display for ExecutiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutiveState::Uninitialized => "uninitialized",
            ExecutiveState::Initialized => "initialized",
            ExecutiveState::Running => "running",
            ExecutiveState::Paused => "paused",
            ExecutiveState::AfterReplication => "after-replication",
            ExecutiveState::Ended => "ended",
        })
    }
}

// ── Results ───────────────────────────────────────────────────────────

/// Result of a single `execute_next` call.
#[derive(Debug)]
pub enum Step<P> {
    /// The event's action ran.
    Executed(Event<P>),
    /// The calendar is empty; the replication is over.
    Exhausted,
}

/// Which limit cut a run short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    /// `max_events` events executed in this run.
    Events(u64),
    /// The next event lies beyond the `max_time` horizon.
    Time(SimTime),
    /// The run's wall-clock budget was spent.
    WallClock(Duration),
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Events(n) => write!(f, "event limit of {n} reached"),
            Limit::Time(t) => write!(f, "time horizon {t} reached"),
            Limit::WallClock(d) => write!(f, "wall-clock limit of {d:?} reached"),
        }
    }
}

/// Why `run_to_completion` returned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The calendar ran dry: the model finished.
    Completed,
    /// A configured limit halted the loop; the replication is paused.
    LimitExceeded(Limit),
    /// An action or observer asked the run to stop.
    StopRequested,
}

/// What one `run_to_completion` call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub replication: u64,
    pub termination: Termination,
    /// Events whose action ran during this call.
    pub events_executed: u64,
    /// Simulated time when the call returned.
    pub end_time: SimTime,
    pub wall_time: Duration,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.termination == Termination::Completed
    }

    /// The limit that cut the run short, if any.
    pub fn limit(&self) -> Option<Limit> {
        match self.termination {
            Termination::LimitExceeded(limit) => Some(limit),
            _ => None,
        }
    }
}

/// Per-replication counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationStats {
    /// Events inserted into the calendar.
    pub scheduled: u64,
    /// Events whose action ran.
    pub executed: u64,
    /// Canceled events discarded when they reached the front.
    pub canceled: u64,
    /// Stale copies left behind by reschedules, discarded at the front.
    pub superseded: u64,
    pub rescheduled: u64,
}

/// How a replication ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationEnd {
    /// No events left.
    Exhausted,
    /// `end_replication` was called with events still pending.
    CutOff,
}

/// Handed to end-of-replication observers and returned by `end_replication`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationSummary {
    pub replication: u64,
    pub end_time: SimTime,
    pub cause: ReplicationEnd,
    pub stats: ReplicationStats,
}

// ── Dispatch context ──────────────────────────────────────────────────

/// Context passed to an event's action.
///
/// Borrows the calendar mutably for the duration of the action, so
/// follow-up events are inserted immediately. Events scheduled here at
/// zero delay run after every event already pending for the same instant
/// and priority, because their creation sequence is larger.
pub struct DispatchContext<'a, P> {
    now: SimTime,
    replication: u64,
    calendar: &'a mut dyn EventCalendar<P>,
    ids: &'a mut EventIdGen,
    stats: &'a mut ReplicationStats,
    stop_requested: &'a mut bool,
}

impl<P: 'static> DispatchContext<'_, P> {
    pub fn replication(&self) -> u64 {
        self.replication
    }

    /// Pending calendar entries, including canceled ones not yet reached.
    pub fn pending_count(&self) -> usize {
        self.calendar.len()
    }

    /// Halt `run_to_completion` once this action returns.
    pub fn request_stop(&mut self) {
        *self.stop_requested = true;
    }
}

impl<P: 'static> Scheduling<P> for DispatchContext<'_, P> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule(&mut self, delay: f64, spec: EventSpec<P>) -> KairosResult<Event<P>> {
        let event = mint(self.ids, self.replication, self.now, delay, spec)?;
        self.calendar.add(CalendarEntry::new(event.clone()));
        self.stats.scheduled += 1;
        trace!(event = %event, "Scheduled from action");
        Ok(event)
    }

    fn cancel(&mut self, event: &Event<P>) -> KairosResult<()> {
        ensure_cancelable(event, self.replication)?;
        self.calendar.cancel(event);
        Ok(())
    }

    fn reschedule_with_priority(
        &mut self,
        event: &Event<P>,
        new_delay: f64,
        priority: Priority,
    ) -> KairosResult<()> {
        let time = reschedule_target(event, self.replication, self.now, new_delay)?;
        move_event(&mut *self.calendar, &mut *self.stats, event, time, priority);
        Ok(())
    }
}

// ── Shared scheduling rules ───────────────────────────────────────────

/// Validate a delay and create an event for `now + delay`. An ID is only
/// consumed once the delay is known to be valid.
pub(crate) fn mint<P: 'static>(
    ids: &mut EventIdGen,
    replication: u64,
    now: SimTime,
    delay: f64,
    spec: EventSpec<P>,
) -> KairosResult<Event<P>> {
    let time = now.checked_add(delay)?;
    Event::create_in(replication, ids.next_id(), time, now, spec)
}

fn ensure_current<P>(event: &Event<P>, replication: u64) -> KairosResult<()> {
    if event.replication() != replication {
        return Err(KairosError::StaleEvent {
            event: event.id(),
            replication: event.replication(),
            current: replication,
        });
    }
    Ok(())
}

/// Canceling twice is fine; canceling something that already ran is not.
pub(crate) fn ensure_cancelable<P>(event: &Event<P>, replication: u64) -> KairosResult<()> {
    ensure_current(event, replication)?;
    if event.is_dispatched() {
        return Err(KairosError::EventNotLive {
            event: event.id(),
            status: event.status(),
        });
    }
    Ok(())
}

/// Check that `event` can be moved and compute its new absolute time.
pub(crate) fn reschedule_target<P>(
    event: &Event<P>,
    replication: u64,
    now: SimTime,
    new_delay: f64,
) -> KairosResult<SimTime> {
    ensure_current(event, replication)?;
    if !event.is_pending() {
        return Err(KairosError::EventNotLive {
            event: event.id(),
            status: event.status(),
        });
    }
    now.checked_add(new_delay)
}

/// Move `event` to a new slot. The copy already in the calendar becomes
/// stale and is discarded when it reaches the front.
pub(crate) fn move_event<P, C>(
    calendar: &mut C,
    stats: &mut ReplicationStats,
    event: &Event<P>,
    time: SimTime,
    priority: Priority,
) where
    C: EventCalendar<P> + ?Sized,
{
    event.move_to(time, priority);
    calendar.add(CalendarEntry::new(event.clone()));
    stats.rescheduled += 1;
    debug!(event = %event, "Rescheduled");
}

// ── Executive ─────────────────────────────────────────────────────────

enum Advance<P> {
    Executed(Event<P>),
    Exhausted,
    Horizon(SimTime),
}

/// Owns simulated time and one event calendar, and drives dispatch.
///
/// `P` is the payload type carried by events.
pub struct Executive<P: 'static = ()> {
    config: ExecutiveConfig,
    calendar: Box<dyn EventCalendar<P>>,
    ids: EventIdGen,
    now: SimTime,
    state: ExecutiveState,
    replication: u64,
    stats: ReplicationStats,
    observers: Vec<SharedObserver<P>>,
    commands: Vec<Command<P>>,
    stop_requested: bool,
}

impl<P: 'static> Executive<P> {
    /// Create an executive from a configuration. No replication is
    /// active until `initialize_replication` is called.
    pub fn new(config: ExecutiveConfig) -> Self {
        Executive {
            calendar: config.calendar.build(),
            config,
            ids: EventIdGen::new(),
            now: SimTime::ZERO,
            state: ExecutiveState::Uninitialized,
            replication: 0,
            stats: ReplicationStats::default(),
            observers: Vec::new(),
            commands: Vec::new(),
            stop_requested: false,
        }
    }

    /// Default configuration with the given calendar strategy.
    pub fn with_calendar(kind: CalendarKind) -> Self {
        Self::new(ExecutiveConfig {
            calendar: kind,
            ..ExecutiveConfig::default()
        })
    }

    pub fn builder() -> ExecutiveBuilder<P> {
        ExecutiveBuilder::new()
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn config(&self) -> &ExecutiveConfig {
        &self.config
    }

    pub fn state(&self) -> ExecutiveState {
        self.state
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of the active (or last) replication; 0 before the first.
    pub fn replication(&self) -> u64 {
        self.replication
    }

    pub fn calendar_kind(&self) -> CalendarKind {
        self.calendar.kind()
    }

    /// Counters for the active replication.
    pub fn stats(&self) -> &ReplicationStats {
        &self.stats
    }

    /// Calendar entries not yet reached, including canceled ones.
    pub fn pending_count(&self) -> usize {
        self.calendar.len()
    }

    /// The event at the front of the calendar. It may be canceled or a
    /// stale reschedule copy; see [`pending_events`](Self::pending_events)
    /// for live events only.
    pub fn peek_next(&self) -> Option<&Event<P>> {
        self.calendar.peek_next().map(CalendarEntry::event)
    }

    /// Live pending events in the order they will be dispatched.
    pub fn pending_events(&self) -> Vec<Event<P>> {
        self.calendar
            .ordered()
            .into_iter()
            .filter(|entry| entry.is_live())
            .map(|entry| entry.event().clone())
            .collect()
    }

    // ── Observers ─────────────────────────────────────────────

    /// Register an observer; notified after those already registered.
    /// Returns a shared handle for reading its state afterwards.
    pub fn add_observer<O>(&mut self, observer: O) -> Rc<RefCell<O>>
    where
        O: ExecutiveObserver<P> + 'static,
    {
        let shared = Rc::new(RefCell::new(observer));
        self.observers.push(shared.clone());
        shared
    }

    pub fn add_shared_observer(&mut self, observer: SharedObserver<P>) {
        self.observers.push(observer);
    }

    /// Register a model element; its lifecycle hooks are delivered
    /// through the observer list.
    pub fn register_element<E>(&mut self, element: E) -> Rc<RefCell<E>>
    where
        E: ModelElement<P> + 'static,
    {
        let shared = Rc::new(RefCell::new(element));
        self.observers
            .push(Rc::new(RefCell::new(ElementHook::new(Rc::clone(&shared)))));
        shared
    }

    // ── Replication lifecycle ─────────────────────────────────

    /// Start a fresh replication: empty calendar, clock at zero, counters
    /// reset, then `on_initialized` observers run. Events they schedule
    /// are inserted before this returns.
    pub fn initialize_replication(&mut self) -> KairosResult<()> {
        if self.state == ExecutiveState::Ended {
            return Err(KairosError::IllegalState(
                "executive has been shut down".into(),
            ));
        }
        self.calendar.clear();
        self.commands.clear();
        self.now = SimTime::ZERO;
        self.replication += 1;
        if self.config.sequence == SequenceScope::PerReplication {
            self.ids.reset();
        }
        self.stats = ReplicationStats::default();
        self.stop_requested = false;
        self.state = ExecutiveState::Initialized;

        info!(
            replication = self.replication,
            calendar = %self.calendar.kind(),
            "Replication initialized"
        );

        self.notify(true, |observer, ctx| observer.borrow_mut().on_initialized(ctx))?;
        self.apply_commands();
        Ok(())
    }

    /// Cut the active replication off: drop pending events and run the
    /// end-of-replication observers.
    pub fn end_replication(&mut self) -> KairosResult<ReplicationSummary> {
        if !self.state.accepts_scheduling() {
            return Err(KairosError::IllegalState(format!(
                "no active replication to end (state: {})",
                self.state
            )));
        }
        self.finish_replication(ReplicationEnd::CutOff)
    }

    /// Move to the terminal `Ended` state. Pending events are dropped
    /// without notifying observers.
    pub fn shutdown(&mut self) {
        self.calendar.clear();
        self.commands.clear();
        self.state = ExecutiveState::Ended;
        debug!(replication = self.replication, "Executive shut down");
    }

    /// Ask `run_to_completion` to return before the next dispatch.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Schedule an event `delay` time units from now.
    ///
    /// Fails with `InvalidArgument` on a negative or non-finite delay and
    /// with `IllegalState` outside an active replication.
    pub fn schedule_event(&mut self, delay: f64, spec: EventSpec<P>) -> KairosResult<Event<P>> {
        self.ensure_active("schedule")?;
        let event = mint(&mut self.ids, self.replication, self.now, delay, spec)?;
        self.calendar.add(CalendarEntry::new(event.clone()));
        self.stats.scheduled += 1;
        trace!(event = %event, "Scheduled");
        Ok(event)
    }

    /// Cancel a pending event. Canceling an already-canceled event is a
    /// no-op; canceling one that has run, or one from an earlier
    /// replication, is an `IllegalState` error.
    pub fn cancel_event(&mut self, event: &Event<P>) -> KairosResult<()> {
        self.ensure_active("cancel")?;
        ensure_cancelable(event, self.replication)?;
        self.calendar.cancel(event);
        trace!(event = %event, "Canceled");
        Ok(())
    }

    /// Move a pending event to `now + new_delay`, keeping its identity,
    /// payload, action and priority.
    pub fn reschedule_event(&mut self, event: &Event<P>, new_delay: f64) -> KairosResult<()> {
        self.reschedule_with_priority(event, new_delay, event.priority())
    }

    /// Like [`reschedule_event`](Self::reschedule_event), also replacing
    /// the priority.
    pub fn reschedule_with_priority(
        &mut self,
        event: &Event<P>,
        new_delay: f64,
        priority: Priority,
    ) -> KairosResult<()> {
        self.ensure_active("reschedule")?;
        let time = reschedule_target(event, self.replication, self.now, new_delay)?;
        move_event(&mut *self.calendar, &mut self.stats, event, time, priority);
        Ok(())
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Dispatch the earliest live event.
    ///
    /// Canceled and superseded entries met on the way are discarded; the
    /// clock still advances to their time, so it never moves backwards.
    /// An empty calendar ends the replication and yields `Step::Exhausted`,
    /// as does any further call until the next `initialize_replication`.
    /// Stop requests made while stepping are discarded.
    pub fn execute_next(&mut self) -> KairosResult<Step<P>> {
        match self.state {
            ExecutiveState::AfterReplication => return Ok(Step::Exhausted),
            state if !state.accepts_scheduling() => {
                return Err(KairosError::IllegalState(format!(
                    "cannot dispatch in state {state}; call initialize_replication first"
                )));
            }
            _ => {}
        }
        let step = match self.advance(None)? {
            Advance::Executed(event) => Step::Executed(event),
            Advance::Exhausted | Advance::Horizon(_) => Step::Exhausted,
        };
        // Stepping has no run to stop.
        self.stop_requested = false;
        Ok(step)
    }

    /// Run with the limits from the configuration.
    pub fn run(&mut self) -> KairosResult<RunReport> {
        let limits = self.config.limits;
        self.run_to_completion(limits)
    }

    /// Dispatch until the calendar is empty or a limit is hit.
    ///
    /// Limits are checked between dispatches, never inside an action.
    /// Hitting one while live events remain leaves the replication
    /// `Paused` and is reported as `Termination::LimitExceeded`, distinct
    /// from normal completion. If an observer or action fails, the error
    /// is returned, the failed event counts as consumed and the
    /// replication is left `Paused`.
    pub fn run_to_completion(&mut self, limits: RunLimits) -> KairosResult<RunReport> {
        let started = Instant::now();
        match self.state {
            ExecutiveState::AfterReplication => {
                return Ok(self.report(Termination::Completed, 0, started));
            }
            state if !state.accepts_scheduling() => {
                return Err(KairosError::IllegalState(format!(
                    "cannot run in state {state}; call initialize_replication first"
                )));
            }
            _ => {}
        }
        self.state = ExecutiveState::Running;

        let wall_limit = limits.wall_clock();
        let mut executed = 0u64;
        let termination = loop {
            if std::mem::take(&mut self.stop_requested) {
                break Termination::StopRequested;
            }
            let limit = match (limits.max_events, wall_limit) {
                (Some(max), _) if executed >= max => Some(Limit::Events(max)),
                (_, Some(budget)) if started.elapsed() >= budget => Some(Limit::WallClock(budget)),
                _ => None,
            };
            if let Some(limit) = limit {
                // A limit only cuts the model off if live work remains.
                if self.skip_inactive(limits.max_time).is_some() {
                    break Termination::LimitExceeded(limit);
                }
                self.finish_replication(ReplicationEnd::Exhausted)?;
                break Termination::Completed;
            }
            match self.advance(limits.max_time)? {
                Advance::Executed(_) => executed += 1,
                Advance::Exhausted => break Termination::Completed,
                Advance::Horizon(horizon) => {
                    break Termination::LimitExceeded(Limit::Time(horizon));
                }
            }
        };

        if termination != Termination::Completed {
            self.state = ExecutiveState::Paused;
            debug!(
                replication = self.replication,
                now = self.now.value(),
                ?termination,
                "Run halted"
            );
        }
        let report = self.report(termination, executed, started);
        info!(
            replication = report.replication,
            executed = report.events_executed,
            end_time = report.end_time.value(),
            ?termination,
            "Run finished"
        );
        Ok(report)
    }

    fn report(&self, termination: Termination, executed: u64, started: Instant) -> RunReport {
        RunReport {
            replication: self.replication,
            termination,
            events_executed: executed,
            end_time: self.now,
            wall_time: started.elapsed(),
        }
    }

    /// Pop canceled and superseded entries off the front and return the
    /// time of the first live one. The clock follows discarded entries
    /// unless they lie beyond `horizon`.
    fn skip_inactive(&mut self, horizon: Option<SimTime>) -> Option<SimTime> {
        loop {
            let entry = self.calendar.peek_next()?;
            if entry.is_live() {
                return Some(entry.time());
            }
            let entry = self.calendar.next_event()?;
            if horizon.map_or(true, |h| entry.time() <= h) {
                debug_assert!(
                    entry.time() >= self.now,
                    "time went backward: now={}, event={}",
                    self.now,
                    entry.time()
                );
                self.now = entry.time();
            }
            if entry.is_superseded() {
                self.stats.superseded += 1;
            } else {
                self.stats.canceled += 1;
            }
            trace!(event = %entry.key(), "Discarded inactive entry");
        }
    }

    /// One dispatch step. Live entries beyond `horizon` are left in place.
    fn advance(&mut self, horizon: Option<SimTime>) -> KairosResult<Advance<P>> {
        let next_time = match self.skip_inactive(horizon) {
            Some(time) => time,
            None => {
                self.finish_replication(ReplicationEnd::Exhausted)?;
                return Ok(Advance::Exhausted);
            }
        };
        if let Some(horizon) = horizon {
            if next_time > horizon {
                return Ok(Advance::Horizon(horizon));
            }
        }
        let Some(entry) = self.calendar.next_event() else {
            self.finish_replication(ReplicationEnd::Exhausted)?;
            return Ok(Advance::Exhausted);
        };

        debug_assert!(
            entry.time() >= self.now,
            "time went backward: now={}, event={}",
            self.now,
            entry.time()
        );
        self.now = entry.time();

        let event = entry.into_event();
        self.state = ExecutiveState::Running;
        if let Err(e) = self.dispatch(&event) {
            self.abandon(&event, &e);
            return Err(e);
        }
        Ok(Advance::Executed(event))
    }

    /// Notify, run the action, notify again, then apply queued commands.
    fn dispatch(&mut self, event: &Event<P>) -> KairosResult<()> {
        self.notify(true, |observer, ctx| observer.borrow_mut().before_event(ctx, event))?;

        event.mark_dispatched();
        if let Some(action) = event.take_action() {
            let mut ctx = DispatchContext {
                now: self.now,
                replication: self.replication,
                calendar: &mut *self.calendar,
                ids: &mut self.ids,
                stats: &mut self.stats,
                stop_requested: &mut self.stop_requested,
            };
            action(&mut ctx, event)?;
        }
        self.stats.executed += 1;
        trace!(event = %event, "Dispatched");

        self.notify(true, |observer, ctx| observer.borrow_mut().after_event(ctx, event))?;
        self.apply_commands();
        Ok(())
    }

    /// A failed dispatch consumes the event: it is marked dispatched and
    /// its action dropped, so the handle can no longer be canceled or
    /// rescheduled. Commands queued in that round are discarded and the
    /// replication is left `Paused`.
    fn abandon(&mut self, event: &Event<P>, error: &KairosError) {
        event.mark_dispatched();
        drop(event.take_action());
        self.commands.clear();
        self.stop_requested = false;
        self.state = ExecutiveState::Paused;
        warn!(event = %event, %error, "Dispatch failed");
    }

    fn finish_replication(&mut self, cause: ReplicationEnd) -> KairosResult<ReplicationSummary> {
        let dropped = self.calendar.len();
        self.calendar.clear();
        self.state = ExecutiveState::AfterReplication;

        let summary = ReplicationSummary {
            replication: self.replication,
            end_time: self.now,
            cause,
            stats: self.stats.clone(),
        };
        info!(
            replication = summary.replication,
            end_time = summary.end_time.value(),
            executed = summary.stats.executed,
            dropped,
            ?cause,
            "Replication ended"
        );

        self.notify(false, |observer, ctx| {
            observer.borrow_mut().on_replication_end(ctx, &summary)
        })?;
        Ok(summary)
    }

    fn ensure_active(&self, operation: &str) -> KairosResult<()> {
        if self.state.accepts_scheduling() {
            Ok(())
        } else {
            Err(KairosError::IllegalState(format!(
                "cannot {operation} in state {}",
                self.state
            )))
        }
    }

    /// Call `f` for every observer in registration order. The first error
    /// stops the notification and is returned.
    fn notify<F>(&mut self, accepting: bool, mut f: F) -> KairosResult<()>
    where
        F: FnMut(&SharedObserver<P>, &mut Notification<'_, P>) -> KairosResult<()>,
    {
        if self.observers.is_empty() {
            return Ok(());
        }
        let observers = std::mem::take(&mut self.observers);
        let mut result = Ok(());
        for observer in &observers {
            let mut ctx = Notification {
                now: self.now,
                replication: self.replication,
                state: self.state,
                accepting,
                calendar: &*self.calendar,
                ids: &mut self.ids,
                commands: &mut self.commands,
                stop_requested: &mut self.stop_requested,
            };
            if let Err(e) = f(observer, &mut ctx) {
                result = Err(e);
                break;
            }
        }
        self.observers = observers;
        result
    }

    /// Apply what observers queued during the last notification round.
    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.commands) {
            match command {
                Command::Insert(entry) => {
                    trace!(event = %entry.key(), "Inserted deferred event");
                    self.calendar.add(entry);
                    self.stats.scheduled += 1;
                }
                Command::Cancel(event) => self.calendar.cancel(&event),
                Command::Reschedule {
                    event,
                    time,
                    priority,
                } => {
                    if event.is_pending() {
                        move_event(&mut *self.calendar, &mut self.stats, &event, time, priority);
                    } else {
                        warn!(event = %event, "Dropped deferred reschedule of inactive event");
                    }
                }
            }
        }
    }
}

impl<P: 'static> Scheduling<P> for Executive<P> {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule(&mut self, delay: f64, spec: EventSpec<P>) -> KairosResult<Event<P>> {
        self.schedule_event(delay, spec)
    }

    fn cancel(&mut self, event: &Event<P>) -> KairosResult<()> {
        self.cancel_event(event)
    }

    fn reschedule_with_priority(
        &mut self,
        event: &Event<P>,
        new_delay: f64,
        priority: Priority,
    ) -> KairosResult<()> {
        Executive::reschedule_with_priority(self, event, new_delay, priority)
    }
}

impl<P: 'static> Default for Executive<P> {
    fn default() -> Self {
        Self::new(ExecutiveConfig::default())
    }
}

impl<P: 'static> fmt::Debug for Executive<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executive")
            .field("state", &self.state)
            .field("now", &self.now)
            .field("replication", &self.replication)
            .field("calendar", &self.calendar.kind())
            .field("pending", &self.calendar.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
