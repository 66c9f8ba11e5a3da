//! Event records for the discrete-event kernel.
//!
//! An [`Event`] is "run this action at this simulated time". Events are
//! ordered by the three-level key `(time, priority, creation sequence)`
//! and that order is the only thing any calendar strategy looks at.
//!
//! An event is immutable after creation except for its lifecycle status
//! and, on reschedule, its slot in the calendar. Both live in `Cell`s on a
//! shared core so the handle returned to model code stays valid while the
//! calendar holds its own copy.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{KairosError, KairosResult};
use crate::executive::DispatchContext;
use crate::time::SimTime;

// ── Event ID ──────────────────────────────────────────────────────────

/// Creation-sequence number of an event.
///
/// Strictly increasing in creation order and never reused within its
/// scope, so it breaks ties between events with equal time and priority:
/// the one created first runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw u64 into an `EventId`.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
    }

    /// Return the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Strictly-increasing creation-sequence generator.
///
/// Each `Executive` owns exactly one of these. Whether it restarts per
/// replication is governed by [`SequenceScope`](crate::config::SequenceScope).
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
}

impl EventIdGen {
    /// Create a generator starting at 0.
    pub fn new() -> Self {
        EventIdGen { next: 0 }
    }

    /// Create a generator starting at a specific value.
    pub fn starting_at(start: u64) -> Self {
        EventIdGen { next: start }
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        EventId(self.next)
    }

    /// Restart the sequence at 0.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

// ── Priority ──────────────────────────────────────────────────────────

/// Tie-break rank for events scheduled at the same time.
///
/// Lower values run first. Valid values are `HIGHEST..=LOWEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Priority(i32);

impl Priority {
    /// Most urgent priority.
    pub const HIGHEST: Priority = Priority(0);
    /// Mid-range priority used when none is given.
    pub const DEFAULT: Priority = Priority(50);
    /// Least urgent priority.
    pub const LOWEST: Priority = Priority(100);

    /// Validate and wrap a raw priority.
    pub fn new(value: i32) -> KairosResult<Self> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Priority(value))
        } else {
            Err(KairosError::InvalidPriority(value))
        }
    }

    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

impl TryFrom<i32> for Priority {
    type Error = KairosError;

    fn try_from(value: i32) -> KairosResult<Self> {
        Priority::new(value)
    }
}

impl From<Priority> for i32 {
    fn from(p: Priority) -> i32 {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ── Status ────────────────────────────────────────────────────────────

/// Lifecycle of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Waiting in a calendar.
    Pending,
    /// Canceled; the executive will discard it when it reaches the front.
    Canceled,
    /// Its action has been invoked.
    Dispatched,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventStatus::Pending => "pending",
            EventStatus::Canceled => "canceled",
            EventStatus::Dispatched => "dispatched",
        })
    }
}

// ── Ordering key ──────────────────────────────────────────────────────

/// The total order every calendar strategy uses.
///
/// Derived `Ord` compares fields in declaration order: time ascending,
/// then priority ascending, then creation sequence ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub time: SimTime,
    pub priority: Priority,
    pub id: EventId,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.id, self.time, self.priority)
    }
}

// ── Event spec ────────────────────────────────────────────────────────

/// The callback an event runs when dispatched.
///
/// It receives the dispatch context (for follow-up scheduling) and the
/// event itself (for its payload). Returning `Err` aborts the run.
pub type Action<P> = Box<dyn FnOnce(&mut DispatchContext<'_, P>, &Event<P>) -> KairosResult<()>>;

/// Everything needed to create an event except its time and identity.
pub struct EventSpec<P> {
    pub(crate) priority: Option<Priority>,
    pub(crate) payload: Option<P>,
    pub(crate) name: Option<String>,
    pub(crate) action: Action<P>,
}

impl<P: 'static> EventSpec<P> {
    /// A spec that runs `action` at the default priority.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce(&mut DispatchContext<'_, P>, &Event<P>) -> KairosResult<()> + 'static,
    {
        EventSpec {
            priority: None,
            payload: None,
            name: None,
            action: Box::new(action),
        }
    }

    /// A spec whose action does nothing. Useful for marker events that
    /// only matter to observers.
    pub fn noop() -> Self {
        Self::new(|_, _| Ok(()))
    }
}

impl<P> EventSpec<P> {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fill in the priority if the caller left it unset.
    pub(crate) fn or_priority(mut self, priority: Priority) -> Self {
        self.priority.get_or_insert(priority);
        self
    }

    /// Fill in the name if the caller left it unset.
    pub(crate) fn or_name(mut self, name: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(name.to_string());
        }
        self
    }
}

impl<P> fmt::Debug for EventSpec<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSpec")
            .field("priority", &self.priority)
            .field("has_payload", &self.payload.is_some())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// Where an event currently sits in the calendar. `generation` counts
/// reschedules so older calendar copies can be recognized as stale.
#[derive(Debug, Clone, Copy)]
struct Slot {
    time: SimTime,
    priority: Priority,
    generation: u32,
}

struct EventCore<P> {
    id: EventId,
    replication: u64,
    name: Option<String>,
    payload: Option<P>,
    action: RefCell<Option<Action<P>>>,
    slot: Cell<Slot>,
    status: Cell<EventStatus>,
}

/// Shared handle to a scheduled event.
///
/// Cloning is cheap and every clone refers to the same event: canceling
/// through one handle cancels it for all, and a handle stays valid across
/// reschedules.
pub struct Event<P = ()> {
    core: Rc<EventCore<P>>,
}

impl<P> Clone for Event<P> {
    fn clone(&self) -> Self {
        Event {
            core: Rc::clone(&self.core),
        }
    }
}

impl<P: 'static> Event<P> {
    /// Create an event for absolute time `time`, given the current
    /// simulated time `now`.
    ///
    /// Fails with `NonCausalEvent` if `time` is before `now`. The executive
    /// mints IDs and calls this for you; it is public for building
    /// calendars by hand.
    pub fn create(id: EventId, time: SimTime, now: SimTime, spec: EventSpec<P>) -> KairosResult<Self> {
        Self::create_in(0, id, time, now, spec)
    }

    pub(crate) fn create_in(
        replication: u64,
        id: EventId,
        time: SimTime,
        now: SimTime,
        spec: EventSpec<P>,
    ) -> KairosResult<Self> {
        if time < now {
            return Err(KairosError::NonCausalEvent {
                requested: time.value(),
                current: now.value(),
            });
        }
        Ok(Event {
            core: Rc::new(EventCore {
                id,
                replication,
                name: spec.name,
                payload: spec.payload,
                action: RefCell::new(Some(spec.action)),
                slot: Cell::new(Slot {
                    time,
                    priority: spec.priority.unwrap_or_default(),
                    generation: 0,
                }),
                status: Cell::new(EventStatus::Pending),
            }),
        })
    }
}

impl<P> Event<P> {
    #[inline]
    pub fn id(&self) -> EventId {
        self.core.id
    }

    /// Scheduled execution time (the latest one, after reschedules).
    #[inline]
    pub fn time(&self) -> SimTime {
        self.core.slot.get().time
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.core.slot.get().priority
    }

    /// The ordering key for the event's current slot.
    pub fn key(&self) -> EventKey {
        let slot = self.core.slot.get();
        EventKey {
            time: slot.time,
            priority: slot.priority,
            id: self.core.id,
        }
    }

    /// Three-level comparison: time, then priority, then creation order.
    pub fn compare_to(&self, other: &Event<P>) -> Ordering {
        self.key().cmp(&other.key())
    }

    pub fn name(&self) -> Option<&str> {
        self.core.name.as_deref()
    }

    pub fn payload(&self) -> Option<&P> {
        self.core.payload.as_ref()
    }

    /// Replication in which the event was created.
    pub fn replication(&self) -> u64 {
        self.core.replication
    }

    pub fn status(&self) -> EventStatus {
        self.core.status.get()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == EventStatus::Pending
    }

    pub fn is_canceled(&self) -> bool {
        self.status() == EventStatus::Canceled
    }

    pub fn is_dispatched(&self) -> bool {
        self.status() == EventStatus::Dispatched
    }

    /// Mark the event canceled.
    ///
    /// Idempotent. The event stays in its calendar until it reaches the
    /// front, where the executive discards it without running its action.
    /// Has no effect on an event that was already dispatched.
    pub fn cancel(&self) {
        if self.is_pending() {
            self.core.status.set(EventStatus::Canceled);
        }
    }

    /// `true` if both handles refer to the same event.
    pub fn same_event(&self, other: &Event<P>) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    pub(crate) fn generation(&self) -> u32 {
        self.core.slot.get().generation
    }

    /// Move the event to a new slot. Calendar copies made before this call
    /// become stale.
    pub(crate) fn move_to(&self, time: SimTime, priority: Priority) {
        let generation = self.generation().wrapping_add(1);
        self.core.slot.set(Slot {
            time,
            priority,
            generation,
        });
    }

    pub(crate) fn mark_dispatched(&self) {
        self.core.status.set(EventStatus::Dispatched);
    }

    pub(crate) fn take_action(&self) -> Option<Action<P>> {
        self.core.action.borrow_mut().take()
    }
}

impl<P> fmt::Debug for Event<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id())
            .field("time", &self.time())
            .field("priority", &self.priority())
            .field("status", &self.status())
            .field("name", &self.core.name)
            .finish()
    }
}

impl<P> fmt::Display for Event<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} {}", self.key(), name),
            None => write!(f, "{}", self.key()),
        }
    }
}

// ── Calendar entry ────────────────────────────────────────────────────

/// What a calendar actually stores: an event plus a snapshot of the slot
/// it was inserted with.
///
/// Ordered by `(key, generation)`. The generation only separates a stale
/// copy from the live one when a reschedule lands on the identical key.
pub struct CalendarEntry<P> {
    key: EventKey,
    generation: u32,
    event: Event<P>,
}

impl<P> CalendarEntry<P> {
    /// Snapshot the event's current slot.
    pub fn new(event: Event<P>) -> Self {
        CalendarEntry {
            key: event.key(),
            generation: event.generation(),
            event,
        }
    }

    #[inline]
    pub fn key(&self) -> EventKey {
        self.key
    }

    #[inline]
    pub fn time(&self) -> SimTime {
        self.key.time
    }

    pub fn event(&self) -> &Event<P> {
        &self.event
    }

    pub fn into_event(self) -> Event<P> {
        self.event
    }

    /// `true` if a reschedule moved the event elsewhere after this copy
    /// was inserted.
    pub fn is_superseded(&self) -> bool {
        self.generation != self.event.generation()
    }

    /// `true` if dispatching this entry should run the event's action.
    pub fn is_live(&self) -> bool {
        self.event.is_pending() && !self.is_superseded()
    }

    /// Calendar-level cancel: flips the event's flag, leaves the structure alone.
    pub fn cancel(&self) {
        self.event.cancel();
    }
}

impl<P> PartialEq for CalendarEntry<P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<P> Eq for CalendarEntry<P> {}

impl<P> Ord for CalendarEntry<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

impl<P> PartialOrd for CalendarEntry<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> fmt::Debug for CalendarEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarEntry")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t: f64) -> SimTime {
        SimTime::new(t).unwrap()
    }

    fn event(id: u64, time: f64, priority: i32) -> Event {
        Event::create(
            EventId::new(id),
            at(time),
            SimTime::ZERO,
            EventSpec::noop().with_priority(Priority::new(priority).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_event_id_monotonic() {
        let mut gen = EventIdGen::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(gen.peek().raw(), 2);
        gen.reset();
        assert_eq!(gen.next_id().raw(), 0);
        assert_eq!(EventIdGen::starting_at(9).next_id().raw(), 9);
    }

    #[test]
    fn test_ordering_by_time_then_priority_then_id() {
        let early = event(5, 1.0, 90);
        let late = event(0, 2.0, 0);
        assert_eq!(early.compare_to(&late), Ordering::Less);

        let urgent = event(3, 2.0, 10);
        let relaxed = event(1, 2.0, 20);
        assert_eq!(urgent.compare_to(&relaxed), Ordering::Less);

        let first = event(1, 2.0, 10);
        let second = event(2, 2.0, 10);
        assert_eq!(first.compare_to(&second), Ordering::Less);
        assert_eq!(second.compare_to(&first), Ordering::Greater);
        assert_eq!(first.compare_to(&first.clone()), Ordering::Equal);
    }

    #[test]
    fn test_create_rejects_past() {
        let err = Event::<()>::create(EventId::new(0), at(1.0), at(2.0), EventSpec::noop())
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(matches!(err, KairosError::NonCausalEvent { .. }));
    }

    #[test]
    fn test_defaults() {
        let e = Event::<()>::create(EventId::new(0), at(1.0), SimTime::ZERO, EventSpec::noop())
            .unwrap();
        assert_eq!(e.priority(), Priority::DEFAULT);
        assert!(e.name().is_none());
        assert!(e.payload().is_none());
        assert!(e.is_pending());
    }

    #[test]
    fn test_payload_and_name_pass_through() {
        let e = Event::create(
            EventId::new(4),
            at(3.0),
            SimTime::ZERO,
            EventSpec::noop().with_payload("cargo").with_name("arrival"),
        )
        .unwrap();
        assert_eq!(e.payload(), Some(&"cargo"));
        assert_eq!(e.name(), Some("arrival"));
        assert_eq!(e.to_string(), "E#4@t=3/P50 arrival");
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let e = event(0, 1.0, 1);
        e.cancel();
        assert!(e.is_canceled());
        e.cancel();
        assert!(e.is_canceled());
    }

    #[test]
    fn test_cancel_after_dispatch_is_noop() {
        let e = event(0, 1.0, 1);
        e.mark_dispatched();
        e.cancel();
        assert!(e.is_dispatched());
    }

    #[test]
    fn test_cancel_visible_through_clones() {
        let e = event(0, 1.0, 1);
        let handle = e.clone();
        handle.cancel();
        assert!(e.is_canceled());
        assert!(e.same_event(&handle));
    }

    #[test]
    fn test_priority_bounds() {
        assert!(Priority::new(-1).is_err());
        assert!(Priority::new(101).is_err());
        assert_eq!(Priority::new(0).unwrap(), Priority::HIGHEST);
        assert_eq!(Priority::new(100).unwrap(), Priority::LOWEST);
        assert!(serde_json::from_str::<Priority>("500").is_err());
    }

    #[test]
    fn test_entry_superseded_after_move() {
        let e = event(0, 1.0, 1);
        let old = CalendarEntry::new(e.clone());
        e.move_to(at(5.0), e.priority());
        let new = CalendarEntry::new(e.clone());
        assert!(old.is_superseded());
        assert!(!old.is_live());
        assert!(new.is_live());
        assert!(old < new);
        assert_eq!(e.time(), at(5.0));
    }

    #[test]
    fn test_entry_same_key_distinct_generation() {
        let e = event(0, 1.0, 1);
        let old = CalendarEntry::new(e.clone());
        e.move_to(at(1.0), e.priority());
        let new = CalendarEntry::new(e);
        assert_eq!(old.key(), new.key());
        assert_ne!(old, new);
    }

    #[test]
    fn test_take_action_once() {
        let e = event(0, 1.0, 1);
        assert!(e.take_action().is_some());
        assert!(e.take_action().is_none());
    }
}
