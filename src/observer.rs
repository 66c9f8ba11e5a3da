//! Executive observers.
//!
//! Observers are told when a replication starts, around every dispatch,
//! and when a replication ends. They see the executive through a
//! [`Notification`]: a read-only view of the calendar plus a scheduling
//! handle whose requests are queued and applied after the current
//! notification round, so the calendar never changes under the loop.

use std::cell::RefCell;
use std::rc::Rc;

use crate::calendar::EventCalendar;
use crate::element::Scheduling;
use crate::error::{KairosError, KairosResult};
use crate::event::{CalendarEntry, Event, EventIdGen, EventSpec, Priority};
use crate::executive::{ensure_cancelable, mint, reschedule_target, ExecutiveState, ReplicationSummary};
use crate::time::SimTime;

/// An observer shared between the executive and the code that created it.
pub type SharedObserver<P> = Rc<RefCell<dyn ExecutiveObserver<P>>>;

/// Lifecycle hooks. Every method defaults to doing nothing; an error
/// aborts the executive call that triggered the notification.
pub trait ExecutiveObserver<P> {
    /// A replication has been initialized; the clock is at zero.
    fn on_initialized(&mut self, _ctx: &mut Notification<'_, P>) -> KairosResult<()> {
        Ok(())
    }

    /// `event` is about to run. Its action has not been taken yet.
    fn before_event(&mut self, _ctx: &mut Notification<'_, P>, _event: &Event<P>) -> KairosResult<()> {
        Ok(())
    }

    /// `event` has run.
    fn after_event(&mut self, _ctx: &mut Notification<'_, P>, _event: &Event<P>) -> KairosResult<()> {
        Ok(())
    }

    /// The replication is over and its calendar has been cleared.
    /// Scheduling requests are rejected from here.
    fn on_replication_end(
        &mut self,
        _ctx: &mut Notification<'_, P>,
        _summary: &ReplicationSummary,
    ) -> KairosResult<()> {
        Ok(())
    }
}

/// A queued observer request.
pub(crate) enum Command<P> {
    Insert(CalendarEntry<P>),
    Cancel(Event<P>),
    Reschedule {
        event: Event<P>,
        time: SimTime,
        priority: Priority,
    },
}

/// What an observer sees during a notification.
pub struct Notification<'a, P> {
    pub(crate) now: SimTime,
    pub(crate) replication: u64,
    pub(crate) state: ExecutiveState,
    pub(crate) accepting: bool,
    pub(crate) calendar: &'a dyn EventCalendar<P>,
    pub(crate) ids: &'a mut EventIdGen,
    pub(crate) commands: &'a mut Vec<Command<P>>,
    pub(crate) stop_requested: &'a mut bool,
}

impl<P: 'static> Notification<'_, P> {
    pub fn replication(&self) -> u64 {
        self.replication
    }

    pub fn state(&self) -> ExecutiveState {
        self.state
    }

    /// Calendar entries not yet reached, including canceled ones.
    pub fn pending_count(&self) -> usize {
        self.calendar.len()
    }

    /// The entry at the front of the calendar, live or not.
    pub fn peek_next(&self) -> Option<&Event<P>> {
        self.calendar.peek_next().map(CalendarEntry::event)
    }

    /// Halt `run_to_completion` before the next dispatch.
    pub fn request_stop(&mut self) {
        *self.stop_requested = true;
    }

    fn ensure_accepting(&self) -> KairosResult<()> {
        if self.accepting {
            Ok(())
        } else {
            Err(KairosError::IllegalState(
                "replication has ended; scheduling is closed".into(),
            ))
        }
    }
}

impl<P: 'static> Scheduling<P> for Notification<'_, P> {
    fn now(&self) -> SimTime {
        self.now
    }

    /// The event gets its ID now and is inserted after the notification
    /// round, so it sorts after anything an action already scheduled.
    fn schedule(&mut self, delay: f64, spec: EventSpec<P>) -> KairosResult<Event<P>> {
        self.ensure_accepting()?;
        let event = mint(self.ids, self.replication, self.now, delay, spec)?;
        self.commands.push(Command::Insert(CalendarEntry::new(event.clone())));
        Ok(event)
    }

    fn cancel(&mut self, event: &Event<P>) -> KairosResult<()> {
        self.ensure_accepting()?;
        ensure_cancelable(event, self.replication)?;
        self.commands.push(Command::Cancel(event.clone()));
        Ok(())
    }

    fn reschedule_with_priority(
        &mut self,
        event: &Event<P>,
        new_delay: f64,
        priority: Priority,
    ) -> KairosResult<()> {
        self.ensure_accepting()?;
        let time = reschedule_target(event, self.replication, self.now, new_delay)?;
        self.commands.push(Command::Reschedule {
            event: event.clone(),
            time,
            priority,
        });
        Ok(())
    }
}
