//! Scheduling façade for model code.
//!
//! [`Scheduling`] is the one interface model components schedule through,
//! whether they hold the executive itself, a [`DispatchContext`] inside an
//! action, or a [`Notification`] inside an observer hook.
//! [`SchedulingElement`] stamps a component's name and default priority
//! onto what it schedules, and [`ModelElement`] lets a component take part
//! in the replication lifecycle.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::error::KairosResult;
use crate::event::{Event, EventSpec, Priority};
use crate::executive::{DispatchContext, ReplicationSummary};
use crate::observer::{ExecutiveObserver, Notification};
use crate::time::SimTime;

/// Scheduling operations, relative to the current simulated time.
pub trait Scheduling<P: 'static> {
    /// Current simulated time.
    fn now(&self) -> SimTime;

    /// Schedule `spec` to run `delay` time units from now.
    fn schedule(&mut self, delay: f64, spec: EventSpec<P>) -> KairosResult<Event<P>>;

    /// Cancel a pending event. Idempotent.
    fn cancel(&mut self, event: &Event<P>) -> KairosResult<()>;

    /// Move a pending event to `now + new_delay` with a new priority.
    fn reschedule_with_priority(
        &mut self,
        event: &Event<P>,
        new_delay: f64,
        priority: Priority,
    ) -> KairosResult<()>;

    /// Move a pending event to `now + new_delay`, keeping its priority.
    fn reschedule(&mut self, event: &Event<P>, new_delay: f64) -> KairosResult<()> {
        self.reschedule_with_priority(event, new_delay, event.priority())
    }

    /// Shorthand for scheduling a bare closure at the default priority.
    fn schedule_in<F>(&mut self, delay: f64, action: F) -> KairosResult<Event<P>>
    where
        F: FnOnce(&mut DispatchContext<'_, P>, &Event<P>) -> KairosResult<()> + 'static,
        Self: Sized,
    {
        self.schedule(delay, EventSpec::new(action))
    }
}

// ── SchedulingElement ─────────────────────────────────────────────────

/// Identity a model component schedules under.
///
/// Events scheduled through it carry its name and priority unless the
/// spec sets its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingElement {
    name: String,
    priority: Priority,
}

impl SchedulingElement {
    pub fn new(name: impl Into<String>) -> Self {
        SchedulingElement {
            name: name.into(),
            priority: Priority::DEFAULT,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn now<P, S>(&self, scheduler: &S) -> SimTime
    where
        P: 'static,
        S: Scheduling<P> + ?Sized,
    {
        scheduler.now()
    }

    pub fn schedule<P, S>(&self, scheduler: &mut S, delay: f64, spec: EventSpec<P>) -> KairosResult<Event<P>>
    where
        P: 'static,
        S: Scheduling<P> + ?Sized,
    {
        let event = scheduler.schedule(delay, spec.or_priority(self.priority).or_name(&self.name))?;
        debug!(element = %self.name, event = %event, "Element scheduled event");
        Ok(event)
    }

    pub fn schedule_in<P, S, F>(&self, scheduler: &mut S, delay: f64, action: F) -> KairosResult<Event<P>>
    where
        P: 'static,
        S: Scheduling<P> + ?Sized,
        F: FnOnce(&mut DispatchContext<'_, P>, &Event<P>) -> KairosResult<()> + 'static,
    {
        self.schedule(scheduler, delay, EventSpec::new(action))
    }

    pub fn cancel<P, S>(&self, scheduler: &mut S, event: &Event<P>) -> KairosResult<()>
    where
        P: 'static,
        S: Scheduling<P> + ?Sized,
    {
        scheduler.cancel(event)?;
        debug!(element = %self.name, event = %event, "Element canceled event");
        Ok(())
    }

    pub fn reschedule<P, S>(&self, scheduler: &mut S, event: &Event<P>, new_delay: f64) -> KairosResult<()>
    where
        P: 'static,
        S: Scheduling<P> + ?Sized,
    {
        scheduler.reschedule(event, new_delay)
    }
}

// ── ModelElement ──────────────────────────────────────────────────────

/// A component that takes part in the replication lifecycle.
///
/// Register with `Executive::register_element`. `on_replication_start` is
/// where an element seeds its first events.
pub trait ModelElement<P: 'static> {
    fn name(&self) -> &str;

    fn on_replication_start(&mut self, _ctx: &mut Notification<'_, P>) -> KairosResult<()> {
        Ok(())
    }

    /// Called after every dispatched event, not only the element's own.
    fn on_event_dispatched(&mut self, _event: &Event<P>) -> KairosResult<()> {
        Ok(())
    }

    fn on_replication_end(&mut self, _summary: &ReplicationSummary) -> KairosResult<()> {
        Ok(())
    }
}

/// Adapts a shared model element to the observer interface.
pub(crate) struct ElementHook<E> {
    element: Rc<RefCell<E>>,
}

impl<E> ElementHook<E> {
    pub(crate) fn new(element: Rc<RefCell<E>>) -> Self {
        ElementHook { element }
    }
}

impl<P: 'static, E: ModelElement<P>> ExecutiveObserver<P> for ElementHook<E> {
    fn on_initialized(&mut self, ctx: &mut Notification<'_, P>) -> KairosResult<()> {
        let mut element = self.element.borrow_mut();
        debug!(element = element.name(), "Element starting replication");
        element.on_replication_start(ctx)
    }

    fn after_event(&mut self, _ctx: &mut Notification<'_, P>, event: &Event<P>) -> KairosResult<()> {
        self.element.borrow_mut().on_event_dispatched(event)
    }

    fn on_replication_end(
        &mut self,
        _ctx: &mut Notification<'_, P>,
        summary: &ReplicationSummary,
    ) -> KairosResult<()> {
        self.element.borrow_mut().on_replication_end(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarKind;
    use crate::config::RunLimits;
    use crate::executive::Executive;

    #[test]
    fn test_element_stamps_name_and_priority() {
        let mut exec: Executive = Executive::with_calendar(CalendarKind::BinaryHeap);
        exec.initialize_replication().unwrap();

        let arrivals = SchedulingElement::new("arrivals").with_priority(Priority::new(10).unwrap());
        let e = arrivals.schedule(&mut exec, 3.0, EventSpec::noop()).unwrap();
        assert_eq!(e.name(), Some("arrivals"));
        assert_eq!(e.priority().value(), 10);

        let own = arrivals
            .schedule(
                &mut exec,
                3.0,
                EventSpec::noop().with_name("custom").with_priority(Priority::HIGHEST),
            )
            .unwrap();
        assert_eq!(own.name(), Some("custom"));
        assert_eq!(own.priority(), Priority::HIGHEST);
        assert_eq!(arrivals.now(&exec), SimTime::ZERO);
    }

    #[test]
    fn test_element_cancel_and_reschedule() {
        let mut exec: Executive = Executive::default();
        exec.initialize_replication().unwrap();
        let el = SchedulingElement::new("timer");

        let e = el.schedule_in(&mut exec, 5.0, |_, _| Ok(())).unwrap();
        el.reschedule(&mut exec, &e, 7.0).unwrap();
        assert_eq!(e.time().value(), 7.0);
        el.cancel(&mut exec, &e).unwrap();
        assert!(e.is_canceled());
        assert!(exec.pending_events().is_empty());
    }

    /// Source that generates `limit` arrivals one time unit apart.
    struct Source {
        me: SchedulingElement,
        limit: u32,
        seen: u32,
        finished: bool,
    }

    impl ModelElement<()> for Source {
        fn name(&self) -> &str {
            self.me.name()
        }

        fn on_replication_start(&mut self, ctx: &mut Notification<'_, ()>) -> KairosResult<()> {
            self.seen = 0;
            self.finished = false;
            let limit = self.limit;
            for i in 0..limit {
                self.me.schedule(ctx, f64::from(i + 1), EventSpec::noop())?;
            }
            Ok(())
        }

        fn on_event_dispatched(&mut self, event: &Event) -> KairosResult<()> {
            if event.name() == Some(self.me.name()) {
                self.seen += 1;
            }
            Ok(())
        }

        fn on_replication_end(&mut self, _summary: &ReplicationSummary) -> KairosResult<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn test_model_element_lifecycle() {
        let mut exec: Executive = Executive::with_calendar(CalendarKind::SortedList);
        let source = exec.register_element(Source {
            me: SchedulingElement::new("source"),
            limit: 4,
            seen: 0,
            finished: false,
        });

        for _ in 0..2 {
            exec.initialize_replication().unwrap();
            assert_eq!(exec.pending_count(), 4);
            exec.run_to_completion(RunLimits::none()).unwrap();
            assert_eq!(source.borrow().seen, 4);
            assert!(source.borrow().finished);
        }
        assert_eq!(exec.now().value(), 4.0);
    }
}
