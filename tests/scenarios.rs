//! End-to-end executive scenarios through the public API.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kairos::{
    CalendarKind, DispatchContext, Event, EventSpec, EventStatus, Executive, ExecutiveConfig,
    ExecutiveState, KairosError, KairosResult, Limit, ModelElement, Notification, Priority, ReplicationEnd,
    ReplicationSummary, RunLimits, Scheduling, SchedulingElement, SequenceScope, SimTime, Step,
    Termination, TraceRecorder,
};
use tracing_test::traced_test;

type Log = Rc<RefCell<Vec<String>>>;

fn labelled(log: &Log, label: &str) -> EventSpec<()> {
    let log = Rc::clone(log);
    let label = label.to_owned();
    EventSpec::new(move |ctx: &mut DispatchContext<'_, ()>, _: &Event| {
        log.borrow_mut().push(format!("{label}@{}", ctx.now().value()));
        Ok(())
    })
}

fn started(kind: CalendarKind) -> Executive {
    let mut exec = Executive::with_calendar(kind);
    exec.initialize_replication().unwrap();
    exec
}

#[traced_test]
#[test]
fn test_time_priority_sequence_order() {
    for kind in CalendarKind::ALL {
        let mut exec = started(kind);
        let log = Log::default();
        let p = |v| Priority::new(v).unwrap();

        exec.schedule_event(5.0, labelled(&log, "e1").with_priority(p(0))).unwrap();
        exec.schedule_event(5.0, labelled(&log, "e2").with_priority(p(1))).unwrap();
        exec.schedule_event(3.0, labelled(&log, "e3").with_priority(p(0))).unwrap();
        exec.schedule_event(5.0, labelled(&log, "e4").with_priority(p(0))).unwrap();

        exec.run_to_completion(RunLimits::none()).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["e3@3", "e1@5", "e4@5", "e2@5"],
            "{kind}"
        );
    }
}

#[traced_test]
#[test]
fn test_cancellation_scenario() {
    let mut exec = started(CalendarKind::SkewHeap);
    let log = Log::default();

    let a = exec.schedule_event(2.0, labelled(&log, "a")).unwrap();
    let b = exec.schedule_event(4.0, labelled(&log, "b")).unwrap();
    exec.cancel_event(&a).unwrap();

    assert_eq!(a.status(), EventStatus::Canceled);
    let pending: Vec<_> = exec.pending_events().iter().map(Event::id).collect();
    assert_eq!(pending, vec![b.id()]);

    exec.run_to_completion(RunLimits::none()).unwrap();
    assert_eq!(*log.borrow(), vec!["b@4"]);
    assert_eq!(exec.stats().canceled, 1);
}

#[test]
fn test_cancel_middle_of_simultaneous_events() {
    for kind in CalendarKind::ALL {
        let mut exec = started(kind);
        let log = Log::default();

        exec.schedule_event(10.0, labelled(&log, "first")).unwrap();
        let second = exec.schedule_event(10.0, labelled(&log, "second")).unwrap();
        exec.schedule_event(10.0, labelled(&log, "third")).unwrap();
        exec.cancel_event(&second).unwrap();

        let report = exec.run_to_completion(RunLimits::none()).unwrap();
        assert!(report.is_completed(), "{kind}");
        assert_eq!(*log.borrow(), vec!["first@10", "third@10"], "{kind}");
        assert_eq!(exec.now().value(), 10.0);
        assert!(second.is_canceled());
    }
}

#[test]
fn test_reschedule_scenario() {
    let mut exec = started(CalendarKind::BalancedTree);
    let log = Log::default();

    let timeout = exec.schedule_event(10.0, labelled(&log, "timeout")).unwrap();
    let log_in = Rc::clone(&log);
    let handle = timeout.clone();
    exec.schedule_event(
        3.0,
        EventSpec::new(move |ctx: &mut DispatchContext<'_, ()>, _: &Event| {
            log_in.borrow_mut().push(format!("activity@{}", ctx.now().value()));
            // Activity pushes the timeout out to 5 units from now.
            ctx.reschedule(&handle, 5.0)
        }),
    )
    .unwrap();

    exec.run_to_completion(RunLimits::none()).unwrap();
    assert_eq!(*log.borrow(), vec!["activity@3", "timeout@8"]);
    assert!(timeout.is_dispatched());
    assert_eq!(exec.stats().superseded, 1);
}

#[test]
fn test_reschedule_with_priority_changes_tie_break() {
    let mut exec = started(CalendarKind::SortedList);
    let log = Log::default();

    let late = exec.schedule_event(1.0, labelled(&log, "late")).unwrap();
    exec.schedule_event(2.0, labelled(&log, "early")).unwrap();
    exec.reschedule_with_priority(&late, 2.0, Priority::HIGHEST).unwrap();
    assert_eq!(late.priority(), Priority::HIGHEST);

    exec.run_to_completion(RunLimits::none()).unwrap();
    assert_eq!(*log.borrow(), vec!["late@2", "early@2"]);
}

#[test]
fn test_zero_delay_chain_at_same_instant() {
    let mut exec = started(CalendarKind::BinaryHeap);
    let log = Log::default();

    fn chain(log: Log, remaining: u32) -> EventSpec<()> {
        EventSpec::new(move |ctx: &mut DispatchContext<'_, ()>, _: &Event| {
            log.borrow_mut().push(format!("link{remaining}@{}", ctx.now().value()));
            if remaining > 0 {
                ctx.schedule(0.0, chain(log, remaining - 1))?;
            }
            Ok(())
        })
    }

    exec.schedule_event(1.0, chain(Rc::clone(&log), 3)).unwrap();
    exec.schedule_event(1.0, labelled(&log, "other")).unwrap();
    exec.run_to_completion(RunLimits::none()).unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["link3@1", "other@1", "link2@1", "link1@1", "link0@1"]
    );
    assert_eq!(exec.now().value(), 1.0);
}

#[test]
fn test_invalid_arguments() {
    let mut exec = started(CalendarKind::BinaryHeap);
    for delay in [-0.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = exec.schedule_event(delay, EventSpec::noop()).unwrap_err();
        assert!(err.is_invalid_argument(), "delay {delay}: {err}");
    }
    assert!(matches!(Priority::new(101), Err(KairosError::InvalidPriority(101))));
    assert!(Priority::new(-1).is_err());
    assert_eq!(exec.pending_count(), 0);
}

#[test]
fn test_step_through_with_execute_next() {
    let mut exec = started(CalendarKind::SkewHeap);
    exec.schedule_event(2.0, EventSpec::noop().with_name("second")).unwrap();
    exec.schedule_event(1.0, EventSpec::noop().with_name("first")).unwrap();

    let mut names = Vec::new();
    while let Step::Executed(event) = exec.execute_next().unwrap() {
        names.push(event.name().unwrap_or_default().to_owned());
    }
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(exec.state(), ExecutiveState::AfterReplication);
    assert!(exec.schedule_event(1.0, EventSpec::noop()).unwrap_err().is_illegal_state());
}

#[traced_test]
#[test]
fn test_wall_clock_limit_stops_endless_model() {
    let mut exec = started(CalendarKind::BinaryHeap);

    fn forever() -> EventSpec<()> {
        EventSpec::new(|ctx: &mut DispatchContext<'_, ()>, _: &Event| {
            ctx.schedule(1.0, forever())?;
            Ok(())
        })
    }
    exec.schedule_event(0.0, forever()).unwrap();

    let report = exec
        .run_to_completion(RunLimits::none().with_wall_clock(Duration::from_millis(20)))
        .unwrap();
    assert_eq!(
        report.termination,
        Termination::LimitExceeded(Limit::WallClock(Duration::from_millis(20)))
    );
    assert!(report.events_executed > 0);
    assert_eq!(exec.state(), ExecutiveState::Paused);

    let summary = exec.end_replication().unwrap();
    assert_eq!(summary.cause, ReplicationEnd::CutOff);
    assert_eq!(exec.pending_count(), 0);
}

#[test]
fn test_limits_from_config() {
    let config = ExecutiveConfig::from_json(
        r#"{ "calendar": "sorted-list", "limits": { "max_time": 4.5 } }"#,
    )
    .unwrap();
    let mut exec: Executive = Executive::new(config);
    exec.initialize_replication().unwrap();
    for t in 1..=9 {
        exec.schedule_event(f64::from(t), EventSpec::noop()).unwrap();
    }

    let report = exec.run().unwrap();
    assert_eq!(report.limit(), Some(Limit::Time(SimTime::new(4.5).unwrap())));
    assert_eq!(report.events_executed, 4);
    assert_eq!(exec.pending_events().len(), 5);

    // Widen the horizon and resume the paused replication.
    let report = exec
        .run_to_completion(RunLimits::none().with_max_time(SimTime::new(7.0).unwrap()))
        .unwrap();
    assert_eq!(report.events_executed, 3);
    assert_eq!(exec.now().value(), 7.0);
}

/// Counts arrivals per replication and seeds them itself.
struct Arrivals {
    me: SchedulingElement,
    per_replication: u32,
    totals: Vec<u64>,
}

impl ModelElement<()> for Arrivals {
    fn name(&self) -> &str {
        self.me.name()
    }

    fn on_replication_start(&mut self, ctx: &mut Notification<'_, ()>) -> KairosResult<()> {
        for i in 0..self.per_replication {
            self.me.schedule(ctx, f64::from(i) * 0.5, EventSpec::noop())?;
        }
        Ok(())
    }

    fn on_replication_end(&mut self, summary: &ReplicationSummary) -> KairosResult<()> {
        self.totals.push(summary.stats.executed);
        Ok(())
    }
}

#[traced_test]
#[test]
fn test_replications_are_isolated() {
    let mut exec: Executive = Executive::builder()
        .calendar(CalendarKind::BalancedTree)
        .sequence(SequenceScope::PerReplication)
        .build()
        .unwrap();
    let recorder = exec.add_observer(TraceRecorder::new());
    let arrivals = exec.register_element(Arrivals {
        me: SchedulingElement::new("arrival"),
        per_replication: 6,
        totals: Vec::new(),
    });

    exec.initialize_replication().unwrap();
    let leftover = exec.schedule_event(100.0, EventSpec::noop()).unwrap();
    exec.run_to_completion(RunLimits::none().with_max_events(6)).unwrap();
    exec.end_replication().unwrap();

    exec.initialize_replication().unwrap();
    assert_eq!(exec.now(), SimTime::ZERO);
    assert_eq!(exec.pending_count(), 6);
    assert!(matches!(
        exec.cancel_event(&leftover),
        Err(KairosError::StaleEvent { .. })
    ));
    exec.run_to_completion(RunLimits::none()).unwrap();

    assert_eq!(arrivals.borrow().totals, vec![6, 6]);
    let recorder = recorder.borrow();
    assert_eq!(
        recorder.replication_hash(1),
        recorder.replication_hash(2),
        "identical replications should dispatch identically"
    );
    assert!(recorder
        .entries()
        .iter()
        .all(|entry| entry.name.as_deref() == Some("arrival")));
}
