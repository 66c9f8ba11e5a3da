//! Kairos demo CLI
//!
//! Runs a small bank model (one teller, impatient customers, a periodic
//! audit that is pulled forward when the line gets long) for a number of
//! replications, and optionally checks that every calendar strategy
//! produces the same dispatch trace.
//!
//! # Example
//!
//! ```bash
//! # Three replications on the skew heap
//! kairos --calendar skew-heap -r 3
//!
//! # Run every strategy and compare trace hashes
//! kairos --compare --customers 2000
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use kairos::{
    CalendarKind, DispatchContext, Event, EventSpec, Executive, ExecutiveBuilder, ExecutiveConfig,
    KairosError, KairosResult, ModelElement, Notification, Priority, ReplicationSummary,
    RunReport, Scheduling, SchedulingElement, SimTime, TraceRecorder,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Kairos discrete-event kernel demo
///
/// Deterministic: the same arguments always produce the same trace.
#[derive(Parser, Debug)]
#[command(name = "kairos")]
#[command(version, about, long_about = None)]
struct Args {
    /// Calendar strategy: sorted-list, binary-heap, skew-heap, balanced-tree
    #[arg(short = 'c', long)]
    calendar: Option<CalendarKind>,

    /// Number of replications
    #[arg(short = 'r', long, default_value = "3")]
    replications: u64,

    /// Customers arriving per replication
    #[arg(long, default_value = "500")]
    customers: u64,

    /// Simulated-time horizon per replication
    #[arg(long)]
    max_time: Option<f64>,

    /// Maximum events dispatched per replication
    #[arg(long)]
    max_events: Option<u64>,

    /// JSON executive configuration; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run every calendar strategy and compare trace hashes
    #[arg(long)]
    compare: bool,

    /// Write the dispatch trace as JSON lines
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,kairos=info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> KairosResult<()> {
    let config = load_config(args)?;
    info!(
        calendar = %config.calendar,
        replications = args.replications,
        customers = args.customers,
        compare = args.compare,
        "Starting simulation"
    );

    if args.compare {
        return compare_strategies(&config, args);
    }

    let outcome = simulate(config, args)?;
    print_days(&outcome);
    println!("  Trace hash: {:016x}", outcome.trace.trace_hash());

    if let Some(path) = &args.trace {
        let mut out = BufWriter::new(File::create(path)?);
        outcome.trace.export(&mut out)?;
        out.flush()?;
        info!(path = %path.display(), entries = outcome.trace.len(), "Trace written");
    }
    Ok(())
}

fn load_config(args: &Args) -> KairosResult<ExecutiveConfig> {
    let mut config = match &args.config {
        Some(path) => ExecutiveConfig::from_file(path)?,
        None => ExecutiveConfig::default(),
    };
    if let Some(kind) = args.calendar {
        config.calendar = kind;
    }
    if let Some(horizon) = args.max_time {
        config.limits.max_time = Some(SimTime::new(horizon)?);
    }
    if let Some(max) = args.max_events {
        config.limits.max_events = Some(max);
    }
    config.validate()?;
    Ok(config)
}

// ── Driver ────────────────────────────────────────────────────────────

struct Outcome {
    calendar: CalendarKind,
    trace: TraceRecorder,
    days: Vec<BankDay>,
    reports: Vec<RunReport>,
}

fn simulate(config: ExecutiveConfig, args: &Args) -> KairosResult<Outcome> {
    let calendar = config.calendar;
    let recorder = Rc::new(RefCell::new(TraceRecorder::new()));
    let mut exec: Executive<u64> = ExecutiveBuilder::from_config(config)
        .observer(Rc::clone(&recorder))
        .build()?;
    let bank = exec.register_element(BankModel::new(args.customers));

    let mut reports = Vec::new();
    for _ in 0..args.replications {
        exec.initialize_replication()?;
        let report = exec.run()?;
        if !report.is_completed() {
            warn!(
                replication = report.replication,
                termination = ?report.termination,
                "Replication cut off"
            );
            exec.end_replication()?;
        }
        reports.push(report);
    }
    exec.shutdown();

    let trace = recorder.borrow().clone();
    let days = std::mem::take(&mut bank.borrow_mut().days);
    Ok(Outcome {
        calendar,
        trace,
        days,
        reports,
    })
}

fn compare_strategies(base: &ExecutiveConfig, args: &Args) -> KairosResult<()> {
    println!("═══════════════════════════════════════════════════════");
    println!("  Kairos: calendar strategy comparison");
    println!("═══════════════════════════════════════════════════════");

    let mut reference: Option<(CalendarKind, u64)> = None;
    for kind in CalendarKind::ALL {
        let config = ExecutiveConfig {
            calendar: kind,
            ..base.clone()
        };
        let outcome = simulate(config, args)?;
        let hash = outcome.trace.trace_hash();
        let wall: f64 = outcome.reports.iter().map(|r| r.wall_time.as_secs_f64()).sum();
        println!(
            "  {:<14} {:>8} events  hash {:016x}  {:>8.3} ms",
            outcome.calendar,
            outcome.trace.len(),
            hash,
            wall * 1000.0
        );

        match reference {
            None => reference = Some((kind, hash)),
            Some((first, expected)) if expected != hash => {
                return Err(KairosError::IllegalState(format!(
                    "{kind} trace {hash:016x} differs from {first} trace {expected:016x}"
                )));
            }
            Some(_) => {}
        }
    }
    println!("  ✓ All strategies dispatched identically.");
    Ok(())
}

fn print_days(outcome: &Outcome) {
    println!("  Calendar: {}", outcome.calendar);
    for day in &outcome.days {
        println!(
            "  R{:<3} closed at {:<12} served {:>5}  reneged {:>4}  longest line {:>3}  audits {:>3}",
            day.replication,
            day.closed_at.to_string(),
            day.served,
            day.reneged,
            day.max_queue,
            day.audits
        );
    }
}

// ── Bank model ────────────────────────────────────────────────────────

const INTERARRIVAL: [f64; 6] = [1.5, 0.5, 2.0, 1.0, 3.0, 0.25];
const SERVICE: [f64; 5] = [1.2, 2.5, 0.8, 1.9, 1.4];
const PATIENCE: f64 = 4.0;
const AUDIT_INTERVAL: f64 = 25.0;
const CROWDED: usize = 3;

type SharedBank = Rc<RefCell<Bank>>;

#[derive(Debug, Clone)]
struct BankDay {
    replication: u64,
    closed_at: SimTime,
    served: u64,
    reneged: u64,
    max_queue: usize,
    audits: u64,
}

/// Mutable state of one replication.
#[derive(Debug)]
struct Bank {
    customers: u64,
    issued: u64,
    served: u64,
    reneged: u64,
    audits: u64,
    busy: bool,
    max_queue: usize,
    queue: VecDeque<(u64, Event<u64>)>,
    audit: Option<Event<u64>>,
    auditor: SchedulingElement,
}

impl Bank {
    fn new(customers: u64) -> Self {
        Bank {
            customers,
            issued: 0,
            served: 0,
            reneged: 0,
            audits: 0,
            busy: false,
            max_queue: 0,
            queue: VecDeque::new(),
            audit: None,
            auditor: SchedulingElement::new("audit").with_priority(Priority::HIGHEST),
        }
    }
}

/// Schedule the next arrival, unless every customer has been issued.
fn schedule_arrival<S: Scheduling<u64>>(sched: &mut S, bank: &SharedBank) -> KairosResult<()> {
    let customer = {
        let b = &mut *bank.borrow_mut();
        if b.issued >= b.customers {
            return Ok(());
        }
        b.issued += 1;
        b.issued - 1
    };
    let delay = INTERARRIVAL[customer as usize % INTERARRIVAL.len()];
    let bank = Rc::clone(bank);
    sched.schedule(
        delay,
        EventSpec::new(move |ctx: &mut DispatchContext<'_, u64>, event: &Event<u64>| {
            on_arrival(ctx, &bank, event)
        })
        .with_payload(customer)
        .with_name("arrival"),
    )?;
    Ok(())
}

fn schedule_audit<S: Scheduling<u64>>(sched: &mut S, bank: &SharedBank, delay: f64) -> KairosResult<()> {
    let auditor = bank.borrow().auditor.clone();
    let shared = Rc::clone(bank);
    let event = auditor.schedule_in(sched, delay, move |ctx: &mut DispatchContext<'_, u64>, _: &Event<u64>| {
        on_audit(ctx, &shared)
    })?;
    bank.borrow_mut().audit = Some(event);
    Ok(())
}

fn on_arrival(ctx: &mut DispatchContext<'_, u64>, bank: &SharedBank, event: &Event<u64>) -> KairosResult<()> {
    let customer = event.payload().copied().unwrap_or_default();
    let idle = !bank.borrow().busy;
    if idle {
        start_service(ctx, bank, customer)?;
    } else {
        let shared = Rc::clone(bank);
        let timer = ctx.schedule(
            PATIENCE,
            EventSpec::new(move |_: &mut DispatchContext<'_, u64>, _: &Event<u64>| {
                on_renege(&shared, customer);
                Ok(())
            })
            .with_payload(customer)
            .with_name("renege")
            .with_priority(Priority::new(60)?),
        )?;
        let crowded = {
            let b = &mut *bank.borrow_mut();
            b.queue.push_back((customer, timer));
            b.max_queue = b.max_queue.max(b.queue.len());
            b.queue.len() >= CROWDED
        };
        if crowded {
            pull_audit_forward(ctx, bank)?;
        }
    }
    schedule_arrival(ctx, bank)
}

fn start_service(ctx: &mut DispatchContext<'_, u64>, bank: &SharedBank, customer: u64) -> KairosResult<()> {
    bank.borrow_mut().busy = true;
    let shared = Rc::clone(bank);
    ctx.schedule(
        SERVICE[customer as usize % SERVICE.len()],
        EventSpec::new(move |ctx: &mut DispatchContext<'_, u64>, _: &Event<u64>| {
            on_departure(ctx, &shared)
        })
        .with_payload(customer)
        .with_name("departure"),
    )?;
    Ok(())
}

fn on_departure(ctx: &mut DispatchContext<'_, u64>, bank: &SharedBank) -> KairosResult<()> {
    let next = {
        let b = &mut *bank.borrow_mut();
        b.served += 1;
        b.busy = false;
        b.queue.pop_front()
    };
    if let Some((customer, timer)) = next {
        ctx.cancel(&timer)?;
        start_service(ctx, bank, customer)?;
    }
    Ok(())
}

fn on_renege(bank: &SharedBank, customer: u64) {
    let b = &mut *bank.borrow_mut();
    b.queue.retain(|(waiting, _)| *waiting != customer);
    b.reneged += 1;
}

fn on_audit(ctx: &mut DispatchContext<'_, u64>, bank: &SharedBank) -> KairosResult<()> {
    let more = {
        let b = &mut *bank.borrow_mut();
        b.audits += 1;
        debug!(now = %ctx.now(), waiting = b.queue.len(), "Audit");
        b.issued < b.customers
    };
    if more {
        schedule_audit(ctx, bank, AUDIT_INTERVAL)?;
    }
    Ok(())
}

/// A long line brings the next audit forward to one time unit from now.
fn pull_audit_forward(ctx: &mut DispatchContext<'_, u64>, bank: &SharedBank) -> KairosResult<()> {
    let Some(audit) = bank.borrow().audit.clone() else {
        return Ok(());
    };
    let soon = ctx.now().checked_add(1.0)?;
    if audit.is_pending() && audit.time() > soon {
        ctx.reschedule(&audit, 1.0)?;
    }
    Ok(())
}

/// Seeds each replication and records how it went.
struct BankModel {
    me: SchedulingElement,
    customers: u64,
    state: SharedBank,
    days: Vec<BankDay>,
}

impl BankModel {
    fn new(customers: u64) -> Self {
        BankModel {
            me: SchedulingElement::new("bank"),
            customers,
            state: Rc::new(RefCell::new(Bank::new(customers))),
            days: Vec::new(),
        }
    }
}

impl ModelElement<u64> for BankModel {
    fn name(&self) -> &str {
        self.me.name()
    }

    fn on_replication_start(&mut self, ctx: &mut Notification<'_, u64>) -> KairosResult<()> {
        *self.state.borrow_mut() = Bank::new(self.customers);
        schedule_arrival(ctx, &self.state)?;
        schedule_audit(ctx, &self.state, AUDIT_INTERVAL)
    }

    fn on_replication_end(&mut self, summary: &ReplicationSummary) -> KairosResult<()> {
        let b = self.state.borrow();
        info!(
            replication = summary.replication,
            end_time = summary.end_time.value(),
            served = b.served,
            reneged = b.reneged,
            max_queue = b.max_queue,
            "Bank closed"
        );
        self.days.push(BankDay {
            replication: summary.replication,
            closed_at: summary.end_time,
            served: b.served,
            reneged: b.reneged,
            max_queue: b.max_queue,
            audits: b.audits,
        });
        Ok(())
    }
}
