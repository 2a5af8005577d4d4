//! Scenario driver
//!
//! Spawns the workers of a scenario, waits for every one of them, and
//! collects what happened. Completion is observed by joining the threads,
//! never by sleeping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use gate_sync::AcquireOutcome;
use tracing::{debug, info, warn};

use crate::error::{Result, ScenarioError};
use crate::progress::ProgressTracker;
use crate::scenario::{AcquireMode, Scenario, WorkOutcome};
use crate::sink::Sink;

/// Most workers a single scenario may spawn
pub const MAX_WORKERS: usize = 1024;

/// Knobs applied on top of the catalog values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    /// Multiplies every hold duration; 0 disables the simulated work delay
    pub hold_scale: f64,
    /// Replaces every scenario's worker count
    pub workers_override: Option<usize>,
    /// Replaces the timeout of timed scenarios
    pub timeout_override: Option<Duration>,
    /// Draw a progress bar per scenario
    pub progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            hold_scale: 1.0,
            workers_override: None,
            timeout_override: None,
            progress: false,
        }
    }
}

impl RunOptions {
    fn hold_for(&self, scenario: &Scenario) -> Result<Duration> {
        Duration::try_from_secs_f64(scenario.hold().as_secs_f64() * self.hold_scale).map_err(|e| {
            ScenarioError::InvalidConfig(format!("hold scale {}: {e}", self.hold_scale))
        })
    }

    fn mode_for(&self, scenario: &Scenario) -> AcquireMode {
        match (scenario.mode(), self.timeout_override) {
            (AcquireMode::Timed(_), Some(timeout)) => AcquireMode::Timed(timeout),
            (mode, _) => mode,
        }
    }
}

/// Everything observed while running one scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub capacity: usize,
    pub workers: usize,
    /// One entry per worker, in worker order
    pub outcomes: Vec<WorkOutcome>,
    /// Most workers seen inside the critical section at once
    pub peak_concurrency: usize,
    pub elapsed: Duration,
    /// State the unit of work left behind
    pub summary: Option<String>,
}

impl ScenarioReport {
    /// Workers that got a slot
    #[must_use]
    pub fn granted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.was_granted()).count()
    }

    /// Workers that gave up waiting
    #[must_use]
    pub fn timed_out(&self) -> usize {
        self.workers - self.granted()
    }

    /// Number of workers whose outcome matches `pred`
    pub fn count(&self, pred: impl Fn(&WorkOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(*o)).count()
    }
}

/// Tracks how many workers are inside the critical section
#[derive(Debug, Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    fn enter(&self) -> Occupant<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Occupant { occupancy: self }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct Occupant<'a> {
    occupancy: &'a Occupancy,
}

impl Drop for Occupant<'_> {
    fn drop(&mut self) {
        self.occupancy.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-run values shared by every worker of a scenario
struct WorkerContext<'a> {
    scenario: &'a Scenario,
    hold: Duration,
    mode: AcquireMode,
    occupancy: &'a Occupancy,
    sink: &'a dyn Sink,
}

fn run_worker(ctx: &WorkerContext<'_>, index: usize) -> Result<WorkOutcome> {
    let scenario = ctx.scenario;
    let label = scenario.worker_label(index);

    let permit = match ctx.mode {
        AcquireMode::Blocking => scenario.gate().acquire(),
        AcquireMode::Timed(timeout) => match scenario.gate().try_acquire_for(timeout) {
            AcquireOutcome::Granted(permit) => permit,
            AcquireOutcome::TimedOut => {
                ctx.sink
                    .line(&format!("{label} could not get access (timeout after {timeout:?})"))?;
                return Ok(WorkOutcome::TimedOut);
            }
        },
    };

    // The permit is dropped on every path out of here, errors included
    let occupant = ctx.occupancy.enter();
    ctx.sink.line(&format!("{label} entered {}", scenario.name()))?;
    if !ctx.hold.is_zero() {
        thread::sleep(ctx.hold);
    }
    let outcome = scenario.unit_of_work().perform(index, &label, ctx.sink)?;
    ctx.sink.line(&format!("{label} {outcome}, releasing"))?;

    drop(occupant);
    permit.release();
    Ok(outcome)
}

/// Run one scenario to completion
///
/// # Errors
///
/// Returns an error if a worker thread cannot be spawned, a worker panics, or
/// a unit of work fails. Every started worker is joined before returning.
pub fn run_scenario(scenario: &Scenario, options: &RunOptions, sink: &dyn Sink) -> Result<ScenarioReport> {
    let workers = options.workers_override.unwrap_or_else(|| scenario.workers());
    if workers == 0 {
        return Err(ScenarioError::InvalidConfig(
            "worker count must be at least 1".to_string(),
        ));
    }
    if workers > MAX_WORKERS {
        return Err(ScenarioError::InvalidConfig(format!(
            "worker count {workers} exceeds the limit of {MAX_WORKERS}"
        )));
    }

    let occupancy = Occupancy::default();
    let ctx = WorkerContext {
        scenario,
        hold: options.hold_for(scenario)?,
        mode: options.mode_for(scenario),
        occupancy: &occupancy,
        sink,
    };
    let progress = if options.progress {
        ProgressTracker::new(scenario.name(), workers)
    } else {
        ProgressTracker::hidden()
    };

    debug!(
        scenario = scenario.name(),
        capacity = scenario.gate().capacity(),
        workers,
        "starting scenario"
    );
    let start = Instant::now();

    let results: Vec<Result<WorkOutcome>> = thread::scope(|s| {
        let mut handles = Vec::new();
        let mut results = Vec::new();

        for index in 0..workers {
            let ctx = &ctx;
            let progress = &progress;
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", scenario.name(), index + 1))
                .spawn_scoped(s, move || {
                    let outcome = run_worker(ctx, index);
                    progress.worker_finished();
                    outcome
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    results.push(Err(ScenarioError::Io(e)));
                    break;
                }
            }
        }

        // Join workers in order; a spawn failure is reported after them
        let mut joined: Vec<Result<WorkOutcome>> = handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(ScenarioError::WorkerPanicked {
                        scenario: scenario.name().to_string(),
                        worker: worker + 1,
                    })
                })
            })
            .collect();
        joined.append(&mut results);
        joined
    });

    let elapsed = start.elapsed();
    progress.finish();

    let outcomes = results.into_iter().collect::<Result<Vec<_>>>()?;
    let report = ScenarioReport {
        name: scenario.name(),
        capacity: scenario.gate().capacity(),
        workers,
        outcomes,
        peak_concurrency: occupancy.peak(),
        elapsed,
        summary: scenario.unit_of_work().summary(),
    };

    if report.timed_out() > 0 {
        warn!(
            scenario = report.name,
            timed_out = report.timed_out(),
            "some workers gave up waiting"
        );
    }
    info!(
        "{}: {}/{} workers granted, peak {} of {} slots, {:?}",
        report.name,
        report.granted(),
        report.workers,
        report.peak_concurrency,
        report.capacity,
        report.elapsed
    );
    if let Some(summary) = &report.summary {
        info!("{}: {summary}", report.name);
    }

    Ok(report)
}

/// Run scenarios one after another
///
/// # Errors
///
/// Stops at the first scenario that fails
pub fn run_all(scenarios: &[Scenario], options: &RunOptions, sink: &dyn Sink) -> Result<Vec<ScenarioReport>> {
    scenarios
        .iter()
        .map(|scenario| {
            sink.line(&format!("---------- {} ----------", scenario.name()))?;
            run_scenario(scenario, options, sink)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{catalog, select, Work, INITIAL_STOCK};
    use crate::sink::MemorySink;
    use gate_sync::{GuardedQueue, GuardedValue};
    use rstest::rstest;
    use std::sync::Arc;

    fn instant() -> RunOptions {
        RunOptions {
            hold_scale: 0.0,
            ..RunOptions::default()
        }
    }

    fn named(name: &str) -> Scenario {
        let catalog = catalog(Arc::new(MemorySink::new())).unwrap();
        select(catalog, &[name.to_string()]).unwrap().remove(0)
    }

    #[test]
    fn test_mutex_serializes_workers() {
        let hold = Duration::from_millis(20);
        let scenario = Scenario::new("mutex", 1, 5, hold).unwrap();
        let sink = MemorySink::new();

        let report = run_scenario(&scenario, &RunOptions::default(), &sink).unwrap();

        assert_eq!(report.granted(), 5);
        assert_eq!(report.peak_concurrency, 1);
        // Five non-overlapping critical sections take at least five holds
        assert!(report.elapsed >= hold * 5);
        assert_eq!(scenario.gate().available(), 1);
    }

    #[rstest]
    #[case(1, 8)]
    #[case(2, 10)]
    #[case(3, 20)]
    fn test_peak_never_exceeds_capacity(#[case] capacity: usize, #[case] workers: usize) {
        let scenario = Scenario::new("pool", capacity, workers, Duration::from_millis(2)).unwrap();
        let report = run_scenario(&scenario, &RunOptions::default(), &MemorySink::new()).unwrap();

        assert!(report.peak_concurrency <= capacity);
        assert!(report.peak_concurrency >= 1);
        assert_eq!(report.outcomes.len(), workers);
        assert_eq!(scenario.gate().available(), capacity);
    }

    #[test]
    fn test_stock_exactly_five_buyers_succeed() {
        let scenario = named("stock");
        let report = run_scenario(&scenario, &instant(), &MemorySink::new()).unwrap();

        let bought = report.count(|o| matches!(o, WorkOutcome::Purchased { .. }));
        let refused = report.count(|o| matches!(o, WorkOutcome::OutOfStock));
        assert_eq!(bought, INITIAL_STOCK as usize);
        assert_eq!(refused, 2);
        assert_eq!(report.summary.as_deref(), Some("stock left: 0"));
    }

    #[test]
    fn test_stock_with_concurrent_checkout_lanes() {
        // Several lanes at once still cannot oversell the guarded counter
        let scenario = Scenario::new("stock", 4, 40, Duration::ZERO)
            .unwrap()
            .work(Work::Purchase(Arc::new(GuardedValue::new(12))));
        let report = run_scenario(&scenario, &instant(), &MemorySink::new()).unwrap();

        assert_eq!(report.count(|o| matches!(o, WorkOutcome::Purchased { .. })), 12);
        assert_eq!(report.count(|o| *o == WorkOutcome::OutOfStock), 28);
    }

    #[test]
    fn test_message_list_collects_every_worker() {
        let list = Arc::new(GuardedValue::new(Vec::new()));
        let scenario = Scenario::new("message-list", 1, 6, Duration::ZERO)
            .unwrap()
            .actor("thread")
            .work(Work::AppendMessage(list.clone()));

        run_scenario(&scenario, &instant(), &MemorySink::new()).unwrap();

        let mut messages = list.with_exclusive_access(|m| m.clone());
        messages.sort();
        let expected: Vec<_> = (1..=6).map(|i| format!("message from thread {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_producer_consumer_conserves_items() {
        let queue = Arc::new(GuardedQueue::new());
        let scenario = Scenario::new("producer-consumer", 1, 10, Duration::ZERO)
            .unwrap()
            .work(Work::ProducerConsumer {
                queue: queue.clone(),
                producers: 5,
            });

        let report = run_scenario(&scenario, &instant(), &MemorySink::new()).unwrap();

        let produced = report.count(|o| matches!(o, WorkOutcome::Produced(_)));
        let consumed = report.count(|o| matches!(o, WorkOutcome::Consumed(_)));
        let empty = report.count(|o| *o == WorkOutcome::QueueEmpty);
        assert_eq!(produced, 5);
        assert_eq!(consumed + empty, 5);
        // The summary drained whatever was left
        assert!(queue.is_empty());
        assert!(report.summary.is_some());
    }

    #[test]
    fn test_timed_scenario_reports_timeouts() {
        // The first worker holds the gate well beyond the zero timeout
        let gate_holder = Scenario::new("timed", 1, 3, Duration::ZERO)
            .unwrap()
            .timed(Duration::ZERO);
        let held = gate_holder.gate().acquire();

        let sink = MemorySink::new();
        let report = run_scenario(&gate_holder, &instant(), &sink).unwrap();
        drop(held);

        assert_eq!(report.timed_out(), 3);
        assert_eq!(report.granted(), 0);
        assert_eq!(report.peak_concurrency, 0);
        assert!(sink.lines().iter().all(|l| l.contains("timeout")));
        assert_eq!(gate_holder.gate().available(), 1);
    }

    #[test]
    fn test_timeout_override_applies_to_timed_scenarios() {
        let options = RunOptions {
            timeout_override: Some(Duration::from_millis(5)),
            ..instant()
        };
        let timed = named("database");
        let blocking = named("printers");

        assert_eq!(options.mode_for(&timed), AcquireMode::Timed(Duration::from_millis(5)));
        assert_eq!(options.mode_for(&blocking), AcquireMode::Blocking);
    }

    #[test]
    fn test_workers_override() {
        let options = RunOptions {
            workers_override: Some(2),
            ..instant()
        };
        let report = run_scenario(&named("uploads"), &options, &MemorySink::new()).unwrap();
        assert_eq!(report.workers, 2);
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn test_zero_workers_override_rejected() {
        let options = RunOptions {
            workers_override: Some(0),
            ..instant()
        };
        let err = run_scenario(&named("uploads"), &options, &MemorySink::new()).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidConfig(_)));
    }

    #[test]
    fn test_oversized_workers_override_rejected() {
        let scenario = named("basic-mutex");
        for workers in [MAX_WORKERS + 1, usize::MAX] {
            let options = RunOptions {
                workers_override: Some(workers),
                ..instant()
            };
            let err = run_scenario(&scenario, &options, &MemorySink::new()).unwrap_err();
            assert!(matches!(err, ScenarioError::InvalidConfig(_)));
        }
        assert_eq!(scenario.gate().available(), scenario.gate().capacity());
    }

    #[test]
    fn test_invalid_hold_scale_rejected() {
        let options = RunOptions {
            hold_scale: -1.0,
            ..RunOptions::default()
        };
        let err = run_scenario(&named("printers"), &options, &MemorySink::new()).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidConfig(_)));
    }

    /// Fails on every write, like a disk that became unavailable
    struct BrokenSink;

    impl Sink for BrokenSink {
        fn line(&self, _text: &str) -> Result<()> {
            Err(ScenarioError::InvalidConfig("sink unavailable".to_string()))
        }
    }

    #[test]
    fn test_failed_unit_of_work_still_releases() {
        let scenario = Scenario::new("file-log", 1, 4, Duration::ZERO)
            .unwrap()
            .work(Work::WriteEntry(Arc::new(BrokenSink)));

        let err = run_scenario(&scenario, &instant(), &MemorySink::new()).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidConfig(_)));

        // Every worker failed inside the critical section, yet no slot leaked
        assert_eq!(scenario.gate().available(), 1);
    }

    /// Panics when a worker announces it entered the critical section
    struct PanickingSink;

    impl Sink for PanickingSink {
        fn line(&self, text: &str) -> Result<()> {
            assert!(!text.contains("entered"), "sink gave out: {text}");
            Ok(())
        }
    }

    #[test]
    fn test_worker_panic_reported_and_slots_returned() {
        let scenario = Scenario::new("pool", 2, 3, Duration::ZERO).unwrap();

        let err = run_scenario(&scenario, &instant(), &PanickingSink).unwrap_err();
        match err {
            ScenarioError::WorkerPanicked { scenario: name, worker } => {
                assert_eq!(name, "pool");
                assert_eq!(worker, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Every worker unwound while holding a slot, none leaked
        assert_eq!(scenario.gate().available(), 2);
        assert_eq!(scenario.gate().waiting(), 0);
    }

    #[test]
    fn test_run_all_whole_catalog() {
        let sink = MemorySink::new();
        let file = Arc::new(MemorySink::new());
        let scenarios = catalog(file.clone()).unwrap();

        let reports = run_all(&scenarios, &instant(), &sink).unwrap();

        assert_eq!(reports.len(), scenarios.len());
        for (report, scenario) in reports.iter().zip(&scenarios) {
            assert_eq!(report.name, scenario.name());
            assert!(report.peak_concurrency <= report.capacity);
            assert_eq!(scenario.gate().available(), scenario.gate().capacity());
        }
        // The file-log scenario wrote one entry per worker
        assert_eq!(file.lines().len(), 3);
        assert!(sink.lines().iter().any(|l| l.starts_with("[LOG]")));
    }
}
