//! Scenario catalog
//!
//! A scenario is one shared resource with a fixed number of slots, the
//! workers that compete for it, and the unit of work each worker performs
//! while holding a slot. The catalog is built fresh for every run, so gates
//! and guarded state are owned by their scenario instead of living in globals.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gate_sync::{BoundedGate, GuardedQueue, GuardedValue};

use crate::error::{Result, ScenarioError};
use crate::sink::Sink;

/// Initial units in the stock scenario
pub const INITIAL_STOCK: u32 = 5;

/// Timeout used by the timed scenarios unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Names of every scenario in catalog order
pub const SCENARIO_NAMES: &[&str] = &[
    "shared-resource",
    "api-limit",
    "printers",
    "database",
    "config-file",
    "reservations",
    "concurrent-reads",
    "checkout",
    "reports",
    "uploads",
    "basic-mutex",
    "multi-access",
    "timed-access",
    "heavy-task",
    "limited-resources",
    "message-list",
    "stock",
    "producer-consumer",
    "file-log",
    "logger",
];

/// How workers ask for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Wait as long as it takes
    Blocking,
    /// Give up after the timeout; a single attempt, no retry
    Timed(Duration),
}

/// What a worker does while it holds a slot
pub enum Work {
    /// Nothing beyond holding the slot
    Hold,
    /// Append one message to a shared list
    AppendMessage(Arc<GuardedValue<Vec<String>>>),
    /// Buy one unit from a shared stock counter
    Purchase(Arc<GuardedValue<u32>>),
    /// The first `producers` workers enqueue, the rest try to dequeue
    ProducerConsumer {
        queue: Arc<GuardedQueue<usize>>,
        producers: usize,
    },
    /// Write one entry to an external sink
    WriteEntry(Arc<dyn Sink>),
    /// Write one `[LOG]` line to the run's narration sink
    Log,
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hold => f.write_str("Hold"),
            Self::AppendMessage(_) => f.write_str("AppendMessage"),
            Self::Purchase(_) => f.write_str("Purchase"),
            Self::ProducerConsumer { producers, .. } => f
                .debug_struct("ProducerConsumer")
                .field("producers", producers)
                .finish_non_exhaustive(),
            Self::WriteEntry(_) => f.write_str("WriteEntry"),
            Self::Log => f.write_str("Log"),
        }
    }
}

/// Result of one worker's turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Held the slot and finished its unit of work
    Completed,
    /// Could not get a slot before the timeout
    TimedOut,
    /// Bought one unit
    Purchased { remaining: u32 },
    /// Found no stock left
    OutOfStock,
    /// Put an item on the queue
    Produced(usize),
    /// Took an item off the queue
    Consumed(usize),
    /// Found the queue empty
    QueueEmpty,
}

impl WorkOutcome {
    /// Whether the worker got a slot at all
    #[must_use]
    pub const fn was_granted(&self) -> bool {
        !matches!(self, Self::TimedOut)
    }
}

impl fmt::Display for WorkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Purchased { remaining } => write!(f, "bought one unit, stock: {remaining}"),
            Self::OutOfStock => write!(f, "could not buy, out of stock"),
            Self::Produced(item) => write!(f, "produced {item}"),
            Self::Consumed(item) => write!(f, "consumed {item}"),
            Self::QueueEmpty => write!(f, "queue empty"),
        }
    }
}

impl Work {
    /// Perform the unit of work for worker `index`
    ///
    /// Must be called while holding a slot of the scenario's gate.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to a sink fails
    pub fn perform(&self, index: usize, label: &str, narration: &dyn Sink) -> Result<WorkOutcome> {
        match self {
            Self::Hold => Ok(WorkOutcome::Completed),
            Self::AppendMessage(list) => {
                list.with_exclusive_access(|messages| {
                    messages.push(format!("message from {label}"));
                });
                Ok(WorkOutcome::Completed)
            }
            Self::Purchase(stock) => Ok(stock.with_exclusive_access(|units| {
                if *units > 0 {
                    *units -= 1;
                    WorkOutcome::Purchased { remaining: *units }
                } else {
                    WorkOutcome::OutOfStock
                }
            })),
            Self::ProducerConsumer { queue, producers } => {
                if index < *producers {
                    let item = index + 1;
                    queue.enqueue(item);
                    Ok(WorkOutcome::Produced(item))
                } else {
                    Ok(queue
                        .try_dequeue()
                        .map_or(WorkOutcome::QueueEmpty, WorkOutcome::Consumed))
                }
            }
            Self::WriteEntry(sink) => {
                sink.line(&format!("entry written by {label}"))?;
                Ok(WorkOutcome::Completed)
            }
            Self::Log => {
                narration.line(&format!("[LOG] message from {label}"))?;
                Ok(WorkOutcome::Completed)
            }
        }
    }

    /// State left behind after every worker finished, if the work keeps any
    ///
    /// For the producer/consumer queue this drains whatever the consumers
    /// did not take.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        match self {
            Self::Hold | Self::WriteEntry(_) | Self::Log => None,
            Self::AppendMessage(list) => Some(format!(
                "messages: {}",
                list.with_exclusive_access(|messages| messages.join(", "))
            )),
            Self::Purchase(stock) => Some(format!(
                "stock left: {}",
                stock.with_exclusive_access(|units| *units)
            )),
            Self::ProducerConsumer { queue, .. } => Some(format!(
                "drained from queue: {:?}",
                queue.drain()
            )),
        }
    }
}

/// One shared resource and the workers that compete for it
#[derive(Debug)]
pub struct Scenario {
    name: &'static str,
    description: &'static str,
    /// Used to label workers, e.g. "client 3"
    actor: &'static str,
    gate: BoundedGate,
    workers: usize,
    hold: Duration,
    mode: AcquireMode,
    work: Work,
}

impl Scenario {
    /// Create a scenario whose workers simply hold a slot for `hold`
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` or `workers` is 0
    pub fn new(name: &'static str, capacity: usize, workers: usize, hold: Duration) -> Result<Self> {
        if workers == 0 {
            return Err(ScenarioError::InvalidConfig(format!(
                "scenario '{name}' needs at least one worker"
            )));
        }
        Ok(Self {
            name,
            description: "",
            actor: "worker",
            gate: BoundedGate::new(capacity)?,
            workers,
            hold,
            mode: AcquireMode::Blocking,
            work: Work::Hold,
        })
    }

    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn actor(mut self, actor: &'static str) -> Self {
        self.actor = actor;
        self
    }

    /// Make workers give up after `timeout` instead of waiting forever
    #[must_use]
    pub fn timed(mut self, timeout: Duration) -> Self {
        self.mode = AcquireMode::Timed(timeout);
        self
    }

    #[must_use]
    pub fn work(mut self, work: Work) -> Self {
        self.work = work;
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    #[must_use]
    pub fn worker_label(&self, index: usize) -> String {
        format!("{} {}", self.actor, index + 1)
    }

    #[must_use]
    pub const fn gate(&self) -> &BoundedGate {
        &self.gate
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub const fn hold(&self) -> Duration {
        self.hold
    }

    #[must_use]
    pub const fn mode(&self) -> AcquireMode {
        self.mode
    }

    #[must_use]
    pub const fn unit_of_work(&self) -> &Work {
        &self.work
    }
}

/// Build every scenario
///
/// `log_file` receives the entries of the `file-log` scenario.
///
/// # Errors
///
/// Returns an error if a scenario is misconfigured
pub fn catalog(log_file: Arc<dyn Sink>) -> Result<Vec<Scenario>> {
    let ms = Duration::from_millis;

    Ok(vec![
        Scenario::new("shared-resource", 3, 5, ms(500))?
            .describe("Three threads at a time use a shared resource")
            .actor("thread"),
        Scenario::new("api-limit", 2, 4, ms(700))?
            .describe("API allows two simultaneous connections")
            .actor("client"),
        Scenario::new("printers", 2, 3, ms(600))?
            .describe("Two printers serve a print queue")
            .actor("document"),
        Scenario::new("database", 1, 1, ms(400))?
            .describe("Exclusive database access with a timeout")
            .actor("db-thread")
            .timed(DEFAULT_TIMEOUT),
        Scenario::new("config-file", 1, 2, ms(300))?
            .describe("Configuration file read by one reader at a time")
            .actor("reader"),
        Scenario::new("reservations", 2, 3, ms(400))?
            .describe("Two reservation desks")
            .actor("user"),
        Scenario::new("concurrent-reads", 3, 5, ms(300))?
            .describe("Up to three concurrent readers of shared data")
            .actor("reader"),
        Scenario::new("checkout", 2, 3, ms(600))?
            .describe("Two checkout lanes process payments")
            .actor("client"),
        Scenario::new("reports", 1, 2, ms(500))?
            .describe("Single report generator")
            .actor("source"),
        Scenario::new("uploads", 2, 4, ms(700))?
            .describe("FTP server accepts two uploads at a time")
            .actor("user"),
        Scenario::new("basic-mutex", 1, 5, Duration::ZERO)?
            .describe("Critical section guarded by a single slot")
            .actor("thread"),
        Scenario::new("multi-access", 3, 5, Duration::ZERO)?
            .describe("Three slots shared by five threads")
            .actor("thread"),
        Scenario::new("timed-access", 1, 3, ms(300))?
            .describe("Single attempt with a timeout, no retry")
            .actor("thread")
            .timed(DEFAULT_TIMEOUT),
        Scenario::new("heavy-task", 2, 4, ms(1000))?
            .describe("Two slots for long-running tasks")
            .actor("task"),
        Scenario::new("limited-resources", 2, 4, ms(1000))?
            .describe("Two units of a limited resource")
            .actor("worker"),
        Scenario::new("message-list", 1, 4, Duration::ZERO)?
            .describe("Threads append to one protected list")
            .actor("thread")
            .work(Work::AppendMessage(Arc::new(GuardedValue::new(Vec::new())))),
        Scenario::new("stock", 1, 7, Duration::ZERO)?
            .describe("Seven buyers compete for five units of stock")
            .actor("buyer")
            .work(Work::Purchase(Arc::new(GuardedValue::new(INITIAL_STOCK)))),
        Scenario::new("producer-consumer", 1, 6, Duration::ZERO)?
            .describe("Producers and consumers share one queue")
            .actor("worker")
            .work(Work::ProducerConsumer {
                queue: Arc::new(GuardedQueue::new()),
                producers: 3,
            }),
        Scenario::new("file-log", 1, 3, Duration::ZERO)?
            .describe("Threads append entries to a log file one at a time")
            .actor("writer")
            .work(Work::WriteEntry(log_file)),
        Scenario::new("logger", 1, 3, Duration::ZERO)?
            .describe("Console logger used by one thread at a time")
            .actor("thread")
            .work(Work::Log),
    ])
}

/// Keep only the scenarios named in `names`, in the order given
///
/// An empty `names` keeps the whole catalog.
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownScenario`] for a name not in the catalog
pub fn select(catalog: Vec<Scenario>, names: &[String]) -> Result<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(catalog);
    }

    let mut pool: Vec<Option<Scenario>> = catalog.into_iter().map(Some).collect();
    names
        .iter()
        .map(|name| {
            pool.iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|s| s.name == name.as_str()))
                .and_then(Option::take)
                .ok_or_else(|| ScenarioError::UnknownScenario(name.clone()))
        })
        .collect()
}
