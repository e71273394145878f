//! The batch controller: owns a run's lifecycle and exposes run control.
//!
//! All run state lives in a single [`watch`] channel. Control operations and
//! the processing loop mutate it through `send_if_modified`, which serializes
//! writers and publishes every change. Observers only ever see snapshots or a
//! read-only receiver. The same channel wakes a paused loop, so pausing costs
//! nothing while nothing changes.

mod worker;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::checker::{BatchRecord, ItemChecker, Outcome, Status};
use crate::consts::{DEFAULT_CHECK_TIMEOUT, DEFAULT_EVENT_CAPACITY};
use crate::events::{Event, EventBus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("batch contains no records")]
    EmptyBatch,

    #[error("no tokio runtime to drive the run")]
    NoRuntime,

    #[error("cannot {operation} while the run is {status}")]
    InvalidState {
        operation: &'static str,
        status: RunStatus,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl RunStatus {
    /// Running or paused: the run still has a say over its queue.
    pub fn is_active(self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Paused => write!(f, "paused"),
            RunStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// The state of the current (or last) run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Generation number. Changes on every start and clear.
    pub run_id: u64,
    pub status: RunStatus,
    /// Fixed once the run starts.
    pub queue: Vec<BatchRecord>,
    /// Index of the next record to process.
    pub cursor: usize,
    /// Append-only within a run, in queue order.
    pub results: Vec<Outcome>,
    /// The record being checked right now.
    pub current_record: Option<BatchRecord>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Which outcomes to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Approved,
    Declined,
}

impl StatusFilter {
    pub fn matches(self, outcome: &Outcome) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Approved => outcome.status == Status::Approved,
            StatusFilter::Declined => outcome.status == Status::Declined,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "approved" => Ok(StatusFilter::Approved),
            "declined" => Ok(StatusFilter::Declined),
            other => Err(format!("unknown filter: {other} (expected all, approved or declined)")),
        }
    }
}

/// An immutable copy of the observable run state.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub run_id: u64,
    pub status: RunStatus,
    pub results: Vec<Outcome>,
    pub current_record: Option<BatchRecord>,
    /// 1-based position of `current_record` in the queue.
    pub current_position: Option<usize>,
    pub processed_count: usize,
    pub total_count: usize,
    pub approved_count: usize,
    pub declined_count: usize,
    pub started_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    pub fn from_state(state: &RunState) -> Self {
        let approved_count = state.results.iter().filter(|o| o.is_approved()).count();
        Self {
            run_id: state.run_id,
            status: state.status,
            results: state.results.clone(),
            current_record: state.current_record.clone(),
            current_position: state.current_record.as_ref().map(|_| state.cursor + 1),
            processed_count: state.results.len(),
            total_count: state.queue.len(),
            approved_count,
            declined_count: state.results.len() - approved_count,
            started_at: state.started_at,
        }
    }

    pub fn filtered(&self, filter: StatusFilter) -> Vec<&Outcome> {
        self.results.iter().filter(|o| filter.matches(o)).collect()
    }

    /// Whole-number percentage of the queue processed.
    pub fn progress_percent(&self) -> u8 {
        if self.total_count == 0 {
            return 0;
        }
        (self.processed_count * 100 / self.total_count) as u8
    }
}

pub struct ControllerConfig {
    /// Upper bound on one check. `None` waits indefinitely.
    pub check_timeout: Option<Duration>,
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            check_timeout: Some(DEFAULT_CHECK_TIMEOUT),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// How far a consumer has read the current run's results.
///
/// Use with [`BatchController::new_results`] so a consumer that falls behind
/// the event stream still sees every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultCursor {
    run_id: u64,
    next: usize,
}

/// Split batch text into trimmed, non-blank records, keeping input order.
pub fn parse_batch(text: &str) -> Vec<BatchRecord> {
    text.lines().filter_map(BatchRecord::parse).collect()
}

struct Shared {
    state: watch::Sender<RunState>,
    events: EventBus,
    checker: Arc<dyn ItemChecker>,
    config: ControllerConfig,
    next_run_id: AtomicU64,
    /// Processing loops spawned and not yet returned.
    live_loops: watch::Sender<usize>,
    /// Handle of the most recently spawned processing loop.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn allocate_run_id(&self) -> u64 {
        self.next_run_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Drives one batch at a time through an [`ItemChecker`], one record in flight.
#[derive(Clone)]
pub struct BatchController {
    shared: Arc<Shared>,
}

impl BatchController {
    pub fn new(checker: Arc<dyn ItemChecker>, config: ControllerConfig) -> Self {
        let (state, _) = watch::channel(RunState::default());
        let (live_loops, _) = watch::channel(0);
        let events = EventBus::new(config.event_capacity);
        Self {
            shared: Arc::new(Shared {
                state,
                events,
                checker,
                config,
                next_run_id: AtomicU64::new(1),
                live_loops,
                worker: Mutex::new(None),
            }),
        }
    }

    /// Begin a fresh run over `text`. Any previous run's results are discarded.
    ///
    /// Fails with [`ControlError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self, text: &str) -> Result<(), ControlError> {
        let runtime = Handle::try_current().map_err(|_| ControlError::NoRuntime)?;
        let queue = parse_batch(text);
        if queue.is_empty() {
            return Err(ControlError::EmptyBatch);
        }
        let total = queue.len();

        // Held for the whole start so the stored handle always belongs to the newest run.
        let mut slot = self.shared.worker.lock().unwrap();

        let run_id = self.shared.allocate_run_id();
        let mut rejected = None;
        self.shared.state.send_if_modified(|state| {
            if state.status.is_active() {
                rejected = Some(state.status);
                return false;
            }
            *state = RunState {
                run_id,
                status: RunStatus::Running,
                queue,
                started_at: Some(Utc::now()),
                ..RunState::default()
            };
            true
        });
        if let Some(status) = rejected {
            return Err(ControlError::InvalidState {
                operation: "start",
                status,
            });
        }

        info!(run_id, total, "run started");
        self.shared.events.emit(Event::RunStarted { run_id, total });

        let previous = slot.take();
        let shared = Arc::clone(&self.shared);
        self.shared.live_loops.send_modify(|n| *n += 1);
        *slot = Some(runtime.spawn(worker::process(shared, run_id, previous)));
        Ok(())
    }

    /// Suspend before the next record. The record in flight, if any, completes.
    pub fn pause(&self) {
        if let Some(run_id) = self.transition(RunStatus::Running, RunStatus::Paused) {
            info!(run_id, "run paused");
            self.shared.events.emit(Event::RunPaused { run_id });
        }
    }

    pub fn resume(&self) {
        if let Some(run_id) = self.transition(RunStatus::Paused, RunStatus::Running) {
            info!(run_id, "run resumed");
            self.shared.events.emit(Event::RunResumed { run_id });
        }
    }

    /// End the run early. Collected results are kept, and a record already
    /// in flight is still recorded when its check completes.
    pub fn stop(&self) {
        let mut stopped = None;
        self.shared.state.send_if_modified(|state| {
            if !state.status.is_active() {
                return false;
            }
            state.status = RunStatus::Stopped;
            stopped = Some((state.run_id, state.results.len()));
            true
        });
        if let Some((run_id, processed)) = stopped {
            info!(run_id, processed, "run stopped");
            self.shared
                .events
                .emit(Event::RunStopped { run_id, processed });
        }
    }

    /// Discard the finished or stopped run. Refused while a run is active.
    pub fn clear(&self) -> Result<(), ControlError> {
        let run_id = self.shared.allocate_run_id();
        let mut rejected = None;
        self.shared.state.send_if_modified(|state| {
            if state.status.is_active() {
                rejected = Some(state.status);
                return false;
            }
            *state = RunState {
                run_id,
                ..RunState::default()
            };
            true
        });
        if let Some(status) = rejected {
            return Err(ControlError::InvalidState {
                operation: "clear",
                status,
            });
        }
        info!("run cleared");
        self.shared.events.emit(Event::RunCleared);
        Ok(())
    }

    pub fn status(&self) -> RunStatus {
        self.shared.state.borrow().status
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::from_state(&self.shared.state.borrow())
    }

    /// Read-only view that is notified of every state change.
    pub fn watch(&self) -> watch::Receiver<RunState> {
        self.shared.state.subscribe()
    }

    /// Lifecycle and per-item events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    /// Outcomes appended since `cursor` last read, in queue order. A new run
    /// or a clear rewinds the cursor.
    pub fn new_results(&self, cursor: &mut ResultCursor) -> Vec<Outcome> {
        let state = self.shared.state.borrow();
        if state.run_id != cursor.run_id {
            *cursor = ResultCursor {
                run_id: state.run_id,
                next: 0,
            };
        }
        let fresh = state.results.get(cursor.next..).unwrap_or_default().to_vec();
        cursor.next += fresh.len();
        fresh
    }

    /// Resolves once no processing loop is running, including one still
    /// draining a stopped or cleared run.
    pub async fn settled(&self) {
        let mut rx = self.shared.live_loops.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn transition(&self, from: RunStatus, to: RunStatus) -> Option<u64> {
        let mut changed = None;
        self.shared.state.send_if_modified(|state| {
            if state.status != from {
                return false;
            }
            state.status = to;
            changed = Some(state.run_id);
            true
        });
        changed
    }
}
