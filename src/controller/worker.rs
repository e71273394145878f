use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{RunStatus, Shared};
use crate::checker::{BatchRecord, ItemChecker, Outcome};
use crate::events::Event;

/// Result of a checkpoint.
enum Gate {
    /// Check this record next.
    Item(usize, BatchRecord),
    /// Paused; wait for the next state change.
    Wait,
    /// Queue exhausted.
    Done,
    /// Stopped, cleared, or superseded by a newer run.
    Exit,
}

/// The processing loop for one run.
pub(super) async fn process(shared: Arc<Shared>, run_id: u64, previous: Option<JoinHandle<()>>) {
    if let Some(previous) = previous {
        // A stopped run may still have a check in flight. Let it land first.
        let _ = previous.await;
    }

    let timeout = shared.config.check_timeout;
    let completed = loop {
        let (index, record) = match next_item(&shared, run_id).await {
            Gate::Item(index, record) => (index, record),
            Gate::Done => break true,
            Gate::Exit | Gate::Wait => break false,
        };

        shared.events.emit(Event::ItemStarted {
            run_id,
            index,
            record: record.clone(),
        });

        let outcome = check_one(shared.checker.as_ref(), &record, timeout).await;
        debug!(run_id, index, status = %outcome.status, "item checked");

        let mut appended = false;
        shared.state.send_if_modified(|state| {
            if state.run_id != run_id {
                return false;
            }
            state.results.push(outcome.clone());
            state.cursor += 1;
            state.current_record = None;
            appended = true;
            true
        });
        if !appended {
            debug!(run_id, index, "run superseded, dropping outcome");
            shared.events.emit(Event::ItemDiscarded { run_id, index });
            break false;
        }
        shared.events.emit(Event::ItemCompleted {
            run_id,
            index,
            outcome,
        });
    };

    let mut processed = None;
    shared.state.send_if_modified(|state| {
        if state.run_id != run_id {
            return false;
        }
        state.current_record = None;
        if completed {
            state.status = RunStatus::Idle;
        }
        processed = Some(state.results.len());
        true
    });

    if let (true, Some(processed)) = (completed, processed) {
        info!(run_id, processed, "run finished");
        shared
            .events
            .emit(Event::RunFinished { run_id, processed });
    }
    shared.live_loops.send_modify(|n| *n -= 1);
}

/// Stop and pause checkpoint. Claims the next record atomically, so a stop
/// issued after this returns lands after the record completes.
async fn next_item(shared: &Shared, run_id: u64) -> Gate {
    let mut rx = shared.state.subscribe();
    loop {
        // Anything modified after this point wakes `changed` below.
        rx.mark_unchanged();

        let mut gate = Gate::Exit;
        shared.state.send_if_modified(|state| {
            if state.run_id != run_id {
                return false;
            }
            match state.status {
                RunStatus::Idle | RunStatus::Stopped => false,
                _ if state.cursor >= state.queue.len() => {
                    gate = Gate::Done;
                    false
                }
                RunStatus::Paused => {
                    gate = Gate::Wait;
                    false
                }
                RunStatus::Running => {
                    let record = state.queue[state.cursor].clone();
                    state.current_record = Some(record.clone());
                    gate = Gate::Item(state.cursor, record);
                    true
                }
            }
        });

        match gate {
            Gate::Wait => {
                if rx.changed().await.is_err() {
                    return Gate::Exit;
                }
            }
            other => return other,
        }
    }
}

/// Run one check. Errors, panics and timeouts all become a declined outcome.
async fn check_one(
    checker: &dyn ItemChecker,
    record: &BatchRecord,
    timeout: Option<Duration>,
) -> Outcome {
    let started = Instant::now();
    let attempt = AssertUnwindSafe(checker.check(record)).catch_unwind();
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, attempt).await.map_err(|_| {
            format!("check timed out after {:.1}s", limit.as_secs_f64())
        }),
        None => Ok(attempt.await),
    };
    let elapsed = started.elapsed();

    let failure = match result {
        Ok(Ok(Ok(verdict))) => return Outcome::from_verdict(record.clone(), verdict, elapsed),
        Ok(Ok(Err(e))) => format!("check failed: {e:#}"),
        Ok(Err(panic)) => format!("checker panicked: {}", panic_message(&*panic)),
        Err(timed_out) => timed_out,
    };
    warn!(record = %record, error = %failure, "item check failed");
    Outcome::check_failed(record.clone(), failure, elapsed)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
