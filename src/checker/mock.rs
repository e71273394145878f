use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{BatchRecord, ItemChecker, Verdict};

/// What a scripted record does when checked.
#[derive(Debug, Clone)]
pub enum Script {
    Decline(String),
    Fail(String),
    Panic,
    /// Sleep, then approve.
    Delay(Duration),
}

/// A deterministic checker for tests. Approves every record unless scripted otherwise.
pub struct ScriptedChecker {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    finished: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedChecker {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Script the behavior for one record (matched on its trimmed text).
    pub fn on(mut self, record: &str, script: Script) -> Self {
        self.scripts.insert(record.to_string(), script);
        self
    }

    /// Number of check invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invocations that have returned or unwound.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping invocations observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Records in the order they were handed to the checker.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Default for ScriptedChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Settles the counters even if the check panics.
struct InFlight<'a> {
    in_flight: &'a AtomicUsize,
    finished: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ItemChecker for ScriptedChecker {
    async fn check(&self, record: &BatchRecord) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(record.as_str().to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight {
            in_flight: &self.in_flight,
            finished: &self.finished,
        };

        match self.scripts.get(record.as_str()) {
            None => Ok(Verdict::approved("approved")),
            Some(Script::Decline(reason)) => Ok(Verdict::declined(reason.clone(), reason.clone())),
            Some(Script::Fail(error)) => bail!("{error}"),
            Some(Script::Panic) => panic!("ScriptedChecker: scripted panic on {record}"),
            Some(Script::Delay(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(Verdict::approved("approved"))
            }
        }
    }
}
