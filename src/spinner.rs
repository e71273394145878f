//! A minimal terminal spinner that follows a run's progress.

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::controller::{RunState, RunStatus};

/// Braille spinner frames.
const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Frame interval.
const INTERVAL: Duration = Duration::from_millis(80);

/// Progress text for the spinner line.
pub fn progress_line(state: &RunState) -> String {
    let processed = state.results.len();
    let total = state.queue.len();
    match (&state.current_record, state.status) {
        (_, RunStatus::Paused) => format!("{processed}/{total} paused"),
        (Some(record), _) => format!("{processed}/{total} checking {record}"),
        (None, _) => format!("{processed}/{total}"),
    }
}

/// Erase the spinner line so regular output starts at column 0.
pub fn clear_line() {
    eprint!("\x1b[2K\r");
    let _ = std::io::stderr().flush();
}

/// A terminal spinner that runs in a background task.
///
/// Call [`Spinner::follow`] to begin, then [`Spinner::stop`] when done.
/// The spinner writes to stderr so it doesn't interfere with stdout output.
pub struct Spinner {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

impl Spinner {
    /// Start a spinner that renders the latest state from `progress`.
    pub fn follow(progress: watch::Receiver<RunState>) -> Self {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut i = 0;
            loop {
                let frame = FRAMES[i % FRAMES.len()];
                let line = progress_line(&progress.borrow());
                // \r moves to start of line, \x1b[2K clears the line
                eprint!("\x1b[2K\r{frame} {line}");
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(INTERVAL) => {}
                    _ = cancel_rx.changed() => break,
                }
                i += 1;
            }
            clear_line();
        });

        Self {
            handle,
            cancel: cancel_tx,
        }
    }

    /// Stop the spinner and clear its line.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::BatchRecord;
    use crate::controller::parse_batch;

    #[test]
    fn frames_are_single_braille_chars() {
        assert!(!FRAMES.is_empty());
        for frame in FRAMES {
            assert_eq!(frame.chars().count(), 1);
        }
    }

    #[test]
    fn progress_line_variants() {
        let mut state = RunState {
            status: RunStatus::Running,
            queue: parse_batch("a\nb\nc"),
            current_record: BatchRecord::parse("a"),
            ..RunState::default()
        };
        assert_eq!(progress_line(&state), "0/3 checking a");

        state.status = RunStatus::Paused;
        assert_eq!(progress_line(&state), "0/3 paused");

        state.status = RunStatus::Running;
        state.current_record = None;
        assert_eq!(progress_line(&state), "0/3");
    }

    #[tokio::test]
    async fn spinner_starts_and_stops_without_panic() {
        let (_tx, rx) = watch::channel(RunState::default());
        let spinner = Spinner::follow(rx);
        tokio::time::sleep(Duration::from_millis(200)).await;
        spinner.stop().await;
    }

    #[tokio::test]
    async fn spinner_immediate_stop() {
        let (_tx, rx) = watch::channel(RunState::default());
        Spinner::follow(rx).stop().await;
    }
}
