use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, unavailable};
use crate::controller::RunSnapshot;

pub struct StatusCommand;

/// One-line progress summary.
pub fn status_line(snapshot: &RunSnapshot) -> String {
    let mut line = format!(
        "{} {}/{} ({}%) approved {} declined {}",
        snapshot.status,
        snapshot.processed_count,
        snapshot.total_count,
        snapshot.progress_percent(),
        snapshot.approved_count,
        snapshot.declined_count,
    );
    if let (Some(record), Some(position)) = (&snapshot.current_record, snapshot.current_position) {
        line.push_str(&format!(" | checking #{position}: {record}"));
    }
    line
}

#[async_trait]
impl Command for StatusCommand {
    fn name(&self) -> &str {
        "/status"
    }

    fn aliases(&self) -> &[&str] {
        &["/s"]
    }

    fn description(&self) -> &str {
        "show run progress"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("run status");
        };

        println!("  {}", status_line(&controller.snapshot()));
        let pending = info.pending_records();
        if pending > 0 {
            println!("  {pending} record(s) pending, /start to check them");
        }
        CommandResult::Handled
    }
}
