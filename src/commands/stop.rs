use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, unavailable};

pub struct StopCommand;

#[async_trait]
impl Command for StopCommand {
    fn name(&self) -> &str {
        "/stop"
    }

    fn description(&self) -> &str {
        "end the run early, keeping results"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("run control");
        };

        let before = controller.status();
        if !before.is_active() {
            println!("  nothing to stop (run is {before})");
            return CommandResult::Handled;
        }
        controller.stop();
        let snapshot = controller.snapshot();
        println!(
            "  ✓ stopped after {}/{} record(s)",
            snapshot.processed_count, snapshot.total_count
        );
        CommandResult::Handled
    }
}
