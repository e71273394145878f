use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, unavailable};
use crate::controller::RunStatus;

pub struct ResumeCommand;

#[async_trait]
impl Command for ResumeCommand {
    fn name(&self) -> &str {
        "/resume"
    }

    fn description(&self) -> &str {
        "continue a paused run"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("run control");
        };

        let before = controller.status();
        controller.resume();
        if before == RunStatus::Paused {
            println!("  ✓ resumed");
        } else {
            println!("  nothing to resume (run is {before})");
        }
        CommandResult::Handled
    }
}
