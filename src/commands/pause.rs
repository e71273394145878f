use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, unavailable};
use crate::controller::RunStatus;

pub struct PauseCommand;

#[async_trait]
impl Command for PauseCommand {
    fn name(&self) -> &str {
        "/pause"
    }

    fn description(&self) -> &str {
        "pause after the record in flight"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("run control");
        };

        controller.pause();
        match controller.status() {
            RunStatus::Paused => println!("  ✓ paused"),
            other => println!("  nothing to pause (run is {other})"),
        }
        CommandResult::Handled
    }
}
