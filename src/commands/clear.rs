use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, StateChange, unavailable};

pub struct ClearCommand;

#[async_trait]
impl Command for ClearCommand {
    fn name(&self) -> &str {
        "/clear"
    }

    fn description(&self) -> &str {
        "discard results and the pending buffer"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("run control");
        };

        match controller.clear() {
            Ok(()) => {
                println!("  ✓ cleared");
                CommandResult::StateChanged(StateChange::BufferCleared)
            }
            Err(e) => {
                eprintln!("  ✗ {e} (use /stop first)");
                CommandResult::Handled
            }
        }
    }
}
