use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, StateChange, unavailable};

pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    fn name(&self) -> &str {
        "/start"
    }

    fn aliases(&self) -> &[&str] {
        &["/run"]
    }

    fn description(&self) -> &str {
        "check the pending records"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("run control");
        };

        match controller.start(info.pending) {
            Ok(()) => {
                println!("  ✓ started checking {} record(s)", info.pending_records());
                CommandResult::StateChanged(StateChange::BatchSubmitted)
            }
            Err(e) => {
                eprintln!("  ✗ {e}");
                CommandResult::Handled
            }
        }
    }
}
