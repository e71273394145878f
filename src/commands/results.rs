use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, unavailable};
use crate::controller::StatusFilter;

pub struct ResultsCommand;

#[async_trait]
impl Command for ResultsCommand {
    fn name(&self) -> &str {
        "/results"
    }

    fn aliases(&self) -> &[&str] {
        &["/r"]
    }

    fn description(&self) -> &str {
        "list outcomes [all|approved|declined]"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some(controller) = info.controller else {
            return unavailable("results");
        };

        let filter: StatusFilter = match args.parse() {
            Ok(f) => f,
            Err(e) => {
                eprintln!("  ✗ {e}");
                return CommandResult::Handled;
            }
        };

        let snapshot = controller.snapshot();
        let outcomes = snapshot.filtered(filter);
        if outcomes.is_empty() {
            println!("  no results");
            return CommandResult::Handled;
        }
        for outcome in outcomes {
            println!("  {outcome}");
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{test_controller, test_info};

    #[tokio::test]
    async fn returns_handled_without_controller() {
        let result = ResultsCommand.execute("", &test_info()).await;
        assert!(matches!(result, CommandResult::Handled));
    }

    #[tokio::test]
    async fn bad_filter_is_handled() {
        let controller = test_controller();
        let info = SessionInfo {
            pending: "",
            controller: Some(&controller),
        };
        assert!(matches!(
            ResultsCommand.execute("bogus", &info).await,
            CommandResult::Handled
        ));
    }

    #[tokio::test]
    async fn lists_after_run() {
        let controller = test_controller();
        controller.start("a\nb").unwrap();
        controller.settled().await;
        let info = SessionInfo {
            pending: "",
            controller: Some(&controller),
        };
        assert!(matches!(
            ResultsCommand.execute("approved", &info).await,
            CommandResult::Handled
        ));
    }
}
