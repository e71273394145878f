use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct QuitCommand;

#[async_trait]
impl Command for QuitCommand {
    fn name(&self) -> &str {
        "/quit"
    }

    fn aliases(&self) -> &[&str] {
        &["quit", "exit", "/exit"]
    }

    fn description(&self) -> &str {
        "stop any run and exit the REPL"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        if let Some(controller) = info.controller {
            controller.stop();
        }
        CommandResult::Quit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{test_controller, test_info};
    use crate::controller::RunStatus;

    #[tokio::test]
    async fn returns_quit() {
        assert!(matches!(
            QuitCommand.execute("", &test_info()).await,
            CommandResult::Quit
        ));
    }

    #[tokio::test]
    async fn stops_active_run() {
        let controller = test_controller();
        controller.start("a\nb\nc").unwrap();
        let info = SessionInfo {
            pending: "",
            controller: Some(&controller),
        };

        assert!(matches!(
            QuitCommand.execute("", &info).await,
            CommandResult::Quit
        ));
        assert_eq!(controller.status(), RunStatus::Stopped);
        controller.settled().await;
        assert!(controller.snapshot().processed_count < 3);
    }

    #[tokio::test]
    async fn leaves_finished_run_alone() {
        let controller = test_controller();
        controller.start("a\nb").unwrap();
        controller.settled().await;
        let info = SessionInfo {
            pending: "",
            controller: Some(&controller),
        };

        QuitCommand.execute("", &info).await;
        let snap = controller.snapshot();
        assert_eq!(snap.status, RunStatus::Idle);
        assert_eq!(snap.processed_count, 2);
    }

    #[test]
    fn has_aliases() {
        let aliases = QuitCommand.aliases();
        assert!(aliases.contains(&"quit"));
        assert!(aliases.contains(&"exit"));
        assert!(aliases.contains(&"/exit"));
    }
}
