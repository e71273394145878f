use anyhow::Context;
use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo, StateChange};

pub struct LoadCommand;

#[async_trait]
impl Command for LoadCommand {
    fn name(&self) -> &str {
        "/load"
    }

    fn description(&self) -> &str {
        "append records from a file to the pending batch"
    }

    async fn execute(&self, args: &str, _info: &SessionInfo<'_>) -> CommandResult {
        if args.is_empty() {
            eprintln!("  ✗ usage: /load <path>");
            return CommandResult::Handled;
        }

        let text = match tokio::fs::read_to_string(args)
            .await
            .with_context(|| format!("failed to read {args}"))
        {
            Ok(t) => t,
            Err(e) => {
                eprintln!("  ✗ {e:#}");
                return CommandResult::Handled;
            }
        };

        let count = text.lines().filter(|l| !l.trim().is_empty()).count();
        println!("  ✓ loaded {count} record(s) from {args}");
        CommandResult::StateChanged(StateChange::Loaded(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_info;

    #[tokio::test]
    async fn requires_path() {
        assert!(matches!(
            LoadCommand.execute("", &test_info()).await,
            CommandResult::Handled
        ));
    }

    #[tokio::test]
    async fn missing_file_is_handled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let result = LoadCommand
            .execute(path.to_str().unwrap(), &test_info())
            .await;
        assert!(matches!(result, CommandResult::Handled));
    }

    #[tokio::test]
    async fn returns_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.txt");
        std::fs::write(&path, "one\n\ntwo\n").unwrap();

        match LoadCommand.execute(path.to_str().unwrap(), &test_info()).await {
            CommandResult::StateChanged(StateChange::Loaded(text)) => {
                assert_eq!(text, "one\n\ntwo\n");
            }
            _ => panic!("expected loaded text"),
        }
    }
}
