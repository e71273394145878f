//! Built-in REPL commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry handles dispatch, alias resolution,
//! argument splitting and help generation.

mod clear;
mod load;
mod pause;
mod quit;
mod results;
mod resume;
mod start;
mod status;
mod stop;

use async_trait::async_trait;
use std::sync::Arc;

use crate::controller::BatchController;

/// Session info available to commands during execution.
pub struct SessionInfo<'a> {
    /// Records typed or loaded since the last `/start`, one per line.
    pub pending: &'a str,
    pub controller: Option<&'a BatchController>,
}

impl SessionInfo<'_> {
    /// Number of non-blank lines waiting in the buffer.
    pub fn pending_records(&self) -> usize {
        self.pending.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

/// A state change the REPL needs to apply after a command runs.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// The pending buffer was handed to the controller.
    BatchSubmitted,
    /// The pending buffer should be emptied.
    BufferCleared,
    /// Append these lines to the pending buffer.
    Loaded(String),
}

/// What the REPL should do after a command runs.
pub enum CommandResult {
    /// Not a command; the line is a record for the pending batch.
    NotACommand,
    /// Command handled, continue the REPL loop.
    Handled,
    /// Command produced a state change the REPL must apply.
    StateChanged(StateChange),
    /// Exit the REPL.
    Quit,
}

/// A REPL command. Implement this trait to add new commands.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/start"`.
    fn name(&self) -> &str;

    /// Alternative names, e.g. `&["/h", "/?"]`.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Run the command. `args` is whatever followed the name, trimmed.
    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult;
}

/// `/help` is dispatched by the registry itself since it lists every command.
struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "/help"
    }

    fn aliases(&self) -> &[&str] {
        &["/h", "/?"]
    }

    fn description(&self) -> &str {
        "show this help"
    }

    async fn execute(&self, _args: &str, _info: &SessionInfo<'_>) -> CommandResult {
        CommandResult::Handled
    }
}

/// Holds registered commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(HelpCommand),
            Arc::new(load::LoadCommand),
            Arc::new(start::StartCommand),
            Arc::new(pause::PauseCommand),
            Arc::new(resume::ResumeCommand),
            Arc::new(stop::StopCommand),
            Arc::new(clear::ClearCommand),
            Arc::new(status::StatusCommand),
            Arc::new(results::ResultsCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    /// Register an additional command.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, info: &SessionInfo<'_>) -> CommandResult {
        let input = input.trim();
        let (cmd, args) = input
            .split_once(char::is_whitespace)
            .map(|(c, a)| (c, a.trim()))
            .unwrap_or((input, ""));

        for command in &self.commands {
            if cmd == command.name() || command.aliases().contains(&cmd) {
                if command.name() == "/help" {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                return command.execute(args, info).await;
            }
        }

        if cmd.starts_with('/') {
            println!("unknown command: {cmd}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    /// Generate help text from all registered commands.
    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.aliases()), c.description()))
            .collect();

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out
    }

    /// All registered command names (for testing).
    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// All registered names and aliases (for duplicate detection).
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, aliases: &[&str]) -> String {
    if aliases.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, aliases.join(", "))
    }
}

/// Print the "no controller" notice shared by the run-control commands.
fn unavailable(what: &str) -> CommandResult {
    eprintln!("  ✗ {what} not available");
    CommandResult::Handled
}
