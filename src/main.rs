use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use batchcheck::banner::{BannerInfo, print_banner, print_run_summary, run_summary};
use batchcheck::checker::Outcome;
use batchcheck::checker::simulated::{SimulatedChecker, SimulatedConfig};
use batchcheck::commands::{CommandRegistry, CommandResult, SessionInfo, StateChange};
use batchcheck::consts::{DEFAULT_APPROVAL_RATE, DEFAULT_CHECK_TIMEOUT};
use batchcheck::controller::{BatchController, ControllerConfig, ResultCursor};
use batchcheck::events::Event;
use batchcheck::spinner::{self, Spinner};

#[derive(Parser)]
#[command(
    name = "batchcheck",
    version,
    about = "Check a batch of records one at a time, with pause, resume and stop."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Simulated latency per record, in milliseconds
    #[arg(long, default_value_t = 20, global = true)]
    delay_ms: u64,

    /// Extra random latency per record, up to this many milliseconds
    #[arg(long, default_value_t = 0, global = true)]
    jitter_ms: u64,

    /// Probability that a record is approved (0.0 to 1.0)
    #[arg(long, default_value_t = DEFAULT_APPROVAL_RATE, value_parser = parse_rate, global = true)]
    approval_rate: f64,

    /// Probability that a check fails outright (0.0 to 1.0)
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate, global = true)]
    failure_rate: f64,

    /// Per-record check timeout in seconds
    #[arg(short, long, default_value_t = DEFAULT_CHECK_TIMEOUT.as_secs(), global = true)]
    timeout: u64,

    /// Wait for every check however long it takes
    #[arg(long, default_value_t = false, global = true)]
    no_timeout: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Check every record in a file and exit
    Check {
        /// Batch file, one record per line (`-` for stdin)
        input: String,

        /// Print outcomes as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{rate} is not between 0.0 and 1.0"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Quiet by default so log lines don't interleave with outcomes
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let timeout = (!cli.no_timeout).then(|| Duration::from_secs(cli.timeout));
    let banner = BannerInfo {
        delay: Duration::from_millis(cli.delay_ms),
        jitter: Duration::from_millis(cli.jitter_ms),
        approval_rate: cli.approval_rate,
        failure_rate: cli.failure_rate,
        timeout,
    };

    let checker = Arc::new(SimulatedChecker::new(SimulatedConfig {
        delay: banner.delay,
        jitter: banner.jitter,
        approval_rate: cli.approval_rate,
        failure_rate: cli.failure_rate,
    }));
    let controller = BatchController::new(
        checker,
        ControllerConfig {
            check_timeout: timeout,
            ..ControllerConfig::default()
        },
    );

    match cli.command {
        Some(Command::Check { input, json }) => check(&controller, &input, json).await,
        None => repl(&controller, &banner).await,
    }
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read batch from stdin")?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read batch file {input}"))
    }
}

fn print_outcome(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
    } else {
        println!("{outcome}");
    }
    Ok(())
}

/// One-shot mode: stream outcomes as they complete. Ctrl+C stops the run.
///
/// Events only say when to print. The outcomes themselves come from the run
/// state, so a lagging reader still prints every one of them.
async fn check(controller: &BatchController, input: &str, json: bool) -> Result<()> {
    let text = read_input(input).await?;

    let mut events = controller.subscribe();
    let mut cursor = ResultCursor::default();
    controller.start(&text)?;

    let progress = (!json && io::stderr().is_terminal()).then(|| Spinner::follow(controller.watch()));
    let flush = |cursor: &mut ResultCursor| -> Result<()> {
        let fresh = controller.new_results(cursor);
        if !fresh.is_empty() && progress.is_some() {
            spinner::clear_line();
        }
        for outcome in &fresh {
            print_outcome(outcome, json)?;
        }
        Ok(())
    };

    let settled = controller.settled();
    tokio::pin!(settled);
    let mut interrupted = false;

    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(Event::ItemCompleted { .. }) => flush(&mut cursor)?,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event stream lagged, catching up from run state");
                    flush(&mut cursor)?;
                }
                Ok(_) => {}
                Err(RecvError::Closed) => break,
            },
            _ = &mut settled => break,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                controller.stop();
            }
        }
    }

    // Outcomes that landed just before the loop settled
    flush(&mut cursor)?;

    if let Some(progress) = progress {
        progress.stop().await;
    }

    let snapshot = controller.snapshot();
    if json {
        eprintln!("{}", run_summary(&snapshot));
    } else {
        print_run_summary(&snapshot);
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("\nbatchcheck> ");
    io::stdout().flush()?;
    Ok(())
}

async fn repl(controller: &BatchController, banner: &BannerInfo) -> Result<()> {
    print_banner(banner);

    let registry = CommandRegistry::new();
    let mut events = controller.subscribe();
    let mut cursor = ResultCursor::default();
    let mut pending = String::new();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    prompt()?;
    loop {
        tokio::select! {
            result = lines.next_line() => {
                let line = match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Ctrl+D (EOF)
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                };

                let info = SessionInfo {
                    pending: &pending,
                    controller: Some(controller),
                };
                match registry.dispatch(&line, &info).await {
                    CommandResult::NotACommand => {
                        if !line.trim().is_empty() {
                            pending.push_str(line.trim());
                            pending.push('\n');
                        }
                    }
                    CommandResult::Handled => {}
                    CommandResult::StateChanged(change) => match change {
                        StateChange::BatchSubmitted | StateChange::BufferCleared => pending.clear(),
                        StateChange::Loaded(text) => {
                            pending.push_str(&text);
                            if !pending.ends_with('\n') {
                                pending.push('\n');
                            }
                        }
                    },
                    CommandResult::Quit => break,
                }
                prompt()?;
            }
            event = events.recv() => match event {
                Ok(Event::ItemCompleted { .. }) | Err(RecvError::Lagged(_)) => {
                    for outcome in controller.new_results(&mut cursor) {
                        println!("\r  {outcome}");
                    }
                }
                Ok(Event::RunFinished { .. }) => {
                    for outcome in controller.new_results(&mut cursor) {
                        println!("\r  {outcome}");
                    }
                    println!("\r  {}", run_summary(&controller.snapshot()));
                    prompt()?;
                }
                Ok(_) => {}
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if controller.status().is_active() {
                    controller.stop();
                    println!("\n  interrupted, run stopped");
                    prompt()?;
                } else {
                    println!();
                    break;
                }
            }
        }
    }

    controller.stop();
    print_run_summary(&controller.snapshot());
    println!("goodbye.");
    Ok(())
}
