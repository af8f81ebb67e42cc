//! mapqueue CLI - Operator surface for the shared session queue
//!
//! Every subcommand opens the queue file directly; there is no daemon. Many
//! `mapqueue` processes can run against the same file at once.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mapqueue_core::application::{cancel_channel, Exclusive, QueueService};
use mapqueue_core::config::QueueConfig;
use mapqueue_core::domain::{ResetPolicy, SessionId, WaitOutcome};
use mapqueue_core::port::id_provider::UuidProvider;
use mapqueue_core::AppError;
use mapqueue_infra_fs::JsonFileQueueStore;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code when the wait ran out of attempts
const EXIT_TIMED_OUT: i32 = 2;
/// Exit code when the wait was interrupted (128 + SIGINT)
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "mapqueue")]
#[command(about = "Shared FIFO queue for a single-consumer resource", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Queue file (overrides QUEUE_FILE)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Seconds between position checks (overrides QUEUE_INTERVAL)
    #[arg(long, global = true)]
    interval: Option<f64>,

    /// Seconds before giving up (overrides QUEUE_TIMEOUT)
    #[arg(long, global = true)]
    timeout: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the queue to empty (run once at host startup)
    Init {
        /// Keep existing entries; only create the file if missing
        #[arg(long)]
        keep: bool,
    },

    /// Add a session to the tail of the queue
    Enqueue {
        /// Session id (a fresh UUID is minted if omitted)
        session: Option<String>,
    },

    /// Show a session's position (0 = front)
    Position { session: String },

    /// Show the session at the front
    Front,

    /// Remove a session from the queue
    Remove { session: String },

    /// List every waiting session
    List,

    /// Block until a session reaches the front
    Wait { session: String },

    /// Wait for the front, run a command, then leave the queue
    Run {
        /// Session id (a fresh UUID is minted if omitted)
        #[arg(long)]
        session: Option<String>,

        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(Tabled)]
struct QueueRow {
    position: usize,
    session: String,
}

fn init_logging() {
    let log_format =
        std::env::var("MAPQUEUE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mapqueue=warn"));

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_config(cli: &Cli) -> Result<QueueConfig> {
    let env = QueueConfig::from_env().context("Invalid queue environment")?;
    if cli.file.is_none() && cli.interval.is_none() && cli.timeout.is_none() {
        return Ok(env);
    }
    let config = QueueConfig::build(
        cli.file.clone().unwrap_or(env.queue_file),
        cli.interval
            .unwrap_or_else(|| env.wait.poll_interval().as_secs_f64()),
        cli.timeout.unwrap_or_else(|| env.wait.timeout().as_secs_f64()),
    )?;
    Ok(config)
}

fn session_arg(service: &QueueService, raw: Option<String>) -> Result<SessionId> {
    match raw {
        Some(raw) => SessionId::new(raw).context("Invalid session id"),
        None => Ok(service.new_session()?),
    }
}

fn print_position(position: usize) {
    println!(
        "  {} {}",
        "Waiting in queue, position:".yellow(),
        position.to_string().bold()
    );
}

fn report_skipped(outcome: WaitOutcome) -> i32 {
    match outcome {
        WaitOutcome::TimedOut => {
            println!("{}", "✗ Queue timed out, please retry".red().bold());
            EXIT_TIMED_OUT
        }
        WaitOutcome::Cancelled => {
            println!("{}", "✗ Wait cancelled".yellow().bold());
            EXIT_CANCELLED
        }
        WaitOutcome::ReachedFront | WaitOutcome::Absent => 0,
    }
}

async fn run_command(command: &[String]) -> mapqueue_core::Result<ExitStatus> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| AppError::Config("no command given".to_string()))?;
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await?;
    Ok(status)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!(
        queue_file = %config.queue_file.display(),
        max_attempts = config.wait.max_attempts(),
        "mapqueue v{}",
        mapqueue_core::VERSION
    );

    let store = Arc::new(JsonFileQueueStore::new(config.queue_file.clone()));
    let service = QueueService::new(store, Arc::new(UuidProvider));

    match cli.command {
        Commands::Init { keep } => {
            let policy = if keep {
                ResetPolicy::Preserve
            } else {
                ResetPolicy::Reset
            };
            let queue = service.initialize(policy).await?;
            println!(
                "{} {} ({} waiting)",
                "✓ Queue ready:".green().bold(),
                service.location(),
                queue.len()
            );
        }

        Commands::Enqueue { session } => {
            let session = session_arg(&service, session)?;
            let position = service.enqueue(&session).await?;
            println!("{}", "✓ Session enqueued".green().bold());
            println!("  {} {}", "Session:".bold(), session);
            println!("  {} {}", "Position:".bold(), position);
        }

        Commands::Position { session } => {
            let session = SessionId::new(session).context("Invalid session id")?;
            match service.position_of(&session).await? {
                Some(position) => println!("{}", position),
                None => {
                    println!("{}", "Not in queue".yellow());
                    std::process::exit(1);
                }
            }
        }

        Commands::Front => match service.front_of().await? {
            Some(session) => println!("{}", session),
            None => println!("{}", "Queue is empty".yellow()),
        },

        Commands::Remove { session } => {
            let session = SessionId::new(session).context("Invalid session id")?;
            if service.remove(&session).await? {
                println!("{}", format!("✓ Session {} removed", session).green().bold());
            } else {
                println!("{}", format!("Session {} was not queued", session).yellow());
            }
        }

        Commands::List => {
            let queue = service.snapshot().await?;
            if queue.is_empty() {
                println!("{}", "Queue is empty".yellow());
            } else {
                let rows: Vec<QueueRow> = queue
                    .iter()
                    .enumerate()
                    .map(|(position, s)| QueueRow {
                        position,
                        session: s.to_string(),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Wait { session } => {
            let session = SessionId::new(session).context("Invalid session id")?;
            let (cancel, token) = cancel_channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let outcome = service
                .wait_until_front(&session, config.wait, token, print_position)
                .await?;
            match outcome {
                WaitOutcome::ReachedFront => println!("{}", "✓ At the front".green().bold()),
                WaitOutcome::Absent => println!("{}", "✓ No longer queued".green().bold()),
                other => std::process::exit(report_skipped(other)),
            }
        }

        Commands::Run { session, command } => {
            let session = session_arg(&service, session)?;
            let (cancel, token) = cancel_channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            println!("  {} {}", "Session:".bold(), session);
            let result = service
                .run_exclusive(&session, config.wait, token, print_position, || {
                    run_command(&command)
                })
                .await
                .context("Queued run failed")?;

            match result {
                Exclusive::Ran(status) => {
                    if !status.success() {
                        std::process::exit(status.code().unwrap_or(1));
                    }
                }
                Exclusive::Skipped(outcome) => std::process::exit(report_skipped(outcome)),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_collects_trailing_command() {
        let cli = Cli::try_parse_from([
            "mapqueue", "--interval", "0.5", "run", "--session", "s1", "--", "echo", "-n", "hi",
        ])
        .unwrap();
        assert_eq!(cli.interval, Some(0.5));
        match cli.command {
            Commands::Run { session, command } => {
                assert_eq!(session.as_deref(), Some("s1"));
                assert_eq!(command, vec!["echo", "-n", "hi"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_command() {
        assert!(Cli::try_parse_from(["mapqueue", "run"]).is_err());
    }

    #[test]
    fn test_skipped_exit_codes() {
        assert_eq!(report_skipped(WaitOutcome::TimedOut), EXIT_TIMED_OUT);
        assert_eq!(report_skipped(WaitOutcome::Cancelled), EXIT_CANCELLED);
    }
}
