//! mlearn - learn durable lessons from Claude Code retry patterns
//!
//! Runs as Claude Code hook commands and as a small maintenance CLI.
//!
//! # Usage
//!
//! ```text
//! mlearn track               # PostToolUse / PostToolUseFailure hook (event on stdin)
//! mlearn analyze             # Stop hook (payload on stdin, optional)
//! mlearn patterns [--json]   # Show learned patterns
//! mlearn clear --yes         # Reset the pattern repository
//! mlearn cleanup             # Remove stale session state
//! mlearn sessions            # List stored session state
//! mlearn setup | uninstall   # Manage hooks in ~/.claude/settings.json
//! ```
//!
//! The hook commands never fail the host: errors are logged and reported on
//! stderr, and the process exits 0.

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use mlearn_core::SessionId;
use mlearn_engine::{Learner, LearningConfig};
use mlearn_protocol::RawToolEvent;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod setup;

// ============================================================================
// CLI Arguments
// ============================================================================

/// mlearn - learn durable lessons from Claude Code retry patterns
#[derive(Parser, Debug)]
#[command(name = "mlearn")]
#[command(about = "Learn durable lessons from Claude Code retry patterns")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Session identifier when the hook payload carries none
    #[arg(long, global = true, env = "CLAUDE_SESSION_ID")]
    session_id: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record one tool event read from stdin
    Track,
    /// Analyze the session and update learned patterns
    Analyze,
    /// Show learned patterns
    Patterns {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove all learned patterns
    Clear {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Remove stale session state files
    Cleanup {
        /// Age threshold in hours (defaults to the configured value)
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
    /// List stored session state
    Sessions,
    /// Configure Claude Code hooks for mlearn
    Setup,
    /// Remove mlearn hooks from Claude Code
    Uninstall,
}

// ============================================================================
// Logging
// ============================================================================

/// Returns the log directory.
///
/// Uses `$XDG_STATE_HOME/mlearn`, falling back to `~/.local/state/mlearn`.
fn get_log_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        if !xdg_state.is_empty() {
            return Some(PathBuf::from(xdg_state).join("mlearn"));
        }
    }
    dirs::home_dir().map(|home| home.join(".local").join("state").join("mlearn"))
}

/// Opens the append-mode log file, or `None` if it cannot be created.
///
/// Hook stdout and stderr are seen by Claude Code, so logs go to a file.
fn create_log_file() -> Option<fs::File> {
    let log_dir = get_log_dir()?;
    fs::create_dir_all(&log_dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("mlearn.log"))
        .ok()
}

fn init_logging() {
    if let Some(file) = create_log_file() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("mlearn=info,mlearn_engine=info,mlearn_core=warn,mlearn_protocol=warn")
        });

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init();
    }
}

// ============================================================================
// Hook Input
// ============================================================================

/// Reads the hook payload from stdin. Empty when stdin is a terminal.
fn read_stdin() -> String {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return String::new();
    }
    let mut input = String::new();
    if let Err(e) = stdin.lock().read_to_string(&mut input) {
        debug!(error = %e, "Failed to read stdin");
    }
    input
}

/// Session id from `--session-id` / `CLAUDE_SESSION_ID`, else the current time.
fn fallback_session_id(explicit: Option<&str>) -> SessionId {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SessionId::new)
        .unwrap_or_else(|| SessionId::from_timestamp(Local::now()))
}

/// Working directory for pattern file discovery: payload `cwd`, else ours.
fn working_dir(payload: Option<&RawToolEvent>) -> Result<PathBuf> {
    if let Some(cwd) = payload.and_then(|p| p.cwd.as_deref()).filter(|c| !c.is_empty()) {
        return Ok(PathBuf::from(cwd));
    }
    std::env::current_dir().context("Could not determine working directory")
}

fn learner(payload: Option<&RawToolEvent>) -> Result<Learner> {
    let config = LearningConfig::load();
    let cwd = working_dir(payload)?;
    Learner::from_config(&config, &cwd).context("Failed to initialize learning engine")
}

// ============================================================================
// Commands
// ============================================================================

fn run_track(session_id: Option<&str>) -> Result<()> {
    let input = read_stdin();
    let payload = serde_json::from_str::<RawToolEvent>(&input).ok();
    let learner = learner(payload.as_ref())?;

    let fallback = fallback_session_id(session_id);
    if let Some(outcome) = learner.tracker.track_payload(&fallback, &input)? {
        debug!(
            session_id = %outcome.session_id,
            goal = %outcome.goal_hash,
            "Tool event tracked"
        );
    }
    Ok(())
}

fn run_analyze(session_id: Option<&str>) -> Result<()> {
    let input = read_stdin();
    let payload = serde_json::from_str::<RawToolEvent>(&input).ok();
    let learner = learner(payload.as_ref())?;

    let session_id = payload
        .as_ref()
        .and_then(RawToolEvent::session_id)
        .unwrap_or_else(|| fallback_session_id(session_id));

    let report = learner.analyzer.analyze(&session_id)?;
    let lines = report.summary_lines();
    if !lines.is_empty() {
        eprintln!();
        for line in lines {
            eprintln!("{line}");
        }
    }
    Ok(())
}

fn run_patterns(json: bool) -> Result<()> {
    let learner = learner(None)?;
    let summary = learner.repository.summary()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Pattern file: {}", learner.repository.path().display());
    println!("Total patterns: {}", summary.total);
    if summary.total == 0 {
        return Ok(());
    }
    println!("\nBy category:");
    for (category, count) in &summary.by_category {
        println!("  {category}: {count}");
    }
    println!("\nPatterns:");
    for entry in &summary.entries {
        println!("  - {entry}");
    }
    Ok(())
}

fn run_clear(yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to clear learned patterns without --yes");
    }
    let learner = learner(None)?;
    learner.repository.clear()?;
    println!("Cleared {}", learner.repository.path().display());
    Ok(())
}

fn run_cleanup(max_age_hours: Option<u64>) -> Result<()> {
    let config = LearningConfig::load();
    let hours = max_age_hours.unwrap_or(config.cleanup_max_age_hours);
    let learner = learner(None)?;
    let removed = learner.store.cleanup_older_than_hours(hours)?;
    println!("Removed {removed} session state file(s) older than {hours}h");
    Ok(())
}

fn run_sessions() -> Result<()> {
    let learner = learner(None)?;
    let listings = learner.store.list_sessions()?;
    if listings.is_empty() {
        println!("No stored sessions in {}", learner.store.dir().display());
        return Ok(());
    }
    for listing in listings {
        println!(
            "{}  {}  {} result(s), {} opportunit(ies)",
            listing.modified.format("%Y-%m-%d %H:%M:%S"),
            listing.session_id,
            listing.tool_results,
            listing.opportunities
        );
    }
    Ok(())
}

/// Runs a hook command, swallowing errors so the host is never blocked.
fn run_hook(name: &str, result: Result<()>) -> Result<()> {
    if let Err(e) = result {
        error!(command = name, error = %format!("{e:#}"), "Hook command failed");
        eprintln!("mlearn {name} error: {e:#}");
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Setup => return setup::setup(),
        Command::Uninstall => return setup::uninstall(),
        _ => {}
    }

    init_logging();
    let session_id = args.session_id.as_deref();
    info!(command = ?args.command, "mlearn starting");

    match args.command {
        Command::Track => run_hook("track", run_track(session_id)),
        Command::Analyze => run_hook("analyze", run_analyze(session_id)),
        Command::Patterns { json } => run_patterns(json),
        Command::Clear { yes } => run_clear(yes),
        Command::Cleanup { max_age_hours } => run_cleanup(max_age_hours),
        Command::Sessions => run_sessions(),
        Command::Setup | Command::Uninstall => Ok(()),
    }
}
