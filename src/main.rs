/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Up Core. Aggregates available updates
    from the apt and flatpak sources, presents them, and
    installs the operator's selection with elevation.

  Security / Safety Notes:
    Elevation goes through PolicyKit when available, falling
    back to sudo with a terminal secret prompt. Secrets are
    held in memory only, inside a bounded trust window.

  Dependencies:
    clap for CLI parsing, dialoguer for the secret prompt,
    chrono for session stamps, libc for the euid probe.

  Operational Scope:
    The sole presentation layer: consumes the aggregator's
    event interface exclusively and owns the event loop task.

  Revision History:
    2025-08-29 COD  Authored Syn-Up Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Explicitly constructed context, no hidden globals
============================================================*/

mod apt;
mod auth;
mod bridge;
mod config;
mod error;
mod flatpak;
mod logger;
mod manager;
mod polkit;
mod privileges;
mod proc;
mod record;
mod source;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{ArgAction, Parser};

use apt::AptSource;
use auth::AuthPrompt;
use bridge::{event_channel, EventKind, UpdateEvent};
use config::SynupConfig;
use error::{Result, SynupError};
use flatpak::FlatpakSource;
use logger::Logger;
use manager::UpdateManager;
use privileges::PrivilegeBroker;
use proc::SystemRunner;
use record::UpdateRecord;
use source::UpdateSource;

/// Command-line arguments for Syn-Up-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Up-Core",
    version,
    author = "Synavera Systems",
    about = "Update aggregation and installation core for Syn-Up"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Install specific updates by name or package id.
    #[arg(long = "install", value_name = "PKG", action = ArgAction::Append)]
    install: Vec<String>,
    /// Install every available update.
    #[arg(long, action = ArgAction::SetTrue)]
    install_all: bool,
    /// Skip the apt source.
    #[arg(long, action = ArgAction::SetTrue)]
    no_apt: bool,
    /// Skip the flatpak source.
    #[arg(long, action = ArgAction::SetTrue)]
    no_flatpak: bool,
    /// Write the PolicyKit policy descriptor and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    setup_policy: bool,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

/// Terminal implementation of the modal secret dialog.
struct TerminalPrompt;

impl AuthPrompt for TerminalPrompt {
    fn request_secret(&self, message: &str) -> Option<String> {
        dialoguer::Password::new()
            .with_prompt(message)
            .interact()
            .ok()
    }

    fn notify_failure(&self, message: &str) {
        eprintln!("Authentication failed: {message}");
    }
}

fn effective_root() -> bool {
    // Safety: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Up-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.no_apt && cli.no_flatpak {
        return Err(SynupError::Config(
            "Cannot disable both the apt and flatpak sources".into(),
        ));
    }

    let config = SynupConfig::load_from_optional_path(cli.config.as_deref())?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .or_else(|| Some(config.log_dir().join(format!("core_{session_stamp}.log"))));
    let logger = Arc::new(Logger::new(log_path, cli.verbose)?);
    logger.info("INIT", "Syn-Up Core awakening.");

    if cli.setup_policy {
        let path = polkit::setup_policy(&config.log_dir())?;
        logger.info(
            "POLICY",
            format!("PolicyKit policy saved to: {}", path.display()),
        );
        println!("Policy descriptor written to {}", path.display());
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }

    let runner = Arc::new(SystemRunner);
    let prompt = Arc::new(TerminalPrompt);
    let privileges = Arc::new(PrivilegeBroker::new(
        &config,
        polkit::pkexec_available(),
        runner.clone(),
        prompt,
        logger.clone(),
        effective_root(),
    ));

    let query_deadline = Duration::from_secs(config.timeouts.query_secs);
    let install_deadline = Duration::from_secs(config.timeouts.install_secs);

    let mut sources: Vec<Arc<dyn UpdateSource>> = Vec::new();
    if !cli.no_apt {
        sources.push(Arc::new(AptSource::new(
            runner.clone(),
            privileges.clone(),
            logger.clone(),
            query_deadline,
        )));
    }
    if !cli.no_flatpak {
        sources.push(Arc::new(FlatpakSource::new(
            runner.clone(),
            logger.clone(),
            query_deadline,
            install_deadline,
        )));
    }

    let (bus, mut event_loop) = event_channel();
    event_loop.subscribe(EventKind::UpdatesFound, |event| {
        if let UpdateEvent::UpdatesFound(records) = event {
            print_updates(records);
        }
    });
    event_loop.subscribe(EventKind::UpdateProgress, |event| {
        if let UpdateEvent::UpdateProgress { percent, name } = event {
            println!("[{percent:>5.1}%] {name}");
        }
    });

    let manager = UpdateManager::new(sources, bus, logger.clone());

    manager.refresh();
    while let Some(event) = event_loop.dispatch_next().await {
        if matches!(event, UpdateEvent::RefreshComplete) {
            break;
        }
    }

    let counts = manager.counts();
    logger.info(
        "SUMMARY",
        format!(
            "total={} apt={} flatpak={} security={}",
            counts.total, counts.apt, counts.flatpak, counts.security
        ),
    );
    println!(
        "{} updates available ({} apt, {} flatpak, {} security)",
        counts.total, counts.apt, counts.flatpak, counts.security
    );

    if !cli.install_all && cli.install.is_empty() {
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }

    let selection = select_records(manager.current_updates(), &cli.install, cli.install_all);
    if selection.is_empty() {
        logger.warn("SELECT", "No matching updates selected; nothing to do");
        logger.finalize()?;
        return Ok(ExitCode::SUCCESS);
    }

    logger.info(
        "SELECT",
        format!("{} updates selected for installation", selection.len()),
    );
    manager.install(selection);

    let mut batch_success = false;
    while let Some(event) = event_loop.dispatch_next().await {
        if let UpdateEvent::UpdateComplete { success, failed } = event {
            batch_success = success;
            if success {
                println!("All selected updates installed.");
            } else {
                println!("Some updates could not be installed: {}", failed.join(", "));
                println!(
                    "Possible causes: authentication was declined, a package \
                     source is unreachable, or the package state changed."
                );
            }
            break;
        }
    }

    // The process is ending; do not leave a verified secret behind.
    privileges.clear_credentials();

    logger.info("COMPLETE", "Session finished.");
    logger.finalize()?;

    Ok(if batch_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_updates(records: &[UpdateRecord]) {
    for record in records {
        let marker = if record.is_security { " [security]" } else { "" };
        println!(
            "{:<12} {:<40} {} -> {} ({}){}",
            record.source.as_str(),
            record.name,
            record.current_version,
            record.new_version,
            record.size,
            marker
        );
    }
}

/// Resolve the operator's selection against the current list. Names
/// match either the display name or the package id.
fn select_records(
    available: Vec<UpdateRecord>,
    requested: &[String],
    install_all: bool,
) -> Vec<UpdateRecord> {
    if install_all {
        return available;
    }
    available
        .into_iter()
        .filter(|record| {
            requested
                .iter()
                .any(|req| req == &record.name || req == &record.package_id)
        })
        .collect()
}
