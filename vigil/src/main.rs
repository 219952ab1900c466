//! `vigil` - run the event router over stdin.
//!
//! Reads an engine configuration, registers its policies and entries, then
//! feeds every stdin line to the router until EOF.

use clap::Parser;
use std::{
    io::{self, BufRead},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vigil::{EngineConfig, RouterAdmin, RouterApi, TesterApi};
use vigil_std::{CatalogBuilder, MemoryStore};

/// vigil - priority-ordered event router
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "vigil.toml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match EngineConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vigil: {e}");
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    if let Err(e) = init_logging(level) {
        eprintln!("vigil: {e}");
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "engine failed");
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| format!("invalid log level: {e}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .with(filter)
        .init();

    Ok(())
}

fn run(config: EngineConfig) -> vigil::Result<()> {
    let store = Arc::new(MemoryStore::with_policies(config.policies.iter().cloned()));
    let builder = Arc::new(CatalogBuilder::new(store));
    let admin = RouterAdmin::new(config.router.clone(), builder, config.decoder())?;

    for entry in config.entries.iter().cloned() {
        admin.post_entry(entry)?;
    }
    for entry in config.test_entries.iter().cloned() {
        admin.post_test_entry(entry)?;
    }
    admin.start()?;
    info!(
        entries = admin.get_entries().len(),
        test_entries = admin.get_test_entries().len(),
        "accepting events on stdin"
    );

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match admin.post_str_event(&line) {
            Ok(()) => {}
            Err(vigil::RouterError::Parse(e)) => warn!(error = %e, "dropping unparsable event"),
            Err(e) => return Err(e),
        }
    }

    admin.stop();
    let stats = admin.stats();
    info!(
        processed = stats.processed,
        failed = stats.failed,
        unmatched = stats.unmatched,
        discarded = stats.discarded,
        "input closed"
    );
    Ok(())
}
