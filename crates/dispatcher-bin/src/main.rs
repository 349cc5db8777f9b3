//! Outbox dispatcher - delivers queued transactional email.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dispatcher_config_and_utils::{init_logging, Config};

/// Outbox dispatcher command-line interface.
#[derive(Parser)]
#[command(name = "outbox-dispatcher")]
#[command(about = "Delivers pending rows of the email outbox")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides OUTBOX_LOG_LEVEL
    /// and the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// JSON file with non-secret settings. Environment variables win.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the trigger endpoint
    Serve {
        /// Address to listen on (overrides OUTBOX_BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,

        /// Also run an invocation every N seconds
        #[arg(long)]
        tick_secs: Option<u64>,
    },
    /// Run a single invocation and exit
    Drain {
        /// Rows to claim, clamped to 1..=20
        #[arg(short = 'n', long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Missing secrets stop the process here, before anything is served.
    let config = Config::load(cli.config.as_deref())?;

    init_logging(config.resolved_log_level(cli.log_level.as_deref()));

    match cli.command {
        Some(Commands::Serve { bind, tick_secs }) => {
            app::serve(config, bind, tick_secs).await?;
        }
        None => {
            app::serve(config, None, None).await?;
        }
        Some(Commands::Drain { limit }) => {
            app::drain(config, limit).await?;
        }
    }

    Ok(())
}
