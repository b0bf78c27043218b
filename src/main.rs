//! Ingress guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 INGRESS GUARD                 │
//!     Client Request    │  ┌──────────┐  ┌────────┐  ┌──────┐          │
//!     ──────────────────┼─▶│request id│─▶│ trace  │─▶│ size │          │
//!                       │  └──────────┘  └────────┘  └──┬───┘          │
//!                       │                               ▼              │
//!                       │  ┌──────────┐  ┌────────┐  ┌──────┐          │
//!                       │  │ sanitize │◀─│  rate  │◀─│ CORS │          │
//!                       │  └────┬─────┘  └────────┘  └──────┘          │
//!                       │       ▼                                      │
//!     Client Response   │  ┌──────────┐                                │
//!     ◀─────────────────┼──│ handlers │   + hardening headers          │
//!                       │  └──────────┘                                │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ingress_guard::config::load_config;
use ingress_guard::http::handlers;
use ingress_guard::lifecycle::startup;
use ingress_guard::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "ingress-guard", version, about = "Request ingress security pipeline")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("Configuration OK");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init_logging(&config.observability, config.environment) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        "ingress-guard starting"
    );

    match startup::run(config, handlers::routes()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}
