//! # Braid CLI Entry Point
//!
//! Main binary for the braid HTTP composition router. Loads the JSON
//! configuration document, compiles the service graphs, and runs the
//! front-end server.
//!
//! ## Usage
//!
//! ```bash
//! braid -c /etc/braid/config.json
//! ```
//!
//! Startup failures (unreadable or invalid configuration, graph
//! compilation errors, bind failures) print a diagnostic to stderr and
//! exit with code 1.

use std::process::ExitCode;

use argh::FromArgs;
use braid_common::config::Config;
use braid_orchestrator::HttpServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// braid - HTTP composition router
#[derive(FromArgs)]
struct Cli {
    /// path to the JSON configuration file
    #[argh(option, short = 'c')]
    config: String,
}

fn main() -> ExitCode {
    let cli: Cli = argh::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "braid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(&cli.config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    tracing::info!(
        config = %config_path,
        port = config.port(),
        threads = config.threads,
        "braid starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.threads)
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let server = HttpServer::from_config(&config)?;
        server.run().await
    })?;
    Ok(())
}
