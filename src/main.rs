//! faultline-control
//!
//! Configuration control plane for the observability stack.
//!
//! # Architecture Overview
//!
//! ```text
//!     API request
//!     ──────────▶ http ──▶ ControlPlane ──▶ ApplyOrchestrator / RollbackOrchestrator
//!                          (write lock)          │
//!                                                ├─▶ store      (managed YAML files)
//!                                                ├─▶ snapshot   (versions.json + snapshots)
//!                                                ├─▶ validation (cross-file rules)
//!                                                ├─▶ effects    (docker restart, scraper reload)
//!                                                └─▶ health     (HTTP probes)
//! ```

use clap::Parser;
use std::path::PathBuf;

use faultline_control::config::loader::load_config;
use faultline_control::lifecycle::startup;
use faultline_control::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "faultline-control")]
#[command(about = "Configuration control plane for the faultline observability stack", long_about = None)]
struct Cli {
    /// Path to a TOML config file (falls back to $FAULTLINE_CONFIG, then defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let path = cli
        .config
        .or_else(|| std::env::var_os("FAULTLINE_CONFIG").map(PathBuf::from));

    let config = load_config(path.as_deref())?;
    init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "faultline-control starting");
    startup::run(config).await
}
