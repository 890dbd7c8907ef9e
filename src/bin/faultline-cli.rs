use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "faultline-cli")]
#[command(about = "Management CLI for the faultline control plane", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stack health and telemetry freshness
    Status,
    /// List the scraper's active targets
    Targets,
    /// Show the current configuration (structured and raw)
    Config,
    /// Validate a candidate without applying it
    Validate {
        /// JSON file with `simple` and/or `raw` sections
        file: PathBuf,
    },
    /// Apply a candidate
    Apply {
        /// JSON file with `simple` and/or `raw` sections
        file: PathBuf,
    },
    /// Roll back to a version, or to the last successful one
    Rollback {
        #[arg(long)]
        version: Option<String>,
    },
    /// List the version history
    History,
    /// List alert rules
    Alerts,
    /// Create an alert rule from a template
    CreateAlert {
        /// service_down, high_error_rate, high_latency_p95, high_cpu or high_memory
        #[arg(long)]
        template: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        duration: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let url = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/api/status", url)).send().await?,
        Commands::Targets => client.get(format!("{}/api/targets", url)).send().await?,
        Commands::Config => client.get(format!("{}/api/config", url)).send().await?,
        Commands::Validate { file } => {
            client
                .post(format!("{}/api/config/validate", url))
                .json(&read_payload(&file)?)
                .send()
                .await?
        }
        Commands::Apply { file } => {
            client
                .post(format!("{}/api/config/apply", url))
                .json(&read_payload(&file)?)
                .send()
                .await?
        }
        Commands::Rollback { version } => {
            client
                .post(format!("{}/api/config/rollback", url))
                .json(&json!({ "versionId": version }))
                .send()
                .await?
        }
        Commands::History => {
            client
                .get(format!("{}/api/version-history", url))
                .send()
                .await?
        }
        Commands::Alerts => client.get(format!("{}/api/alerts", url)).send().await?,
        Commands::CreateAlert {
            template,
            service,
            threshold,
            duration,
        } => {
            client
                .post(format!("{}/api/alerts", url))
                .json(&json!({
                    "template": template,
                    "service": service,
                    "threshold": threshold,
                    "duration": duration,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn read_payload(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", body);
    } else {
        eprintln!("Error: API returned status {}", status);
        eprintln!("{}", body);
        std::process::exit(1);
    }
    Ok(())
}
