use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use squigscan::{FrequencyRange, PageSnapshot, ScanConfig, TargetKind};
use squigscan_host::scan_cmd::{self, ScanRequest};
use squigscan_host::{logging, serve, snapshot};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "squigscan")]
#[command(about = "Scrape headphone frequency-response curves and rank them against a target")]
#[command(version)]
struct Cli {
    /// TOML scan configuration (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a captured page once and print the ranked results
    Scan {
        /// Page snapshot (.json) or raw HTML file
        input: PathBuf,

        /// Page URL, overriding the one recorded in the snapshot
        #[arg(long)]
        url: Option<String>,

        /// Captured network responses (.json array of {url, contentType, body})
        #[arg(long)]
        responses: Option<PathBuf>,

        /// Target curve: harman, diffuse-field or flat
        #[arg(long, default_value = "harman")]
        target: TargetKind,

        /// Frequency window: "lo-hi" in Hz, or full, bass, midrange, treble
        #[arg(long, default_value = "full")]
        range: FrequencyRange,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a scan session speaking line-delimited JSON on stdin/stdout
    Serve {
        /// Initial page snapshot (.json) or raw HTML file
        input: Option<PathBuf>,

        /// Page URL, overriding the one recorded in the snapshot
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json)?;

    let config = match &cli.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ScanConfig::from_env(),
    };

    match cli.command {
        Commands::Scan {
            input,
            url,
            responses,
            target,
            range,
            json,
        } => {
            let request = ScanRequest {
                input,
                url,
                responses,
                target,
                range,
            };
            scan_cmd::run(&request, &config, json)
        }
        Commands::Serve { input, url } => {
            let page = match &input {
                Some(path) => snapshot::load_page(path, url.as_deref())?,
                None => PageSnapshot {
                    url,
                    ..PageSnapshot::default()
                },
            };
            info!("starting squigscan v{}", env!("CARGO_PKG_VERSION"));
            serve::run(
                page,
                config,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
        }
    }
}
