//! # CloudPRNT Emulator CLI
//!
//! ## Usage
//!
//! ```bash
//! # Poll every 5 seconds, write jobs to ./jobs
//! cloudprnt-emulator -i 5 -o jobs http://localhost:8080/cloudprnt
//!
//! # Authenticated server, upside-down mounted printer
//! cloudprnt-emulator -i 10 -r -u printer -p secret https://example.com/cloudprnt
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cloudprnt_emulator::{
    CloudPrntError, EmulatorConfig,
    printer::{
        BasicAuth, PrinterIdentity,
        config::{DEFAULT_MAC, DEFAULT_TOPIC_NAMESPACE},
    },
    session::Session,
};

/// CloudPRNT receipt printer emulator
#[derive(Parser, Debug)]
#[command(name = "cloudprnt-emulator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CloudPRNT server URL to poll
    poll_url: String,

    /// Seconds between polls
    #[arg(short, long, env = "CLOUDPRNT_INTERVAL", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Rotate raster jobs by 180 degrees
    #[arg(short, long)]
    rotate: bool,

    /// Basic-auth user name
    #[arg(short, long, env = "CLOUDPRNT_USER")]
    user: Option<String>,

    /// Basic-auth password
    #[arg(short, long, env = "CLOUDPRNT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Printer MAC address
    #[arg(long, default_value = DEFAULT_MAC)]
    mac: String,

    /// Directory to write jobs to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// MQTT topic namespace
    #[arg(long, default_value = DEFAULT_TOPIC_NAMESPACE)]
    topic_namespace: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<EmulatorConfig, CloudPrntError> {
        let mut config = EmulatorConfig::new(&self.poll_url, self.interval)?;
        config.rotate = self.rotate;
        config.identity = PrinterIdentity::new(&self.mac)?;
        config.output_dir = self.output;
        config.topic_namespace = self.topic_namespace;
        config.auth = self.user.map(|user| BasicAuth {
            user,
            password: self.password,
        });
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,cloudprnt_emulator=info",
        1 => "info,cloudprnt_emulator=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CloudPrntError> {
    let config = cli.into_config()?;
    Session::new(config)?.run().await
}
