//! Command-line entry point for the target file generator.
//!
//! Every option carries an environment fallback so cron deployments run the
//! binary without any flags: the NetBox location and token come from the
//! environment, output locations default to the conventional Prometheus
//! paths.

use std::{path::PathBuf, process};

use clap::{ArgAction, Parser};
use netbox_prom_sd::{Error, Filter, NetBoxClient, TargetBuilder};
use tracing_subscriber::EnvFilter;

/// Command line interface for generating Prometheus targets from NetBox.
#[derive(Debug, Parser)]
#[command(
    name = "netbox-prom-sd",
    version,
    about = "Generate Prometheus file_sd targets and metadata metrics from NetBox"
)]
struct Cli {
    /// Base URL of the NetBox instance.
    #[arg(long, env = "NETBOX_URL", default_value = "https://netbox.example.net")]
    url: String,

    /// API token used to authenticate against NetBox.
    #[arg(long, env = "NETBOX_TOKEN", hide_env_values = true)]
    token: String,

    /// Devices and VMs in all sites carrying this tag are polled.
    #[arg(long, env = "NETBOX_SITE_TAG", default_value = "prometheus")]
    site_tag: String,

    /// Directory receiving the generated target files.
    #[arg(long, env = "PROM_TARGETS_DIR", default_value = "/etc/prometheus/targets.d")]
    targets_dir: PathBuf,

    /// Path of the rendered netbox_meta exposition file.
    #[arg(long, env = "PROM_METRICS_FILE", default_value = "/var/www/html/metrics/netbox")]
    metrics_file: PathBuf,

    /// Skip TLS certificate verification for the NetBox API.
    #[arg(long, env = "NETBOX_INSECURE", action = ArgAction::SetTrue)]
    insecure: bool
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("{}", error.to_display_string());
        process::exit(1);
    }
}

/// Executes one full generation run.
///
/// # Errors
///
/// Propagates errors from the NetBox client, rendering, and file writes;
/// nothing is written unless every collection query succeeded.
async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let client = NetBoxClient::new(&cli.url, &cli.token, !cli.insecure)?;

    let site_ids = client.site_ids(&cli.site_tag).await?;
    let filter = Filter::default()
        .fields("site_id", site_ids.iter().map(u64::to_string))
        .field("status", "active");

    let mut builder = TargetBuilder::new();
    builder.build(&client, &filter).await?;

    builder.write_targets(&cli.targets_dir)?;
    builder.write_metrics(&cli.metrics_file)?;

    Ok(())
}
