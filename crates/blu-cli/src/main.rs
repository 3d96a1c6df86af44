//! blu CLI: find BluOS players on the local network and resolve device
//! arguments to a player address.

mod output;
mod resolve;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use blu_config::{setup, Config, DiscoveryCache};
use blu_discovery::Discovery;
use clap::{Parser, Subcommand};

use crate::resolve::Resolver;

#[derive(Parser)]
#[command(
    name = "blu",
    about = "Find and address BluOS players on the local network",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover players and refresh the device cache.
    Devices {
        /// Discovery deadline in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Do not write the device cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Resolve a device name, alias or address to one player.
    Resolve {
        /// Device id, alias, name, host[:port] or URL.
        #[arg(env = "BLU_DEVICE")]
        device: Option<String>,

        /// Never search the network.
        #[arg(long)]
        no_discover: bool,

        /// Discovery deadline in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = setup::load_config(cli.config.as_deref()).context("loading config")?;
    let cache_path = setup::cache_path()?;
    let cache = DiscoveryCache::load_or_default(&cache_path);

    match cli.command {
        Commands::Devices {
            timeout,
            json,
            no_cache,
        } => {
            let timeout = discovery_timeout(&config, timeout);
            tracing::info!(timeout_secs = timeout.as_secs(), "discovering players");
            let devices = Discovery::new().discover(timeout).await?;

            if !no_cache && config.discovery.write_cache {
                let refreshed =
                    DiscoveryCache::refreshed(chrono::Utc::now(), devices.clone(), &cache);
                refreshed
                    .save(&cache_path)
                    .context("writing discovery cache")?;
            }
            if devices.is_empty() && !cache.is_empty() {
                tracing::warn!(
                    cached = cache.devices.len(),
                    "no devices discovered; try a longer --timeout"
                );
            }

            let mut stdout = io::stdout().lock();
            if json {
                output::write_json(&mut stdout, &devices)?;
            } else {
                output::write_table(&mut stdout, &devices)?;
            }
        }
        Commands::Resolve {
            device,
            no_discover,
            timeout,
            json,
        } => {
            let discovery = Discovery::new();
            let resolver = Resolver {
                config: &config,
                cache: &cache,
                discovery: &discovery,
                allow_discover: !no_discover,
                timeout: discovery_timeout(&config, timeout),
            };
            let device = resolver.resolve(device.as_deref()).await?;

            let mut stdout = io::stdout().lock();
            if json {
                let mut value = serde_json::to_value(&device)?;
                value["base_url"] = serde_json::Value::String(device.base_url());
                output::write_json(&mut stdout, &value)?;
            } else {
                output::write_table(&mut stdout, std::slice::from_ref(&device))?;
                writeln!(stdout, "base url: {}", device.base_url())?;
            }
        }
    }

    Ok(())
}

fn discovery_timeout(config: &Config, flag: Option<u64>) -> Duration {
    flag.map_or_else(|| config.discovery.timeout(), Duration::from_secs)
}
