//! sangbo - the Sangbo API server.
//!
//! # Usage
//!
//! ```text
//! sangbo serve --entry frontend --address 0.0.0.0:8000
//! sangbo --config config/app.toml routes --entry admin
//! ```

mod controllers;
mod routes;

use anyhow::Context;
use clap::{Parser, Subcommand};
use routes::Entry;
use sangbo_core::{logger, AppConfig, AppContext, Server, ServerConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sangbo", version, about = "Sangbo API server")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "config/app.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one entrypoint's routes over HTTP.
    Serve {
        /// Route table to serve.
        #[arg(long, value_enum, default_value_t = Entry::Frontend)]
        entry: Entry,

        /// Listen address, overriding the configuration.
        #[arg(long)]
        address: Option<String>,
    },
    /// Print an entrypoint's route table.
    Routes {
        /// Route table to print.
        #[arg(long, value_enum, default_value_t = Entry::Frontend)]
        entry: Entry,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Serve { entry, address } => serve(config, entry, address).await,
        Command::Routes { entry } => print_routes(config, entry),
    }
}

/// Read the config file, or fall back to defaults when it does not exist.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return AppConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    let mut config = AppConfig::default();
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

async fn serve(mut config: AppConfig, entry: Entry, address: Option<String>) -> anyhow::Result<()> {
    if let Some(address) = address {
        config.server.address = address;
    }
    logger::init(&config.log)?;
    if config.databases.is_empty() {
        warn!("No databases configured");
    }

    let server_config = ServerConfig::from_settings(&config.server)?;
    let ctx = Arc::new(AppContext::bootstrap(config).await?);
    let router = routes::build(entry, &ctx)?;
    info!(entry = %entry, routes = router.len(), env = %ctx.config().env, "Sangbo starting");

    let result = Server::new(router).with_config(server_config).serve().await;
    ctx.shutdown().await;
    result?;

    info!("Sangbo stopped");
    Ok(())
}

fn print_routes(config: AppConfig, entry: Entry) -> anyhow::Result<()> {
    let cache = sangbo_core::FileCache::new(&config.cache_path)?;
    let ctx = Arc::new(AppContext::from_parts(config, cache, BTreeMap::new()));
    let router = routes::build(entry, &ctx)?;

    for route in router.routes() {
        println!(
            "{:<7} {:<24} {}",
            route.method.as_str(),
            route.pattern(),
            route.middleware_names().join(", ")
        );
    }
    Ok(())
}
