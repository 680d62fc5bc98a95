//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use flagstore_client::{Client, InitError};
use flagstore_store::RedisFlagStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::handlers::{self, AppState};
use crate::seed;
use crate::server::Server;
use crate::settings::Settings;

/// Feature flag evaluation server backed by Redis.
#[derive(Debug, Parser)]
#[command(name = "flagstore")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the flag evaluation API
    Serve(ServeArgs),
    /// Write flag definitions from a JSON file into Redis
    Seed(SeedArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on [default: settings `port`]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Settings file (JSON, TOML or .env)
    #[arg(short, long, env = "FLAGSTORE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// JSON file of flag definitions
    #[arg(short, long)]
    pub file: PathBuf,

    /// Replace every flag in the store instead of writing versioned updates
    #[arg(long)]
    pub replace: bool,

    /// Settings file (JSON, TOML or .env)
    #[arg(short, long, env = "FLAGSTORE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve(args).await,
            Command::Seed(args) => seed_store(args).await,
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let _guard = settings.log_config().init()?;
    let port = args.port.unwrap_or(settings.port);
    info!(settings = ?settings, port, "Starting flagstore");

    let client = match Client::connect(settings.client_config()).await {
        Ok(client) => Some(Arc::new(client)),
        Err(InitError::MissingSdkKey) => {
            error!("No SDK key configured; set FLAGSTORE_SDK_KEY. Flag requests will get 503");
            None
        }
        Err(e) => return Err(e.into()),
    };

    let state = Arc::new(AppState::new(client.clone(), settings.application.clone()));
    let listener = Server::bind(port).await?;
    let served = Server::new(handlers::router(state))
        .serve(listener, shutdown_signal())
        .await;

    if let Some(client) = client {
        client.close().await;
    }
    served
}

async fn seed_store(args: SeedArgs) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let _guard = settings.log_config().init()?;

    let definitions = seed::load_definitions(&args.file)?;
    let store = RedisFlagStore::connect_lazy(settings.redis_config(), settings.prefix.clone())?;
    let report = seed::seed(&store, definitions, args.replace).await?;

    println!(
        "Seeded {} flag(s) into {} ({} already up to date)",
        report.written,
        store.features_key(),
        report.skipped
    );
    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["flagstore", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Command::Serve(args) => assert_eq!(args.port, Some(9000)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_seed() {
        let cli = Cli::try_parse_from(["flagstore", "seed", "--file", "flags.json", "--replace"]).unwrap();
        match cli.command {
            Command::Seed(args) => {
                assert_eq!(args.file, PathBuf::from("flags.json"));
                assert!(args.replace);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["flagstore", "seed"]).is_err());
    }
}
