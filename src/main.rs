//! API Mock Server - CLI Entry Point

use anyhow::Result;
use api_mock_server::config::{ConfigStore, FileConfigStore};
use api_mock_server::error::ErrorShape;
use api_mock_server::fixtures::DirFixtureStore;
use api_mock_server::resolver::{AuthOptions, Resolver};
use api_mock_server::server::{MockServer, ServerState};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "api-mock-server",
    about = "Configuration-driven API mock server - canned JSON responses for external client testing",
    version
)]
struct Args {
    /// Path to the endpoint configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory holding the JSON response fixtures
    #[arg(short, long, default_value = "responses")]
    fixtures: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    listen: SocketAddr,

    /// Require authentication headers and body fields on every endpoint
    #[arg(long)]
    require_auth: bool,

    /// Expected applicationId header value (with --require-auth)
    #[arg(long, default_value = "sample_app_Id")]
    application_id: String,

    /// Expected accessKey header value (with --require-auth)
    #[arg(long, default_value = "sample_access_key")]
    access_key: String,

    /// Shape of error response bodies
    #[arg(long, value_enum, default_value_t = ErrorShape::Simple)]
    error_shape: ErrorShape,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print the sample configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print sample config if requested
    if args.print_config {
        print!("{}", include_str!("../config.sample.yaml"));
        return Ok(());
    }

    let store = FileConfigStore::new(&args.config);

    // Validate and exit if requested
    if args.validate {
        if !args.config.exists() {
            anyhow::bail!("Configuration file not found: {:?}", args.config);
        }
        let config = store.load().await?;
        println!(
            "Configuration is valid ({} endpoint(s) defined)",
            config.endpoints.len()
        );
        return Ok(());
    }

    // Create the fixtures directory if absent so fresh setups start clean
    tokio::fs::create_dir_all(&args.fixtures).await?;

    // Startup summary
    match store.load().await {
        Ok(config) if !config.endpoints.is_empty() => {
            info!(
                path = ?args.config,
                endpoints = config.endpoints.len(),
                "Loaded configuration"
            );
            let mut paths: Vec<_> = config.endpoints.keys().cloned().collect();
            paths.sort();
            for path in paths {
                info!("  {}", path);
            }
        }
        Ok(_) => {
            warn!(path = ?args.config, "No endpoints configured, edit the configuration file");
        }
        Err(e) => {
            warn!(path = ?args.config, error = %e, "Configuration is currently invalid, requests will fail until it is fixed");
        }
    }
    info!("Utility endpoints: GET /health, GET /endpoints");

    let mut resolver = Resolver::new(store.clone(), DirFixtureStore::new(&args.fixtures));
    if args.require_auth {
        info!("Authentication gate enabled");
        resolver = resolver.with_auth(AuthOptions {
            application_id: args.application_id,
            access_key: args.access_key,
        });
    }

    let state = ServerState::new(resolver, store, args.error_shape);
    MockServer::new(args.listen, state).run().await
}
