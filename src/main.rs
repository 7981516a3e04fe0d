//! litsearch service entry point

use std::sync::Arc;

use clap::{Parser, Subcommand};
use litsearch::{create_router, Config, SearchRequest, SearchType, ServiceCoordinator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// litsearch: medical literature search service
#[derive(Parser, Debug)]
#[command(name = "litsearch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable JSON logging format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default behavior)
    Serve {
        /// Bind address. If not specified, uses config file value.
        #[arg(long)]
        host: Option<String>,
        /// HTTP port. If not specified, uses config file value.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one search and print the response as JSON
    Search {
        /// Search query
        query: String,
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,
        /// Results per page
        #[arg(long, default_value = "30")]
        page_size: u32,
        /// Search type (keyword, vector or hybrid)
        #[arg(short = 't', long = "type", default_value = "keyword")]
        search_type: String,
        /// Run the LLM relevance gate on vector results
        #[arg(long)]
        llm: bool,
    },
    /// Inspect the result cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Print a stored search response
    Get {
        /// Search ID
        search_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // One-shot commands print JSON on stdout, so logs go to stderr.
    let is_serve = matches!(args.command, Some(Command::Serve { .. }) | None);
    init_tracing(args.json_logs, is_serve);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Some(Command::Serve { host, port }) => serve(config, host, port).await,
        None => serve(config, None, None).await,
        Some(Command::Search {
            query,
            page,
            page_size,
            search_type,
            llm,
        }) => {
            let coordinator = ServiceCoordinator::new(config).await?;
            let request = SearchRequest::new(query)
                .page(page)
                .page_size(page_size)
                .search_type(SearchType::parse_lenient(&search_type))
                .enable_llm(llm);
            request.validate()?;

            let response = coordinator.search(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Some(Command::Cache {
            action: CacheCommand::Get { search_id },
        }) => {
            let coordinator = ServiceCoordinator::new(config).await?;
            match coordinator.cached(&search_id).await? {
                Some(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    Ok(())
                }
                None => anyhow::bail!("Search not found: {}", search_id),
            }
        }
    }
}

fn init_tracing(json_logs: bool, is_serve: bool) {
    let default_level = if is_serve { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => Config::load()?,
    };
    Ok(config)
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!("Starting litsearch v{}", env!("CARGO_PKG_VERSION"));

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!(
        environment = %config.server.environment,
        engine = %config.engine.base_url(),
        index = %config.engine.index,
        cache = ?config.cache.backend,
        "Configuration loaded"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server_config = config.server.clone();
    let coordinator = Arc::new(ServiceCoordinator::new(config).await?);
    let app = create_router(coordinator, &server_config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
