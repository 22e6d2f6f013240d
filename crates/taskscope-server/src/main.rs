//! taskscope
//!
//! Classifies registry models with an LLM behind a read-through cache.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::time::Duration;
use taskscope_server::cli::{Cli, Commands, SeedArgs, ServeArgs};
use taskscope_server::seed::{self, SeedOptions};
use taskscope_server::{build_app, run_server, AppState, ServiceConfig};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Seed(args) => run_seed(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    init_tracing(args.verbose);

    info!("Starting taskscope");
    let config = ServiceConfig::load(&args.config, &args)?;
    info!("Registry: {}", config.registry.base_url);
    info!("LLM: {} at {}", config.llm.model, config.llm.base_url);
    if config.registry.token().is_none() {
        warn!("{} is not set; registry calls are unauthenticated", config.registry.token_env);
    }
    if config.llm.api_key().is_none() {
        warn!("{} is not set; completion calls are unauthenticated", config.llm.api_key_env);
    }

    let metrics_handle = init_metrics()?;
    let state = AppState::from_config(&config)?.with_metrics(metrics_handle);
    let app = build_app(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", args.listen, args.port).parse()?;
    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    run_server(app, addr, shutdown).await
}

async fn run_seed(args: SeedArgs) -> Result<()> {
    init_tracing(args.verbose);

    let models = seed::most_run(seed::load_models(&args.models)?, args.max);
    info!("Seeding the cache with the {} most run models", models.len());

    let options = SeedOptions {
        target: args.target,
        delay: Duration::from_secs(args.delay_secs),
    };
    seed::run_seed(&reqwest::Client::new(), &models, &options).await?;
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("taskscope=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("taskscope=info,tower_http=warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "taskscope_classifications_total",
        "Classifications served, labelled by cache hit or miss"
    );
    metrics::describe_counter!("taskscope_errors_total", "Failed requests by error kind");
    metrics::describe_histogram!(
        "taskscope_llm_latency_ms",
        metrics::Unit::Milliseconds,
        "Completion call latency in milliseconds"
    );
    metrics::describe_counter!(
        "taskscope_cache_purged_total",
        "Cache entries removed by purges"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
