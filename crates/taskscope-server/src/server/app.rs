use crate::config::CorsConfig;
use crate::server::routes;
use crate::state::AppState;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the CORS layer described by `config`
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allow_any_origin {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the Axum application
pub fn build_app(state: AppState, cors: &CorsConfig) -> Router {
    let api_routes = Router::new()
        // Classification
        .route("/models/:owner/:model_name", get(routes::classify_model))
        // Taxonomy
        .route("/tasks", get(routes::list_tasks))
        .route("/taskNames", get(routes::list_task_names))
        // Cache administration
        .route("/classifications", get(routes::list_classifications))
        .route("/cache/stats", get(routes::cache_stats))
        .route("/cache/purge", post(routes::purge_cache));

    Router::new()
        .route("/", get(routes::landing))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::render_metrics))
        .route("/generate-image", post(routes::generate_image))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
        .with_state(state)
}

/// Run the server until `shutdown` resolves
pub async fn run_server(
    app: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
