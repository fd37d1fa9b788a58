//! Vantage Web Server
//!
//! Axum-based REST API serving aggregations over the insights dataset.
//!
//! - Read-only endpoints under a configurable base path (default `/insights`)
//! - `/health` at the root reporting store reachability
//! - JSON `{error}` envelope on every failure, panics included

use std::any::Any;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use vantage_core::store::{InsightStore, StoreClient};

mod handlers;

/// Default mount point of the insight routes
pub const DEFAULT_BASE_PATH: &str = "/insights";

/// Message returned for any failure whose details must stay server-side
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Path the insight routes are nested under
    pub base_path: String,
    /// Allowed CORS origins (empty = any origin)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            allowed_origins: vec![],
        }
    }
}

/// Normalize a base path to `/segment[/segment]`, or empty for the root
fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Shared application state
pub struct AppState {
    pub store: StoreClient,
    pub config: ServerConfig,
}

/// Create the application router
pub fn create_router(store: StoreClient, config: ServerConfig) -> Router {
    let base_path = normalize_base_path(&config.base_path);
    let state = Arc::new(AppState {
        store,
        config: config.clone(),
    });

    let insight_routes = Router::new()
        .route("/all", get(handlers::list_all_insights))
        .route("/sectors", get(handlers::get_sectors))
        .route("/regions", get(handlers::get_regions))
        .route("/insights-over-time", get(handlers::get_insights_over_time))
        .route("/likelihood-intensity", get(handlers::get_likelihood_intensity))
        .route("/relevance-likelihood", get(handlers::get_relevance_likelihood));

    let router = Router::new().route("/health", get(handlers::health));
    // Nesting at "/" is not allowed, so a root mount merges instead
    let router = if base_path.is_empty() {
        router.merge(insight_routes)
    } else {
        router.nest(&base_path, insight_routes)
    };

    apply_layers(router.with_state(state), &config)
}

/// Check that every configured CORS origin is a valid header value
pub fn validate_allowed_origins(origins: &[String]) -> anyhow::Result<()> {
    for origin in origins {
        if origin.parse::<HeaderValue>().is_err() {
            anyhow::bail!("Invalid CORS origin: {:?}", origin);
        }
    }
    Ok(())
}

/// Wrap a router in the middleware stack (outermost first)
pub(crate) fn apply_layers(router: Router, config: &ServerConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o.escape_debug(), "Ignoring malformed CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )),
    )
}

/// Convert a handler panic into the generic 500 envelope
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "Handler panicked");

    AppError::internal(INTERNAL_ERROR_MESSAGE).into_response()
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    store: StoreClient,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    validate_allowed_origins(&config.allowed_origins)?;
    check_store_connection(&store).await;

    let base_path = normalize_base_path(&config.base_path);
    let app = create_router(store, config);
    let addr = format!("{}:{}", host, port);

    info!(
        "Starting server at http://{}{}",
        addr,
        if base_path.is_empty() {
            "/"
        } else {
            base_path.as_str()
        }
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log store reachability at startup
///
/// An unreachable store does not stop the server; requests will report the failure.
async fn check_store_connection(store: &StoreClient) {
    if store.health_check().await {
        info!("✅ Store connected: {}", store.describe());
    } else {
        warn!("⚠️  Store configured but not responding: {}", store.describe());
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

/// Store and validation failures are reported to the client with their
/// message; a crashed background task is not.
impl From<vantage_core::Error> for AppError {
    fn from(err: vantage_core::Error) -> Self {
        match err {
            vantage_core::Error::Join(e) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: INTERNAL_ERROR_MESSAGE.to_string(),
                internal: Some(e.into()),
            },
            other => {
                warn!(error = %other, "Request failed");
                Self::bad_request(&other.to_string())
            }
        }
    }
}
