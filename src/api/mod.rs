mod handlers;
pub mod middleware;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::db::AnswerStore;
use crate::error::TaxonomyError;
use crate::taxonomy::{Taxonomy, TaxonomyCache};

pub use handlers::{GetAnswersQuery, TaxonomyQuery, TaxonomyResponse};
pub use middleware::RateLimiter;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub taxonomy: TaxonomyCache,
    pub answers: AnswerStore,
    /// Source key of the taxonomy served by this instance.
    pub taxonomy_key: String,
    /// Include error details in responses.
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(taxonomy: TaxonomyCache, answers: AnswerStore, taxonomy_key: impl Into<String>) -> Self {
        Self {
            taxonomy,
            answers,
            taxonomy_key: taxonomy_key.into(),
            expose_error_details: false,
        }
    }

    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    async fn load_taxonomy(&self) -> Result<std::sync::Arc<Taxonomy>, ApiError> {
        self.taxonomy
            .get_or_build(&self.taxonomy_key)
            .await
            .map_err(|error| ApiError::Taxonomy {
                error,
                expose_details: self.expose_error_details,
            })
    }
}

/// HTTP layer settings that are not part of handler state.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    pub rate_limiter: Option<RateLimiter>,
    pub request_timeout: Duration,
}

impl RouterOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        let rate_limiter = (config.rate_limit.max_requests > 0).then(|| {
            RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window)
                .trust_proxy_headers(config.rate_limit.trust_proxy_headers)
        });
        Self {
            cors_origins: config.cors_origins.clone(),
            rate_limiter,
            request_timeout: config.request_timeout,
        }
    }

    /// Limit each client to `max_requests` per `window`. Zero disables
    /// limiting.
    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.rate_limiter = (max_requests > 0).then(|| RateLimiter::new(max_requests, window));
        self
    }
}

impl Default for RouterOptions {
    /// Permissive CORS, no rate limiting, 30 second timeout.
    fn default() -> Self {
        Self {
            cors_origins: None,
            rate_limiter: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    create_router_with(state, RouterOptions::default())
}

pub fn create_router_with(state: AppState, options: RouterOptions) -> Router {
    let mut api = Router::new()
        .route("/health", get(handlers::health))
        .route("/taxonomy", get(handlers::get_taxonomy))
        .route("/taxonomy/tree", get(handlers::get_taxonomy_tree))
        .route("/topics", get(handlers::get_topics))
        .route(
            "/answers",
            post(handlers::save_answer).get(handlers::get_answers),
        )
        .route("/answers/bulk", post(handlers::save_answers))
        .route("/answers/{node_id}", get(handlers::get_answer));

    if let Some(limiter) = options.rate_limiter {
        api = api.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    Router::new()
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(options.request_timeout))
                .layer(cors_layer(options.cors_origins.as_deref()))
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
        .with_state(state)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

// ============================================================
// Error Handling
// ============================================================

/// JSON body for taxonomy, routing and rate limit errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: None,
            details: None,
        }
    }
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Taxonomy {
        error: TaxonomyError,
        expose_details: bool,
    },
    /// Invalid request, reported as `{"error": ...}`.
    BadRequest(String),
    /// Missing resource, reported as `{"error": ...}`.
    NotFound(String),
    Internal(anyhow::Error),
}

/// Wrap a store failure. The client only sees a generic message.
fn internal_error(e: anyhow::Error) -> ApiError {
    ApiError::Internal(e)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Taxonomy {
                error,
                expose_details,
            } => {
                let (status, message) = match &error {
                    TaxonomyError::SourceRead { .. } => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to read taxonomy source".to_string(),
                    ),
                    other => (StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
                };
                if status.is_server_error() {
                    tracing::error!("Taxonomy error: {}", error);
                } else {
                    tracing::warn!("Taxonomy error: {}", error);
                }
                let body = ErrorBody {
                    code: Some(error.code().to_string()),
                    details: expose_details.then(|| serde_json::json!(error.to_string())),
                    ..ErrorBody::new(message)
                };
                (status, Json(body)).into_response()
            }
            Self::BadRequest(message) => {
                tracing::warn!("Validation error: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": message })),
                )
                    .into_response()
            }
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            Self::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}
