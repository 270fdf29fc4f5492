use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ApiConfig, AppConfig, SecurityConfig};
use crate::handlers::{data, find, public};
use crate::services::EntityService;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EntityService>,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

impl AppState {
    pub fn new(service: EntityService, config: &AppConfig) -> Self {
        Self {
            service: Arc::new(service),
            api: config.api.clone(),
            security: config.security.clone(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.security);

    Router::new()
        // Public
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .route("/auth/login", post(public::login_post))
        // Search before the generic entity routes
        .merge(find_routes())
        .merge(data_routes())
        .with_state(state)
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn find_routes() -> Router<AppState> {
    Router::new()
        .route("/api/find/:entity", get(find::find_get))
        .route("/api/lookup/:entity/:field", get(find::lookup_get))
}

fn data_routes() -> Router<AppState> {
    Router::new()
        .route("/api/:entity", get(data::entity_get).post(data::entity_post))
        .route(
            "/api/:entity/:id",
            get(data::record_get)
                .put(data::record_put)
                .patch(data::record_patch)
                .delete(data::record_delete),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        // No allowed origins: browsers get no CORS headers
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
