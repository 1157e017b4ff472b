//! # chatlink_api
//!
//! HTTP API library for Chatlink.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chatlink_core::service::ChatService;
use chatlink_core::session::AttributeTokenStore;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{entry, health, hooks, rpc};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    pub config: ApiConfig,
    /// Used when tokens are kept server-side.
    pub attributes: Arc<AttributeTokenStore>,
}

impl AppState {
    pub fn new(service: ChatService, config: ApiConfig) -> Self {
        Self {
            service,
            config,
            attributes: Arc::new(AttributeTokenStore::new()),
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new().route("/api/health", get(health::health_handler));

    // Routes acting for a host user
    let protected = Router::new()
        .route("/", get(entry::entry_handler))
        .route("/api/rpc/{method}", post(rpc::rpc_handler))
        .route(
            "/api/hooks/before-delete-user",
            post(hooks::before_delete_user_handler),
        )
        .route("/api/hooks/after-logout", post(hooks::after_logout_handler))
        .route("/api/hooks/after-login", post(hooks::after_login_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
