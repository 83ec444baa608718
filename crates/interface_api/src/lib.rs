//! HTTP API Layer
//!
//! This crate provides the REST API for the loyalty ledger core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers delegating to the points engine
//! - **Middleware**: Authentication, tenancy context, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses with machine-readable codes
//!
//! Handlers never touch the store directly: every operation goes through
//! `PointsEngine`, and every protected route receives the `RequestContext`
//! the auth middleware builds from the bearer token's org and actor claims.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(engine, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use domain_ledger::PointsEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{customers, health, ledger, services};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PointsEngine>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `engine` - The points engine, already wired to a ledger store
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(engine: Arc<PointsEngine>, config: ApiConfig) -> Router {
    let state = AppState { engine, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Customer routes
    let customer_routes = Router::new()
        .route("/", post(customers::register_customer))
        .route("/:id", get(customers::get_customer))
        .route("/:id/balance", get(customers::get_balance))
        .route("/:id/expiring-lots", get(customers::list_expiring_lots))
        .route("/:id/ledger", get(customers::list_ledger))
        .route("/:id/consistency", get(customers::check_consistency));

    // Service and rule routes
    let service_routes = Router::new()
        .route("/", post(services::register_service))
        .route("/:id", get(services::get_service))
        .route("/:id/rules", post(services::create_rule))
        .route("/:id/rules", get(services::list_rules))
        .route("/:id/rules/active", get(services::get_active_rule))
        .route("/:id/earn-preview", get(services::preview_earn));

    // Ledger command routes
    let ledger_routes = Router::new()
        .route("/earns", post(ledger::record_earn))
        .route("/earns/:id/reversal", post(ledger::reverse_earn))
        .route("/redemptions", post(ledger::record_redemption))
        .route("/adjustments", post(ledger::record_adjustment))
        .route("/sweeps", post(ledger::sweep_expired));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .nest("/services", service_routes)
        .nest("/ledger", ledger_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
