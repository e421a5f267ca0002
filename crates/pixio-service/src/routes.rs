//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::handlers::{dashboard, health, otp, payments, tools, users};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent image tool requests.
/// Each one holds an upload in memory and waits on the image provider.
const IMAGE_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /api/user/register` - Register and receive a token
/// - `POST /api/user/login` - Sign in and receive a token
/// - `POST /api/otp/send` - Mail a verification code
/// - `POST /api/otp/verify` - Check a verification code
///
/// ## User (token auth)
/// - `GET /api/user/credits` - Balance and profile
/// - `POST /api/user/pay-razor` - Create a Razorpay order for a plan
/// - `POST /api/user/verify-razor` - Verify a checkout and credit the account
///
/// ## Image tools (token auth, rate-limited)
/// - `POST /api/image/generate` - Text-to-image (JSON)
/// - `POST /api/image/{enhance,remove-background,remove-text,uncrop,replace-background,cleanup}` (multipart)
///
/// ## Dashboard (token auth)
/// - `GET /api/dashboard/overview`
/// - `GET /api/dashboard/transactions`
/// - `GET /api/dashboard/tool-usage`
/// - `GET /api/dashboard/tool-stats`
/// - `GET /api/dashboard/credit-summary`
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = if state.config.cors_origins.is_empty() {
        vec![state.config.frontend_url.clone()]
    } else {
        state.config.cors_origins.clone()
    };
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);
    let auth = from_fn_with_state(state.clone(), require_auth);

    let user_routes = Router::new()
        .route("/credits", get(users::credits))
        .route("/pay-razor", post(payments::create_payment))
        .route("/verify-razor", post(payments::verify_payment))
        .route_layer(auth.clone())
        .route("/register", post(users::register))
        .route("/login", post(users::login));

    let otp_routes = Router::new()
        .route("/send", post(otp::send_otp))
        .route("/verify", post(otp::verify_otp));

    // Image tools wait on the provider, so they get their own, lower limit.
    let image_routes = Router::new()
        .route("/generate", post(tools::generate))
        .route("/enhance", post(tools::enhance))
        .route("/remove-background", post(tools::remove_background))
        .route("/remove-text", post(tools::remove_text))
        .route("/uncrop", post(tools::uncrop))
        .route("/replace-background", post(tools::replace_background))
        .route("/cleanup", post(tools::cleanup))
        .route_layer(auth.clone())
        .layer(ConcurrencyLimitLayer::new(IMAGE_MAX_CONCURRENT_REQUESTS));

    let dashboard_routes = Router::new()
        .route("/overview", get(dashboard::get_overview))
        .route("/transactions", get(dashboard::list_transactions))
        .route("/tool-usage", get(dashboard::list_tool_usage))
        .route("/tool-stats", get(dashboard::get_tool_stats))
        .route("/credit-summary", get(dashboard::get_credit_summary))
        .route_layer(auth);

    let api_routes = Router::new()
        .nest("/user", user_routes)
        .nest("/otp", otp_routes)
        .nest("/dashboard", dashboard_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .nest("/image", image_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
