//! # Feed Server
//!
//! HTTP entry layer for a small social feed: accounts, channels, posts,
//! follows and a personal feed.
//!
//! ## Request pipeline
//!
//! Every request passes through the same stages, outermost first:
//!
//! | Stage | Guarantees to the stages after it |
//! |-------|-----------------------------------|
//! | access log | exactly one line is recorded once the response exists |
//! | CORS | preflights answered; grant headers only for the allowed origin |
//! | recover | a panic below becomes a 500 and the server keeps running |
//! | trace | request span for diagnostics |
//! | body limit | bodies larger than 16 KiB are rejected |
//! | auth (private routes) | a resolved [`auth::CurrentUser`] is in the request |
//!
//! ## API Overview
//!
//! | Endpoint | Method | Auth | Description |
//! |----------|--------|------|-------------|
//! | `/health` | GET | no | Health check |
//! | `/signup` | POST | no | Create account |
//! | `/login` | POST | no | Issue session token |
//! | `/` | GET | yes | Caller's profile |
//! | `/channels` | GET, POST, PATCH, DELETE | yes | Own channels |
//! | `/post` | POST, GET, DELETE | yes | Posts in a channel |
//! | `/myPost` | GET | yes | Posts in own channels |
//! | `/follow` | POST, DELETE | yes | Follow / unfollow a channel |
//! | `/newPost` | GET | yes | Feed from followed channels |
//! | `/following` | GET | yes | Followed channels |

pub mod access_log;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

pub use access_log::AccessLog;
pub use config::Config;
pub use handlers::AppState;
pub use services::{ServiceError, Services};
pub use store::MemoryServices;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

/// Maximum request body size (16 KiB).
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Build the Axum router with all endpoints and middleware.
///
/// `access_log` is owned by the returned router; every request it serves is
/// recorded there.
pub fn build_router(state: AppState, config: &Config, access_log: Arc<AccessLog>) -> Router {
    // A known path with an unsupported method is answered like an unknown path
    let public = Router::new()
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .route("/signup", post(handlers::sign_up).fallback(handlers::not_found))
        .route("/login", post(handlers::login).fallback(handlers::not_found));

    let private = Router::new()
        .route("/", get(handlers::main_page).fallback(handlers::not_found))
        .route(
            "/channels",
            get(handlers::get_channels)
                .post(handlers::create_channel)
                .patch(handlers::update_channel)
                .delete(handlers::delete_channel)
                .fallback(handlers::not_found),
        )
        .route(
            "/post",
            post(handlers::create_post)
                .get(handlers::get_posts)
                .delete(handlers::delete_post)
                .fallback(handlers::not_found),
        )
        .route(
            "/myPost",
            get(handlers::get_my_channel_posts).fallback(handlers::not_found),
        )
        .route(
            "/follow",
            post(handlers::follow)
                .delete(handlers::unfollow)
                .fallback(handlers::not_found),
        )
        .route(
            "/newPost",
            get(handlers::get_new_posts).fallback(handlers::not_found),
        )
        .route(
            "/following",
            get(handlers::get_following).fallback(handlers::not_found),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(private)
        .fallback(handlers::not_found)
        // ServiceBuilder order: first layer = outermost stage
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    access_log,
                    access_log::record_access,
                ))
                .layer(middleware::cors_layer(&config.allowed_origin))
                .layer(CatchPanicLayer::custom(middleware::handle_panic))
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE)),
        )
        .with_state(state)
}
