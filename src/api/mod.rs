//! API layer - HTTP handlers and routing
//!
//! JSON API for the Atelier server:
//! - Auth endpoints (register, login, password reset)
//! - Artwork CRUD and view counting
//! - Comments and likes
//! - Aggregated site statistics
//! - Image upload and static serving of uploaded files
//! - Health check

pub mod artworks;
pub mod auth;
pub mod comments;
pub mod health;
pub mod likes;
pub mod middleware;
pub mod stats;
pub mod upload;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser, RequestStats};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Routes that require a logged-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route("/artworks", post(artworks::create_artwork))
        .route("/artworks/{id}", put(artworks::update_artwork))
        .route("/artworks/{id}", delete(artworks::delete_artwork))
        .route("/comments", post(comments::create_comment))
        .route("/comments/{id}", delete(comments::delete_comment))
        .route("/likes", post(likes::toggle_like))
        .route("/likes/check", get(likes::check_like))
        .route("/upload/image", post(upload::upload_image))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public browsing, personalized when a session is present
    let browse_routes = Router::new()
        .route("/artworks", get(artworks::list_artworks))
        .route("/artworks/{id}", get(artworks::get_artwork))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    Router::new()
        .route("/artworks/{id}/view", post(artworks::increment_view))
        .route("/artworks/{id}/comments", get(comments::list_comments))
        .route("/stats", get(stats::get_stats))
        .route("/health", get(health::health))
        .nest("/auth", auth::public_router())
        .merge(browse_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // CORS allows cookie-based auth from the configured frontend origin
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let uploads_dir = state.upload_config.path.clone();

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
