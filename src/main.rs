//! Atelier - a community server for publishing and discussing artwork

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier::{
    api::{self, AppState, RequestStats},
    config::Config,
    db::{migrations, Gateway},
    db::repositories::{
        SqlxArtworkRepository, SqlxCommentRepository, SqlxLikeRepository, SqlxSessionRepository,
        SqlxUserRepository,
    },
    services::{
        ArtworkService, CommentService, EmailService, LikeService, LoginRateLimiter,
        StatsService, UserService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Atelier server...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // The gateway connects lazily; a store that is down at startup only
    // degrades request handling, it does not keep the server from starting.
    let gateway = Gateway::shared(config.database.clone());
    match gateway.acquire().await {
        Ok(pool) => {
            migrations::run_migrations(&pool).await?;
            tracing::info!("Database ready: {}", config.database.url);
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "store unreachable at startup; continuing, handlers will retry"
            );
        }
    }

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(gateway.clone());
    let session_repo = SqlxSessionRepository::boxed(gateway.clone());
    let artwork_repo = SqlxArtworkRepository::boxed(gateway.clone());
    let comment_repo = SqlxCommentRepository::boxed(gateway.clone());
    let like_repo = SqlxLikeRepository::boxed(gateway.clone());

    // Initialize services
    let user_service = Arc::new(UserService::new(user_repo.clone(), session_repo));
    let artwork_service = Arc::new(ArtworkService::new(artwork_repo.clone()));
    let comment_service = Arc::new(CommentService::new(
        comment_repo.clone(),
        artwork_repo.clone(),
    ));
    let like_service = Arc::new(LikeService::new(like_repo.clone()));
    let stats_service = Arc::new(StatsService::new(
        artwork_repo,
        user_repo,
        comment_repo,
        like_repo,
    ));
    let email_service = Arc::new(EmailService::new(
        config.email.clone(),
        config.server.base_url.clone(),
    ));

    let rate_limiter = Arc::new(LoginRateLimiter::new());
    let request_stats = Arc::new(RequestStats::new());

    // Build application state
    let state = AppState {
        gateway: gateway.clone(),
        user_service: user_service.clone(),
        artwork_service,
        comment_service,
        like_service,
        stats_service,
        email_service,
        upload_config: Arc::new(config.upload.clone()),
        rate_limiter: rate_limiter.clone(),
        request_stats,
    };

    // Rate limiter sweep task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.sweep().await;
            }
        });
    }

    // Expired-session sweep task (runs hourly)
    {
        let users = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match users.sweep_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!("Removed {} expired session(s)", removed),
                    Err(e) => tracing::warn!(error = %e, "session sweep failed"),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
