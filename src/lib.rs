//! Blog Backend - library for app logic and testing

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;
pub mod render;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::{AppConfig, DEFAULT_ADMIN_EMAIL, DEFAULT_JWT_SECRET};
use crate::db::{DbConfig, Store, StoreError};
use crate::mail::Mailer;
use crate::state::AppState;

/// Global request body cap; uploads are the largest bodies accepted.
const BODY_LIMIT: usize = routes::upload::MAX_FILE_SIZE + 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("JWT_SECRET must be set to a secure, unique value in production")]
    InsecureJwtSecret,

    #[error("invalid HOST/PORT configuration: {0}")]
    InvalidAddress(String),

    #[error("failed to open database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to bootstrap admin account: {0}")]
    Bootstrap(#[from] StoreError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN, else local dev origins.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty())
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(routes::admin::dashboard))
        .route("/posts", post(routes::blog::create_post))
        .route(
            "/posts/{slug}",
            patch(routes::blog::update_post).delete(routes::blog::delete_post),
        )
        .route("/subscribers", get(routes::subscribers::list_subscribers))
        .route(
            "/subscribers/{id}",
            delete(routes::subscribers::delete_subscriber),
        )
        .route("/broadcast", post(routes::admin::broadcast))
        .route("/test-email", post(routes::admin::test_email))
        .route(
            "/uploads",
            post(routes::upload::upload_image).layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .route("/site", delete(routes::admin::wipe_site))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/api/posts", get(routes::blog::list_posts))
        .route("/api/posts/{slug}", get(routes::blog::get_post))
        .route(
            "/api/posts/{slug}/comments",
            post(routes::comments::add_comment),
        )
        .route("/api/subscribe", post(routes::subscribers::subscribe))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .nest("/api/admin", admin_routes())
        .route("/rss.xml", get(routes::rss::rss_feed))
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .nest_service("/uploads", uploads)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(cors)
}

fn check_production_config(config: &AppConfig) -> Result<(), StartupError> {
    if !config.is_production() {
        return Ok(());
    }

    if config.auth.jwt_secret.is_empty() || config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        return Err(StartupError::InsecureJwtSecret);
    }

    if config.auth.admin_email == DEFAULT_ADMIN_EMAIL {
        tracing::warn!(
            "SECURITY: ADMIN_EMAIL is using an insecure default. \
             Set ADMIN_EMAIL to a real address."
        );
    }
    if config.auth.admin_password_hash.is_none() && std::env::var("ADMIN_PASSWORD").is_err() {
        tracing::warn!(
            "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
             The fallback default password is insecure. \
             Set ADMIN_HASH_PASSWORD to a bcrypt hash of a strong password."
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init(&logging::LogConfig::from_env());

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    check_production_config(&config)?;

    let store = Store::connect(&DbConfig::from_app(&config)).await?;
    store.bootstrap_admin(&config.auth).await?;

    let mailer = Mailer::from_config(&config.mail);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e: std::net::AddrParseError| StartupError::InvalidAddress(e.to_string()))?;

    let app = create_app(AppState::new(store.clone(), mailer, config));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.close().await;
    tracing::info!("Server stopped");
    Ok(())
}
