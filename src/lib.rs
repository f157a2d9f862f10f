pub mod authentication;
pub mod blob_store;
pub mod config;
pub mod data_formats;
pub mod db_helpers;
pub mod errors;
mod handlers;
pub mod mail;
pub mod models;
pub mod otp;

use std::{
    net::{SocketAddr, TcpListener},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
pub use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode},
    routing::*,
    Extension, Json, Router,
};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use blob_store::{BlobStore, LocalBlobStore};
use config::Config;
pub use db_helpers::init_db;
use handlers::*;
use mail::{HttpMailer, LogMailer, Mailer};

pub type JsonResponse<T> = (StatusCode, Json<T>);

/// Request bodies, uploads included, are capped at 50 MiB.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:5000"];

/// Everything a handler needs, shared behind an `Arc` as a request extension.
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    pub blob_store: Arc<dyn BlobStore>,
}

/// Opens the database and wires the collaborators the configuration asks for.
pub async fn build_state(config: Config) -> Result<Arc<AppState>> {
    let pool = init_db(&config.database_url).await?;

    let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )?),
        None => {
            info!("MAIL_API_URL not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let blob_store = LocalBlobStore::new(
        PathBuf::from(&config.upload_dir),
        format!("{}/uploads", config.public_base_url.trim_end_matches('/')),
    )
    .await?;

    Ok(Arc::new(AppState {
        pool,
        config,
        mailer,
        blob_store: Arc::new(blob_store),
    }))
}

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true)
}

pub fn make_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(signup))
        .route("/sendotp", post(send_otp))
        .route("/login", post(login))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword", post(reset_password));

    let profile_routes = Router::new()
        .route("/updateProfile", put(update_profile))
        .route("/updateDisplayPicture", put(update_display_picture))
        .route("/deleteProfile", delete(delete_profile));

    let post_routes = Router::new()
        .route("/create", post(create_post))
        .route("/:post_id/like", post(toggle_like).delete(unlike_post))
        .route("/:post_id/likes", get(list_likes))
        .route("/:post_id/comment", post(add_comment))
        .route("/:post_id/comments", get(list_comments))
        .route("/comment/:comment_id", delete(delete_comment));

    let api = auth_routes
        .nest("/profiles", profile_routes)
        .nest("/posts", post_routes);

    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/check_health", get(alive))
        .nest("/api/v1", api)
        .nest_service("/uploads", uploads)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Binds an OS-assigned port on localhost.
pub fn bind_random_port() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Could not bind a free port")?;
    let addr = listener
        .local_addr()
        .context("Could not read the bound address")?;
    Ok((listener, addr))
}

pub async fn serve(app: Router, listener: TcpListener) -> Result<()> {
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub async fn run_app(app: Router, address: SocketAddr) -> Result<()> {
    let listener =
        TcpListener::bind(address).with_context(|| format!("Could not bind {}", address))?;
    info!("Server started on {}", address);
    serve(app, listener).await
}
