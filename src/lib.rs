use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod database;
pub mod dtos;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use config::AppConfig;
use database::connection::get_db_client;
use state::AppState;

/// Entry point shared by the binary and anything that wants to stand the
/// whole service up the same way the binary does.
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    let db = get_db_client(&config).await;
    database::mongo::ensure_indexes(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create indexes: {}", e))?;

    let app_state = AppState::new(db, &config);
    let app = build_router(app_state);

    start_server(app, &config).await
}

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/health", get(api_health_check))
        .nest("/api/auth", routes::auth::routes())
        .nest("/api", routes::auth_otp_routes::auth_otp_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "Account Recovery API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
