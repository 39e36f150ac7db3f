use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use board_common::SnowflakeGenerator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use board_api::config::Config;
use board_api::gateway::Gateway;
use board_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = board_api::db::pool::connect(&config.database_url).await;

    let gateway = Arc::new(Gateway::new(config.chat_history_cap));
    let snowflake = Arc::new(SnowflakeGenerator::new(config.worker_id));

    tracing::info!(
        history_cap = config.chat_history_cap,
        worker_id = config.worker_id,
        "board-api configured"
    );

    let state = AppState {
        db,
        config: Arc::new(config),
        snowflake,
        gateway,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(board_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "board-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
