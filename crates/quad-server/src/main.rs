use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use quad_api::auth::{AppState, AppStateInner};
use quad_db::Database;
use quad_gateway::GatewayState;
use quad_gateway::connection;
use quad_gateway::dispatcher::Dispatcher;
use quad_gateway::notify::Notifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quad=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("QUAD_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("QUAD_DB_PATH").unwrap_or_else(|_| "quad.db".into());
    let host = std::env::var("QUAD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("QUAD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Role bootstrap: the named account (register it first, then restart)
    // becomes the admin; everyone else starts as a plain member.
    if let Ok(admin) = std::env::var("QUAD_ADMIN_USERNAME") {
        if db.set_role(&admin, "admin")? {
            info!("{admin} promoted to admin");
        } else {
            warn!("QUAD_ADMIN_USERNAME={admin} has no account yet");
        }
    }

    // Shared state, constructed once and injected everywhere
    let dispatcher = Dispatcher::new();
    let notifier = Notifier::new(db.clone(), dispatcher.clone());

    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        notifier: notifier.clone(),
    });
    let gateway_state = GatewayState {
        db,
        dispatcher,
        notifier,
        jwt_secret,
    };

    let app = quad_api::router(app_state)
        .merge(
            Router::new()
                .route("/gateway", get(ws_upgrade))
                .with_state(gateway_state),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Quad server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state))
}
