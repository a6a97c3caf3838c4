use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use huddle_api::auth::{self, AppState, AppStateInner};
use huddle_api::middleware::require_auth;
use huddle_api::{channels, conversations, files, members, messages, reactions, workspaces};
use huddle_gateway::connection;
use huddle_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HUDDLE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("HUDDLE_DB_PATH").unwrap_or_else(|_| "huddle.db".into());
    let upload_dir =
        PathBuf::from(std::env::var("HUDDLE_UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()));
    let host = std::env::var("HUDDLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HUDDLE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    std::fs::create_dir_all(&upload_dir)?;

    // Init database
    let db = huddle_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
        upload_dir,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/workspaces",
            get(workspaces::list_workspaces).post(workspaces::create_workspace),
        )
        .route(
            "/workspaces/{workspace_id}",
            get(workspaces::get_workspace)
                .patch(workspaces::rename_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route(
            "/workspaces/{workspace_id}/join-code",
            post(workspaces::rotate_join_code),
        )
        .route("/workspaces/{workspace_id}/join", post(workspaces::join_workspace))
        .route(
            "/workspaces/{workspace_id}/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route(
            "/channels/{channel_id}",
            patch(channels::rename_channel).delete(channels::delete_channel),
        )
        .route("/workspaces/{workspace_id}/members", get(members::list_members))
        .route(
            "/workspaces/{workspace_id}/members/me",
            get(members::current_member),
        )
        .route(
            "/members/{member_id}",
            get(members::get_member)
                .patch(members::update_member_role)
                .delete(members::remove_member),
        )
        .route(
            "/workspaces/{workspace_id}/conversations",
            post(conversations::create_or_get_conversation),
        )
        .route(
            "/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/messages/feed", get(messages::get_feed))
        .route(
            "/messages/{message_id}",
            get(messages::get_message)
                .patch(messages::edit_message)
                .delete(messages::delete_message),
        )
        .route(
            "/messages/{message_id}/reactions",
            post(reactions::toggle_reaction),
        )
        .route("/uploads", post(files::create_upload))
        .route("/uploads/{token}", put(files::upload_file))
        .route("/files/{file_id}", get(files::download_file))
        .layer(middleware::from_fn(require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Huddle server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher.clone(), state.jwt_secret.clone())
    })
}
