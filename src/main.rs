use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use quizturn::config::{self, ServerConfig};
use quizturn::game::{self, GameHandle};
use quizturn::hub::Hub;
use quizturn::types::ClientMsg;

// ─── State ────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    game: GameHandle,
    hub: Arc<Hub>,
}

// ─── WebSocket ────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let socket_id = uuid::Uuid::new_v4().to_string();
    let mut outbound = state.hub.register(&socket_id);
    tracing::info!("WebSocket connected: {}", socket_id);

    // Forward room broadcasts and direct messages to this socket
    let event_task = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Failed to encode {:?}: {}", msg, e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };

        let client_msg: ClientMsg = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Invalid message from {}: {}", socket_id, e);
                continue;
            }
        };

        state.game.client_event(&socket_id, client_msg).await;
    }

    tracing::info!("WebSocket disconnected: {}", socket_id);
    state.hub.unregister(&socket_id);
    event_task.abort();
    state.game.disconnect(&socket_id).await;
}

// ─── Routes ───────────────────────────────────────────────────────

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(HeaderValue::from_str(origin)?),
        None => AllowOrigin::any(),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST]))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    config::init(&config.config_path)?;
    let questions = config::load_questions(&config.questions_path())?;
    tracing::info!("Loaded {} questions", questions.len());

    let hub = Arc::new(Hub::new());
    let (game, _game_task) = game::spawn(questions, hub.clone(), config.game.clone());

    let state = AppState { game, hub };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(cors_layer(config.cors_origin.as_deref())?)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!("Quizturn server running on port {}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}

// ─── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}
