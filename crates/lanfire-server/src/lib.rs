pub mod config;
pub mod game_loop;
pub mod health;
pub mod state;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use lanfire_sim::Simulation;

use config::ServerConfig;
use game_loop::spawn_game_loop;
use state::AppState;

/// Build the Axum router and start the game loop that owns `sim`.
///
/// Must be called inside a tokio runtime.
pub fn build_app(config: ServerConfig, sim: Simulation) -> (Router<()>, AppState, JoinHandle<()>) {
    let web_root = config.web_root.clone();
    let (commands, game_handle) = spawn_game_loop(sim);
    let state = AppState::new(config, commands);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state, game_handle)
}
