use tracing_subscriber::EnvFilter;

use lanfire_core::map::load_map;
use lanfire_core::weapon::WeaponTable;
use lanfire_server::build_app;
use lanfire_server::config::ServerConfig;
use lanfire_sim::Simulation;
use lanfire_sim::config::SimConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let sim_config = SimConfig::load();
    if let Err(e) = sim_config.validate() {
        tracing::error!("Invalid simulation config: {e}");
        std::process::exit(1);
    }
    let sim = Simulation::new(sim_config, load_map(), WeaponTable::default());
    let addr = config.listen_addr.clone();
    let web_root = config.web_root.clone();
    let (app, _state, _game) = build_app(config, sim);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(%addr, %web_root, "lanfire server listening");

    axum::serve(listener, app).await.expect("Server error");
}
