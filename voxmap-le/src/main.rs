//! voxmap-le - Opinion Landscape Engine
//!
//! **Module Identity:**
//! - Name: voxmap-le (Landscape Engine)
//! - Port: 5741
//!
//! Computes opinion landscapes for Agree/Disagree/Pass polls: dimensionality
//! reduction over the vote matrix, fine and coarse clustering, statement
//! classification, and statement presentation weighting. Heavy computation
//! runs on a background worker; the HTTP surface stays responsive.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use voxmap_common::events::EventBus;
use voxmap_common::params::PARAMS;

use voxmap_le::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting voxmap-le (Landscape Engine)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Root folder: CLI arg > env var > config file > OS default
    let cli_root = std::env::args().nth(1);
    let root_folder =
        voxmap_common::config::resolve_root_folder(cli_root.as_deref(), "VOXMAP_ROOT");
    let db_path = voxmap_common::config::prepare_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Database: {}", db_path.display());

    let db_pool = voxmap_le::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Tunable overrides from the settings table
    PARAMS.load_from_db(&db_pool).await?;

    let event_bus = EventBus::new(100);

    // Background clustering worker
    let shutdown = CancellationToken::new();
    let worker_handle = tokio::spawn(voxmap_le::worker::run(
        db_pool.clone(),
        event_bus.clone(),
        shutdown.clone(),
    ));

    let state = AppState::new(db_pool, event_bus);
    let app = voxmap_le::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:5741").await?;
    info!("Listening on http://127.0.0.1:5741");
    info!("Health check: http://127.0.0.1:5741/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    shutdown.cancel();
    let _ = worker_handle.await;

    Ok(())
}
