pub mod api;
pub mod blob;
pub mod config;
pub mod controller;
pub mod core_state;
pub mod db;
pub mod identity;
pub mod journal;
pub mod prediction;
pub mod presenter;
pub mod records;
pub mod reports;
pub mod symptoms;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Start the HealthAI server and block until Ctrl-C.
///
/// Services are built before the async runtime starts: the prediction
/// and blob clients are blocking HTTP clients and must be created and
/// dropped outside of it.
pub fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::AppConfig::from_env().map_err(|e| e.to_string())?;
    tracing::info!(
        api = %config.api_base_url,
        storage = ?config.storage,
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr;
    let core = Arc::new(core_state::CoreState::open(config).map_err(|e| e.to_string())?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    let result = runtime.block_on(async {
        let server = api::start_api_server(Arc::clone(&core), bind_addr).await?;
        tracing::info!(addr = %server.addr(), "Listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
        }
        server.stop().await;
        Ok::<(), String>(())
    });

    drop(runtime);
    drop(core);
    result
}
