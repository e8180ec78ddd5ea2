use std::env;
use std::error::Error;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chronicare::api::RestApi;
use chronicare::care;
use chronicare::config::{load_config, Config, CONFIG_ENV, DEFAULT_CONFIG_PATH};
use chronicare::error::ConfigError;
use chronicare::seed::load_sample_data;
use chronicare::service::CareServices;
use chronicare::storage::CareStores;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, missing) = match load_config(&config_path) {
        Ok(config) => (config, false),
        Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => (Config::default(), true),
        Err(e) => return Err(e.into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    if missing {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
    }

    let stores = Arc::new(CareStores::new());
    let services = CareServices::new(Arc::clone(&stores));
    if config.sample_data {
        if let Err(e) = load_sample_data(&services, care::now()) {
            error!(%e, "Failed to load sample data");
        }
    }

    let api = RestApi::new(services);
    let addr = config.socket_addr()?;
    info!(%addr, "Starting ChroniCare server");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (bound, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("Shutting down server...");
        })?;
    info!(addr = %bound, "Listening");

    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("Ctrl+C received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    server_handle.await?;

    info!(
        patients = stores.patients.len(),
        medications = stores.medications.len(),
        notifications = stores.notifications.len(),
        "Server shutdown complete"
    );
    Ok(())
}
