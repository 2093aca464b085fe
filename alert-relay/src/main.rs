use std::sync::Arc;

use alert_relay::api::{ApiServer, AppState};
use alert_relay::config::{GatewayConfig, LogConfig};
use alert_relay::logging;
use alert_relay::services::ServiceContainer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_config = LogConfig::from_env();
    let _log_guard = logging::init_logging(&log_config.level, log_config.dir.as_deref())?;

    let config = GatewayConfig::from_env();
    info!(
        environment = ?config.environment,
        timezone = %config.timezone,
        telegram_mode = ?config.telegram.enabled_mode(),
        sms_active = config.sms.active,
        "Starting alert-relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    let server_config = config.server.clone();
    let services = Arc::new(ServiceContainer::new(config)?);
    if let Err(e) = services.initialize().await {
        error!(error = %e, "Failed to initialize services");
        return Err(e.into());
    }

    let server = ApiServer::new(server_config, AppState::new(services.clone()));
    let server_token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        server_token.cancel();
    });

    let result = server.run().await;
    services.shutdown();
    result?;

    info!("alert-relay stopped");
    Ok(())
}
