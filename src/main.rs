use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lexdesk_api::config::{self, StorageBackend};
use lexdesk_api::database::DatabaseManager;
use lexdesk_api::encryption::{AttributeCodec, FieldCipher};
use lexdesk_api::is_production;
use lexdesk_api::routes::{self, AppState};
use lexdesk_api::services::EntityService;

const DEFAULT_LOG_FILTER: &str = "lexdesk_api=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_KEY, etc.
    let _ = dotenvy::dotenv();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();

    let default_filter = if config.api.enable_request_logging {
        DEFAULT_LOG_FILTER.to_string()
    } else {
        DEFAULT_LOG_FILTER.replace("tower_http=info", "tower_http=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!("Starting Lexdesk API in {:?} mode", config.environment);

    // The key is required before anything touches storage
    let cipher = FieldCipher::from_env(&config.encryption)
        .context("ConfigurationError: the application encryption key is not usable")?;
    tracing::info!(
        key_id = cipher.key_id(),
        previous_key_id = cipher.previous_key_id(),
        "Field encryption ready"
    );
    let codec = AttributeCodec::new(cipher).with_fallback_logging(config.encryption.log_fallbacks);

    if is_production!() && config.database.backend == StorageBackend::Memory {
        tracing::warn!("In-memory storage selected in production: data is lost on restart");
    }
    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open storage")?;
    tracing::info!(storage = store.backend(), "Storage ready");

    let service = EntityService::new(store, Arc::new(codec), config.encryption.max_scan_rows);
    let app = routes::app(AppState::new(service, config));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Lexdesk API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
