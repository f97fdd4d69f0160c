//! orderflow HTTP server
//!
//! Usage: `orderflow-server [config.yaml]`. The config path may also come
//! from `ORDERFLOW_CONFIG`. A `.env` file is honoured when present.

use anyhow::Result;
use orderflow::config::ServiceConfig;
use orderflow::logging::init_tracing;
use orderflow::notify::{LogNotifier, Notifier};
use orderflow::server::ServerBuilder;
use orderflow::storage::InMemoryStore;
use std::path::PathBuf;
use std::sync::Arc;

const ENV_CONFIG: &str = "ORDERFLOW_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG).ok())
        .map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref())?;

    init_tracing(&config.logging)?;
    tracing::info!(
        config = ?config_path,
        auth_mode = ?config.auth.mode,
        "Starting orderflow"
    );

    let addr = config.bind_address();
    ServerBuilder::new()
        .with_notifier(notifier(&config)?)
        .with_store(InMemoryStore::new())
        .with_config(config)
        .serve(&addr)
        .await
}

#[cfg(feature = "push")]
fn notifier(config: &ServiceConfig) -> Result<Arc<dyn Notifier>> {
    match &config.notifications.webhook_url {
        Some(url) => {
            tracing::info!(endpoint = %url, "Delivering notifications to webhook");
            Ok(Arc::new(orderflow::notify::WebhookNotifier::new(url.clone())?))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(not(feature = "push"))]
fn notifier(config: &ServiceConfig) -> Result<Arc<dyn Notifier>> {
    if config.notifications.webhook_url.is_some() {
        tracing::warn!("notifications.webhook_url is set but the 'push' feature is disabled");
    }
    Ok(Arc::new(LogNotifier))
}
