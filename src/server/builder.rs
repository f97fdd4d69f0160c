//! ServerBuilder for fluent API to build the HTTP server

use super::router::build_routes;
use super::state::AppState;
use crate::config::ServiceConfig;
use crate::core::auth::AuthProvider;
use crate::core::events::EventBus;
use crate::core::store::Store;
use crate::fulfillment::{
    FulfillmentDocuments, PrerequisiteValidator, StatusService, TimelineProjector,
};
use crate::notify::{LogNotifier, NotificationDispatcher, Notifier};
use crate::orders::{OrderRepository, OrderService};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Builder for the orderflow HTTP application
///
/// The store is required. Everything else falls back to the configuration:
/// the auth provider comes from `auth.mode`, the event bus is sized from
/// `events.capacity`, and notifications go to the log.
///
/// # Example
///
/// ```rust,ignore
/// ServerBuilder::new()
///     .with_config(config)
///     .with_store(InMemoryStore::new())
///     .serve("0.0.0.0:3000")
///     .await?;
/// ```
pub struct ServerBuilder {
    config: ServiceConfig,
    store: Option<Arc<dyn Store>>,
    auth: Option<Arc<dyn AuthProvider>>,
    notifier: Option<Arc<dyn Notifier>>,
    event_bus: Option<EventBus>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
            store: None,
            auth: None,
            notifier: None,
            event_bus: None,
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: impl Store + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Share an already constructed store, e.g. with a test harness
    pub fn with_shared_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_auth_provider(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(provider));
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Use a caller-owned bus, so the caller can subscribe to it as well
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Wire services together and return the handler state
    ///
    /// Must run inside a tokio runtime: the notification dispatcher is
    /// spawned here.
    pub fn build_state(mut self) -> Result<AppState> {
        let store = self
            .store
            .take()
            .ok_or_else(|| anyhow::anyhow!("Store is required. Call .with_store()"))?;
        let auth = match self.auth.take() {
            Some(auth) => auth,
            None => self.config.auth_provider(),
        };
        let events = self
            .event_bus
            .take()
            .unwrap_or_else(|| EventBus::new(self.config.events.capacity));
        let notifier = self
            .notifier
            .take()
            .unwrap_or_else(|| Arc::new(LogNotifier));

        NotificationDispatcher::new(notifier).spawn(&events);

        let repository = OrderRepository::new(store);
        let validator =
            PrerequisiteValidator::new(repository.clone(), self.config.validation.clone());
        let documents = FulfillmentDocuments::new(
            repository.clone(),
            self.config.validation.pickup_method_ids.clone(),
        );

        Ok(AppState {
            status: StatusService::new(repository.clone(), validator, events),
            orders: OrderService::new(repository.clone()),
            timeline: TimelineProjector::new(repository),
            documents,
            auth,
        })
    }

    pub fn build(self) -> Result<Router> {
        let state = self.build_state()?;
        Ok(build_routes(state).layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to `addr` and stops on SIGTERM or Ctrl+C once in-flight
    /// requests have completed.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
