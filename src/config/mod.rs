//! Configuration loading and management
//!
//! Configuration is read from YAML, with every section optional, and then a
//! handful of `ORDERFLOW_*` environment variables are layered on top.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//! logging:
//!   format: json
//! validation:
//!   pickup_method_ids: [pickup, farm-pickup]
//!   check_totals: false
//! auth:
//!   mode: static_tokens
//!   tokens:
//!     - token: dev-admin
//!       actor_id: 00000000-0000-0000-0000-000000000001
//!       email: admin@example.com
//!       role: admin
//! ```

use crate::core::auth::{
    Actor, AuthProvider, Role, StaticTokenAuthProvider, TrustedHeaderAuthProvider,
};
use crate::status::PaymentStatus;
use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub const ENV_HOST: &str = "ORDERFLOW_HOST";
pub const ENV_PORT: &str = "ORDERFLOW_PORT";
pub const ENV_LOG: &str = "ORDERFLOW_LOG";
pub const ENV_LOG_FORMAT: &str = "ORDERFLOW_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Broadcast buffer size before slow subscribers start lagging
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive, used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info,orderflow=debug".to_string(),
        }
    }
}

/// Knobs for the fulfillment prerequisite checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub required_address_fields: Vec<String>,
    pub accepted_payment_statuses: Vec<PaymentStatus>,
    /// Shipping methods that need no shipping address
    pub pickup_method_ids: Vec<String>,
    pub check_totals: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            required_address_fields: ["street", "city", "postal_code", "country"]
                .into_iter()
                .map(String::from)
                .collect(),
            accepted_payment_statuses: vec![PaymentStatus::Paid],
            pickup_method_ids: vec!["pickup".to_string()],
            check_totals: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Identity forwarded by a gateway in `x-actor-*` headers
    #[default]
    TrustedHeaders,
    /// Fixed bearer tokens from this file
    StaticTokens,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub actor_id: Uuid,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub mode: AuthMode,
    pub tokens: Vec<TokenGrant>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Deliver notifications to this URL (requires the `push` feature)
    pub webhook_url: Option<String>,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub events: EventSettings,
    pub logging: LoggingSettings,
    pub validation: ValidationSettings,
    pub auth: AuthSettings,
    pub notifications: NotificationSettings,
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// File (when given) or defaults, then process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Layer `ORDERFLOW_*` overrides from `lookup` on top of this config
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow!("Invalid {} '{}': {}", ENV_PORT, port, e))?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.logging.filter = filter;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => bail!("Invalid {} '{}'", ENV_LOG_FORMAT, other),
            };
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.capacity == 0 {
            bail!("events.capacity must be greater than zero");
        }
        if self.auth.mode == AuthMode::StaticTokens && self.auth.tokens.is_empty() {
            bail!("auth.mode 'static_tokens' needs at least one entry in auth.tokens");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Build the auth provider selected by `auth.mode`
    pub fn auth_provider(&self) -> Arc<dyn AuthProvider> {
        match self.auth.mode {
            AuthMode::TrustedHeaders => Arc::new(TrustedHeaderAuthProvider),
            AuthMode::StaticTokens => {
                let provider = self
                    .auth
                    .tokens
                    .iter()
                    .fold(StaticTokenAuthProvider::new(), |provider, grant| {
                        provider.with_token(
                            grant.token.clone(),
                            Actor::new(grant.actor_id, grant.email.clone(), grant.role),
                        )
                    });
                Arc::new(provider)
            }
        }
    }
}
