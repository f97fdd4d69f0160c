//! Actors, roles and authentication providers
//!
//! Identity is established upstream. Providers only turn request headers
//! into an [`Actor`], which the core then trusts verbatim.
//! - `TrustedHeaderAuthProvider`: gateway-forwarded identity headers
//! - `StaticTokenAuthProvider`: fixed bearer tokens for development and tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_EMAIL_HEADER: &str = "x-actor-email";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Closed role hierarchy: `Customer < Staff < Admin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    /// Warehouse and producer-side operators
    #[serde(alias = "producer")]
    Staff,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Staff, Role::Admin];

    fn rank(self) -> u8 {
        match self {
            Role::Customer => 0,
            Role::Staff => 1,
            Role::Admin => 2,
        }
    }

    /// Check if this role is `minimum` or above in the hierarchy
    pub fn at_least(self, minimum: Role) -> bool {
        self.rank() >= minimum.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "staff" | "producer" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow!("Unknown role '{}'", other)),
        }
    }
}

/// The authenticated identity performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Staff and admins act on any order; customers only on their own
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.role.at_least(Role::Staff) || self.id == owner_id
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the actor from request headers
    ///
    /// Any error is reported to the client as 401.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Actor>;
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .ok_or_else(|| anyhow!("Missing '{}' header", name))?
        .to_str()
        .map_err(|_| anyhow!("Header '{}' is not valid text", name))
}

/// Trusts identity headers injected by an upstream gateway
///
/// The gateway is expected to have validated the bearer credential and to
/// strip these headers from client traffic.
#[derive(Debug, Clone, Default)]
pub struct TrustedHeaderAuthProvider;

#[async_trait]
impl AuthProvider for TrustedHeaderAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Actor> {
        let id = header_str(headers, ACTOR_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|e| anyhow!("Invalid actor id: {}", e))?;
        let email = headers
            .get(ACTOR_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let role = header_str(headers, ACTOR_ROLE_HEADER)?.parse::<Role>()?;

        Ok(Actor::new(id, email, role))
    }
}

/// Maps `Authorization: Bearer <token>` to a fixed actor
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthProvider {
    tokens: HashMap<String, Actor>,
}

impl StaticTokenAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.tokens.insert(token.into(), actor);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Actor> {
        let value = header_str(headers, AUTHORIZATION.as_str())?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| anyhow!("Expected a bearer token"))?
            .trim();

        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown token"))
    }
}
