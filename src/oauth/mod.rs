// ABOUTME: OAuth module for CRM provider token lifecycle management
// ABOUTME: Token data structures, error taxonomy, provider trait, and registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # OAuth Management Module
//!
//! Unified OAuth2 token handling for all CRM providers. The authorization
//! *consent* pages live in the surrounding web application; this module owns
//! the thin token-endpoint flows it hands back to - authorization-code
//! exchange and refresh-token exchange - behind one provider trait.

pub mod providers;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OAuth token data returned by a token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    /// Bearer access token
    pub access_token: String,
    /// Refresh token (Salesforce does not rotate this; Pipedrive does)
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Provider-specific API host (Salesforce `instance_url`)
    pub instance_url: Option<String>,
    /// Provider tag this token belongs to
    pub provider: String,
}

/// OAuth error types
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// No token client registered for the provider
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    /// Authorization-code exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Refresh-token exchange failed for a transient reason (network,
    /// provider 5xx)
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// The token endpoint definitively rejected the grant (revoked or
    /// invalid refresh token) - retrying cannot succeed without re-consent
    #[error("Grant rejected by provider: {0}")]
    InvalidGrant(String),

    /// OAuth app credentials missing or malformed
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Trait for per-provider OAuth token-endpoint clients
#[async_trait::async_trait]
pub trait CrmOAuthProvider: Send + Sync {
    /// Provider tag
    fn name(&self) -> &'static str;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenData, OAuthError>;

    /// Exchange a refresh token for a fresh access token
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenData, OAuthError>;
}

/// Registry of OAuth token clients keyed by provider tag
pub struct OAuthRegistry {
    providers: HashMap<String, Box<dyn CrmOAuthProvider>>,
}

impl OAuthRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a token client
    pub fn register_provider(&mut self, provider: Box<dyn CrmOAuthProvider>) {
        let name = provider.name().to_owned();
        self.providers.insert(name, provider);
    }

    /// Get a token client by provider tag
    #[must_use]
    pub fn get_provider(&self, name: &str) -> Option<&dyn CrmOAuthProvider> {
        self.providers.get(name).map(std::convert::AsRef::as_ref)
    }

    /// List all registered provider tags
    #[must_use]
    pub fn list_providers(&self) -> Vec<&str> {
        self.providers
            .keys()
            .map(std::string::String::as_str)
            .collect()
    }
}

impl Default for OAuthRegistry {
    fn default() -> Self {
        Self::new()
    }
}
