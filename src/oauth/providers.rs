// ABOUTME: Concrete OAuth token-endpoint clients for HubSpot, Salesforce, and Pipedrive
// ABOUTME: Each owns its provider's grant parameters, client authentication, and response shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # OAuth Provider Implementations
//!
//! Token-endpoint clients for the three supported CRM platforms. HubSpot and
//! Salesforce authenticate the OAuth app with form-encoded client
//! credentials; Pipedrive requires HTTP Basic authentication. Salesforce is
//! the odd one out twice more: it does not rotate refresh tokens and it
//! reports an `instance_url` that all subsequent API calls must target.

use super::{CrmOAuthProvider, OAuthError, TokenData};
use crate::constants::{crm_providers, ports, tokens};
use crate::utils::http_client::oauth_client;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

fn default_redirect_uri(provider: &str) -> String {
    format!(
        "http://localhost:{}/oauth/callback/{provider}",
        ports::DEFAULT_HTTP_PORT
    )
}

/// Classify a non-success token-endpoint response during refresh
///
/// 400/401 mean the grant itself was rejected (revoked, already-rotated, or
/// malformed refresh token); anything else is treated as transient.
fn classify_refresh_failure(status: reqwest::StatusCode, body: &str) -> OAuthError {
    if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
        OAuthError::InvalidGrant(format!("status {status}: {body}"))
    } else {
        OAuthError::TokenRefreshFailed(format!("status {status}: {body}"))
    }
}

// ============================================================================
// HubSpot
// ============================================================================

/// HubSpot OAuth token client
pub struct HubSpotOAuthProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
}

/// HubSpot token response format
#[derive(Debug, Deserialize)]
struct HubSpotTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

impl HubSpotOAuthProvider {
    /// Build from `HUBSPOT_CLIENT_ID` / `HUBSPOT_CLIENT_SECRET` /
    /// `HUBSPOT_REDIRECT_URI`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client id or secret is not set
    pub fn new() -> Result<Self, OAuthError> {
        let client_id = std::env::var("HUBSPOT_CLIENT_ID")
            .map_err(|_| OAuthError::ConfigurationError("HUBSPOT_CLIENT_ID not set".to_owned()))?;

        let client_secret = std::env::var("HUBSPOT_CLIENT_SECRET").map_err(|_| {
            OAuthError::ConfigurationError("HUBSPOT_CLIENT_SECRET not set".to_owned())
        })?;

        let redirect_uri = std::env::var("HUBSPOT_REDIRECT_URI")
            .unwrap_or_else(|_| default_redirect_uri(crm_providers::HUBSPOT));

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: "https://api.hubapi.com/oauth/v1/token".to_owned(),
        })
    }

    fn token_data(&self, response: HubSpotTokenResponse) -> TokenData {
        TokenData {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(response.expires_in),
            instance_url: None,
            provider: crm_providers::HUBSPOT.to_owned(),
        }
    }
}

#[async_trait::async_trait]
impl CrmOAuthProvider for HubSpotOAuthProvider {
    fn name(&self) -> &'static str {
        crm_providers::HUBSPOT
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenData, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = oauth_client()
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(OAuthError::TokenExchangeFailed(format!(
                "status {status}: {text}"
            )));
        }

        let token_response: HubSpotTokenResponse = serde_json::from_str(&text)
            .map_err(|e| OAuthError::TokenExchangeFailed(format!("Parse error: {e}")))?;

        Ok(self.token_data(token_response))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenData, OAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = oauth_client()
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_refresh_failure(status, &text));
        }

        let token_response: HubSpotTokenResponse = serde_json::from_str(&text)
            .map_err(|e| OAuthError::TokenRefreshFailed(format!("Parse error: {e}")))?;

        Ok(self.token_data(token_response))
    }
}

// ============================================================================
// Salesforce
// ============================================================================

/// Salesforce OAuth token client
pub struct SalesforceOAuthProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
}

/// Salesforce token response format
///
/// Refresh responses carry no `refresh_token` (Salesforce never rotates it)
/// and usually no `expires_in`.
#[derive(Debug, Deserialize)]
struct SalesforceTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    instance_url: String,
    expires_in: Option<i64>,
}

impl SalesforceOAuthProvider {
    /// Build from `SALESFORCE_CLIENT_ID` / `SALESFORCE_CLIENT_SECRET` /
    /// `SALESFORCE_REDIRECT_URI` / `SALESFORCE_LOGIN_URL`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client id or secret is not set
    pub fn new() -> Result<Self, OAuthError> {
        let client_id = std::env::var("SALESFORCE_CLIENT_ID").map_err(|_| {
            OAuthError::ConfigurationError("SALESFORCE_CLIENT_ID not set".to_owned())
        })?;

        let client_secret = std::env::var("SALESFORCE_CLIENT_SECRET").map_err(|_| {
            OAuthError::ConfigurationError("SALESFORCE_CLIENT_SECRET not set".to_owned())
        })?;

        let redirect_uri = std::env::var("SALESFORCE_REDIRECT_URI")
            .unwrap_or_else(|_| default_redirect_uri(crm_providers::SALESFORCE));

        let login_url = std::env::var("SALESFORCE_LOGIN_URL")
            .unwrap_or_else(|_| "https://login.salesforce.com".to_owned());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: format!("{login_url}/services/oauth2/token"),
        })
    }

    fn token_data(response: SalesforceTokenResponse, prior_refresh_token: Option<&str>) -> TokenData {
        let expires_in = response
            .expires_in
            .unwrap_or(tokens::SALESFORCE_DEFAULT_EXPIRES_SECS);

        TokenData {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| prior_refresh_token.map(str::to_owned))
                .unwrap_or_default(),
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(expires_in),
            instance_url: Some(response.instance_url),
            provider: crm_providers::SALESFORCE.to_owned(),
        }
    }
}

#[async_trait::async_trait]
impl CrmOAuthProvider for SalesforceOAuthProvider {
    fn name(&self) -> &'static str {
        crm_providers::SALESFORCE
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenData, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = oauth_client()
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(OAuthError::TokenExchangeFailed(format!(
                "status {status}: {text}"
            )));
        }

        let token_response: SalesforceTokenResponse = serde_json::from_str(&text)
            .map_err(|e| OAuthError::TokenExchangeFailed(format!("Parse error: {e}")))?;

        Ok(Self::token_data(token_response, None))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenData, OAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = oauth_client()
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_refresh_failure(status, &text));
        }

        let token_response: SalesforceTokenResponse = serde_json::from_str(&text)
            .map_err(|e| OAuthError::TokenRefreshFailed(format!("Parse error: {e}")))?;

        Ok(Self::token_data(token_response, Some(refresh_token)))
    }
}

// ============================================================================
// Pipedrive
// ============================================================================

/// Pipedrive OAuth token client
pub struct PipedriveOAuthProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
}

/// Pipedrive token response format
#[derive(Debug, Deserialize)]
struct PipedriveTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

impl PipedriveOAuthProvider {
    /// Build from `PIPEDRIVE_CLIENT_ID` / `PIPEDRIVE_CLIENT_SECRET` /
    /// `PIPEDRIVE_REDIRECT_URI`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the client id or secret is not set
    pub fn new() -> Result<Self, OAuthError> {
        let client_id = std::env::var("PIPEDRIVE_CLIENT_ID").map_err(|_| {
            OAuthError::ConfigurationError("PIPEDRIVE_CLIENT_ID not set".to_owned())
        })?;

        let client_secret = std::env::var("PIPEDRIVE_CLIENT_SECRET").map_err(|_| {
            OAuthError::ConfigurationError("PIPEDRIVE_CLIENT_SECRET not set".to_owned())
        })?;

        let redirect_uri = std::env::var("PIPEDRIVE_REDIRECT_URI")
            .unwrap_or_else(|_| default_redirect_uri(crm_providers::PIPEDRIVE));

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: "https://oauth.pipedrive.com/oauth/token".to_owned(),
        })
    }

    fn basic_auth_header(&self) -> String {
        let credentials =
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        format!("Basic {credentials}")
    }

    fn token_data(response: PipedriveTokenResponse) -> TokenData {
        TokenData {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(response.expires_in),
            instance_url: None,
            provider: crm_providers::PIPEDRIVE.to_owned(),
        }
    }
}

#[async_trait::async_trait]
impl CrmOAuthProvider for PipedriveOAuthProvider {
    fn name(&self) -> &'static str {
        crm_providers::PIPEDRIVE
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenData, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = oauth_client()
            .post(&self.token_url)
            .header("Authorization", self.basic_auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(OAuthError::TokenExchangeFailed(format!(
                "status {status}: {text}"
            )));
        }

        let token_response: PipedriveTokenResponse = serde_json::from_str(&text)
            .map_err(|e| OAuthError::TokenExchangeFailed(format!("Parse error: {e}")))?;

        Ok(Self::token_data(token_response))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenData, OAuthError> {
        // Pipedrive rotates the refresh token on every exchange; the caller
        // must persist the returned token or the grant is orphaned.
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = oauth_client()
            .post(&self.token_url)
            .header("Authorization", self.basic_auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OAuthError::TokenRefreshFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_refresh_failure(status, &text));
        }

        let token_response: PipedriveTokenResponse = serde_json::from_str(&text)
            .map_err(|e| OAuthError::TokenRefreshFailed(format!("Parse error: {e}")))?;

        Ok(Self::token_data(token_response))
    }
}

/// Build a registry containing every provider whose OAuth app credentials are
/// configured in the environment; unconfigured providers are skipped with a
/// warning
#[must_use]
pub fn registry_from_env() -> super::OAuthRegistry {
    let mut registry = super::OAuthRegistry::new();

    match HubSpotOAuthProvider::new() {
        Ok(provider) => registry.register_provider(Box::new(provider)),
        Err(e) => tracing::warn!("HubSpot OAuth not configured: {e}"),
    }
    match SalesforceOAuthProvider::new() {
        Ok(provider) => registry.register_provider(Box::new(provider)),
        Err(e) => tracing::warn!("Salesforce OAuth not configured: {e}"),
    }
    match PipedriveOAuthProvider::new() {
        Ok(provider) => registry.register_provider(Box::new(provider)),
        Err(e) => tracing::warn!("Pipedrive OAuth not configured: {e}"),
    }

    registry
}
