// ABOUTME: Authenticated CRM client construction with transparent token refresh
// ABOUTME: Serializes refreshes per (user, provider) and persists rotated credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Client Factory
//!
//! [`CrmClientFactory`] turns a (user, provider) pair into a ready
//! [`CrmProvider`] client: it loads the Connected integration row, decrypts
//! the credential blob, refreshes the access token when it is inside the
//! expiry skew window, persists the re-encrypted result, and only then
//! constructs the client. `Ok(None)` means "not connected" - either no
//! Connected row exists or the refresh could not produce a usable token.
//!
//! Refreshes for the same (user, provider) are serialized through a per-key
//! async mutex. Without that, two concurrent syncs observing the same expired
//! token would both hit the token endpoint, and on providers that rotate
//! refresh tokens (Pipedrive) the second exchange invalidates whichever
//! token the first one obtained.

use super::core::CrmProvider;
use super::hubspot_provider::HubSpotProvider;
use super::pipedrive_provider::PipedriveProvider;
use super::salesforce_provider::SalesforceProvider;
use crate::errors::{AppError, AppResult};
use crate::models::{
    CredentialBlob, CrmKind, EncryptedCredentials, Integration, IntegrationStatus,
};
use crate::oauth::{OAuthError, OAuthRegistry};
use crate::storage::IntegrationRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Constructs authenticated CRM clients for a user
///
/// The trait seam lets tests substitute recording fakes for the real
/// HTTP-backed clients.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build a client for the user's connection to the given provider
    ///
    /// Returns `Ok(None)` when the user has no Connected integration for the
    /// provider or its credentials could not be refreshed.
    async fn client_for_user(
        &self,
        user_id: Uuid,
        provider: CrmKind,
    ) -> AppResult<Option<Box<dyn CrmProvider>>>;
}

type RefreshLocks = DashMap<(Uuid, CrmKind), Arc<Mutex<()>>>;

/// Production client factory backed by the integration store and the OAuth
/// token clients
pub struct CrmClientFactory {
    integrations: Arc<dyn IntegrationRepository>,
    oauth: OAuthRegistry,
    encryption_key: Vec<u8>,
    refresh_locks: RefreshLocks,
}

impl CrmClientFactory {
    /// Create a factory
    #[must_use]
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        oauth: OAuthRegistry,
        encryption_key: Vec<u8>,
    ) -> Self {
        Self {
            integrations,
            oauth,
            encryption_key,
            refresh_locks: DashMap::new(),
        }
    }

    /// Finish an OAuth consent flow: exchange the authorization code and store
    /// a Connected integration row with encrypted credentials
    ///
    /// # Errors
    ///
    /// Returns an error if no token client is registered for the provider,
    /// the code exchange fails, or the row cannot be stored
    pub async fn complete_oauth_connection(
        &self,
        user_id: Uuid,
        provider: CrmKind,
        code: &str,
    ) -> AppResult<Integration> {
        let oauth_provider = self.oauth.get_provider(provider.as_str()).ok_or_else(|| {
            AppError::config(format!("{provider} OAuth is not configured"))
                .with_provider(provider.as_str())
        })?;

        let token = oauth_provider.exchange_code(code).await.map_err(|e| {
            AppError::auth_invalid(format!("{provider} code exchange failed: {e}"))
                .with_user_id(user_id)
        })?;

        let blob = CredentialBlob::new(
            token.access_token,
            token.refresh_token,
            token.expires_at,
            token.instance_url,
        );
        let encrypted = EncryptedCredentials::new(&blob, &self.encryption_key)?;

        let integration = Integration::new(user_id, provider.integration_type(), encrypted);
        self.integrations.create_integration(&integration).await?;

        info!("Connected {provider} for user {user_id}");
        Ok(integration)
    }

    fn build_client(
        provider: CrmKind,
        credentials: &CredentialBlob,
    ) -> AppResult<Box<dyn CrmProvider>> {
        match provider {
            CrmKind::HubSpot => Ok(Box::new(HubSpotProvider::new(
                credentials.access_token.clone(),
            ))),
            CrmKind::Salesforce => {
                let instance_url = credentials.instance_url.as_deref().ok_or_else(|| {
                    AppError::auth_invalid("Salesforce credentials carry no instance URL")
                })?;
                Ok(Box::new(SalesforceProvider::new(
                    credentials.access_token.clone(),
                    instance_url,
                )))
            }
            CrmKind::Pipedrive => Ok(Box::new(PipedriveProvider::new(
                credentials.access_token.clone(),
            ))),
        }
    }

    /// Load the Connected integration and decrypt its blob
    async fn load_credentials(
        &self,
        user_id: Uuid,
        provider: CrmKind,
    ) -> AppResult<Option<(Integration, CredentialBlob)>> {
        let Some(integration) = self
            .integrations
            .connected_integration(user_id, &provider.integration_type())
            .await?
        else {
            return Ok(None);
        };

        let Some(encrypted) = integration.credentials.clone() else {
            warn!("Integration {} has no stored credentials", integration.id);
            return Ok(None);
        };

        let blob = encrypted.decrypt(&self.encryption_key)?;
        Ok(Some((integration, blob)))
    }

    /// Refresh against the token endpoint and persist the rotated blob
    ///
    /// `Ok(None)` means the refresh failed; a definitive grant rejection also
    /// flips the integration to Disconnected so later syncs stop issuing
    /// doomed token-endpoint calls.
    async fn refresh_credentials(
        &self,
        integration: &Integration,
        provider: CrmKind,
        stale: CredentialBlob,
    ) -> AppResult<Option<CredentialBlob>> {
        let Some(oauth_provider) = self.oauth.get_provider(provider.as_str()) else {
            warn!("No OAuth token client registered for {provider}");
            return Ok(None);
        };

        match oauth_provider.refresh_token(&stale.refresh_token).await {
            Ok(token) => {
                let fresh = CredentialBlob::new(
                    token.access_token,
                    token.refresh_token,
                    token.expires_at,
                    token.instance_url.or(stale.instance_url),
                );
                let encrypted = EncryptedCredentials::new(&fresh, &self.encryption_key)?;
                self.integrations
                    .update_credentials(integration.id, &encrypted)
                    .await?;

                info!(
                    "Refreshed {provider} token for user {}, expires {}",
                    integration.user_id, fresh.expires_at
                );
                Ok(Some(fresh))
            }
            Err(OAuthError::InvalidGrant(reason)) => {
                warn!(
                    "{provider} grant rejected for user {}, disconnecting: {reason}",
                    integration.user_id
                );
                self.integrations
                    .update_status(integration.id, IntegrationStatus::Disconnected)
                    .await?;
                Ok(None)
            }
            Err(e) => {
                warn!(
                    "{provider} token refresh failed for user {}: {e}",
                    integration.user_id
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ClientFactory for CrmClientFactory {
    async fn client_for_user(
        &self,
        user_id: Uuid,
        provider: CrmKind,
    ) -> AppResult<Option<Box<dyn CrmProvider>>> {
        let Some((_, credentials)) = self.load_credentials(user_id, provider).await? else {
            return Ok(None);
        };

        let credentials = if credentials.needs_refresh() {
            let lock = {
                let entry = self
                    .refresh_locks
                    .entry((user_id, provider))
                    .or_insert_with(|| Arc::new(Mutex::new(())));
                entry.value().clone()
            };
            let _guard = lock.lock().await;

            // Re-read under the lock: a concurrent holder may have already
            // refreshed and persisted new credentials while we waited
            let Some((integration, current)) = self.load_credentials(user_id, provider).await?
            else {
                return Ok(None);
            };

            if current.needs_refresh() {
                match self
                    .refresh_credentials(&integration, provider, current)
                    .await?
                {
                    Some(fresh) => fresh,
                    None => return Ok(None),
                }
            } else {
                current
            }
        } else {
            credentials
        };

        Self::build_client(provider, &credentials).map(Some)
    }
}
