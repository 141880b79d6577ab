// ABOUTME: Repository trait definitions consumed by the sync engine
// ABOUTME: Explicit storage ports with SQLite and in-memory implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Storage Ports
//!
//! The sync engine never talks to a database handle directly; it consumes the
//! repository traits defined here. Two implementations ship with the crate:
//! [`memory::MemoryStorage`] (tests, embedded use) and
//! [`sqlite::SqliteStorage`] (the production default of the surrounding
//! application). Leads and outreach actions are written by the surrounding
//! application - their repositories are read-only ports here.

pub mod memory;
pub mod sqlite;

use crate::errors::AppResult;
use crate::models::{
    CrmKind, CrmMapping, CrmSyncLog, EncryptedCredentials, EntityKind, Integration,
    IntegrationStatus, Lead, OutreachAction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Generate a fresh 32-byte credential encryption key
///
/// # Errors
///
/// Returns an error if the OS random source is unavailable
pub fn generate_encryption_key() -> AppResult<[u8; 32]> {
    use ring::rand::{SecureRandom, SystemRandom};

    let rng = SystemRandom::new();
    let mut key = [0u8; 32];
    rng.fill(&mut key)?;
    Ok(key)
}

/// Lead lookups (read-only port)
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Fetch a lead by id
    async fn lead_by_id(&self, lead_id: Uuid) -> AppResult<Option<Lead>>;
}

/// Outreach action lookups (read-only port)
#[async_trait]
pub trait ActionRepository: Send + Sync {
    /// Fetch an action by id
    async fn action_by_id(&self, action_id: Uuid) -> AppResult<Option<OutreachAction>>;

    /// All actions for a lead whose status is Sent
    async fn sent_actions_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<OutreachAction>>;
}

/// Integration rows and their credential lifecycle
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Store a new integration row (called when the consent flow completes)
    async fn create_integration(&self, integration: &Integration) -> AppResult<()>;

    /// The user's Connected integration of the given type, if any
    async fn connected_integration(
        &self,
        user_id: Uuid,
        integration_type: &str,
    ) -> AppResult<Option<Integration>>;

    /// All integration rows for a user, regardless of status
    async fn integrations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Integration>>;

    /// Replace the encrypted credential blob after a successful refresh
    async fn update_credentials(
        &self,
        integration_id: Uuid,
        credentials: &EncryptedCredentials,
    ) -> AppResult<()>;

    /// Flip the connection status (revoked grant, user disconnect)
    async fn update_status(
        &self,
        integration_id: Uuid,
        status: IntegrationStatus,
    ) -> AppResult<()>;
}

/// Entity-to-remote-object mappings
///
/// The unique key is (provider, `entity_kind`, `entity_id`); implementations
/// must make [`MappingRepository::insert_mapping_if_absent`] atomic on it.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Unique lookup by key
    async fn find_mapping(
        &self,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Option<CrmMapping>>;

    /// Atomic insert-if-absent; `false` means a row already held the key and
    /// the caller lost the race
    async fn insert_mapping_if_absent(&self, mapping: &CrmMapping) -> AppResult<bool>;

    /// Refresh `last_synced_at` on an existing mapping
    async fn touch_mapping(
        &self,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// All mappings for one local entity across providers
    async fn mappings_for_entity(
        &self,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<CrmMapping>>;
}

/// Append-only sync audit log
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Append one attempt record
    async fn append_log(&self, entry: &CrmSyncLog) -> AppResult<()>;

    /// Most recent attempts for a user, newest first
    async fn recent_logs_for_user(&self, user_id: Uuid, limit: u32) -> AppResult<Vec<CrmSyncLog>>;
}

/// Bundle of repository handles injected into the sync manager
#[derive(Clone)]
pub struct Repositories {
    /// Lead lookups
    pub leads: Arc<dyn LeadRepository>,
    /// Action lookups
    pub actions: Arc<dyn ActionRepository>,
    /// Integration rows
    pub integrations: Arc<dyn IntegrationRepository>,
    /// Entity mappings
    pub mappings: Arc<dyn MappingRepository>,
    /// Sync audit log
    pub sync_log: Arc<dyn SyncLogRepository>,
}

impl Repositories {
    /// Build the bundle from one storage object implementing every port
    pub fn from_single<S>(storage: Arc<S>) -> Self
    where
        S: LeadRepository
            + ActionRepository
            + IntegrationRepository
            + MappingRepository
            + SyncLogRepository
            + 'static,
    {
        Self {
            leads: storage.clone(),
            actions: storage.clone(),
            integrations: storage.clone(),
            mappings: storage.clone(),
            sync_log: storage,
        }
    }
}
