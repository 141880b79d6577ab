// ABOUTME: In-memory implementation of the storage ports
// ABOUTME: Backs integration tests and embedded single-process deployments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! In-memory storage.
//!
//! One `RwLock`-guarded map per table. The mapping map is keyed by the unique
//! (provider, entity kind, entity id) tuple, so insert-if-absent is atomic
//! under the write lock - the same guarantee the SQLite implementation gets
//! from its unique index.

use super::{
    ActionRepository, IntegrationRepository, LeadRepository, MappingRepository, SyncLogRepository,
};
use crate::errors::AppResult;
use crate::models::{
    ActionStatus, CrmKind, CrmMapping, CrmSyncLog, EncryptedCredentials, EntityKind, Integration,
    IntegrationStatus, Lead, OutreachAction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

type MappingKey = (CrmKind, EntityKind, Uuid);

/// In-memory implementation of every storage port
#[derive(Default)]
pub struct MemoryStorage {
    leads: RwLock<HashMap<Uuid, Lead>>,
    actions: RwLock<HashMap<Uuid, OutreachAction>>,
    integrations: RwLock<HashMap<Uuid, Integration>>,
    mappings: RwLock<HashMap<MappingKey, CrmMapping>>,
    sync_log: RwLock<Vec<CrmSyncLog>>,
}

impl MemoryStorage {
    /// Create empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a lead (the surrounding application owns lead writes)
    pub async fn insert_lead(&self, lead: Lead) {
        self.leads.write().await.insert(lead.id, lead);
    }

    /// Seed an outreach action
    pub async fn insert_action(&self, action: OutreachAction) {
        self.actions.write().await.insert(action.id, action);
    }

    /// Number of mapping rows currently held
    pub async fn mapping_count(&self) -> usize {
        self.mappings.read().await.len()
    }

    /// Number of sync log rows currently held
    pub async fn sync_log_count(&self) -> usize {
        self.sync_log.read().await.len()
    }

    /// Snapshot of the full sync log, oldest first
    pub async fn sync_log_entries(&self) -> Vec<CrmSyncLog> {
        self.sync_log.read().await.clone()
    }
}

#[async_trait]
impl LeadRepository for MemoryStorage {
    async fn lead_by_id(&self, lead_id: Uuid) -> AppResult<Option<Lead>> {
        Ok(self.leads.read().await.get(&lead_id).cloned())
    }
}

#[async_trait]
impl ActionRepository for MemoryStorage {
    async fn action_by_id(&self, action_id: Uuid) -> AppResult<Option<OutreachAction>> {
        Ok(self.actions.read().await.get(&action_id).cloned())
    }

    async fn sent_actions_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<OutreachAction>> {
        let mut actions: Vec<OutreachAction> = self
            .actions
            .read()
            .await
            .values()
            .filter(|action| action.lead_id == lead_id && action.status == ActionStatus::Sent)
            .cloned()
            .collect();
        actions.sort_by_key(|action| action.sent_at);
        Ok(actions)
    }
}

#[async_trait]
impl IntegrationRepository for MemoryStorage {
    async fn create_integration(&self, integration: &Integration) -> AppResult<()> {
        self.integrations
            .write()
            .await
            .insert(integration.id, integration.clone());
        Ok(())
    }

    async fn connected_integration(
        &self,
        user_id: Uuid,
        integration_type: &str,
    ) -> AppResult<Option<Integration>> {
        Ok(self
            .integrations
            .read()
            .await
            .values()
            .find(|row| {
                row.user_id == user_id
                    && row.integration_type == integration_type
                    && row.status == IntegrationStatus::Connected
            })
            .cloned())
    }

    async fn integrations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Integration>> {
        Ok(self
            .integrations
            .read()
            .await
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_credentials(
        &self,
        integration_id: Uuid,
        credentials: &EncryptedCredentials,
    ) -> AppResult<()> {
        if let Some(row) = self.integrations.write().await.get_mut(&integration_id) {
            row.credentials = Some(credentials.clone());
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_status(
        &self,
        integration_id: Uuid,
        status: IntegrationStatus,
    ) -> AppResult<()> {
        if let Some(row) = self.integrations.write().await.get_mut(&integration_id) {
            row.status = status;
            row.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl MappingRepository for MemoryStorage {
    async fn find_mapping(
        &self,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Option<CrmMapping>> {
        Ok(self
            .mappings
            .read()
            .await
            .get(&(provider, entity_kind, entity_id))
            .cloned())
    }

    async fn insert_mapping_if_absent(&self, mapping: &CrmMapping) -> AppResult<bool> {
        let key = (mapping.provider, mapping.entity_kind, mapping.entity_id);
        let mut mappings = self.mappings.write().await;
        if mappings.contains_key(&key) {
            return Ok(false);
        }
        mappings.insert(key, mapping.clone());
        Ok(true)
    }

    async fn touch_mapping(
        &self,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(row) = self
            .mappings
            .write()
            .await
            .get_mut(&(provider, entity_kind, entity_id))
        {
            row.last_synced_at = synced_at;
        }
        Ok(())
    }

    async fn mappings_for_entity(
        &self,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<CrmMapping>> {
        Ok(self
            .mappings
            .read()
            .await
            .values()
            .filter(|row| row.entity_kind == entity_kind && row.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SyncLogRepository for MemoryStorage {
    async fn append_log(&self, entry: &CrmSyncLog) -> AppResult<()> {
        self.sync_log.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent_logs_for_user(&self, user_id: Uuid, limit: u32) -> AppResult<Vec<CrmSyncLog>> {
        let log = self.sync_log.read().await;
        let mut entries: Vec<CrmSyncLog> = log
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit as usize);
        Ok(entries)
    }
}
