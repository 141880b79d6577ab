// ABOUTME: Sync manager orchestrating lead and activity mirroring into CRM providers
// ABOUTME: Owns the create-or-update decision, idempotence guards, fan-out, and audit logging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Sync Manager
//!
//! Orchestration of outbound CRM sync. Per lead: resolve the provider client
//! (4.1 construction path), decide create vs update against the mapping
//! store, push the contact, then fan the lead's sent outreach actions out as
//! remote activities. Every attempt - success or failure - lands exactly one
//! row in the sync log; the one exception is the activity idempotence guard,
//! which returns before an attempt exists.
//!
//! A failure for one entity or one provider never aborts or rolls back any
//! other: `sync_lead_to_all_crms` isolates providers, and activity fan-out
//! failures are logged without touching the lead-level result.

use super::{SyncResult, SyncStatus};
use crate::crm::core::{CrmActivity, CrmContact};
use crate::crm::factory::ClientFactory;
use crate::errors::AppResult;
use crate::models::{
    ActionStatus, CrmKind, CrmMapping, CrmSyncLog, EntityKind, SyncOperation,
};
use crate::storage::Repositories;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Remote object family tags recorded on mapping rows
const REMOTE_CONTACT: &str = "contact";
const REMOTE_ACTIVITY: &str = "activity";

/// Orchestrates CRM synchronization for the surrounding application
pub struct SyncManager {
    repos: Repositories,
    clients: Arc<dyn ClientFactory>,
}

impl SyncManager {
    /// Create a manager from injected repositories and a client factory
    #[must_use]
    pub fn new(repos: Repositories, clients: Arc<dyn ClientFactory>) -> Self {
        Self { repos, clients }
    }

    /// Mirror one lead into one provider
    ///
    /// Create-or-update semantics: an existing mapping wins; otherwise the
    /// provider is searched by email to catch records created outside this
    /// system; only then is a new remote contact created. On success the
    /// lead's sent actions are fanned out as remote activities.
    #[instrument(skip(self), fields(user_id = %user_id, lead_id = %lead_id, provider = %provider))]
    pub async fn sync_lead_to_crm(
        &self,
        user_id: Uuid,
        lead_id: Uuid,
        provider: CrmKind,
    ) -> SyncResult {
        let result = self
            .sync_lead_contact(user_id, lead_id, provider)
            .await
            .unwrap_or_else(|e| SyncResult::failure(SyncOperation::Create, e.to_string()));

        self.log_attempt(user_id, provider, EntityKind::Lead, lead_id, &result)
            .await;

        if result.success {
            if let Some(remote_id) = result.remote_id.clone() {
                self.fan_out_sent_actions(user_id, lead_id, provider, &remote_id)
                    .await;
            }
        }

        result
    }

    /// Mirror one sent outreach action into one provider as an activity
    ///
    /// Idempotent: an existing mapping short-circuits to `operation: skip`
    /// without any remote call (and without a new log row - no attempt was
    /// made).
    #[instrument(skip(self, contact_remote_id), fields(user_id = %user_id, action_id = %action_id, provider = %provider))]
    pub async fn sync_activity_to_crm(
        &self,
        user_id: Uuid,
        action_id: Uuid,
        provider: CrmKind,
        contact_remote_id: &str,
    ) -> SyncResult {
        match self
            .repos
            .mappings
            .find_mapping(provider, EntityKind::Action, action_id)
            .await
        {
            Ok(Some(mapping)) => {
                debug!("Action {action_id} already synced to {provider}, skipping");
                return SyncResult::skipped(mapping.remote_id);
            }
            Ok(None) => {}
            Err(e) => {
                let result = SyncResult::failure(SyncOperation::Create, e.to_string());
                self.log_attempt(user_id, provider, EntityKind::Action, action_id, &result)
                    .await;
                return result;
            }
        }

        let result = self
            .push_activity(user_id, action_id, provider, contact_remote_id)
            .await
            .unwrap_or_else(|e| SyncResult::failure(SyncOperation::Create, e.to_string()));

        self.log_attempt(user_id, provider, EntityKind::Action, action_id, &result)
            .await;
        result
    }

    /// Mirror one lead into every CRM the user has connected
    ///
    /// Results are collected per provider tag; one provider's failure neither
    /// prevents nor alters any other provider's sync.
    #[instrument(skip(self), fields(user_id = %user_id, lead_id = %lead_id))]
    pub async fn sync_lead_to_all_crms(
        &self,
        user_id: Uuid,
        lead_id: Uuid,
    ) -> HashMap<String, SyncResult> {
        let mut results = HashMap::new();

        let integrations = match self.repos.integrations.integrations_for_user(user_id).await {
            Ok(integrations) => integrations,
            Err(e) => {
                warn!("Failed to enumerate integrations for user {user_id}: {e}");
                return results;
            }
        };

        for integration in integrations {
            if !integration.is_connected_crm() {
                continue;
            }
            let Some(provider) = CrmKind::from_integration_type(&integration.integration_type)
            else {
                continue;
            };

            let result = self.sync_lead_to_crm(user_id, lead_id, provider).await;
            results.insert(provider.as_str().to_owned(), result);
        }

        results
    }

    /// The CRM providers the user currently has connected
    ///
    /// # Errors
    ///
    /// Returns an error if the integration store cannot be read
    pub async fn get_connected_crms(&self, user_id: Uuid) -> AppResult<Vec<CrmKind>> {
        let integrations = self.repos.integrations.integrations_for_user(user_id).await?;
        Ok(integrations
            .iter()
            .filter(|integration| integration.is_connected_crm())
            .filter_map(|integration| {
                CrmKind::from_integration_type(&integration.integration_type)
            })
            .collect())
    }

    /// Per-provider sync state of one lead across all known providers
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping store cannot be read
    pub async fn get_sync_status(
        &self,
        lead_id: Uuid,
    ) -> AppResult<HashMap<String, SyncStatus>> {
        let mappings = self
            .repos
            .mappings
            .mappings_for_entity(EntityKind::Lead, lead_id)
            .await?;

        let mut status: HashMap<String, SyncStatus> = CrmKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.as_str().to_owned(),
                    SyncStatus {
                        synced: false,
                        last_synced_at: None,
                    },
                )
            })
            .collect();

        for mapping in mappings {
            status.insert(
                mapping.provider.as_str().to_owned(),
                SyncStatus {
                    synced: true,
                    last_synced_at: Some(mapping.last_synced_at),
                },
            );
        }

        Ok(status)
    }

    /// Contact-sync core of [`Self::sync_lead_to_crm`]
    ///
    /// Domain failures come back as unsuccessful [`SyncResult`]s; only
    /// infrastructure faults surface as `Err` (folded into a failure result
    /// by the caller).
    async fn sync_lead_contact(
        &self,
        user_id: Uuid,
        lead_id: Uuid,
        provider: CrmKind,
    ) -> AppResult<SyncResult> {
        let lead = self.repos.leads.lead_by_id(lead_id).await?;
        let Some(lead) = lead.filter(|l| l.email.as_deref().is_some_and(|e| !e.is_empty()))
        else {
            return Ok(SyncResult::failure(
                SyncOperation::Create,
                "Lead not found or has no email",
            ));
        };
        // Filter above guarantees the email is present
        let Some(email) = lead.email.clone() else {
            return Ok(SyncResult::failure(
                SyncOperation::Create,
                "Lead not found or has no email",
            ));
        };

        let Some(client) = self.clients.client_for_user(user_id, provider).await? else {
            return Ok(SyncResult::failure(
                SyncOperation::Create,
                format!("{provider} not connected"),
            ));
        };

        let contact = CrmContact::from_lead(&lead);

        if let Some(mapping) = self
            .repos
            .mappings
            .find_mapping(provider, EntityKind::Lead, lead_id)
            .await?
        {
            return match client.update_contact(&mapping.remote_id, &contact).await {
                Ok(()) => {
                    self.repos
                        .mappings
                        .touch_mapping(provider, EntityKind::Lead, lead_id, Utc::now())
                        .await?;
                    Ok(SyncResult::updated(mapping.remote_id))
                }
                Err(e) => Ok(SyncResult::failure(SyncOperation::Update, e.to_string())),
            };
        }

        // No mapping yet - a matching record may still exist remotely
        // (created in the CRM directly); update it instead of duplicating
        let existing = client.find_contact_by_email(&email).await?;

        let (remote_id, operation) = match existing {
            Some(remote) => match client.update_contact(&remote.id, &contact).await {
                Ok(()) => (remote.id, SyncOperation::Update),
                Err(e) => return Ok(SyncResult::failure(SyncOperation::Update, e.to_string())),
            },
            None => match client.create_contact(&contact).await {
                Ok(remote_id) => (remote_id, SyncOperation::Create),
                Err(e) => return Ok(SyncResult::failure(SyncOperation::Create, e.to_string())),
            },
        };

        let mapping = CrmMapping::new(
            user_id,
            provider,
            EntityKind::Lead,
            lead_id,
            REMOTE_CONTACT,
            &remote_id,
        );
        if !self.repos.mappings.insert_mapping_if_absent(&mapping).await? {
            // A concurrent sync won the race; its mapping stands
            warn!(
                "Mapping for {provider}/lead/{lead_id} already present, keeping the existing row"
            );
        }

        Ok(match operation {
            SyncOperation::Update => SyncResult::updated(remote_id),
            _ => SyncResult::created(remote_id),
        })
    }

    /// Activity-sync core of [`Self::sync_activity_to_crm`]
    async fn push_activity(
        &self,
        user_id: Uuid,
        action_id: Uuid,
        provider: CrmKind,
        contact_remote_id: &str,
    ) -> AppResult<SyncResult> {
        let Some(action) = self.repos.actions.action_by_id(action_id).await? else {
            return Ok(SyncResult::failure(
                SyncOperation::Create,
                "Action not found",
            ));
        };
        if action.status != ActionStatus::Sent {
            return Ok(SyncResult::failure(
                SyncOperation::Create,
                "Action has not been sent",
            ));
        }

        let Some(client) = self.clients.client_for_user(user_id, provider).await? else {
            return Ok(SyncResult::failure(
                SyncOperation::Create,
                format!("{provider} not connected"),
            ));
        };

        let activity = CrmActivity::from_action(&action, contact_remote_id);

        match client.create_activity(&activity).await {
            Ok(remote_id) => {
                let mapping = CrmMapping::new(
                    user_id,
                    provider,
                    EntityKind::Action,
                    action_id,
                    REMOTE_ACTIVITY,
                    &remote_id,
                );
                if !self.repos.mappings.insert_mapping_if_absent(&mapping).await? {
                    warn!(
                        "Mapping for {provider}/action/{action_id} already present, keeping the existing row"
                    );
                }
                Ok(SyncResult::created(remote_id))
            }
            Err(e) => Ok(SyncResult::failure(SyncOperation::Create, e.to_string())),
        }
    }

    /// Push each of the lead's sent actions as a remote activity
    ///
    /// Failures here are independently logged by the per-action calls and do
    /// not change the lead-level result.
    async fn fan_out_sent_actions(
        &self,
        user_id: Uuid,
        lead_id: Uuid,
        provider: CrmKind,
        contact_remote_id: &str,
    ) {
        let actions = match self.repos.actions.sent_actions_for_lead(lead_id).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!("Failed to enumerate sent actions for lead {lead_id}: {e}");
                return;
            }
        };

        for action in actions {
            let result = self
                .sync_activity_to_crm(user_id, action.id, provider, contact_remote_id)
                .await;
            if !result.success {
                debug!(
                    "Activity sync for action {} to {provider} failed: {:?}",
                    action.id, result.error
                );
            }
        }
    }

    /// Append the attempt to the audit log; a log-write failure is reported
    /// but never overrides the sync outcome
    async fn log_attempt(
        &self,
        user_id: Uuid,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
        result: &SyncResult,
    ) {
        let entry = CrmSyncLog::record(
            user_id,
            provider,
            result.operation,
            entity_kind,
            entity_id,
            result.success,
            result.error.clone(),
        );

        if let Err(e) = self.repos.sync_log.append_log(&entry).await {
            warn!("Failed to append sync log entry: {e}");
        }
    }
}
