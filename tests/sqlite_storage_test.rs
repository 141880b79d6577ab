// ABOUTME: Integration tests for the SQLite storage implementation
// ABOUTME: Mapping unique-key enforcement, integration lifecycle, and audit log persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

//! SQLite repository behavior, including the unique index that backs mapping
//! idempotence.

use cadence_crm_sync::models::{
    CrmKind, CrmMapping, CrmSyncLog, EncryptedCredentials, EntityKind, Integration,
    IntegrationStatus, SyncOperation,
};
use cadence_crm_sync::storage::{
    sqlite::SqliteStorage, ActionRepository, IntegrationRepository, LeadRepository,
    MappingRepository, SyncLogRepository,
};
use chrono::Utc;
use uuid::Uuid;

mod common;

async fn memory_storage() -> SqliteStorage {
    common::init_test_logging();
    SqliteStorage::new("sqlite::memory:").await.unwrap()
}

fn test_integration(user_id: Uuid, provider: CrmKind) -> Integration {
    Integration::new(
        user_id,
        provider.integration_type(),
        EncryptedCredentials {
            blob: "b64-blob".to_owned(),
        },
    )
}

#[tokio::test]
async fn test_lead_and_action_round_trip() {
    let storage = memory_storage().await;
    let lead = common::test_lead();
    storage.insert_lead(&lead).await.unwrap();

    let loaded = storage.lead_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, lead.name);
    assert_eq!(loaded.email, lead.email);
    assert_eq!(loaded.organization, lead.organization);

    let sent = common::sent_action(lead.id);
    let draft = common::draft_action(lead.id);
    storage.insert_action(&sent).await.unwrap();
    storage.insert_action(&draft).await.unwrap();

    let loaded_action = storage.action_by_id(sent.id).await.unwrap().unwrap();
    assert_eq!(loaded_action.subject, sent.subject);
    assert_eq!(loaded_action.action_type, sent.action_type);
    assert_eq!(loaded_action.outcome, sent.outcome);

    // Only sent actions are sync-eligible
    let eligible = storage.sent_actions_for_lead(lead.id).await.unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id, sent.id);

    assert!(storage.lead_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_integration_lifecycle() {
    let storage = memory_storage().await;
    let user_id = Uuid::new_v4();
    let integration = test_integration(user_id, CrmKind::HubSpot);
    storage.create_integration(&integration).await.unwrap();

    let connected = storage
        .connected_integration(user_id, "crm_hubspot")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connected.id, integration.id);
    assert_eq!(connected.status, IntegrationStatus::Connected);
    assert_eq!(connected.credentials.unwrap().blob, "b64-blob");

    // Credentials replaced on refresh
    storage
        .update_credentials(
            integration.id,
            &EncryptedCredentials {
                blob: "rotated".to_owned(),
            },
        )
        .await
        .unwrap();
    let refreshed = storage
        .connected_integration(user_id, "crm_hubspot")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.credentials.unwrap().blob, "rotated");

    // Disconnection removes the row from connected lookups but not the table
    storage
        .update_status(integration.id, IntegrationStatus::Disconnected)
        .await
        .unwrap();
    assert!(storage
        .connected_integration(user_id, "crm_hubspot")
        .await
        .unwrap()
        .is_none());
    let all = storage.integrations_for_user(user_id).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, IntegrationStatus::Disconnected);
}

#[tokio::test]
async fn test_mapping_unique_key_enforced() {
    let storage = memory_storage().await;
    let user_id = Uuid::new_v4();
    let lead_id = Uuid::new_v4();

    let first = CrmMapping::new(
        user_id,
        CrmKind::HubSpot,
        EntityKind::Lead,
        lead_id,
        "contact",
        "hs-1",
    );
    assert!(storage.insert_mapping_if_absent(&first).await.unwrap());

    // Same key, different remote id - the second writer loses
    let second = CrmMapping::new(
        user_id,
        CrmKind::HubSpot,
        EntityKind::Lead,
        lead_id,
        "contact",
        "hs-2",
    );
    assert!(!storage.insert_mapping_if_absent(&second).await.unwrap());

    let stored = storage
        .find_mapping(CrmKind::HubSpot, EntityKind::Lead, lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remote_id, "hs-1");

    // Same entity on another provider is a distinct key
    let other_provider = CrmMapping::new(
        user_id,
        CrmKind::Pipedrive,
        EntityKind::Lead,
        lead_id,
        "contact",
        "pd-9",
    );
    assert!(storage
        .insert_mapping_if_absent(&other_provider)
        .await
        .unwrap());

    let all = storage
        .mappings_for_entity(EntityKind::Lead, lead_id)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_mapping_touch_refreshes_last_synced_at() {
    let storage = memory_storage().await;
    let lead_id = Uuid::new_v4();
    let mut mapping = CrmMapping::new(
        Uuid::new_v4(),
        CrmKind::Salesforce,
        EntityKind::Lead,
        lead_id,
        "contact",
        "00Q-1",
    );
    mapping.last_synced_at = Utc::now() - chrono::Duration::days(3);
    assert!(storage.insert_mapping_if_absent(&mapping).await.unwrap());

    let later = Utc::now();
    storage
        .touch_mapping(CrmKind::Salesforce, EntityKind::Lead, lead_id, later)
        .await
        .unwrap();

    let stored = storage
        .find_mapping(CrmKind::Salesforce, EntityKind::Lead, lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_synced_at.timestamp(), later.timestamp());
    assert_eq!(stored.remote_id, "00Q-1");
}

#[tokio::test]
async fn test_sync_log_append_and_query() {
    let storage = memory_storage().await;
    let user_id = Uuid::new_v4();
    let lead_id = Uuid::new_v4();

    let mut success = CrmSyncLog::record(
        user_id,
        CrmKind::HubSpot,
        SyncOperation::Create,
        EntityKind::Lead,
        lead_id,
        true,
        None,
    );
    success.timestamp = Utc::now() - chrono::Duration::minutes(5);
    storage.append_log(&success).await.unwrap();

    let failure = CrmSyncLog::record(
        user_id,
        CrmKind::Pipedrive,
        SyncOperation::Update,
        EntityKind::Lead,
        lead_id,
        false,
        Some("pipedrive API error (status 503): upstream".to_owned()),
    );
    storage.append_log(&failure).await.unwrap();

    let logs = storage.recent_logs_for_user(user_id, 10).await.unwrap();
    assert_eq!(logs.len(), 2);
    // Newest first
    assert_eq!(logs[0].provider, CrmKind::Pipedrive);
    assert!(!logs[0].success);
    assert!(logs[0].error_message.as_deref().unwrap().contains("503"));
    assert_eq!(logs[1].provider, CrmKind::HubSpot);
    assert!(logs[1].success);

    let limited = storage.recent_logs_for_user(user_id, 1).await.unwrap();
    assert_eq!(limited.len(), 1);

    let other_user = storage
        .recent_logs_for_user(Uuid::new_v4(), 10)
        .await
        .unwrap();
    assert!(other_user.is_empty());
}

#[tokio::test]
async fn test_on_disk_database_persists_across_reopen() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite:{}/sync.db", dir.path().display());

    let lead_id = Uuid::new_v4();
    {
        let storage = SqliteStorage::new(&database_url).await.unwrap();
        let mapping = CrmMapping::new(
            Uuid::new_v4(),
            CrmKind::HubSpot,
            EntityKind::Lead,
            lead_id,
            "contact",
            "hs-77",
        );
        assert!(storage.insert_mapping_if_absent(&mapping).await.unwrap());
    }

    let reopened = SqliteStorage::new(&database_url).await.unwrap();
    let stored = reopened
        .find_mapping(CrmKind::HubSpot, EntityKind::Lead, lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.remote_id, "hs-77");
}
