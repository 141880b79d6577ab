// ABOUTME: Integration tests for sync manager orchestration semantics
// ABOUTME: Create-or-update decisions, idempotence guards, fan-out, and audit logging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

//! Sync manager behavior against in-memory repositories and recording
//! provider fakes.

use cadence_crm_sync::crm::core::RemoteContact;
use cadence_crm_sync::models::{CrmKind, EntityKind, SyncOperation};
use cadence_crm_sync::storage::MappingRepository;
use std::sync::atomic::Ordering;

mod common;

#[tokio::test]
async fn test_first_sync_creates_contact_and_mapping() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;

    assert!(result.success);
    assert_eq!(result.operation, SyncOperation::Create);
    assert_eq!(result.remote_id.as_deref(), Some("hubspot-contact-1"));

    let state = harness.state(CrmKind::HubSpot);
    assert_eq!(state.create_contact_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.update_contact_calls.load(Ordering::SeqCst), 0);
    // The remote is searched before creating, to catch records made in-CRM
    assert_eq!(state.find_by_email_calls.load(Ordering::SeqCst), 1);

    assert_eq!(harness.storage.mapping_count().await, 1);
    assert_eq!(harness.storage.sync_log_count().await, 1);
    let log = harness.storage.sync_log_entries().await;
    assert!(log[0].success);
    assert_eq!(log[0].operation, SyncOperation::Create);
    assert_eq!(log[0].entity_kind, EntityKind::Lead);
}

#[tokio::test]
async fn test_resync_updates_with_mapped_remote_id() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let mut lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;

    let first = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;
    assert!(first.success);

    // Lead changed locally; re-sync must update, not create
    lead.organization = Some("Acme Holdings".to_owned());
    harness.storage.insert_lead(lead.clone()).await;

    let second = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;

    assert!(second.success);
    assert_eq!(second.operation, SyncOperation::Update);
    assert_eq!(second.remote_id, first.remote_id);

    let state = harness.state(CrmKind::HubSpot);
    assert_eq!(state.create_contact_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.update_contact_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        state.updated_remote_ids.lock().unwrap().as_slice(),
        ["hubspot-contact-1"]
    );

    // Mapping row count unchanged; one new log row per attempt
    assert_eq!(harness.storage.mapping_count().await, 1);
    assert_eq!(harness.storage.sync_log_count().await, 2);
}

#[tokio::test]
async fn test_existing_remote_contact_is_updated_not_duplicated() {
    let harness = common::setup_harness(&[CrmKind::Salesforce]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;

    // A record for this email already lives in the CRM (created there
    // directly); no local mapping exists yet
    *harness
        .state(CrmKind::Salesforce)
        .existing_contact
        .lock()
        .unwrap() = Some(RemoteContact {
        id: "00Q-EXISTING".to_owned(),
        email: lead.email.clone(),
        first_name: None,
        last_name: None,
        company: None,
    });

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::Salesforce)
        .await;

    assert!(result.success);
    assert_eq!(result.operation, SyncOperation::Update);
    assert_eq!(result.remote_id.as_deref(), Some("00Q-EXISTING"));

    let state = harness.state(CrmKind::Salesforce);
    assert_eq!(state.create_contact_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.update_contact_calls.load(Ordering::SeqCst), 1);

    // The mapping points at the pre-existing remote id
    let mapping = harness
        .storage
        .find_mapping(CrmKind::Salesforce, EntityKind::Lead, lead.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mapping.remote_id, "00Q-EXISTING");
}

#[tokio::test]
async fn test_lead_without_email_fails_validation() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::emailless_lead();
    harness.storage.insert_lead(lead.clone()).await;

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Lead not found or has no email")
    );

    // The failed attempt is still audited; nothing was mapped
    assert_eq!(harness.storage.sync_log_count().await, 1);
    assert!(!harness.storage.sync_log_entries().await[0].success);
    assert_eq!(harness.storage.mapping_count().await, 0);
}

#[tokio::test]
async fn test_missing_lead_fails_validation() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, uuid::Uuid::new_v4(), CrmKind::HubSpot)
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Lead not found or has no email")
    );
}

#[tokio::test]
async fn test_unconnected_provider_fails() {
    // Harness has HubSpot only; Pipedrive is not connected
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::Pipedrive)
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("pipedrive not connected"));
    assert_eq!(harness.storage.sync_log_count().await, 1);
}

#[tokio::test]
async fn test_sent_actions_fan_out_as_activities() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;
    harness
        .storage
        .insert_action(common::sent_action(lead.id))
        .await;
    harness
        .storage
        .insert_action(common::draft_action(lead.id))
        .await;

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;
    assert!(result.success);

    let state = harness.state(CrmKind::HubSpot);
    // Only the sent action became an activity; the draft stayed local
    assert_eq!(state.create_activity_calls.load(Ordering::SeqCst), 1);

    // Lead mapping + action mapping; lead log + activity log
    assert_eq!(harness.storage.mapping_count().await, 2);
    assert_eq!(harness.storage.sync_log_count().await, 2);
}

#[tokio::test]
async fn test_activity_sync_is_idempotent() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::test_lead();
    let action = common::sent_action(lead.id);
    harness.storage.insert_lead(lead.clone()).await;
    harness.storage.insert_action(action.clone()).await;

    let first = harness
        .manager
        .sync_activity_to_crm(harness.user_id, action.id, CrmKind::HubSpot, "42")
        .await;
    assert!(first.success);
    assert_eq!(first.operation, SyncOperation::Create);

    let logs_after_first = harness.storage.sync_log_count().await;

    let second = harness
        .manager
        .sync_activity_to_crm(harness.user_id, action.id, CrmKind::HubSpot, "42")
        .await;

    assert!(second.success);
    assert_eq!(second.operation, SyncOperation::Skip);
    assert_eq!(second.remote_id, first.remote_id);

    let state = harness.state(CrmKind::HubSpot);
    // Exactly one remote activity, one mapping row, and no outbound call or
    // log row for the skip
    assert_eq!(state.create_activity_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.storage.mapping_count().await, 1);
    assert_eq!(harness.storage.sync_log_count().await, logs_after_first);
}

#[tokio::test]
async fn test_unsent_action_is_rejected() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::test_lead();
    let draft = common::draft_action(lead.id);
    harness.storage.insert_lead(lead.clone()).await;
    harness.storage.insert_action(draft.clone()).await;

    let result = harness
        .manager
        .sync_activity_to_crm(harness.user_id, draft.id, CrmKind::HubSpot, "42")
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Action has not been sent"));
    assert_eq!(
        harness
            .state(CrmKind::HubSpot)
            .create_activity_calls
            .load(Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_activity_failure_does_not_change_lead_result() {
    let harness = common::setup_harness(&[CrmKind::HubSpot]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;
    harness
        .storage
        .insert_action(common::sent_action(lead.id))
        .await;

    harness
        .state(CrmKind::HubSpot)
        .fail_activity_ops
        .store(true, Ordering::SeqCst);

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;

    // Contact sync stands even though the fan-out failed
    assert!(result.success);

    // Lead log (success) + activity log (failure)
    let logs = harness.storage.sync_log_entries().await;
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().any(|entry| !entry.success
        && entry.entity_kind == EntityKind::Action
        && entry.error_message.is_some()));

    // Only the lead got mapped
    assert_eq!(harness.storage.mapping_count().await, 1);
}

#[tokio::test]
async fn test_all_crms_isolates_provider_failures() {
    let harness = common::setup_harness(&[CrmKind::HubSpot, CrmKind::Pipedrive]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;

    harness
        .state(CrmKind::HubSpot)
        .fail_contact_ops
        .store(true, Ordering::SeqCst);

    let results = harness
        .manager
        .sync_lead_to_all_crms(harness.user_id, lead.id)
        .await;

    assert_eq!(results.len(), 2);
    assert!(!results["hubspot"].success);
    assert!(results["pipedrive"].success);

    // Pipedrive's mapping landed untouched by HubSpot's failure
    let mapping = harness
        .storage
        .find_mapping(CrmKind::Pipedrive, EntityKind::Lead, lead.id)
        .await
        .unwrap();
    assert!(mapping.is_some());
    let hubspot_mapping = harness
        .storage
        .find_mapping(CrmKind::HubSpot, EntityKind::Lead, lead.id)
        .await
        .unwrap();
    assert!(hubspot_mapping.is_none());

    // One log row per provider attempt
    assert_eq!(harness.storage.sync_log_count().await, 2);
}

#[tokio::test]
async fn test_get_connected_crms_and_sync_status() {
    let harness = common::setup_harness(&[CrmKind::HubSpot, CrmKind::Salesforce]).await;
    let lead = common::test_lead();
    harness.storage.insert_lead(lead.clone()).await;

    let mut connected = harness
        .manager
        .get_connected_crms(harness.user_id)
        .await
        .unwrap();
    connected.sort_by_key(|kind| kind.as_str());
    assert_eq!(connected, vec![CrmKind::HubSpot, CrmKind::Salesforce]);

    let result = harness
        .manager
        .sync_lead_to_crm(harness.user_id, lead.id, CrmKind::HubSpot)
        .await;
    assert!(result.success);

    let status = harness.manager.get_sync_status(lead.id).await.unwrap();
    assert_eq!(status.len(), 3);
    assert!(status["hubspot"].synced);
    assert!(status["hubspot"].last_synced_at.is_some());
    assert!(!status["salesforce"].synced);
    assert!(status["salesforce"].last_synced_at.is_none());
    assert!(!status["pipedrive"].synced);
}
