// ABOUTME: Shared test utilities and fixtures for integration tests
// ABOUTME: In-memory storage setup, recording provider fakes, and domain fixtures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
#![allow(missing_docs)]

//! Shared test utilities for `cadence_crm_sync` integration tests.

use async_trait::async_trait;
use cadence_crm_sync::crm::core::{
    CrmActivity, CrmContact, CrmDeal, CrmProvider, ProviderConfig, RemoteContact,
};
use cadence_crm_sync::crm::factory::ClientFactory;
use cadence_crm_sync::errors::{AppError, AppResult};
use cadence_crm_sync::models::{
    ActionStatus, ActionType, CredentialBlob, CrmKind, EncryptedCredentials, Integration, Lead,
    OutreachAction,
};
use cadence_crm_sync::storage::{memory::MemoryStorage, Repositories};
use cadence_crm_sync::sync::manager::SyncManager;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

// ============================================================================
// Domain Fixtures
// ============================================================================

/// A sync-eligible lead
pub fn test_lead() -> Lead {
    Lead {
        id: Uuid::new_v4(),
        name: "Nora Chen".to_owned(),
        email: Some("nora@acme.test".to_owned()),
        organization: Some("Acme Corp".to_owned()),
        role: Some("VP Engineering".to_owned()),
        website: Some("https://acme.test".to_owned()),
    }
}

/// A lead without an email address (not sync-eligible)
pub fn emailless_lead() -> Lead {
    Lead {
        email: None,
        ..test_lead()
    }
}

/// A sent outreach action for the given lead
pub fn sent_action(lead_id: Uuid) -> OutreachAction {
    OutreachAction {
        id: Uuid::new_v4(),
        lead_id,
        action_type: ActionType::Email,
        subject: Some("Quick intro".to_owned()),
        body: Some("Hi Nora, ...".to_owned()),
        sent_at: Some(Utc::now()),
        status: ActionStatus::Sent,
        outcome: Some("replied".to_owned()),
    }
}

/// A draft action (ineligible for sync)
pub fn draft_action(lead_id: Uuid) -> OutreachAction {
    OutreachAction {
        status: ActionStatus::Draft,
        sent_at: None,
        ..sent_action(lead_id)
    }
}

/// Credential blob with the given expiry
pub fn credential_blob(expires_at: DateTime<Utc>, instance_url: Option<&str>) -> CredentialBlob {
    CredentialBlob::new(
        "access-1".to_owned(),
        "refresh-1".to_owned(),
        expires_at,
        instance_url.map(str::to_owned),
    )
}

/// A Connected integration row for the provider, with encrypted credentials
pub fn connected_integration(
    user_id: Uuid,
    provider: CrmKind,
    blob: &CredentialBlob,
    encryption_key: &[u8],
) -> Integration {
    let encrypted = EncryptedCredentials::new(blob, encryption_key).unwrap();
    Integration::new(user_id, provider.integration_type(), encrypted)
}

/// A Connected integration whose credential blob content is irrelevant
/// (used with the fake client factory, which never decrypts)
pub fn opaque_integration(user_id: Uuid, provider: CrmKind) -> Integration {
    Integration::new(
        user_id,
        provider.integration_type(),
        EncryptedCredentials {
            blob: "unused".to_owned(),
        },
    )
}

// ============================================================================
// Recording Provider Fake
// ============================================================================

/// Shared observable state of one recording provider
#[derive(Default)]
pub struct ProviderState {
    pub create_contact_calls: AtomicUsize,
    pub update_contact_calls: AtomicUsize,
    pub find_by_email_calls: AtomicUsize,
    pub create_activity_calls: AtomicUsize,
    /// Remote ids passed to `update_contact`, in call order
    pub updated_remote_ids: Mutex<Vec<String>>,
    /// What `find_contact_by_email` reports
    pub existing_contact: Mutex<Option<RemoteContact>>,
    /// Force contact create/update to fail
    pub fail_contact_ops: AtomicBool,
    /// Force activity creation to fail
    pub fail_activity_ops: AtomicBool,
}

/// Recording in-memory stand-in for a CRM provider client
#[derive(Clone)]
pub struct RecordingProvider {
    kind: CrmKind,
    config: ProviderConfig,
    pub state: Arc<ProviderState>,
}

impl RecordingProvider {
    pub fn new(kind: CrmKind) -> Self {
        Self {
            kind,
            config: ProviderConfig {
                name: kind.as_str().to_owned(),
                api_base_url: format!("https://{}.invalid", kind.as_str()),
            },
            state: Arc::new(ProviderState::default()),
        }
    }

    fn outage(&self) -> AppError {
        AppError::external_service(self.kind.as_str(), "simulated outage")
    }
}

#[async_trait]
impl CrmProvider for RecordingProvider {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn create_contact(&self, _contact: &CrmContact) -> AppResult<String> {
        if self.state.fail_contact_ops.load(Ordering::SeqCst) {
            return Err(self.outage());
        }
        let n = self.state.create_contact_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}-contact-{n}", self.kind.as_str()))
    }

    async fn update_contact(&self, remote_id: &str, _contact: &CrmContact) -> AppResult<()> {
        if self.state.fail_contact_ops.load(Ordering::SeqCst) {
            return Err(self.outage());
        }
        self.state.update_contact_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .updated_remote_ids
            .lock()
            .unwrap()
            .push(remote_id.to_owned());
        Ok(())
    }

    async fn get_contact(&self, _remote_id: &str) -> Option<RemoteContact> {
        None
    }

    async fn find_contact_by_email(&self, _email: &str) -> AppResult<Option<RemoteContact>> {
        self.state.find_by_email_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.existing_contact.lock().unwrap().clone())
    }

    async fn create_activity(&self, _activity: &CrmActivity) -> AppResult<String> {
        if self.state.fail_activity_ops.load(Ordering::SeqCst) {
            return Err(self.outage());
        }
        let n = self
            .state
            .create_activity_calls
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        Ok(format!("{}-activity-{n}", self.kind.as_str()))
    }

    async fn create_deal(&self, _deal: &CrmDeal) -> AppResult<String> {
        Ok(format!("{}-deal-1", self.kind.as_str()))
    }

    async fn update_deal(&self, _remote_id: &str, _deal: &CrmDeal) -> AppResult<()> {
        Ok(())
    }
}

/// Client factory serving recording providers for the registered kinds
#[derive(Default)]
pub struct FakeClientFactory {
    providers: HashMap<CrmKind, RecordingProvider>,
}

impl FakeClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: RecordingProvider) -> Self {
        self.providers.insert(provider.kind, provider);
        self
    }
}

#[async_trait]
impl ClientFactory for FakeClientFactory {
    async fn client_for_user(
        &self,
        _user_id: Uuid,
        provider: CrmKind,
    ) -> AppResult<Option<Box<dyn CrmProvider>>> {
        Ok(self
            .providers
            .get(&provider)
            .map(|p| Box::new(p.clone()) as Box<dyn CrmProvider>))
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Everything a sync-manager test needs in one place
pub struct TestHarness {
    pub storage: Arc<MemoryStorage>,
    pub manager: SyncManager,
    pub providers: HashMap<CrmKind, RecordingProvider>,
    pub user_id: Uuid,
}

impl TestHarness {
    pub fn state(&self, kind: CrmKind) -> &ProviderState {
        &self.providers[&kind].state
    }
}

/// Build a harness with recording providers (and Connected integration rows)
/// for the given kinds
pub async fn setup_harness(kinds: &[CrmKind]) -> TestHarness {
    init_test_logging();

    let storage = Arc::new(MemoryStorage::new());
    let user_id = Uuid::new_v4();

    let mut factory = FakeClientFactory::new();
    let mut providers = HashMap::new();
    for &kind in kinds {
        let provider = RecordingProvider::new(kind);
        factory = factory.with_provider(provider.clone());
        providers.insert(kind, provider);

        use cadence_crm_sync::storage::IntegrationRepository;
        storage
            .create_integration(&opaque_integration(user_id, kind))
            .await
            .unwrap();
    }

    let repos = Repositories::from_single(storage.clone());
    let manager = SyncManager::new(repos, Arc::new(factory));

    TestHarness {
        storage,
        manager,
        providers,
        user_id,
    }
}
