// ABOUTME: Core domain models for leads, outreach actions, integrations, and sync records
// ABOUTME: Includes the encrypted OAuth credential blob handling (AES-256-GCM at rest)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Domain Models
//!
//! Shared data structures for the CRM sync engine. Leads and outreach actions
//! are owned by the surrounding application and are read-only here; the sync
//! engine owns integrations, entity mappings, and the sync log.

use crate::constants::{crm_providers, tokens};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The CRM platforms this engine can mirror entities into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmKind {
    /// HubSpot CRM (contacts / engagements / deals)
    HubSpot,
    /// Salesforce (Lead / Task / Opportunity sobjects)
    Salesforce,
    /// Pipedrive (persons / activities / deals)
    Pipedrive,
}

impl CrmKind {
    /// All providers known to the engine
    pub const ALL: [Self; 3] = [Self::HubSpot, Self::Salesforce, Self::Pipedrive];

    /// Provider tag (`"hubspot"`, `"salesforce"`, `"pipedrive"`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HubSpot => crm_providers::HUBSPOT,
            Self::Salesforce => crm_providers::SALESFORCE,
            Self::Pipedrive => crm_providers::PIPEDRIVE,
        }
    }

    /// Integration type string stored on the integration row (`"crm_hubspot"`, ...)
    #[must_use]
    pub fn integration_type(self) -> String {
        format!("{}{}", crm_providers::INTEGRATION_PREFIX, self.as_str())
    }

    /// Parse a bare provider tag
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            crm_providers::HUBSPOT => Some(Self::HubSpot),
            crm_providers::SALESFORCE => Some(Self::Salesforce),
            crm_providers::PIPEDRIVE => Some(Self::Pipedrive),
            _ => None,
        }
    }

    /// Parse a `crm_`-prefixed integration type string
    #[must_use]
    pub fn from_integration_type(integration_type: &str) -> Option<Self> {
        integration_type
            .strip_prefix(crm_providers::INTEGRATION_PREFIX)
            .and_then(Self::from_tag)
    }
}

impl fmt::Display for CrmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sales lead (owned by the surrounding application, read-only here)
///
/// Source of truth for contact payloads pushed to CRMs; never mutated by the
/// sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// Unique lead identifier
    pub id: Uuid,
    /// Full name
    pub name: String,
    /// Email address - a lead without an email is not sync-eligible
    pub email: Option<String>,
    /// Company / organization name
    pub organization: Option<String>,
    /// Job title or role
    pub role: Option<String>,
    /// Company website
    pub website: Option<String>,
}

impl Lead {
    /// First/last name split on the first whitespace gap
    #[must_use]
    pub fn split_name(&self) -> (Option<String>, Option<String>) {
        let mut parts = self.name.splitn(2, char::is_whitespace);
        let first = parts.next().map(str::to_owned).filter(|s| !s.is_empty());
        let last = parts.next().map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
        (first, last)
    }
}

/// Kind of outbound communication an outreach action represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    /// Outbound email
    Email,
    /// Phone call
    Call,
    /// Meeting
    Meeting,
    /// Free-form note
    Note,
    /// Unrecognized type preserved verbatim; providers map this to their
    /// generic note type
    Other(String),
}

impl ActionType {
    /// Canonical lowercase tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Call => "call",
            Self::Meeting => "meeting",
            Self::Note => "note",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "email" => Self::Email,
            "call" => Self::Call,
            "meeting" => Self::Meeting,
            "note" => Self::Note,
            _ => Self::Other(value),
        }
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        value.as_str().to_owned()
    }
}

/// Lifecycle state of an outreach action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Authored but not scheduled
    Draft,
    /// Queued for sending
    Scheduled,
    /// Delivered - the only state eligible for CRM sync
    Sent,
    /// Send attempt failed
    Failed,
}

/// One outbound communication event tied to a lead (read-only here)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachAction {
    /// Unique action identifier
    pub id: Uuid,
    /// Lead this action belongs to
    pub lead_id: Uuid,
    /// Kind of communication
    pub action_type: ActionType,
    /// Subject line
    pub subject: Option<String>,
    /// Message body
    pub body: Option<String>,
    /// When the action was actually sent
    pub sent_at: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub status: ActionStatus,
    /// Optional outcome feedback (reply received, meeting booked, ...)
    pub outcome: Option<String>,
}

/// Connection state of a third-party integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    /// OAuth grant active, credentials stored
    Connected,
    /// Grant revoked or user-initiated disconnect
    Disconnected,
}

/// A user's connection to one third-party platform
///
/// Created when the user completes the OAuth consent flow (outside this
/// subsystem); credentials are mutated in place on every successful token
/// refresh. Rows are never deleted here - disconnection flips `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    /// Unique row identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Integration type (`"crm_hubspot"`, `"crm_salesforce"`, ...)
    pub integration_type: String,
    /// Connection state
    pub status: IntegrationStatus,
    /// Encrypted OAuth credential blob; `None` until the consent flow stores one
    pub credentials: Option<EncryptedCredentials>,
    /// When the integration was created
    pub created_at: DateTime<Utc>,
    /// When the integration (or its credentials) was last updated
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// Create a freshly connected integration
    #[must_use]
    pub fn new(user_id: Uuid, integration_type: String, credentials: EncryptedCredentials) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            integration_type,
            status: IntegrationStatus::Connected,
            credentials: Some(credentials),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this row represents an active CRM connection
    #[must_use]
    pub fn is_connected_crm(&self) -> bool {
        self.status == IntegrationStatus::Connected
            && CrmKind::from_integration_type(&self.integration_type).is_some()
    }
}

/// Decrypted OAuth credentials for one (user, provider) pair
///
/// Only exists in memory at the client-construction boundary - never stored
/// in this form. The schema is versioned so older blobs stay readable after
/// field additions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialBlob {
    /// Blob schema version (currently 1)
    #[serde(default = "CredentialBlob::current_version")]
    pub schema_version: u32,
    /// Plain text access token
    pub access_token: String,
    /// Plain text refresh token
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Provider-specific API host (Salesforce instance URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
}

impl CredentialBlob {
    const fn current_version() -> u32 {
        1
    }

    /// Create a version-1 blob
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
        instance_url: Option<String>,
    ) -> Self {
        Self {
            schema_version: Self::current_version(),
            access_token,
            refresh_token,
            expires_at,
            instance_url,
        }
    }

    /// Whether the access token is already past its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Whether the access token is within the refresh skew window of expiry
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + chrono::Duration::minutes(tokens::REFRESH_SKEW_MINUTES) >= self.expires_at
    }
}

/// Encrypted OAuth credential storage
///
/// The whole [`CredentialBlob`] is serialized to JSON and sealed with
/// AES-256-GCM. The 12-byte nonce is prepended to the ciphertext and the
/// result base64 encoded, so a stored blob is a single opaque string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedCredentials {
    /// base64(\[12-byte nonce\]\[ciphertext + tag\])
    pub blob: String,
}

impl EncryptedCredentials {
    /// Encrypt a credential blob
    ///
    /// # Errors
    ///
    /// Returns an error if the encryption key is not 32 bytes or sealing fails
    pub fn new(credentials: &CredentialBlob, encryption_key: &[u8]) -> AppResult<Self> {
        use base64::{engine::general_purpose, Engine as _};
        use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
        use ring::rand::{SecureRandom, SystemRandom};

        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; 12];
        rng.fill(&mut nonce_bytes)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let unbound_key = UnboundKey::new(&AES_256_GCM, encryption_key)?;
        let key = LessSafeKey::new(unbound_key);

        let mut data = serde_json::to_vec(credentials)?;
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut data)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data);

        Ok(Self {
            blob: general_purpose::STANDARD.encode(combined),
        })
    }

    /// Decrypt back into a [`CredentialBlob`]
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is malformed, the key is wrong, or the
    /// decrypted payload is not a valid credential schema
    pub fn decrypt(&self, encryption_key: &[u8]) -> AppResult<CredentialBlob> {
        use base64::{engine::general_purpose, Engine as _};
        use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};

        let combined = general_purpose::STANDARD.decode(&self.blob)?;
        if combined.len() < 12 {
            return Err(AppError::auth_invalid("credential blob too short"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes.try_into()?);

        let unbound_key = UnboundKey::new(&AES_256_GCM, encryption_key)?;
        let key = LessSafeKey::new(unbound_key);

        let mut data = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut data)
            .map_err(|_| AppError::auth_invalid("credential blob decryption failed"))?;

        Ok(serde_json::from_slice(plaintext)?)
    }
}

/// Which local entity family a mapping or log row refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A sales lead
    Lead,
    /// An outreach action
    Action,
}

impl EntityKind {
    /// Canonical lowercase tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Action => "action",
        }
    }
}

/// Which remote operation a sync attempt performed (or would have performed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    /// A new remote record was (to be) created
    Create,
    /// An existing remote record was (to be) updated
    Update,
    /// Idempotence guard hit - nothing was sent
    Skip,
}

impl SyncOperation {
    /// Canonical lowercase tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Skip => "skip",
        }
    }
}

/// Direction of a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Local entity pushed to the CRM (the only direction this engine performs)
    Outbound,
}

/// Link between one local entity and its remote CRM object
///
/// At most one row exists per (provider, `entity_kind`, `entity_id`) - this
/// uniqueness is what makes re-sync idempotent. Rows are created on first
/// successful sync, touched to refresh `last_synced_at`, and never deleted
/// automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmMapping {
    /// Unique row identifier
    pub id: Uuid,
    /// User the mapping belongs to
    pub user_id: Uuid,
    /// Target provider
    pub provider: CrmKind,
    /// Local entity family
    pub entity_kind: EntityKind,
    /// Local entity id
    pub entity_id: Uuid,
    /// Remote object family (`"contact"`, `"activity"`, `"deal"`)
    pub remote_entity_type: String,
    /// Remote object id assigned by the provider
    pub remote_id: String,
    /// Last successful sync instant
    pub last_synced_at: DateTime<Utc>,
}

impl CrmMapping {
    /// Create a mapping row stamped with the current instant
    #[must_use]
    pub fn new(
        user_id: Uuid,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
        remote_entity_type: impl Into<String>,
        remote_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider,
            entity_kind,
            entity_id,
            remote_entity_type: remote_entity_type.into(),
            remote_id: remote_id.into(),
            last_synced_at: Utc::now(),
        }
    }
}

/// Append-only audit record of one sync attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmSyncLog {
    /// Unique row identifier
    pub id: Uuid,
    /// User the attempt ran on behalf of
    pub user_id: Uuid,
    /// Target provider
    pub provider: CrmKind,
    /// Operation attempted
    pub operation: SyncOperation,
    /// Sync direction
    pub direction: SyncDirection,
    /// Local entity family
    pub entity_kind: EntityKind,
    /// Local entity id
    pub entity_id: Uuid,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Error text for failed attempts
    pub error_message: Option<String>,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}

impl CrmSyncLog {
    /// Record an attempt outcome stamped with the current instant
    #[must_use]
    pub fn record(
        user_id: Uuid,
        provider: CrmKind,
        operation: SyncOperation,
        entity_kind: EntityKind,
        entity_id: Uuid,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider,
            operation,
            direction: SyncDirection::Outbound,
            entity_kind,
            entity_id,
            success,
            error_message,
            timestamp: Utc::now(),
        }
    }
}
