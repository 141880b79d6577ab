// ABOUTME: Sync orchestration module - result types and the sync manager
// ABOUTME: Structured outcomes returned to callers instead of raised errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Sync Orchestration
//!
//! [`manager::SyncManager`] drives the create-or-update decision per lead,
//! fans sent outreach actions out as remote activities, and aggregates
//! per-provider outcomes. The sync operations return [`SyncResult`] values -
//! callers always receive a result, never an unhandled error.

pub mod manager;

use crate::models::SyncOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one sync attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// Whether the attempt succeeded
    pub success: bool,
    /// Remote object id involved, when known
    pub remote_id: Option<String>,
    /// Operation performed (or the one that was being attempted on failure)
    pub operation: SyncOperation,
    /// Error text for failed attempts
    pub error: Option<String>,
}

impl SyncResult {
    /// A remote record was created
    #[must_use]
    pub fn created(remote_id: impl Into<String>) -> Self {
        Self {
            success: true,
            remote_id: Some(remote_id.into()),
            operation: SyncOperation::Create,
            error: None,
        }
    }

    /// An existing remote record was updated
    #[must_use]
    pub fn updated(remote_id: impl Into<String>) -> Self {
        Self {
            success: true,
            remote_id: Some(remote_id.into()),
            operation: SyncOperation::Update,
            error: None,
        }
    }

    /// The idempotence guard hit - nothing was sent
    #[must_use]
    pub fn skipped(remote_id: impl Into<String>) -> Self {
        Self {
            success: true,
            remote_id: Some(remote_id.into()),
            operation: SyncOperation::Skip,
            error: None,
        }
    }

    /// The attempt failed before or during the given operation
    #[must_use]
    pub fn failure(operation: SyncOperation, error: impl Into<String>) -> Self {
        Self {
            success: false,
            remote_id: None,
            operation,
            error: Some(error.into()),
        }
    }
}

/// Per-provider sync state of one lead
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Whether a mapping row exists for the provider
    pub synced: bool,
    /// Last successful sync instant, when mapped
    pub last_synced_at: Option<DateTime<Utc>>,
}
