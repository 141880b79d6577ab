// ABOUTME: Main library entry point for the Cadence CRM sync engine
// ABOUTME: Mirrors leads and outreach actions into HubSpot, Salesforce, and Pipedrive
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

#![deny(unsafe_code)]

//! # Cadence CRM Sync
//!
//! Multi-provider CRM synchronization engine for the Cadence sales-outreach
//! platform. Mirrors locally-owned leads and their outreach actions into
//! HubSpot, Salesforce, and Pipedrive over their REST APIs, refreshing OAuth2
//! credentials transparently and keeping an exactly-once mapping between each
//! local entity and its remote object.
//!
//! ## Features
//!
//! - **Multi-provider support**: three incompatible remote object models
//!   behind one capability trait
//! - **Transparent token refresh**: per-(user, provider) credential
//!   lifecycle, serialized so rotated refresh tokens are never orphaned
//! - **Idempotent re-sync**: a unique mapping per (provider, entity) makes
//!   repeated syncs update instead of duplicate
//! - **Partial-failure tolerance**: one provider failing never blocks or
//!   corrupts another provider's sync
//! - **Audit trail**: every attempt lands in an append-only sync log
//!
//! ## Architecture
//!
//! - **`crm`**: provider clients and the authenticated client factory
//! - **`oauth`**: token-endpoint clients (code exchange + refresh)
//! - **`sync`**: the orchestrating manager and result types
//! - **`storage`**: repository ports with SQLite and in-memory backends
//! - **`models`**: domain structures and the encrypted credential blob
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cadence_crm_sync::config::environment::SyncConfig;
//! use cadence_crm_sync::crm::factory::CrmClientFactory;
//! use cadence_crm_sync::errors::AppResult;
//! use cadence_crm_sync::oauth::providers::registry_from_env;
//! use cadence_crm_sync::storage::{sqlite::SqliteStorage, Repositories};
//! use cadence_crm_sync::sync::manager::SyncManager;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = SyncConfig::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database_url).await?);
//!     let repos = Repositories::from_single(storage);
//!
//!     let factory = Arc::new(CrmClientFactory::new(
//!         repos.integrations.clone(),
//!         registry_from_env(),
//!         config.encryption_key,
//!     ));
//!     let manager = SyncManager::new(repos, factory);
//!
//!     let user_id = uuid::Uuid::new_v4();
//!     let lead_id = uuid::Uuid::new_v4();
//!     let results = manager.sync_lead_to_all_crms(user_id, lead_id).await;
//!     for (provider, result) in results {
//!         println!("{provider}: success={}", result.success);
//!     }
//!     Ok(())
//! }
//! ```

/// Configuration management and persistence
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// CRM provider clients behind one capability trait
pub mod crm;

/// Unified error handling system with standard error codes
pub mod errors;

/// Production logging and structured output
pub mod logging;

/// Shared domain models and encrypted credential storage
pub mod models;

/// OAuth2 token lifecycle for CRM providers
pub mod oauth;

/// Repository ports with SQLite and in-memory implementations
pub mod storage;

/// Sync orchestration and result types
pub mod sync;

/// Shared utilities
pub mod utils;
