// ABOUTME: Environment-based configuration loading for storage and encryption settings
// ABOUTME: Per-provider OAuth app credentials are read by the oauth module constructors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Environment Configuration
//!
//! Environment-only configuration for the sync engine. OAuth application
//! credentials (`HUBSPOT_CLIENT_ID`, `SALESFORCE_CLIENT_SECRET`, ...) are read
//! by the per-provider constructors in [`crate::oauth::providers`]; this
//! module covers the storage URL and the credential encryption key.

use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose, Engine as _};
use std::env;

/// Engine-level configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Database connection string (`sqlite:...`)
    pub database_url: String,
    /// 32-byte AES-256-GCM key protecting stored OAuth credentials
    pub encryption_key: Vec<u8>,
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// `DATABASE_URL` defaults to a local SQLite file;
    /// `CADENCE_ENCRYPTION_KEY` (base64, 32 bytes decoded) is required.
    ///
    /// # Errors
    ///
    /// Returns an error if the encryption key is missing, not valid base64,
    /// or not exactly 32 bytes
    pub fn from_env() -> AppResult<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/cadence.db".into());

        let key_b64 = env::var("CADENCE_ENCRYPTION_KEY")
            .map_err(|_| AppError::config("CADENCE_ENCRYPTION_KEY not set"))?;
        let encryption_key = parse_encryption_key(&key_b64)?;

        Ok(Self {
            database_url,
            encryption_key,
        })
    }
}

/// Decode and validate a base64-encoded 32-byte encryption key
///
/// # Errors
///
/// Returns an error if the value is not valid base64 or decodes to a length
/// other than 32 bytes
pub fn parse_encryption_key(key_b64: &str) -> AppResult<Vec<u8>> {
    let key = general_purpose::STANDARD
        .decode(key_b64.trim())
        .map_err(|e| AppError::config(format!("CADENCE_ENCRYPTION_KEY is not valid base64: {e}")))?;

    if key.len() != 32 {
        return Err(AppError::config(format!(
            "CADENCE_ENCRYPTION_KEY must decode to 32 bytes, got {}",
            key.len()
        )));
    }

    Ok(key)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encryption_key_valid() {
        let encoded = general_purpose::STANDARD.encode([42u8; 32]);
        let key = parse_encryption_key(&encoded).unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(key[0], 42);
    }

    #[test]
    fn test_parse_encryption_key_wrong_length() {
        let encoded = general_purpose::STANDARD.encode([42u8; 16]);
        assert!(parse_encryption_key(&encoded).is_err());
    }

    #[test]
    fn test_parse_encryption_key_not_base64() {
        assert!(parse_encryption_key("not-base64!!!").is_err());
    }
}
