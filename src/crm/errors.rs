// ABOUTME: Structured error types for CRM provider operations
// ABOUTME: Classifies remote failures before they are folded into AppError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! Domain-specific provider errors with status and retry information.

use crate::errors::{AppError, ErrorCode};
use thiserror::Error;

/// Errors raised by CRM provider API interactions
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-2xx API response
    #[error("{provider} API error (status {status_code}): {message}")]
    ApiError {
        /// Provider tag
        provider: String,
        /// HTTP status code returned
        status_code: u16,
        /// Response body text
        message: String,
        /// Whether a retry could plausibly succeed (5xx)
        retryable: bool,
    },

    /// Access token rejected by the provider
    #[error("{provider} authentication failed: {reason}")]
    AuthenticationFailed {
        /// Provider tag
        provider: String,
        /// Failure detail
        reason: String,
    },

    /// Provider rate limit hit
    #[error("{provider} rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Provider tag
        provider: String,
        /// Suggested wait before retrying
        retry_after_secs: u64,
    },

    /// Remote object not found
    #[error("{provider} {resource_type} {resource_id} not found")]
    NotFound {
        /// Provider tag
        provider: String,
        /// Remote object family
        resource_type: String,
        /// Remote object id
        resource_id: String,
    },

    /// Payload field failed provider-side or local validation
    #[error("{provider} invalid data in {field}: {reason}")]
    InvalidData {
        /// Provider tag
        provider: String,
        /// Offending field
        field: String,
        /// Validation detail
        reason: String,
    },
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        let code = match &error {
            ProviderError::AuthenticationFailed { .. } => ErrorCode::ExternalAuthFailed,
            ProviderError::NotFound { .. } => ErrorCode::ResourceNotFound,
            ProviderError::InvalidData { .. } => ErrorCode::InvalidInput,
            ProviderError::ApiError { .. } | ProviderError::RateLimited { .. } => {
                ErrorCode::ExternalServiceError
            }
        };
        Self::new(code, error.to_string())
    }
}
