// ABOUTME: Shared HTTP client utilities with connection pooling and timeout configuration
// ABOUTME: One pooled client for CRM API traffic, a shorter-timeout client for token exchanges
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

use reqwest::{Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client for provider API calls
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or create the shared HTTP client
///
/// Connection-pooled with a 30s request / 10s connect timeout. All provider
/// clients share this instance rather than constructing their own.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// Create a new HTTP client optimized for OAuth token exchanges
///
/// Token endpoints answer quickly; a 15s request / 5s connect timeout keeps a
/// stuck token endpoint from pinning a sync operation for half a minute.
#[must_use]
pub fn oauth_client() -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| Client::new())
}
