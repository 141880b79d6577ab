// ABOUTME: Application constants shared across the CRM sync engine
// ABOUTME: Provider name tags, integration type prefixes, ports, and token policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! Application-wide constants.

/// CRM provider name tags
pub mod crm_providers {
    /// HubSpot provider tag
    pub const HUBSPOT: &str = "hubspot";
    /// Salesforce provider tag
    pub const SALESFORCE: &str = "salesforce";
    /// Pipedrive provider tag
    pub const PIPEDRIVE: &str = "pipedrive";

    /// Prefix marking an integration row as a CRM connection (`crm_hubspot`, ...)
    pub const INTEGRATION_PREFIX: &str = "crm_";
}

/// Network ports
pub mod ports {
    /// Default HTTP port of the surrounding Cadence server (used for OAuth
    /// redirect URI defaults)
    pub const DEFAULT_HTTP_PORT: u16 = 8081;
}

/// Service identification for structured logging
pub mod service_names {
    /// Canonical service name
    pub const SERVICE_NAME: &str = "cadence-crm-sync";
}

/// OAuth token lifecycle policy
pub mod tokens {
    /// Access tokens are refreshed this many minutes before their recorded
    /// expiry so an in-flight API call never races the expiry instant.
    pub const REFRESH_SKEW_MINUTES: i64 = 5;

    /// Salesforce refresh responses omit `expires_in`; assume the org default
    /// session timeout of two hours.
    pub const SALESFORCE_DEFAULT_EXPIRES_SECS: i64 = 7200;
}
