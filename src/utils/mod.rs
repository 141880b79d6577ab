// ABOUTME: Small shared utilities for the CRM sync engine
// ABOUTME: Currently the pooled HTTP client helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! Shared utilities.

/// Pooled HTTP client helpers
pub mod http_client;
