// ABOUTME: Configuration management for the CRM sync engine
// ABOUTME: Environment-based settings for storage and credential encryption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! Configuration management.

/// Environment-variable based configuration
pub mod environment;
