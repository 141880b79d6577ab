// ABOUTME: CRM provider module organizing the capability trait and per-provider clients
// ABOUTME: HubSpot, Salesforce, and Pipedrive behind one contact/activity/deal contract
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # CRM Provider Clients
//!
//! One capability trait ([`core::CrmProvider`]) over three incompatible
//! remote object models: HubSpot contacts/engagements/deals, Salesforce
//! Lead/Task/Opportunity sobjects, and Pipedrive persons/activities/deals.
//! Each client owns its field-mapping tables; construction (including
//! transparent token refresh) lives in [`factory`].

/// Capability trait and generic contact/activity/deal shapes
pub mod core;

/// Structured error types for provider operations
pub mod errors;

/// Authenticated client construction with transparent token refresh
pub mod factory;

/// HubSpot CRM v3 + legacy Engagements client
pub mod hubspot_provider;

/// Pipedrive v1 API client
pub mod pipedrive_provider;

/// Salesforce REST API client
pub mod salesforce_provider;
