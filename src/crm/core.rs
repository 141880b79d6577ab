// ABOUTME: Core CRM provider trait and the generic shapes shared by all providers
// ABOUTME: Contacts, activities, and deals in provider-neutral form
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! # Shared CRM Provider Contract
//!
//! The [`CrmProvider`] trait is the single capability interface every CRM
//! client implements. Callers hand providers the generic shapes defined here
//! ([`CrmContact`], [`CrmActivity`], [`CrmDeal`]); each implementation owns
//! the mapping onto its native object model (HubSpot `contact`, Salesforce
//! `Lead`, Pipedrive `person`, and so on) and strips unset fields before
//! sending.
//!
//! All methods surface remote failures as [`crate::errors::AppError`] values;
//! a provider method never panics and never leaks a transport error type.
//! The one deliberate exception to error propagation is [`CrmProvider::get_contact`],
//! which collapses *any* fetch failure to `None` - for this subsystem a
//! record that cannot be retrieved is indistinguishable from one that does
//! not exist.

use crate::errors::AppResult;
use crate::models::{ActionType, Lead, OutreachAction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider tag (`"hubspot"`, `"salesforce"`, `"pipedrive"`)
    pub name: String,
    /// Base URL for API calls (per-user for Salesforce: the instance URL)
    pub api_base_url: String,
}

/// Provider-neutral contact payload
///
/// Built from a [`Lead`]; every field optional so the same shape serves both
/// full create payloads and partial updates. Providers skip `None` fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrmContact {
    /// Email address
    pub email: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Job title
    pub title: Option<String>,
    /// Website URL
    pub website: Option<String>,
}

impl CrmContact {
    /// Build the contact payload for a lead
    #[must_use]
    pub fn from_lead(lead: &Lead) -> Self {
        let (first_name, last_name) = lead.split_name();
        Self {
            email: lead.email.clone(),
            first_name,
            last_name,
            company: lead.organization.clone(),
            phone: None,
            title: lead.role.clone(),
            website: lead.website.clone(),
        }
    }
}

/// A contact as it exists in the remote CRM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteContact {
    /// Remote object id
    pub id: String,
    /// Email address, when the provider returned one
    pub email: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Company name
    pub company: Option<String>,
}

/// Provider-neutral activity payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmActivity {
    /// Remote contact id to associate the activity with
    pub contact_id: String,
    /// Kind of interaction; mapped through a fixed per-provider lookup table
    pub action_type: ActionType,
    /// Subject line
    pub subject: Option<String>,
    /// Body text
    pub body: Option<String>,
    /// When the interaction happened
    pub timestamp: DateTime<Utc>,
    /// Outcome feedback appended to the body where the provider has no
    /// dedicated field
    pub outcome: Option<String>,
    /// Interaction direction; always `"outbound"` for synced outreach
    pub direction: String,
}

impl CrmActivity {
    /// Build the activity payload for a sent outreach action
    #[must_use]
    pub fn from_action(action: &OutreachAction, contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            action_type: action.action_type.clone(),
            subject: action.subject.clone(),
            body: action.body.clone(),
            timestamp: action.sent_at.unwrap_or_else(Utc::now),
            outcome: action.outcome.clone(),
            direction: "outbound".to_owned(),
        }
    }

    /// Body text with the outcome feedback folded in
    #[must_use]
    pub fn body_with_outcome(&self) -> Option<String> {
        match (&self.body, &self.outcome) {
            (Some(body), Some(outcome)) => Some(format!("{body}\n\nOutcome: {outcome}")),
            (Some(body), None) => Some(body.clone()),
            (None, Some(outcome)) => Some(format!("Outcome: {outcome}")),
            (None, None) => None,
        }
    }
}

/// Provider-neutral deal payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrmDeal {
    /// Deal name
    pub name: String,
    /// Monetary amount
    pub amount: Option<f64>,
    /// Pipeline stage label
    pub stage: Option<String>,
    /// Expected close date
    pub close_date: Option<DateTime<Utc>>,
    /// Win probability (0-100)
    pub probability: Option<f64>,
    /// Remote contact id to associate the deal with
    pub contact_id: Option<String>,
}

/// Core CRM provider trait - the shared capability interface
///
/// Implementations must be `Send + Sync`; every instance is already
/// authenticated (construction in [`crate::crm::factory`] refreshes the
/// token first when needed) and attaches its bearer token to each call.
#[async_trait]
pub trait CrmProvider: Send + Sync {
    /// Provider tag (`"hubspot"`, `"salesforce"`, `"pipedrive"`)
    fn name(&self) -> &'static str;

    /// Provider endpoint configuration
    fn config(&self) -> &ProviderConfig;

    /// Create a contact-family object, returning the remote id
    async fn create_contact(&self, contact: &CrmContact) -> AppResult<String>;

    /// Partially update a contact-family object; only supplied fields are sent
    async fn update_contact(&self, remote_id: &str, contact: &CrmContact) -> AppResult<()>;

    /// Fetch a contact by remote id
    ///
    /// Returns `None` on any fetch failure, not just 404 - "not retrievable"
    /// and "not found" are equivalent for sync purposes.
    async fn get_contact(&self, remote_id: &str) -> Option<RemoteContact>;

    /// Find an existing contact by email via the provider's native search
    async fn find_contact_by_email(&self, email: &str) -> AppResult<Option<RemoteContact>>;

    /// Create an activity-family object, returning the remote id
    async fn create_activity(&self, activity: &CrmActivity) -> AppResult<String>;

    /// Create a deal-family object, returning the remote id
    async fn create_deal(&self, deal: &CrmDeal) -> AppResult<String>;

    /// Partially update a deal-family object
    async fn update_deal(&self, remote_id: &str, deal: &CrmDeal) -> AppResult<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{ActionStatus, ActionType};
    use uuid::Uuid;

    #[test]
    fn test_contact_from_lead() {
        let lead = Lead {
            id: Uuid::new_v4(),
            name: "Grace Hopper".to_owned(),
            email: Some("grace@navy.mil".to_owned()),
            organization: Some("US Navy".to_owned()),
            role: Some("Rear Admiral".to_owned()),
            website: None,
        };

        let contact = CrmContact::from_lead(&lead);
        assert_eq!(contact.email.as_deref(), Some("grace@navy.mil"));
        assert_eq!(contact.first_name.as_deref(), Some("Grace"));
        assert_eq!(contact.last_name.as_deref(), Some("Hopper"));
        assert_eq!(contact.company.as_deref(), Some("US Navy"));
        assert!(contact.phone.is_none());
    }

    #[test]
    fn test_activity_body_with_outcome() {
        let action = OutreachAction {
            id: Uuid::new_v4(),
            lead_id: Uuid::new_v4(),
            action_type: ActionType::Email,
            subject: Some("Intro".to_owned()),
            body: Some("Hi there".to_owned()),
            sent_at: Some(Utc::now()),
            status: ActionStatus::Sent,
            outcome: Some("replied".to_owned()),
        };

        let activity = CrmActivity::from_action(&action, "rc-1");
        assert_eq!(activity.direction, "outbound");
        assert_eq!(
            activity.body_with_outcome().unwrap(),
            "Hi there\n\nOutcome: replied"
        );
    }
}
