// ABOUTME: Salesforce REST API client implementation using the unified provider architecture
// ABOUTME: Maps generic contacts/activities/deals onto Lead/Task/Opportunity sobjects
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

use super::core::{CrmActivity, CrmContact, CrmDeal, CrmProvider, ProviderConfig, RemoteContact};
use super::errors::ProviderError;
use crate::constants::crm_providers;
use crate::errors::{AppError, AppResult};
use crate::models::ActionType;
use crate::utils::http_client::shared_client;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

/// REST API version all endpoints are pinned to
const API_VERSION: &str = "v59.0";

// ============================================================================
// Salesforce API Response Structures
// ============================================================================

/// sobject create envelope
#[derive(Debug, Deserialize)]
struct SalesforceCreateResponse {
    id: String,
}

/// Lead record subset this engine reads back
#[derive(Debug, Deserialize)]
struct SalesforceLeadRecord {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Email")]
    email: Option<String>,
    #[serde(rename = "FirstName")]
    first_name: Option<String>,
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "Company")]
    company: Option<String>,
}

/// SOQL query envelope
#[derive(Debug, Deserialize)]
struct SalesforceQueryResponse {
    records: Vec<SalesforceLeadRecord>,
}

// ============================================================================
// Salesforce Provider Implementation
// ============================================================================

/// Salesforce client bound to one org instance
pub struct SalesforceProvider {
    config: ProviderConfig,
    access_token: String,
    client: Client,
}

impl SalesforceProvider {
    /// Create a client from a valid access token and the org's instance URL
    #[must_use]
    pub fn new(access_token: String, instance_url: &str) -> Self {
        Self {
            config: ProviderConfig {
                name: crm_providers::SALESFORCE.to_owned(),
                api_base_url: format!(
                    "{}/services/data/{API_VERSION}",
                    instance_url.trim_end_matches('/')
                ),
            },
            access_token,
            client: shared_client().clone(),
        }
    }

    /// Generic field name -> Lead field name, `None` stripped
    fn lead_fields(contact: &CrmContact) -> serde_json::Map<String, Value> {
        let fields = [
            ("Email", &contact.email),
            ("FirstName", &contact.first_name),
            ("LastName", &contact.last_name),
            ("Company", &contact.company),
            ("Phone", &contact.phone),
            ("Title", &contact.title),
            ("Website", &contact.website),
        ];

        let mut payload = serde_json::Map::new();
        for (name, value) in fields {
            if let Some(value) = value {
                payload.insert((*name).to_owned(), Value::String(value.clone()));
            }
        }
        payload
    }

    /// Fixed activity-type lookup onto the Task subtype picklist; the generic
    /// fallback on Salesforce is a plain Task
    fn task_subtype(action_type: &ActionType) -> &'static str {
        match action_type {
            ActionType::Email => "Email",
            ActionType::Call => "Call",
            ActionType::Meeting | ActionType::Note | ActionType::Other(_) => "Task",
        }
    }

    fn opportunity_fields(deal: &CrmDeal) -> serde_json::Map<String, Value> {
        let mut payload = serde_json::Map::new();
        payload.insert("Name".to_owned(), Value::String(deal.name.clone()));
        if let Some(amount) = deal.amount {
            payload.insert("Amount".to_owned(), json!(amount));
        }
        if let Some(stage) = &deal.stage {
            payload.insert("StageName".to_owned(), Value::String(stage.clone()));
        }
        if let Some(close_date) = deal.close_date {
            payload.insert(
                "CloseDate".to_owned(),
                Value::String(close_date.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(probability) = deal.probability {
            payload.insert("Probability".to_owned(), json!(probability));
        }
        payload
    }

    /// Escape a literal for interpolation into a SOQL string
    fn soql_escape(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    fn handle_api_error(status: reqwest::StatusCode, text: &str) -> AppError {
        let status_code = status.as_u16();

        if status_code == 429 {
            return ProviderError::RateLimited {
                provider: crm_providers::SALESFORCE.to_owned(),
                retry_after_secs: 30,
            }
            .into();
        }

        if status_code == 401 {
            return ProviderError::AuthenticationFailed {
                provider: crm_providers::SALESFORCE.to_owned(),
                reason: "Session expired or invalid".to_owned(),
            }
            .into();
        }

        ProviderError::ApiError {
            provider: crm_providers::SALESFORCE.to_owned(),
            status_code,
            message: text.to_owned(),
            retryable: status_code >= 500,
        }
        .into()
    }

    async fn api_get<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        let url = format!("{}{endpoint}", self.config.api_base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("salesforce", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        response.json().await.map_err(|e| {
            AppError::external_service("salesforce", format!("Failed to parse API response: {e}"))
        })
    }

    async fn api_post<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> AppResult<T> {
        let url = format!("{}{endpoint}", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("salesforce", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        response.json().await.map_err(|e| {
            AppError::external_service("salesforce", format!("Failed to parse API response: {e}"))
        })
    }

    /// sobject PATCH returns 204 with no body
    async fn api_patch(&self, endpoint: &str, body: &Value) -> AppResult<()> {
        let url = format!("{}{endpoint}", self.config.api_base_url);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("salesforce", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        Ok(())
    }

    fn to_remote_contact(record: SalesforceLeadRecord) -> RemoteContact {
        RemoteContact {
            id: record.id,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            company: record.company,
        }
    }
}

#[async_trait]
impl CrmProvider for SalesforceProvider {
    fn name(&self) -> &'static str {
        crm_providers::SALESFORCE
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[instrument(skip(self, contact), fields(provider = "salesforce", api_call = "create_contact"))]
    async fn create_contact(&self, contact: &CrmContact) -> AppResult<String> {
        let mut fields = Self::lead_fields(contact);

        // LastName and Company are required on the Lead sobject
        fields
            .entry("LastName".to_owned())
            .or_insert_with(|| Value::String("Unknown".to_owned()));
        fields
            .entry("Company".to_owned())
            .or_insert_with(|| Value::String("Unknown".to_owned()));

        let created: SalesforceCreateResponse = self
            .api_post("/sobjects/Lead", &Value::Object(fields))
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self, contact), fields(provider = "salesforce", api_call = "update_contact"))]
    async fn update_contact(&self, remote_id: &str, contact: &CrmContact) -> AppResult<()> {
        let fields = Self::lead_fields(contact);
        self.api_patch(
            &format!("/sobjects/Lead/{remote_id}"),
            &Value::Object(fields),
        )
        .await
    }

    async fn get_contact(&self, remote_id: &str) -> Option<RemoteContact> {
        let endpoint = format!("/sobjects/Lead/{remote_id}");
        match self.api_get::<SalesforceLeadRecord>(&endpoint).await {
            Ok(record) => Some(Self::to_remote_contact(record)),
            Err(e) => {
                debug!("Salesforce Lead {remote_id} not retrievable: {e}");
                None
            }
        }
    }

    #[instrument(skip(self), fields(provider = "salesforce", api_call = "find_contact_by_email"))]
    async fn find_contact_by_email(&self, email: &str) -> AppResult<Option<RemoteContact>> {
        let soql = format!(
            "SELECT Id, Email, FirstName, LastName, Company FROM Lead WHERE Email = '{}' LIMIT 1",
            Self::soql_escape(email)
        );
        let endpoint = format!("/query?q={}", urlencoding::encode(&soql));

        let query: SalesforceQueryResponse = self.api_get(&endpoint).await?;
        Ok(query
            .records
            .into_iter()
            .next()
            .map(Self::to_remote_contact))
    }

    #[instrument(skip(self, activity), fields(provider = "salesforce", api_call = "create_activity"))]
    async fn create_activity(&self, activity: &CrmActivity) -> AppResult<String> {
        let subject = activity
            .subject
            .clone()
            .unwrap_or_else(|| activity.action_type.as_str().to_owned());

        let body = json!({
            "Subject": subject,
            "Description": activity.body_with_outcome(),
            "ActivityDate": activity.timestamp.format("%Y-%m-%d").to_string(),
            "Status": "Completed",
            "TaskSubtype": Self::task_subtype(&activity.action_type),
            "WhoId": activity.contact_id,
        });

        let created: SalesforceCreateResponse = self.api_post("/sobjects/Task", &body).await?;
        Ok(created.id)
    }

    #[instrument(skip(self, deal), fields(provider = "salesforce", api_call = "create_deal"))]
    async fn create_deal(&self, deal: &CrmDeal) -> AppResult<String> {
        let mut fields = Self::opportunity_fields(deal);

        // StageName and CloseDate are required on the Opportunity sobject
        fields
            .entry("StageName".to_owned())
            .or_insert_with(|| Value::String("Prospecting".to_owned()));
        fields.entry("CloseDate".to_owned()).or_insert_with(|| {
            Value::String(
                (Utc::now() + chrono::Duration::days(30))
                    .format("%Y-%m-%d")
                    .to_string(),
            )
        });

        let created: SalesforceCreateResponse = self
            .api_post("/sobjects/Opportunity", &Value::Object(fields))
            .await?;

        // Best-effort contact association; the opportunity itself stands
        // whether or not this call lands
        if let Some(contact_id) = &deal.contact_id {
            let association = json!({
                "OpportunityId": created.id,
                "ContactId": contact_id,
            });
            if let Err(e) = self
                .api_post::<SalesforceCreateResponse>("/sobjects/OpportunityContactRole", &association)
                .await
            {
                warn!(
                    "Failed to associate Salesforce opportunity {} with contact {contact_id}: {e}",
                    created.id
                );
            }
        }

        Ok(created.id)
    }

    #[instrument(skip(self, deal), fields(provider = "salesforce", api_call = "update_deal"))]
    async fn update_deal(&self, remote_id: &str, deal: &CrmDeal) -> AppResult<()> {
        let fields = Self::opportunity_fields(deal);
        self.api_patch(
            &format!("/sobjects/Opportunity/{remote_id}"),
            &Value::Object(fields),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_fields_strip_unset() {
        let contact = CrmContact {
            email: Some("kay@example.com".to_owned()),
            first_name: None,
            last_name: Some("Kay".to_owned()),
            company: None,
            phone: Some("+1 555 0100".to_owned()),
            title: None,
            website: None,
        };

        let fields = SalesforceProvider::lead_fields(&contact);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["Email"], "kay@example.com");
        assert_eq!(fields["LastName"], "Kay");
        assert_eq!(fields["Phone"], "+1 555 0100");
        assert!(!fields.contains_key("Company"));
    }

    #[test]
    fn test_task_subtype_lookup() {
        assert_eq!(SalesforceProvider::task_subtype(&ActionType::Email), "Email");
        assert_eq!(SalesforceProvider::task_subtype(&ActionType::Call), "Call");
        assert_eq!(SalesforceProvider::task_subtype(&ActionType::Meeting), "Task");
        assert_eq!(
            SalesforceProvider::task_subtype(&ActionType::Other("sms".to_owned())),
            "Task"
        );
    }

    #[test]
    fn test_soql_escape() {
        assert_eq!(
            SalesforceProvider::soql_escape("o'brien@example.com"),
            "o\\'brien@example.com"
        );
    }

    #[test]
    fn test_instance_url_trailing_slash() {
        let provider = SalesforceProvider::new(
            "token".to_owned(),
            "https://na1.salesforce.com/",
        );
        assert_eq!(
            provider.config().api_base_url,
            "https://na1.salesforce.com/services/data/v59.0"
        );
    }
}
