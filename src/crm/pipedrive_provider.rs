// ABOUTME: Pipedrive API client implementation using the unified provider architecture
// ABOUTME: Maps generic contacts/activities/deals onto persons, activities, and deals
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
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

// ============================================================================
// Pipedrive API Response Structures
// ============================================================================

/// Standard Pipedrive response envelope
#[derive(Debug, Deserialize)]
struct PipedriveEnvelope<T> {
    data: Option<T>,
}

/// Person record subset this engine reads back
#[derive(Debug, Deserialize)]
struct PipedrivePerson {
    /// Person id (numeric in Pipedrive)
    id: i64,
    name: Option<String>,
    primary_email: Option<String>,
    org_name: Option<String>,
}

/// Object carrying only an id (activities, deals)
#[derive(Debug, Deserialize)]
struct PipedriveIdOnly {
    id: i64,
}

/// Search envelope: `data.items[].item`
#[derive(Debug, Deserialize)]
struct PipedriveSearchData {
    #[serde(default)]
    items: Vec<PipedriveSearchHit>,
}

#[derive(Debug, Deserialize)]
struct PipedriveSearchHit {
    item: PipedriveSearchItem,
}

#[derive(Debug, Deserialize)]
struct PipedriveSearchItem {
    id: i64,
    name: Option<String>,
    #[serde(default)]
    emails: Vec<String>,
}

// ============================================================================
// Pipedrive Provider Implementation
// ============================================================================

/// Pipedrive client
pub struct PipedriveProvider {
    config: ProviderConfig,
    access_token: String,
    client: Client,
}

impl PipedriveProvider {
    /// Create a client from a valid (already refreshed) access token
    #[must_use]
    pub fn new(access_token: String) -> Self {
        Self {
            config: ProviderConfig {
                name: crm_providers::PIPEDRIVE.to_owned(),
                api_base_url: "https://api.pipedrive.com/v1".to_owned(),
            },
            access_token,
            client: shared_client().clone(),
        }
    }

    /// Generic contact -> person payload, `None` stripped
    ///
    /// Pipedrive persons carry a single display name; company and title have
    /// no direct person field and are left to the org linkage the sales team
    /// maintains in-app.
    fn person_fields(contact: &CrmContact) -> serde_json::Map<String, Value> {
        let mut payload = serde_json::Map::new();

        let name = match (&contact.first_name, &contact.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        };
        if let Some(name) = name {
            payload.insert("name".to_owned(), Value::String(name));
        }
        if let Some(email) = &contact.email {
            payload.insert(
                "email".to_owned(),
                json!([{ "value": email, "primary": true }]),
            );
        }
        if let Some(phone) = &contact.phone {
            payload.insert(
                "phone".to_owned(),
                json!([{ "value": phone, "primary": true }]),
            );
        }
        payload
    }

    /// Fixed activity-type lookup; Pipedrive's generic fallback type is `task`
    fn activity_type(action_type: &ActionType) -> &'static str {
        match action_type {
            ActionType::Email => "email",
            ActionType::Call => "call",
            ActionType::Meeting => "meeting",
            ActionType::Note | ActionType::Other(_) => "task",
        }
    }

    fn deal_fields(deal: &CrmDeal) -> AppResult<serde_json::Map<String, Value>> {
        let mut payload = serde_json::Map::new();
        payload.insert("title".to_owned(), Value::String(deal.name.clone()));
        if let Some(amount) = deal.amount {
            payload.insert("value".to_owned(), json!(amount));
        }
        if let Some(probability) = deal.probability {
            payload.insert("probability".to_owned(), json!(probability));
        }
        if let Some(close_date) = deal.close_date {
            payload.insert(
                "expected_close_date".to_owned(),
                Value::String(close_date.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(contact_id) = &deal.contact_id {
            payload.insert(
                "person_id".to_owned(),
                json!(Self::numeric_person_id(contact_id)?),
            );
        }
        Ok(payload)
    }

    fn handle_api_error(status: reqwest::StatusCode, text: &str) -> AppError {
        let status_code = status.as_u16();

        if status_code == 429 {
            return ProviderError::RateLimited {
                provider: crm_providers::PIPEDRIVE.to_owned(),
                retry_after_secs: 2,
            }
            .into();
        }

        if status_code == 401 {
            return ProviderError::AuthenticationFailed {
                provider: crm_providers::PIPEDRIVE.to_owned(),
                reason: "Access token expired or invalid".to_owned(),
            }
            .into();
        }

        ProviderError::ApiError {
            provider: crm_providers::PIPEDRIVE.to_owned(),
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
                AppError::external_service("pipedrive", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        response.json().await.map_err(|e| {
            AppError::external_service("pipedrive", format!("Failed to parse API response: {e}"))
        })
    }

    async fn api_send<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: &Value,
    ) -> AppResult<T> {
        let url = format!("{}{endpoint}", self.config.api_base_url);
        let response = self
            .client
            .request(method, &url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("pipedrive", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        response.json().await.map_err(|e| {
            AppError::external_service("pipedrive", format!("Failed to parse API response: {e}"))
        })
    }

    fn numeric_person_id(contact_id: &str) -> AppResult<i64> {
        contact_id.parse().map_err(|_| {
            ProviderError::InvalidData {
                provider: crm_providers::PIPEDRIVE.to_owned(),
                field: "contact_id".to_owned(),
                reason: format!("expected numeric Pipedrive id, got {contact_id}"),
            }
            .into()
        })
    }

    /// Unwrap the `data` field of an envelope, treating `null` as a protocol error
    fn expect_data<T>(envelope: PipedriveEnvelope<T>, what: &str) -> AppResult<T> {
        envelope.data.ok_or_else(|| {
            AppError::external_service("pipedrive", format!("{what} response carried no data"))
        })
    }

    fn split_display_name(name: Option<String>) -> (Option<String>, Option<String>) {
        match name {
            Some(name) => {
                let mut parts = name.splitn(2, char::is_whitespace);
                let first = parts.next().map(str::to_owned).filter(|s| !s.is_empty());
                let last = parts.next().map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
                (first, last)
            }
            None => (None, None),
        }
    }
}

#[async_trait]
impl CrmProvider for PipedriveProvider {
    fn name(&self) -> &'static str {
        crm_providers::PIPEDRIVE
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[instrument(skip(self, contact), fields(provider = "pipedrive", api_call = "create_contact"))]
    async fn create_contact(&self, contact: &CrmContact) -> AppResult<String> {
        let mut fields = Self::person_fields(contact);

        // Persons require a display name; fall back to the email address
        if !fields.contains_key("name") {
            let fallback = contact.email.clone().unwrap_or_else(|| "Unknown".to_owned());
            fields.insert("name".to_owned(), Value::String(fallback));
        }

        let envelope: PipedriveEnvelope<PipedrivePerson> = self
            .api_send(reqwest::Method::POST, "/persons", &Value::Object(fields))
            .await?;
        let person = Self::expect_data(envelope, "person create")?;
        Ok(person.id.to_string())
    }

    #[instrument(skip(self, contact), fields(provider = "pipedrive", api_call = "update_contact"))]
    async fn update_contact(&self, remote_id: &str, contact: &CrmContact) -> AppResult<()> {
        let fields = Self::person_fields(contact);
        let _: PipedriveEnvelope<PipedrivePerson> = self
            .api_send(
                reqwest::Method::PUT,
                &format!("/persons/{remote_id}"),
                &Value::Object(fields),
            )
            .await?;
        Ok(())
    }

    async fn get_contact(&self, remote_id: &str) -> Option<RemoteContact> {
        let result: AppResult<PipedriveEnvelope<PipedrivePerson>> =
            self.api_get(&format!("/persons/{remote_id}")).await;

        match result {
            Ok(PipedriveEnvelope { data: Some(person) }) => {
                let (first_name, last_name) = Self::split_display_name(person.name);
                Some(RemoteContact {
                    id: person.id.to_string(),
                    email: person.primary_email,
                    first_name,
                    last_name,
                    company: person.org_name,
                })
            }
            Ok(PipedriveEnvelope { data: None }) => None,
            Err(e) => {
                debug!("Pipedrive person {remote_id} not retrievable: {e}");
                None
            }
        }
    }

    #[instrument(skip(self), fields(provider = "pipedrive", api_call = "find_contact_by_email"))]
    async fn find_contact_by_email(&self, email: &str) -> AppResult<Option<RemoteContact>> {
        let endpoint = format!(
            "/persons/search?term={}&fields=email&exact_match=true&limit=1",
            urlencoding::encode(email)
        );

        let envelope: PipedriveEnvelope<PipedriveSearchData> = self.api_get(&endpoint).await?;
        let Some(data) = envelope.data else {
            return Ok(None);
        };

        Ok(data.items.into_iter().next().map(|hit| {
            let (first_name, last_name) = Self::split_display_name(hit.item.name);
            RemoteContact {
                id: hit.item.id.to_string(),
                email: hit.item.emails.into_iter().next(),
                first_name,
                last_name,
                company: None,
            }
        }))
    }

    #[instrument(skip(self, activity), fields(provider = "pipedrive", api_call = "create_activity"))]
    async fn create_activity(&self, activity: &CrmActivity) -> AppResult<String> {
        let person_id = Self::numeric_person_id(&activity.contact_id)?;
        let subject = activity
            .subject
            .clone()
            .unwrap_or_else(|| activity.action_type.as_str().to_owned());

        let body = json!({
            "subject": subject,
            "type": Self::activity_type(&activity.action_type),
            "done": 1,
            "due_date": activity.timestamp.format("%Y-%m-%d").to_string(),
            "note": activity.body_with_outcome(),
            "person_id": person_id,
        });

        let envelope: PipedriveEnvelope<PipedriveIdOnly> = self
            .api_send(reqwest::Method::POST, "/activities", &body)
            .await?;
        let created = Self::expect_data(envelope, "activity create")?;
        Ok(created.id.to_string())
    }

    #[instrument(skip(self, deal), fields(provider = "pipedrive", api_call = "create_deal"))]
    async fn create_deal(&self, deal: &CrmDeal) -> AppResult<String> {
        let fields = Self::deal_fields(deal)?;
        let envelope: PipedriveEnvelope<PipedriveIdOnly> = self
            .api_send(reqwest::Method::POST, "/deals", &Value::Object(fields))
            .await?;
        let created = Self::expect_data(envelope, "deal create")?;
        Ok(created.id.to_string())
    }

    #[instrument(skip(self, deal), fields(provider = "pipedrive", api_call = "update_deal"))]
    async fn update_deal(&self, remote_id: &str, deal: &CrmDeal) -> AppResult<()> {
        let fields = Self::deal_fields(deal)?;
        let _: PipedriveEnvelope<PipedriveIdOnly> = self
            .api_send(
                reqwest::Method::PUT,
                &format!("/deals/{remote_id}"),
                &Value::Object(fields),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_person_fields_email_shape() {
        let contact = CrmContact {
            email: Some("sam@example.com".to_owned()),
            first_name: Some("Sam".to_owned()),
            last_name: Some("Reed".to_owned()),
            company: Some("ignored".to_owned()),
            phone: None,
            title: None,
            website: None,
        };

        let fields = PipedriveProvider::person_fields(&contact);
        assert_eq!(fields["name"], "Sam Reed");
        assert_eq!(fields["email"][0]["value"], "sam@example.com");
        assert_eq!(fields["email"][0]["primary"], true);
        assert!(!fields.contains_key("phone"));
        // Company has no person field on Pipedrive
        assert!(!fields.contains_key("org_name"));
    }

    #[test]
    fn test_activity_type_lookup() {
        assert_eq!(PipedriveProvider::activity_type(&ActionType::Email), "email");
        assert_eq!(
            PipedriveProvider::activity_type(&ActionType::Meeting),
            "meeting"
        );
        assert_eq!(PipedriveProvider::activity_type(&ActionType::Note), "task");
        assert_eq!(
            PipedriveProvider::activity_type(&ActionType::Other("voicemail".to_owned())),
            "task"
        );
    }

    #[test]
    fn test_numeric_person_id() {
        assert_eq!(PipedriveProvider::numeric_person_id("42").unwrap(), 42);
        assert!(PipedriveProvider::numeric_person_id("0xdead").is_err());
    }
}
