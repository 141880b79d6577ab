// ABOUTME: HubSpot CRM client implementation using the unified provider architecture
// ABOUTME: Maps generic contacts/activities/deals onto CRM v3 objects and legacy engagements
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
// HubSpot API Response Structures
// ============================================================================

/// CRM v3 object envelope (contacts, deals)
#[derive(Debug, Deserialize)]
struct HubSpotObject {
    /// Object id (string in v3)
    id: String,
    /// Contact properties, present on reads and search hits
    #[serde(default)]
    properties: HubSpotContactProperties,
}

/// Contact property subset this engine reads back
#[derive(Debug, Default, Deserialize)]
struct HubSpotContactProperties {
    email: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    company: Option<String>,
}

/// CRM v3 search envelope
#[derive(Debug, Deserialize)]
struct HubSpotSearchResponse {
    results: Vec<HubSpotObject>,
}

/// Legacy Engagements API envelope
#[derive(Debug, Deserialize)]
struct HubSpotEngagementResponse {
    engagement: HubSpotEngagement,
}

/// Engagement core (numeric id in the legacy API)
#[derive(Debug, Deserialize)]
struct HubSpotEngagement {
    id: i64,
}

// ============================================================================
// HubSpot Provider Implementation
// ============================================================================

/// HubSpot CRM client
pub struct HubSpotProvider {
    config: ProviderConfig,
    access_token: String,
    client: Client,
}

impl HubSpotProvider {
    /// Create a client from a valid (already refreshed) access token
    #[must_use]
    pub fn new(access_token: String) -> Self {
        Self {
            config: ProviderConfig {
                name: crm_providers::HUBSPOT.to_owned(),
                api_base_url: "https://api.hubapi.com".to_owned(),
            },
            access_token,
            client: shared_client().clone(),
        }
    }

    /// Generic field name -> HubSpot contact property name, `None` stripped
    fn contact_properties(contact: &CrmContact) -> serde_json::Map<String, Value> {
        let fields = [
            ("email", &contact.email),
            ("firstname", &contact.first_name),
            ("lastname", &contact.last_name),
            ("company", &contact.company),
            ("phone", &contact.phone),
            ("jobtitle", &contact.title),
            ("website", &contact.website),
        ];

        let mut properties = serde_json::Map::new();
        for (name, value) in fields {
            if let Some(value) = value {
                properties.insert((*name).to_owned(), Value::String(value.clone()));
            }
        }
        properties
    }

    /// Fixed activity-type lookup; anything unrecognized becomes a NOTE
    fn engagement_type(action_type: &ActionType) -> &'static str {
        match action_type {
            ActionType::Email => "EMAIL",
            ActionType::Call => "CALL",
            ActionType::Meeting => "MEETING",
            ActionType::Note | ActionType::Other(_) => "NOTE",
        }
    }

    fn deal_properties(deal: &CrmDeal) -> serde_json::Map<String, Value> {
        let mut properties = serde_json::Map::new();
        properties.insert("dealname".to_owned(), Value::String(deal.name.clone()));
        if let Some(amount) = deal.amount {
            properties.insert("amount".to_owned(), Value::String(amount.to_string()));
        }
        if let Some(stage) = &deal.stage {
            properties.insert("dealstage".to_owned(), Value::String(stage.clone()));
        }
        if let Some(close_date) = deal.close_date {
            properties.insert(
                "closedate".to_owned(),
                Value::String(close_date.to_rfc3339()),
            );
        }
        if let Some(probability) = deal.probability {
            properties.insert(
                "hs_deal_stage_probability".to_owned(),
                Value::String(probability.to_string()),
            );
        }
        properties
    }

    fn handle_api_error(status: reqwest::StatusCode, text: &str) -> AppError {
        let status_code = status.as_u16();

        if status_code == 429 {
            return ProviderError::RateLimited {
                provider: crm_providers::HUBSPOT.to_owned(),
                retry_after_secs: 10,
            }
            .into();
        }

        if status_code == 401 {
            return ProviderError::AuthenticationFailed {
                provider: crm_providers::HUBSPOT.to_owned(),
                reason: "Access token expired or invalid".to_owned(),
            }
            .into();
        }

        ProviderError::ApiError {
            provider: crm_providers::HUBSPOT.to_owned(),
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
                AppError::external_service("hubspot", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        response.json().await.map_err(|e| {
            AppError::external_service("hubspot", format!("Failed to parse API response: {e}"))
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
                AppError::external_service("hubspot", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        response.json().await.map_err(|e| {
            AppError::external_service("hubspot", format!("Failed to parse API response: {e}"))
        })
    }

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
                AppError::external_service("hubspot", format!("Failed to send request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::handle_api_error(status, &text));
        }

        Ok(())
    }

    /// Engagement association wants the numeric contact id
    fn numeric_contact_id(contact_id: &str) -> AppResult<i64> {
        contact_id.parse().map_err(|_| {
            ProviderError::InvalidData {
                provider: crm_providers::HUBSPOT.to_owned(),
                field: "contact_id".to_owned(),
                reason: format!("expected numeric HubSpot id, got {contact_id}"),
            }
            .into()
        })
    }

    fn to_remote_contact(object: HubSpotObject) -> RemoteContact {
        RemoteContact {
            id: object.id,
            email: object.properties.email,
            first_name: object.properties.firstname,
            last_name: object.properties.lastname,
            company: object.properties.company,
        }
    }
}

#[async_trait]
impl CrmProvider for HubSpotProvider {
    fn name(&self) -> &'static str {
        crm_providers::HUBSPOT
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[instrument(skip(self, contact), fields(provider = "hubspot", api_call = "create_contact"))]
    async fn create_contact(&self, contact: &CrmContact) -> AppResult<String> {
        let body = json!({ "properties": Self::contact_properties(contact) });
        let created: HubSpotObject = self.api_post("/crm/v3/objects/contacts", &body).await?;
        Ok(created.id)
    }

    #[instrument(skip(self, contact), fields(provider = "hubspot", api_call = "update_contact"))]
    async fn update_contact(&self, remote_id: &str, contact: &CrmContact) -> AppResult<()> {
        let body = json!({ "properties": Self::contact_properties(contact) });
        self.api_patch(&format!("/crm/v3/objects/contacts/{remote_id}"), &body)
            .await
    }

    async fn get_contact(&self, remote_id: &str) -> Option<RemoteContact> {
        let endpoint = format!(
            "/crm/v3/objects/contacts/{remote_id}?properties=email,firstname,lastname,company"
        );
        match self.api_get::<HubSpotObject>(&endpoint).await {
            Ok(object) => Some(Self::to_remote_contact(object)),
            Err(e) => {
                debug!("HubSpot contact {remote_id} not retrievable: {e}");
                None
            }
        }
    }

    #[instrument(skip(self), fields(provider = "hubspot", api_call = "find_contact_by_email"))]
    async fn find_contact_by_email(&self, email: &str) -> AppResult<Option<RemoteContact>> {
        let body = json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": "email",
                    "operator": "EQ",
                    "value": email,
                }]
            }],
            "properties": ["email", "firstname", "lastname", "company"],
            "limit": 1,
        });

        let search: HubSpotSearchResponse = self
            .api_post("/crm/v3/objects/contacts/search", &body)
            .await?;

        Ok(search
            .results
            .into_iter()
            .next()
            .map(Self::to_remote_contact))
    }

    #[instrument(skip(self, activity), fields(provider = "hubspot", api_call = "create_activity"))]
    async fn create_activity(&self, activity: &CrmActivity) -> AppResult<String> {
        let contact_id = Self::numeric_contact_id(&activity.contact_id)?;

        let body = json!({
            "engagement": {
                "type": Self::engagement_type(&activity.action_type),
                "timestamp": activity.timestamp.timestamp_millis(),
                "active": true,
            },
            "associations": { "contactIds": [contact_id] },
            "metadata": {
                "subject": activity.subject,
                "body": activity.body_with_outcome(),
            },
        });

        let created: HubSpotEngagementResponse =
            self.api_post("/engagements/v1/engagements", &body).await?;
        Ok(created.engagement.id.to_string())
    }

    #[instrument(skip(self, deal), fields(provider = "hubspot", api_call = "create_deal"))]
    async fn create_deal(&self, deal: &CrmDeal) -> AppResult<String> {
        let mut body = json!({ "properties": Self::deal_properties(deal) });

        // Deal-to-contact association rides along in the create call;
        // associationTypeId 3 is the HubSpot-defined deal-to-contact type
        if let Some(contact_id) = &deal.contact_id {
            body["associations"] = json!([{
                "to": { "id": contact_id },
                "types": [{
                    "associationCategory": "HUBSPOT_DEFINED",
                    "associationTypeId": 3,
                }],
            }]);
        }

        let created: HubSpotObject = self.api_post("/crm/v3/objects/deals", &body).await?;
        Ok(created.id)
    }

    #[instrument(skip(self, deal), fields(provider = "hubspot", api_call = "update_deal"))]
    async fn update_deal(&self, remote_id: &str, deal: &CrmDeal) -> AppResult<()> {
        let body = json!({ "properties": Self::deal_properties(deal) });
        self.api_patch(&format!("/crm/v3/objects/deals/{remote_id}"), &body)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_properties_strip_unset_fields() {
        let contact = CrmContact {
            email: Some("lee@example.com".to_owned()),
            first_name: Some("Lee".to_owned()),
            last_name: None,
            company: None,
            phone: None,
            title: Some("CTO".to_owned()),
            website: None,
        };

        let properties = HubSpotProvider::contact_properties(&contact);
        assert_eq!(properties.len(), 3);
        assert_eq!(properties["email"], "lee@example.com");
        assert_eq!(properties["jobtitle"], "CTO");
        assert!(!properties.contains_key("lastname"));
        assert!(!properties.contains_key("website"));
    }

    #[test]
    fn test_engagement_type_lookup() {
        assert_eq!(HubSpotProvider::engagement_type(&ActionType::Email), "EMAIL");
        assert_eq!(HubSpotProvider::engagement_type(&ActionType::Call), "CALL");
        assert_eq!(
            HubSpotProvider::engagement_type(&ActionType::Meeting),
            "MEETING"
        );
        assert_eq!(HubSpotProvider::engagement_type(&ActionType::Note), "NOTE");
        assert_eq!(
            HubSpotProvider::engagement_type(&ActionType::Other("linkedin_dm".to_owned())),
            "NOTE"
        );
    }

    #[test]
    fn test_numeric_contact_id_rejects_garbage() {
        assert!(HubSpotProvider::numeric_contact_id("12345").is_ok());
        assert!(HubSpotProvider::numeric_contact_id("abc").is_err());
    }
}
