// ABOUTME: SQLite implementation of the storage ports using sqlx
// ABOUTME: Owns schema migration and the unique index backing mapping idempotence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 Cadence Labs

//! SQLite storage.
//!
//! Runtime `sqlx` queries against a `CREATE TABLE IF NOT EXISTS` schema. The
//! `crm_mappings` unique index on (provider, entity kind, entity id) is the
//! load-bearing constraint: `insert_mapping_if_absent` is expressed as
//! `INSERT ... ON CONFLICT DO NOTHING`, so two racing syncs cannot both map
//! the same local entity.

use super::{
    ActionRepository, IntegrationRepository, LeadRepository, MappingRepository, SyncLogRepository,
};
use crate::errors::{AppError, AppResult};
use crate::models::{
    ActionStatus, ActionType, CrmKind, CrmMapping, CrmSyncLog, EncryptedCredentials, EntityKind,
    Integration, IntegrationStatus, Lead, OutreachAction, SyncDirection, SyncOperation,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// SQLite-backed implementation of every storage port
#[derive(Clone)]
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

impl SqliteStorage {
    /// Open (creating the file if needed) and migrate the database
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains("mode=")
            && !database_url.contains(":memory:")
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Get a reference to the underlying pool
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create tables and indexes
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                organization TEXT,
                role TEXT,
                website TEXT
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS outreach_actions (
                id TEXT PRIMARY KEY,
                lead_id TEXT NOT NULL,
                action_type TEXT NOT NULL,
                subject TEXT,
                body TEXT,
                sent_at INTEGER,
                status TEXT NOT NULL,
                outcome TEXT
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS integrations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                integration_type TEXT NOT NULL,
                status TEXT NOT NULL,
                credentials TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(user_id, integration_type)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS crm_mappings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                entity_kind TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                remote_entity_type TEXT NOT NULL,
                remote_id TEXT NOT NULL,
                last_synced_at INTEGER NOT NULL,
                UNIQUE(provider, entity_kind, entity_id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS crm_sync_log (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                operation TEXT NOT NULL,
                direction TEXT NOT NULL,
                entity_kind TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                success INTEGER NOT NULL,
                error_message TEXT,
                timestamp INTEGER NOT NULL
            )
            ",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        }

        Ok(())
    }

    /// Seed a lead row (lead writes belong to the surrounding application;
    /// exposed for tests and tooling)
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn insert_lead(&self, lead: &Lead) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT OR REPLACE INTO leads (id, name, email, organization, role, website)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(lead.id.to_string())
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.organization)
        .bind(&lead.role)
        .bind(&lead.website)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert lead: {e}")))?;
        Ok(())
    }

    /// Seed an outreach action row (see [`Self::insert_lead`])
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn insert_action(&self, action: &OutreachAction) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT OR REPLACE INTO outreach_actions
                (id, lead_id, action_type, subject, body, sent_at, status, outcome)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(action.id.to_string())
        .bind(action.lead_id.to_string())
        .bind(action.action_type.as_str())
        .bind(&action.subject)
        .bind(&action.body)
        .bind(action.sent_at.map(|t| t.timestamp()))
        .bind(action_status_str(action.status))
        .bind(&action.outcome)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert action: {e}")))?;
        Ok(())
    }
}

fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| AppError::database(format!("Invalid UUID in row: {e}")))
}

fn parse_timestamp(value: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(value, 0)
        .ok_or_else(|| AppError::database(format!("Invalid timestamp in row: {value}")))
}

fn parse_provider(value: &str) -> AppResult<CrmKind> {
    CrmKind::from_tag(value)
        .ok_or_else(|| AppError::database(format!("Unknown provider in row: {value}")))
}

fn parse_entity_kind(value: &str) -> AppResult<EntityKind> {
    match value {
        "lead" => Ok(EntityKind::Lead),
        "action" => Ok(EntityKind::Action),
        other => Err(AppError::database(format!(
            "Unknown entity kind in row: {other}"
        ))),
    }
}

fn parse_operation(value: &str) -> AppResult<SyncOperation> {
    match value {
        "create" => Ok(SyncOperation::Create),
        "update" => Ok(SyncOperation::Update),
        "skip" => Ok(SyncOperation::Skip),
        other => Err(AppError::database(format!(
            "Unknown operation in row: {other}"
        ))),
    }
}

fn parse_integration_status(value: &str) -> AppResult<IntegrationStatus> {
    match value {
        "connected" => Ok(IntegrationStatus::Connected),
        "disconnected" => Ok(IntegrationStatus::Disconnected),
        other => Err(AppError::database(format!(
            "Unknown integration status in row: {other}"
        ))),
    }
}

fn integration_status_str(status: IntegrationStatus) -> &'static str {
    match status {
        IntegrationStatus::Connected => "connected",
        IntegrationStatus::Disconnected => "disconnected",
    }
}

fn parse_action_status(value: &str) -> AppResult<ActionStatus> {
    match value {
        "draft" => Ok(ActionStatus::Draft),
        "scheduled" => Ok(ActionStatus::Scheduled),
        "sent" => Ok(ActionStatus::Sent),
        "failed" => Ok(ActionStatus::Failed),
        other => Err(AppError::database(format!(
            "Unknown action status in row: {other}"
        ))),
    }
}

fn action_status_str(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Draft => "draft",
        ActionStatus::Scheduled => "scheduled",
        ActionStatus::Sent => "sent",
        ActionStatus::Failed => "failed",
    }
}

fn lead_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<Lead> {
    Ok(Lead {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        email: row.get("email"),
        organization: row.get("organization"),
        role: row.get("role"),
        website: row.get("website"),
    })
}

fn action_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<OutreachAction> {
    let sent_at = row
        .get::<Option<i64>, _>("sent_at")
        .map(parse_timestamp)
        .transpose()?;

    Ok(OutreachAction {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        lead_id: parse_uuid(&row.get::<String, _>("lead_id"))?,
        action_type: ActionType::from(row.get::<String, _>("action_type")),
        subject: row.get("subject"),
        body: row.get("body"),
        sent_at,
        status: parse_action_status(&row.get::<String, _>("status"))?,
        outcome: row.get("outcome"),
    })
}

fn integration_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<Integration> {
    Ok(Integration {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        integration_type: row.get("integration_type"),
        status: parse_integration_status(&row.get::<String, _>("status"))?,
        credentials: row
            .get::<Option<String>, _>("credentials")
            .map(|blob| EncryptedCredentials { blob }),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn mapping_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<CrmMapping> {
    Ok(CrmMapping {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        provider: parse_provider(&row.get::<String, _>("provider"))?,
        entity_kind: parse_entity_kind(&row.get::<String, _>("entity_kind"))?,
        entity_id: parse_uuid(&row.get::<String, _>("entity_id"))?,
        remote_entity_type: row.get("remote_entity_type"),
        remote_id: row.get("remote_id"),
        last_synced_at: parse_timestamp(row.get("last_synced_at"))?,
    })
}

fn log_from_row(row: &sqlx::sqlite::SqliteRow) -> AppResult<CrmSyncLog> {
    Ok(CrmSyncLog {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
        provider: parse_provider(&row.get::<String, _>("provider"))?,
        operation: parse_operation(&row.get::<String, _>("operation"))?,
        direction: SyncDirection::Outbound,
        entity_kind: parse_entity_kind(&row.get::<String, _>("entity_kind"))?,
        entity_id: parse_uuid(&row.get::<String, _>("entity_id"))?,
        success: row.get::<i64, _>("success") != 0,
        error_message: row.get("error_message"),
        timestamp: parse_timestamp(row.get("timestamp"))?,
    })
}

#[async_trait]
impl LeadRepository for SqliteStorage {
    async fn lead_by_id(&self, lead_id: Uuid) -> AppResult<Option<Lead>> {
        let row = sqlx::query("SELECT * FROM leads WHERE id = $1")
            .bind(lead_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to query lead: {e}")))?;

        row.as_ref().map(lead_from_row).transpose()
    }
}

#[async_trait]
impl ActionRepository for SqliteStorage {
    async fn action_by_id(&self, action_id: Uuid) -> AppResult<Option<OutreachAction>> {
        let row = sqlx::query("SELECT * FROM outreach_actions WHERE id = $1")
            .bind(action_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to query action: {e}")))?;

        row.as_ref().map(action_from_row).transpose()
    }

    async fn sent_actions_for_lead(&self, lead_id: Uuid) -> AppResult<Vec<OutreachAction>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM outreach_actions
            WHERE lead_id = $1 AND status = 'sent'
            ORDER BY sent_at ASC
            ",
        )
        .bind(lead_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query sent actions: {e}")))?;

        rows.iter().map(action_from_row).collect()
    }
}

#[async_trait]
impl IntegrationRepository for SqliteStorage {
    async fn create_integration(&self, integration: &Integration) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO integrations
                (id, user_id, integration_type, status, credentials, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(integration.id.to_string())
        .bind(integration.user_id.to_string())
        .bind(&integration.integration_type)
        .bind(integration_status_str(integration.status))
        .bind(integration.credentials.as_ref().map(|c| c.blob.clone()))
        .bind(integration.created_at.timestamp())
        .bind(integration.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert integration: {e}")))?;
        Ok(())
    }

    async fn connected_integration(
        &self,
        user_id: Uuid,
        integration_type: &str,
    ) -> AppResult<Option<Integration>> {
        let row = sqlx::query(
            r"
            SELECT * FROM integrations
            WHERE user_id = $1 AND integration_type = $2 AND status = 'connected'
            ",
        )
        .bind(user_id.to_string())
        .bind(integration_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query integration: {e}")))?;

        row.as_ref().map(integration_from_row).transpose()
    }

    async fn integrations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Integration>> {
        let rows = sqlx::query("SELECT * FROM integrations WHERE user_id = $1")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to query integrations: {e}")))?;

        rows.iter().map(integration_from_row).collect()
    }

    async fn update_credentials(
        &self,
        integration_id: Uuid,
        credentials: &EncryptedCredentials,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE integrations SET credentials = $2, updated_at = $3 WHERE id = $1
            ",
        )
        .bind(integration_id.to_string())
        .bind(&credentials.blob)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update credentials: {e}")))?;
        Ok(())
    }

    async fn update_status(
        &self,
        integration_id: Uuid,
        status: IntegrationStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE integrations SET status = $2, updated_at = $3 WHERE id = $1
            ",
        )
        .bind(integration_id.to_string())
        .bind(integration_status_str(status))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update status: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MappingRepository for SqliteStorage {
    async fn find_mapping(
        &self,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Option<CrmMapping>> {
        let row = sqlx::query(
            r"
            SELECT * FROM crm_mappings
            WHERE provider = $1 AND entity_kind = $2 AND entity_id = $3
            ",
        )
        .bind(provider.as_str())
        .bind(entity_kind.as_str())
        .bind(entity_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query mapping: {e}")))?;

        row.as_ref().map(mapping_from_row).transpose()
    }

    async fn insert_mapping_if_absent(&self, mapping: &CrmMapping) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO crm_mappings
                (id, user_id, provider, entity_kind, entity_id,
                 remote_entity_type, remote_id, last_synced_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(provider, entity_kind, entity_id) DO NOTHING
            ",
        )
        .bind(mapping.id.to_string())
        .bind(mapping.user_id.to_string())
        .bind(mapping.provider.as_str())
        .bind(mapping.entity_kind.as_str())
        .bind(mapping.entity_id.to_string())
        .bind(&mapping.remote_entity_type)
        .bind(&mapping.remote_id)
        .bind(mapping.last_synced_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert mapping: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn touch_mapping(
        &self,
        provider: CrmKind,
        entity_kind: EntityKind,
        entity_id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE crm_mappings SET last_synced_at = $4
            WHERE provider = $1 AND entity_kind = $2 AND entity_id = $3
            ",
        )
        .bind(provider.as_str())
        .bind(entity_kind.as_str())
        .bind(entity_id.to_string())
        .bind(synced_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to touch mapping: {e}")))?;
        Ok(())
    }

    async fn mappings_for_entity(
        &self,
        entity_kind: EntityKind,
        entity_id: Uuid,
    ) -> AppResult<Vec<CrmMapping>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM crm_mappings WHERE entity_kind = $1 AND entity_id = $2
            ",
        )
        .bind(entity_kind.as_str())
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query mappings: {e}")))?;

        rows.iter().map(mapping_from_row).collect()
    }
}

#[async_trait]
impl SyncLogRepository for SqliteStorage {
    async fn append_log(&self, entry: &CrmSyncLog) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO crm_sync_log
                (id, user_id, provider, operation, direction, entity_kind,
                 entity_id, success, error_message, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.to_string())
        .bind(entry.provider.as_str())
        .bind(entry.operation.as_str())
        .bind("outbound")
        .bind(entry.entity_kind.as_str())
        .bind(entry.entity_id.to_string())
        .bind(i64::from(entry.success))
        .bind(&entry.error_message)
        .bind(entry.timestamp.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to append sync log: {e}")))?;
        Ok(())
    }

    async fn recent_logs_for_user(&self, user_id: Uuid, limit: u32) -> AppResult<Vec<CrmSyncLog>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM crm_sync_log
            WHERE user_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query sync log: {e}")))?;

        rows.iter().map(log_from_row).collect()
    }
}
