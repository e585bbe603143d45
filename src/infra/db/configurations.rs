use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::repos::{DurableError, DurableStore};
use crate::domain::entities::{ConfigEntry, ConfigValueType, validate_name, validate_value_len};

use super::{PostgresRepositories, map_sqlx_error};

const FETCH_ACTIVE_SQL: &str = r#"
    SELECT application_name, name, value, value_type, is_active, updated_at
    FROM configuration_items
    WHERE application_name = $1 AND is_active = TRUE
    ORDER BY name
"#;

const FETCH_ONE_SQL: &str = r#"
    SELECT application_name, name, value, value_type, is_active, updated_at
    FROM configuration_items
    WHERE application_name = $1 AND LOWER(name) = LOWER($2) AND is_active = TRUE
    ORDER BY updated_at DESC
    LIMIT 1
"#;

#[derive(sqlx::FromRow)]
struct ConfigEntryRow {
    application_name: String,
    name: String,
    value: String,
    value_type: String,
    is_active: bool,
    updated_at: OffsetDateTime,
}

impl From<ConfigEntryRow> for ConfigEntry {
    fn from(row: ConfigEntryRow) -> Self {
        let value_type = row.value_type.parse().unwrap_or_else(|err| {
            warn!(
                application = %row.application_name,
                key = %row.name,
                error = %err,
                "Unknown stored value type; reading as string"
            );
            ConfigValueType::String
        });

        Self {
            application_name: row.application_name,
            key: row.name,
            value: row.value,
            value_type,
            active: row.is_active,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl DurableStore for PostgresRepositories {
    async fn fetch_active(&self, application_name: &str) -> Result<Vec<ConfigEntry>, DurableError> {
        let rows = sqlx::query_as::<_, ConfigEntryRow>(FETCH_ACTIVE_SQL)
            .bind(application_name)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ConfigEntry::from).collect())
    }

    async fn fetch_one(
        &self,
        application_name: &str,
        key: &str,
    ) -> Result<Option<ConfigEntry>, DurableError> {
        let row = sqlx::query_as::<_, ConfigEntryRow>(FETCH_ONE_SQL)
            .bind(application_name)
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(ConfigEntry::from))
    }
}

impl PostgresRepositories {
    /// Insert or replace the entry identified by `(application_name, key)`.
    pub async fn upsert_entry(&self, entry: &ConfigEntry) -> Result<(), DurableError> {
        validate_name("application_name", &entry.application_name)
            .and_then(|()| validate_name("key", &entry.key))
            .and_then(|()| validate_value_len(&entry.value))
            .map_err(|err| DurableError::query(err.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO configuration_items (
                application_name,
                name,
                value,
                value_type,
                is_active,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (application_name, name) DO UPDATE SET
                value = EXCLUDED.value,
                value_type = EXCLUDED.value_type,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&entry.application_name)
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.value_type.as_str())
        .bind(entry.active)
        .bind(entry.updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    /// Toggle visibility of one entry. Returns `false` when no such entry exists.
    pub async fn set_active(
        &self,
        application_name: &str,
        key: &str,
        active: bool,
    ) -> Result<bool, DurableError> {
        let result = sqlx::query(
            r#"
            UPDATE configuration_items
            SET is_active = $3, updated_at = $4
            WHERE application_name = $1 AND name = $2
            "#,
        )
        .bind(application_name)
        .bind(key)
        .bind(active)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_application_names(&self) -> Result<Vec<String>, DurableError> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT application_name FROM configuration_items ORDER BY application_name",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
