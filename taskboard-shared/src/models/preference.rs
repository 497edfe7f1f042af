/// Per-user key/value preferences
///
/// Values are JSON scalars or documents. They are stored as text with a
/// `value_type` discriminator so they decode back to the same JSON shape.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_preferences (
///     id BIGSERIAL PRIMARY KEY,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     key VARCHAR(255) NOT NULL,
///     value TEXT NOT NULL,
///     value_type VARCHAR(16) NOT NULL DEFAULT 'string',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, key)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::preference::{PreferenceValue, UserPreference};
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// UserPreference::set(&pool, 1, "theme", &PreferenceValue::from("dark")).await?;
///
/// let theme = UserPreference::get_or(&pool, 1, "theme", PreferenceValue::from("light")).await?;
/// assert_eq!(theme, PreferenceValue::from("dark"));
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;

/// Key whose responses and updates get special handling
pub const THEME_KEY: &str = "theme";

/// Error type for preference operations
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("The value field is required.")]
    MissingValue,

    #[error("Stored preference '{key}' could not be decoded: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A preference value. Serializes as the bare JSON value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    String(String),
    Number(serde_json::Number),
    Bool(bool),

    /// Arrays and objects
    Json(JsonValue),
}

impl PreferenceValue {
    /// Converts request JSON; `null` is rejected
    pub fn from_json(value: JsonValue) -> Result<Self, PreferenceError> {
        match value {
            JsonValue::Null => Err(PreferenceError::MissingValue),
            JsonValue::String(s) => Ok(Self::String(s)),
            JsonValue::Number(n) => Ok(Self::Number(n)),
            JsonValue::Bool(b) => Ok(Self::Bool(b)),
            other => Ok(Self::Json(other)),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Number(n) => JsonValue::Number(n.clone()),
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Json(v) => v.clone(),
        }
    }

    /// Discriminator stored in `value_type`
    pub fn value_type(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Json(_) => "json",
        }
    }

    /// Text stored in `value`
    pub fn to_storage(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }

    pub fn from_storage(value_type: &str, raw: &str) -> Result<Self, String> {
        match value_type {
            "string" => Ok(Self::String(raw.to_string())),
            "number" => serde_json::Number::from_str(raw)
                .map(Self::Number)
                .map_err(|e| e.to_string()),
            "bool" => raw.parse::<bool>().map(Self::Bool).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(raw).map(Self::Json).map_err(|e| e.to_string()),
            other => Err(format!("unknown value_type '{other}'")),
        }
    }
}

impl From<&str> for PreferenceValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Allowed values for the `theme` preference, enforced on its dedicated update path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        }
    }
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "auto" => Ok(Theme::Auto),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PreferenceRow {
    key: String,
    value: String,
    value_type: String,
}

impl PreferenceRow {
    fn decode(self) -> Result<(String, PreferenceValue), PreferenceError> {
        match PreferenceValue::from_storage(&self.value_type, &self.value) {
            Ok(value) => Ok((self.key, value)),
            Err(reason) => Err(PreferenceError::Corrupt { key: self.key, reason }),
        }
    }
}

/// Repository for `user_preferences`
pub struct UserPreference;

impl UserPreference {
    async fn upsert<'e, E>(executor: E, user_id: i64, key: &str, value: &PreferenceValue) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, key, value, value_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, key)
            DO UPDATE SET value = EXCLUDED.value, value_type = EXCLUDED.value_type, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(key)
        .bind(value.to_storage())
        .bind(value.value_type())
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Idempotent upsert of one key
    pub async fn set(pool: &PgPool, user_id: i64, key: &str, value: &PreferenceValue) -> Result<(), PreferenceError> {
        Self::upsert(pool, user_id, key, value).await?;
        info!(user_id, key, "Preference set");
        Ok(())
    }

    /// Upserts every pair in one transaction; nothing is written if any fails
    pub async fn set_many(
        pool: &PgPool,
        user_id: i64,
        entries: &[(String, PreferenceValue)],
    ) -> Result<(), PreferenceError> {
        let mut tx = pool.begin().await?;
        for (key, value) in entries {
            Self::upsert(&mut *tx, user_id, key, value).await?;
        }
        tx.commit().await?;

        info!(user_id, count = entries.len(), "Preferences set");
        Ok(())
    }

    pub async fn get(pool: &PgPool, user_id: i64, key: &str) -> Result<Option<PreferenceValue>, PreferenceError> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            "SELECT key, value, value_type FROM user_preferences WHERE user_id = $1 AND key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(pool)
        .await?;

        row.map(|r| r.decode().map(|(_, value)| value)).transpose()
    }

    /// Like [`Self::get`], falling back to `default` when the key is absent
    pub async fn get_or(
        pool: &PgPool,
        user_id: i64,
        key: &str,
        default: PreferenceValue,
    ) -> Result<PreferenceValue, PreferenceError> {
        Ok(Self::get(pool, user_id, key).await?.unwrap_or(default))
    }

    pub async fn get_all(pool: &PgPool, user_id: i64) -> Result<BTreeMap<String, PreferenceValue>, PreferenceError> {
        let rows = sqlx::query_as::<_, PreferenceRow>(
            "SELECT key, value, value_type FROM user_preferences WHERE user_id = $1 ORDER BY key",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(PreferenceRow::decode).collect()
    }

    /// Returns whether a row was removed
    pub async fn delete(pool: &PgPool, user_id: i64, key: &str) -> Result<bool, PreferenceError> {
        let result = sqlx::query("DELETE FROM user_preferences WHERE user_id = $1 AND key = $2")
            .bind(user_id)
            .bind(key)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_discriminates() {
        assert_eq!(PreferenceValue::from_json(json!("dark")).unwrap().value_type(), "string");
        assert_eq!(PreferenceValue::from_json(json!(12.5)).unwrap().value_type(), "number");
        assert_eq!(PreferenceValue::from_json(json!(false)).unwrap().value_type(), "bool");
        assert_eq!(PreferenceValue::from_json(json!([1, 2])).unwrap().value_type(), "json");
        assert_eq!(PreferenceValue::from_json(json!({"a": 1})).unwrap().value_type(), "json");
        assert!(matches!(
            PreferenceValue::from_json(JsonValue::Null),
            Err(PreferenceError::MissingValue)
        ));
    }

    #[test]
    fn test_storage_preserves_json_shape() {
        for original in [json!("10"), json!(10), json!(true), json!({"columns": ["todo", "done"]})] {
            let value = PreferenceValue::from_json(original.clone()).unwrap();
            let restored = PreferenceValue::from_storage(value.value_type(), &value.to_storage()).unwrap();

            assert_eq!(restored.to_json(), original);
            assert_eq!(serde_json::to_value(&restored).unwrap(), original);
        }
    }

    #[test]
    fn test_from_storage_rejects_garbage() {
        assert!(PreferenceValue::from_storage("bool", "yes").is_err());
        assert!(PreferenceValue::from_storage("number", "ten").is_err());
        assert!(PreferenceValue::from_storage("blob", "x").is_err());
    }

    #[test]
    fn test_theme_values() {
        assert_eq!("dark".parse::<Theme>(), Ok(Theme::Dark));
        assert_eq!(Theme::default().as_str(), "light");
        assert!("blue".parse::<Theme>().is_err());
        assert!("Dark".parse::<Theme>().is_err());
    }
}
