use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub preference_key: String,
    pub preference_value: Value,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    pub async fn find(pool: &PgPool, user_id: Uuid, key: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserPreference>(
            r#"SELECT user_id, preference_key, preference_value, updated_at
               FROM user_preferences
               WHERE user_id = $1 AND preference_key = $2"#,
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    pub async fn upsert(
        pool: &PgPool,
        user_id: Uuid,
        key: &str,
        value: &Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UserPreference>(
            r#"INSERT INTO user_preferences (user_id, preference_key, preference_value)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id, preference_key) DO UPDATE SET
                   preference_value = EXCLUDED.preference_value,
                   updated_at = now()
               RETURNING user_id, preference_key, preference_value, updated_at"#,
        )
        .bind(user_id)
        .bind(key)
        .bind(value)
        .fetch_one(pool)
        .await
    }
}
