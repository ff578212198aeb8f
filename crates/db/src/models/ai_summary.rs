use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AiSummary {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub summary_length: String,
    pub focus: String,
    pub content: Value,
    pub model: Option<String>,
    pub generated_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAiSummary<'a> {
    pub entity_type: &'a str,
    pub entity_id: Uuid,
    pub summary_length: &'a str,
    pub focus: &'a str,
    pub content: Value,
    pub model: Option<&'a str>,
    pub generated_by: Uuid,
}

impl AiSummary {
    pub async fn create(pool: &PgPool, data: &NewAiSummary<'_>) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AiSummary>(
            r#"INSERT INTO ai_summaries (id, entity_type, entity_id, summary_length, focus, content, model, generated_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, entity_type, entity_id, summary_length, focus, content, model, generated_by, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.entity_type)
        .bind(data.entity_id)
        .bind(data.summary_length)
        .bind(data.focus)
        .bind(&data.content)
        .bind(data.model)
        .bind(data.generated_by)
        .fetch_one(pool)
        .await
    }
}
