use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Postgres};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title_en: String,
    pub title_ar: String,
    pub body_en: Option<String>,
    pub body_ar: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: &'static str,
    pub title_en: String,
    pub title_ar: String,
    pub body_en: Option<String>,
    pub body_ar: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
}

impl Notification {
    pub async fn create<'e, E>(executor: E, data: &NewNotification) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications
                   (id, user_id, notification_type, title_en, title_ar, body_en, body_ar, entity_type, entity_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, user_id, notification_type, title_en, title_ar, body_en, body_ar,
                         entity_type, entity_id, is_read, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.user_id)
        .bind(data.notification_type)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.body_en)
        .bind(&data.body_ar)
        .bind(&data.entity_type)
        .bind(data.entity_id)
        .fetch_one(executor)
        .await
    }
}
