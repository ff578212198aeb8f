use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display)]
#[sqlx(type_name = "dossier_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DossierType {
    Country,
    Organization,
    Forum,
    Engagement,
    Topic,
    WorkingGroup,
    Person,
    Theme,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "dossier_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DossierStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Dossier {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub dossier_type: DossierType,
    pub name_en: String,
    pub name_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub status: DossierStatus,
    pub sensitivity_level: i32,
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateDossier {
    pub dossier_type: DossierType,
    pub name_en: String,
    pub name_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub sensitivity_level: Option<i32>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateDossier {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub sensitivity_level: Option<i32>,
    pub tags: Option<Vec<String>>,
}

const DOSSIER_COLUMNS: &str = "id, type, name_en, name_ar, description_en, description_ar, status, \
    sensitivity_level, tags, created_by, created_at, updated_at";

impl Dossier {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Dossier>(&format!("SELECT {DOSSIER_COLUMNS} FROM dossiers WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateDossier,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Dossier>(&format!(
            "INSERT INTO dossiers (id, type, name_en, name_ar, description_en, description_ar, \
             sensitivity_level, tags, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 1), $8, $9)
             RETURNING {DOSSIER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(data.dossier_type)
        .bind(&data.name_en)
        .bind(&data.name_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(data.sensitivity_level)
        .bind(&data.tags)
        .bind(created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: &UpdateDossier,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Dossier>(&format!(
            "UPDATE dossiers SET
                name_en = COALESCE($2, name_en),
                name_ar = COALESCE($3, name_ar),
                description_en = COALESCE($4, description_en),
                description_ar = COALESCE($5, description_ar),
                sensitivity_level = COALESCE($6, sensitivity_level),
                tags = COALESCE($7, tags),
                updated_at = now()
             WHERE id = $1
             RETURNING {DOSSIER_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.name_en)
        .bind(&data.name_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(data.sensitivity_level)
        .bind(&data.tags)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: DossierStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE dossiers SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn add_owner<'e, E>(
        executor: E,
        dossier_id: Uuid,
        user_id: Uuid,
        ownership_type: &str,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"INSERT INTO dossier_owners (dossier_id, user_id, ownership_type)
               VALUES ($1, $2, $3)
               ON CONFLICT (dossier_id, user_id) DO NOTHING"#,
        )
        .bind(dossier_id)
        .bind(user_id)
        .bind(ownership_type)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// `(id, name_en, name_ar)` for a batch of dossiers.
    pub async fn find_names(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String, String)>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, name_en, name_ar FROM dossiers WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}
