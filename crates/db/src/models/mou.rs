use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "mou_workflow_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MouWorkflowState {
    Draft,
    InternalReview,
    ExternalReview,
    Negotiation,
    PendingSignature,
    Active,
    Renewed,
    Expired,
    Terminated,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Mou {
    pub id: Uuid,
    pub reference_number: String,
    pub title_en: String,
    pub title_ar: String,
    pub dossier_id: Option<Uuid>,
    pub counterparty_dossier_id: Option<Uuid>,
    pub workflow_state: MouWorkflowState,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub previous_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Active MoU approaching (or past) its expiry date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ExpiringMou {
    pub id: Uuid,
    pub reference_number: String,
    pub title_en: String,
    pub title_ar: String,
    pub workflow_state: MouWorkflowState,
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i32,
    pub has_open_renewal: bool,
}

/// One entry in a MoU's version chain, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MouVersion {
    pub version: i32,
    #[serde(flatten)]
    #[ts(flatten)]
    pub mou: Mou,
}

const MOU_COLUMNS: &str = "id, reference_number, title_en, title_ar, dossier_id, counterparty_dossier_id, \
    workflow_state, effective_date, expiry_date, previous_version_id, created_at, updated_at";

impl Mou {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Mou>(&format!("SELECT {MOU_COLUMNS} FROM mous WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_expiring(
        pool: &PgPool,
        days_ahead: i32,
        include_expired: bool,
    ) -> Result<Vec<ExpiringMou>, sqlx::Error> {
        sqlx::query_as::<_, ExpiringMou>(
            r#"SELECT m.id, m.reference_number, m.title_en, m.title_ar, m.workflow_state,
                      m.expiry_date,
                      (m.expiry_date - CURRENT_DATE)::int4 AS days_until_expiry,
                      EXISTS (
                          SELECT 1 FROM mou_renewals r
                          WHERE r.original_mou_id = m.id
                            AND r.renewal_status NOT IN ('completed', 'declined', 'expired')
                      ) AS has_open_renewal
               FROM mous m
               WHERE m.expiry_date IS NOT NULL
                 AND m.expiry_date <= CURRENT_DATE + $1::int4
                 AND (
                     (m.workflow_state = 'active' AND ($2 OR m.expiry_date >= CURRENT_DATE))
                     OR ($2 AND m.workflow_state = 'expired')
                 )
               ORDER BY m.expiry_date ASC"#,
        )
        .bind(days_ahead)
        .bind(include_expired)
        .fetch_all(pool)
        .await
    }

    /// Ancestors via `previous_version_id`, the MoU itself, then its successors.
    pub async fn version_chain(pool: &PgPool, id: Uuid) -> Result<Vec<MouVersion>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Mou>(&format!(
            r#"WITH RECURSIVE back AS (
                   SELECT {MOU_COLUMNS}, 0 AS hop FROM mous WHERE id = $1
                   UNION ALL
                   SELECT p.id, p.reference_number, p.title_en, p.title_ar, p.dossier_id,
                          p.counterparty_dossier_id, p.workflow_state, p.effective_date,
                          p.expiry_date, p.previous_version_id, p.created_at, p.updated_at,
                          b.hop - 1
                   FROM mous p JOIN back b ON p.id = b.previous_version_id
                   WHERE b.hop > -50
               ),
               fwd AS (
                   SELECT {MOU_COLUMNS}, 0 AS hop FROM mous WHERE id = $1
                   UNION ALL
                   SELECT n.id, n.reference_number, n.title_en, n.title_ar, n.dossier_id,
                          n.counterparty_dossier_id, n.workflow_state, n.effective_date,
                          n.expiry_date, n.previous_version_id, n.created_at, n.updated_at,
                          f.hop + 1
                   FROM mous n JOIN fwd f ON n.previous_version_id = f.id
                   WHERE f.hop < 50
               )
               SELECT {MOU_COLUMNS} FROM (
                   SELECT * FROM back
                   UNION
                   SELECT * FROM fwd
               ) chain
               ORDER BY hop ASC"#
        ))
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, mou)| MouVersion {
                version: i as i32 + 1,
                mou,
            })
            .collect())
    }

    pub async fn set_workflow_state<'e, E>(
        executor: E,
        id: Uuid,
        state: MouWorkflowState,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE mous SET workflow_state = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(state)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_previous_version<'e, E>(
        executor: E,
        id: Uuid,
        previous_version_id: Uuid,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE mous SET previous_version_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(previous_version_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Flip every active MoU past its expiry date to `expired`, returning the ids touched.
    pub async fn expire_overdue<'e, E>(executor: E) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"UPDATE mous
               SET workflow_state = 'expired', updated_at = now()
               WHERE workflow_state = 'active'
                 AND expiry_date IS NOT NULL
                 AND expiry_date < CURRENT_DATE
               RETURNING id"#,
        )
        .fetch_all(executor)
        .await
    }

    pub async fn find_titles(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<Vec<(Uuid, String, String)>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, title_en, title_ar FROM mous WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }
}
