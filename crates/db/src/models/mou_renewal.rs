use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder, Type};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[sqlx(type_name = "renewal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenewalStatus {
    Pending,
    Initiated,
    Negotiation,
    Approved,
    Signed,
    Completed,
    Declined,
    Expired,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MouRenewal {
    pub id: Uuid,
    pub original_mou_id: Uuid,
    pub renewed_mou_id: Option<Uuid>,
    pub renewal_status: RenewalStatus,
    pub current_expiry_date: Option<NaiveDate>,
    pub proposed_expiry_date: Option<NaiveDate>,
    pub renewal_period_months: Option<i32>,
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
    pub decline_reason_en: Option<String>,
    pub decline_reason_ar: Option<String>,
    pub terms_changed: bool,
    pub terms_change_summary_en: Option<String>,
    pub terms_change_summary_ar: Option<String>,
    pub initiated_by: Option<Uuid>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Renewal row joined with the MoU it renews.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MouRenewalWithMou {
    #[serde(flatten)]
    #[sqlx(flatten)]
    #[ts(flatten)]
    pub renewal: MouRenewal,
    pub original_reference_number: String,
    pub original_title_en: String,
    pub original_title_ar: String,
    pub original_expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewRenewal {
    pub original_mou_id: Uuid,
    pub current_expiry_date: Option<NaiveDate>,
    pub proposed_expiry_date: Option<NaiveDate>,
    pub renewal_period_months: i32,
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
    pub initiated_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct RenewalStatusChange {
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
    pub decline_reason_en: Option<String>,
    pub decline_reason_ar: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RenewalCompletion {
    pub renewed_mou_id: Uuid,
    pub terms_changed: bool,
    pub terms_change_summary_en: Option<String>,
    pub terms_change_summary_ar: Option<String>,
}

const RENEWAL_COLUMNS: &str = "r.id, r.original_mou_id, r.renewed_mou_id, r.renewal_status, \
    r.current_expiry_date, r.proposed_expiry_date, r.renewal_period_months, r.notes_en, r.notes_ar, \
    r.decline_reason_en, r.decline_reason_ar, r.terms_changed, r.terms_change_summary_en, \
    r.terms_change_summary_ar, r.initiated_by, r.initiated_at, r.approved_at, r.signed_at, \
    r.declined_at, r.completed_at, r.created_at, r.updated_at";

impl MouRenewal {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MouRenewal>(&format!(
            "SELECT {RENEWAL_COLUMNS} FROM mou_renewals r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_with_mou(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<MouRenewalWithMou>, sqlx::Error> {
        sqlx::query_as::<_, MouRenewalWithMou>(&format!(
            "SELECT {RENEWAL_COLUMNS},
                    m.reference_number AS original_reference_number,
                    m.title_en AS original_title_en,
                    m.title_ar AS original_title_ar,
                    m.expiry_date AS original_expiry_date
             FROM mou_renewals r
             JOIN mous m ON m.id = r.original_mou_id
             WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Renewal of `mou_id` that has not reached a terminal status yet.
    pub async fn find_open_for_mou<'e, E>(
        executor: E,
        mou_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MouRenewal>(&format!(
            "SELECT {RENEWAL_COLUMNS} FROM mou_renewals r
             WHERE r.original_mou_id = $1
               AND r.renewal_status NOT IN ('completed', 'declined', 'expired')
             LIMIT 1"
        ))
        .bind(mou_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        mou_id: Option<Uuid>,
        status: Option<RenewalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MouRenewalWithMou>, i64), sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RENEWAL_COLUMNS},
                    m.reference_number AS original_reference_number,
                    m.title_en AS original_title_en,
                    m.title_ar AS original_title_ar,
                    m.expiry_date AS original_expiry_date,
                    COUNT(*) OVER () AS total_count
             FROM mou_renewals r
             JOIN mous m ON m.id = r.original_mou_id
             WHERE 1 = 1"
        ));
        if let Some(mou_id) = mou_id {
            query.push(" AND r.original_mou_id = ").push_bind(mou_id);
        }
        if let Some(status) = status {
            query.push(" AND r.renewal_status = ").push_bind(status);
        }
        query
            .push(" ORDER BY r.created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<CountedRenewal>()
            .fetch_all(pool)
            .await?;
        let total = rows.first().map(|r| r.total_count).unwrap_or(0);
        Ok((rows.into_iter().map(|r| r.row).collect(), total))
    }

    pub async fn create<'e, E>(executor: E, data: &NewRenewal) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MouRenewal>(&format!(
            "INSERT INTO mou_renewals AS r (id, original_mou_id, renewal_status, current_expiry_date,
                 proposed_expiry_date, renewal_period_months, notes_en, notes_ar, initiated_by, initiated_at)
             VALUES ($1, $2, 'initiated', $3, $4, $5, $6, $7, $8, now())
             RETURNING {RENEWAL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(data.original_mou_id)
        .bind(data.current_expiry_date)
        .bind(data.proposed_expiry_date)
        .bind(data.renewal_period_months)
        .bind(&data.notes_en)
        .bind(&data.notes_ar)
        .bind(data.initiated_by)
        .fetch_one(executor)
        .await
    }

    /// Persist a status change. The caller is responsible for validating the transition.
    pub async fn update_status<'e, E>(
        executor: E,
        id: Uuid,
        status: RenewalStatus,
        change: &RenewalStatusChange,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MouRenewal>(&format!(
            "UPDATE mou_renewals AS r SET
                renewal_status = $2,
                notes_en = COALESCE($3, r.notes_en),
                notes_ar = COALESCE($4, r.notes_ar),
                decline_reason_en = COALESCE($5, r.decline_reason_en),
                decline_reason_ar = COALESCE($6, r.decline_reason_ar),
                approved_at = CASE WHEN $2 = 'approved'::renewal_status THEN now() ELSE r.approved_at END,
                signed_at = CASE WHEN $2 = 'signed'::renewal_status THEN now() ELSE r.signed_at END,
                declined_at = CASE WHEN $2 = 'declined'::renewal_status THEN now() ELSE r.declined_at END,
                updated_at = now()
             WHERE r.id = $1
             RETURNING {RENEWAL_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(&change.notes_en)
        .bind(&change.notes_ar)
        .bind(&change.decline_reason_en)
        .bind(&change.decline_reason_ar)
        .fetch_one(executor)
        .await
    }

    pub async fn mark_completed<'e, E>(
        executor: E,
        id: Uuid,
        completion: &RenewalCompletion,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MouRenewal>(&format!(
            "UPDATE mou_renewals AS r SET
                renewal_status = 'completed',
                renewed_mou_id = $2,
                terms_changed = $3,
                terms_change_summary_en = $4,
                terms_change_summary_ar = $5,
                completed_at = now(),
                updated_at = now()
             WHERE r.id = $1
             RETURNING {RENEWAL_COLUMNS}"
        ))
        .bind(id)
        .bind(completion.renewed_mou_id)
        .bind(completion.terms_changed)
        .bind(&completion.terms_change_summary_en)
        .bind(&completion.terms_change_summary_ar)
        .fetch_one(executor)
        .await
    }

    /// Expire every open renewal of the given MoUs, returning `(renewal_id, mou_id)` pairs.
    pub async fn expire_open_for_mous<'e, E>(
        executor: E,
        mou_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, Uuid)>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"UPDATE mou_renewals
               SET renewal_status = 'expired', updated_at = now()
               WHERE original_mou_id = ANY($1)
                 AND renewal_status NOT IN ('completed', 'declined', 'expired')
               RETURNING id, original_mou_id"#,
        )
        .bind(mou_ids)
        .fetch_all(executor)
        .await
    }
}

#[derive(FromRow)]
struct CountedRenewal {
    #[sqlx(flatten)]
    row: MouRenewalWithMou,
    total_count: i64,
}
