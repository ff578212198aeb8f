use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "negotiation_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NegotiationOutcome {
    Positive,
    Negative,
    #[default]
    Pending,
    FollowUpRequired,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MouNegotiation {
    pub id: Uuid,
    pub renewal_id: Uuid,
    pub negotiation_date: DateTime<Utc>,
    pub summary_en: String,
    pub summary_ar: String,
    pub proposed_changes: Value,
    pub outcome: NegotiationOutcome,
    pub next_steps_en: Option<String>,
    pub next_steps_ar: Option<String>,
    pub next_meeting_date: Option<DateTime<Utc>>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateNegotiation {
    pub renewal_id: Option<Uuid>,
    pub summary_en: Option<String>,
    pub summary_ar: Option<String>,
    pub outcome: Option<NegotiationOutcome>,
    pub proposed_changes: Option<Value>,
    pub next_steps_en: Option<String>,
    pub next_steps_ar: Option<String>,
    pub next_meeting_date: Option<DateTime<Utc>>,
    pub negotiation_date: Option<DateTime<Utc>>,
}

const NEGOTIATION_COLUMNS: &str = "id, renewal_id, negotiation_date, summary_en, summary_ar, proposed_changes, \
    outcome, next_steps_en, next_steps_ar, next_meeting_date, recorded_by, created_at";

impl MouNegotiation {
    pub async fn find_by_renewal(pool: &PgPool, renewal_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MouNegotiation>(&format!(
            "SELECT {NEGOTIATION_COLUMNS} FROM mou_renewal_negotiations
             WHERE renewal_id = $1
             ORDER BY negotiation_date DESC"
        ))
        .bind(renewal_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        renewal_id: Uuid,
        summary_en: &str,
        summary_ar: &str,
        data: &CreateNegotiation,
        recorded_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let proposed_changes = data
            .proposed_changes
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        sqlx::query_as::<_, MouNegotiation>(&format!(
            "INSERT INTO mou_renewal_negotiations (id, renewal_id, negotiation_date, summary_en, summary_ar,
                 proposed_changes, outcome, next_steps_en, next_steps_ar, next_meeting_date, recorded_by)
             VALUES ($1, $2, COALESCE($3, now()), $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {NEGOTIATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(renewal_id)
        .bind(data.negotiation_date)
        .bind(summary_en)
        .bind(summary_ar)
        .bind(proposed_changes)
        .bind(data.outcome.unwrap_or_default())
        .bind(&data.next_steps_en)
        .bind(&data.next_steps_ar)
        .bind(data.next_meeting_date)
        .bind(recorded_by)
        .fetch_one(pool)
        .await
    }
}
