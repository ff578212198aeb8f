use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "mou_alert_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertType {
    #[strum(serialize = "expiration_90_days")]
    #[serde(rename = "expiration_90_days")]
    #[sqlx(rename = "expiration_90_days")]
    Expiration90Days,
    #[strum(serialize = "expiration_60_days")]
    #[serde(rename = "expiration_60_days")]
    #[sqlx(rename = "expiration_60_days")]
    Expiration60Days,
    #[strum(serialize = "expiration_30_days")]
    #[serde(rename = "expiration_30_days")]
    #[sqlx(rename = "expiration_30_days")]
    Expiration30Days,
    #[strum(serialize = "expiration_7_days")]
    #[serde(rename = "expiration_7_days")]
    #[sqlx(rename = "expiration_7_days")]
    Expiration7Days,
    Expired,
    RenewalInitiated,
    RenewalApproved,
    RenewalCompleted,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "mou_alert_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Sent,
    Acknowledged,
    Dismissed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MouExpirationAlert {
    pub id: Uuid,
    pub mou_id: Uuid,
    pub renewal_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub alert_status: AlertStatus,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub message_en: String,
    pub message_ar: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub mou_id: Option<Uuid>,
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
}

const ALERT_COLUMNS: &str = "id, mou_id, renewal_id, alert_type, alert_status, scheduled_for, sent_at, \
    acknowledged_by, acknowledged_at, message_en, message_ar, created_at";

impl MouExpirationAlert {
    pub async fn create<'e, E>(
        executor: E,
        mou_id: Uuid,
        renewal_id: Option<Uuid>,
        alert_type: AlertType,
        message_en: &str,
        message_ar: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MouExpirationAlert>(&format!(
            "INSERT INTO mou_expiration_alerts (id, mou_id, renewal_id, alert_type, scheduled_for, message_en, message_ar)
             VALUES ($1, $2, $3, $4, now(), $5, $6)
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(mou_id)
        .bind(renewal_id)
        .bind(alert_type)
        .bind(message_en)
        .bind(message_ar)
        .fetch_one(executor)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &AlertFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ALERT_COLUMNS}, COUNT(*) OVER () AS total_count FROM mou_expiration_alerts WHERE 1 = 1"
        ));
        if let Some(mou_id) = filter.mou_id {
            query.push(" AND mou_id = ").push_bind(mou_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND alert_status = ").push_bind(status);
        }
        if let Some(alert_type) = filter.alert_type {
            query.push(" AND alert_type = ").push_bind(alert_type);
        }
        query
            .push(" ORDER BY scheduled_for ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build_query_as::<CountedAlert>().fetch_all(pool).await?;
        let total = rows.first().map(|r| r.total_count).unwrap_or(0);
        Ok((rows.into_iter().map(|r| r.alert).collect(), total))
    }

    pub async fn acknowledge(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MouExpirationAlert>(&format!(
            "UPDATE mou_expiration_alerts
             SET alert_status = 'acknowledged', acknowledged_by = $2, acknowledged_at = now()
             WHERE id = $1
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn dismiss(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MouExpirationAlert>(&format!(
            "UPDATE mou_expiration_alerts SET alert_status = 'dismissed'
             WHERE id = $1
             RETURNING {ALERT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Record the tightest 90/60/30/7 day threshold each active MoU has crossed,
    /// skipping thresholds that already have an alert.
    pub async fn schedule_expiration_alerts<'e, E>(executor: E) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"INSERT INTO mou_expiration_alerts (id, mou_id, alert_type, scheduled_for, message_en, message_ar)
               SELECT gen_random_uuid(), due.mou_id, due.alert_type, now(),
                      format('MoU %s expires in %s days', due.reference_number, due.days_left),
                      format('تنتهي مذكرة التفاهم %s خلال %s يومًا', due.reference_number, due.days_left)
               FROM (
                   SELECT DISTINCT ON (m.id)
                          m.id AS mou_id, m.reference_number, t.alert_type,
                          (m.expiry_date - CURRENT_DATE) AS days_left
                   FROM mous m
                   CROSS JOIN (VALUES
                       ('expiration_90_days'::mou_alert_type, 90),
                       ('expiration_60_days'::mou_alert_type, 60),
                       ('expiration_30_days'::mou_alert_type, 30),
                       ('expiration_7_days'::mou_alert_type, 7)
                   ) AS t(alert_type, days)
                   WHERE m.workflow_state = 'active'
                     AND m.expiry_date IS NOT NULL
                     AND m.expiry_date >= CURRENT_DATE
                     AND m.expiry_date - CURRENT_DATE <= t.days
                   ORDER BY m.id, t.days ASC
               ) due
               WHERE NOT EXISTS (
                   SELECT 1 FROM mou_expiration_alerts a
                   WHERE a.mou_id = due.mou_id AND a.alert_type = due.alert_type
               )"#,
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark every pending alert whose time has come as sent.
    pub async fn mark_due_sent<'e, E>(executor: E) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"UPDATE mou_expiration_alerts
               SET alert_status = 'sent', sent_at = now()
               WHERE alert_status = 'pending' AND scheduled_for <= now()"#,
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(FromRow)]
struct CountedAlert {
    #[sqlx(flatten)]
    alert: MouExpirationAlert,
    total_count: i64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_alert_type_wire_names() {
        assert_eq!(AlertType::Expiration90Days.to_string(), "expiration_90_days");
        assert_eq!(
            AlertType::from_str("expiration_7_days").unwrap(),
            AlertType::Expiration7Days
        );
        assert_eq!(
            serde_json::to_value(AlertType::RenewalInitiated).unwrap(),
            "renewal_initiated"
        );
        assert_eq!(
            serde_json::to_value(AlertType::Expiration30Days).unwrap(),
            "expiration_30_days"
        );
    }
}
