//! Rows read by the unified timeline, one type per source table.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::mou::MouWorkflowState;

/// Date window and page size applied to every source query.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineWindow {
    /// Exclusive upper bound carried over from the previous page.
    pub before: Option<DateTime<Utc>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CalendarEntryRow {
    pub id: Uuid,
    pub entry_type: String,
    pub title_en: String,
    pub title_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub status: String,
    pub created_by: Option<Uuid>,
}

impl CalendarEntryRow {
    pub async fn find_for_dossier(
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CalendarEntryRow>(
            r#"SELECT * FROM (
                   SELECT id, entry_type, title_en, title_ar, description_en, description_ar,
                          ((event_date + COALESCE(event_time, TIME '00:00')) AT TIME ZONE 'UTC') AS occurred_at,
                          status, created_by
                   FROM calendar_entries
                   WHERE dossier_id = $1
               ) c
               WHERE ($2::timestamptz IS NULL OR c.occurred_at < $2)
                 AND ($3::timestamptz IS NULL OR c.occurred_at >= $3)
                 AND ($4::timestamptz IS NULL OR c.occurred_at <= $4)
               ORDER BY c.occurred_at DESC
               LIMIT $5"#,
        )
        .bind(dossier_id)
        .bind(window.before)
        .bind(window.from)
        .bind(window.to)
        .bind(window.limit)
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InteractionRow {
    pub id: Uuid,
    pub interaction_type: String,
    pub summary_en: String,
    pub summary_ar: String,
    pub details_en: Option<String>,
    pub details_ar: Option<String>,
    pub interaction_date: DateTime<Utc>,
    pub priority: String,
}

impl InteractionRow {
    pub async fn find_for_dossier(
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InteractionRow>(
            r#"SELECT id, interaction_type, summary_en, summary_ar, details_en, details_ar,
                      interaction_date, priority
               FROM interactions
               WHERE dossier_id = $1
                 AND ($2::timestamptz IS NULL OR interaction_date < $2)
                 AND ($3::timestamptz IS NULL OR interaction_date >= $3)
                 AND ($4::timestamptz IS NULL OR interaction_date <= $4)
               ORDER BY interaction_date DESC
               LIMIT $5"#,
        )
        .bind(dossier_id)
        .bind(window.before)
        .bind(window.from)
        .bind(window.to)
        .bind(window.limit)
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IntelligenceReportRow {
    pub id: Uuid,
    pub title_en: String,
    pub title_ar: String,
    pub summary_en: Option<String>,
    pub summary_ar: Option<String>,
    pub confidence_level: String,
    pub priority: String,
    pub status: String,
    pub reported_at: DateTime<Utc>,
}

impl IntelligenceReportRow {
    pub async fn find_for_dossier(
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, IntelligenceReportRow>(
            r#"SELECT id, title_en, title_ar, summary_en, summary_ar, confidence_level,
                      priority, status, reported_at
               FROM intelligence_reports
               WHERE dossier_id = $1
                 AND ($2::timestamptz IS NULL OR reported_at < $2)
                 AND ($3::timestamptz IS NULL OR reported_at >= $3)
                 AND ($4::timestamptz IS NULL OR reported_at <= $4)
               ORDER BY reported_at DESC
               LIMIT $5"#,
        )
        .bind(dossier_id)
        .bind(window.before)
        .bind(window.from)
        .bind(window.to)
        .bind(window.limit)
        .fetch_all(pool)
        .await
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MouTimelineRow {
    pub id: Uuid,
    pub reference_number: String,
    pub title_en: String,
    pub title_ar: String,
    pub workflow_state: MouWorkflowState,
    pub occurred_at: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
}

impl MouTimelineRow {
    /// MoUs where the dossier is either party, dated by their effective date.
    pub async fn find_for_dossier(
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MouTimelineRow>(
            r#"SELECT * FROM (
                   SELECT id, reference_number, title_en, title_ar, workflow_state,
                          COALESCE(effective_date::timestamp AT TIME ZONE 'UTC', created_at) AS occurred_at,
                          expiry_date
                   FROM mous
                   WHERE dossier_id = $1 OR counterparty_dossier_id = $1
               ) m
               WHERE ($2::timestamptz IS NULL OR m.occurred_at < $2)
                 AND ($3::timestamptz IS NULL OR m.occurred_at >= $3)
                 AND ($4::timestamptz IS NULL OR m.occurred_at <= $4)
               ORDER BY m.occurred_at DESC
               LIMIT $5"#,
        )
        .bind(dossier_id)
        .bind(window.before)
        .bind(window.from)
        .bind(window.to)
        .bind(window.limit)
        .fetch_all(pool)
        .await
    }
}
