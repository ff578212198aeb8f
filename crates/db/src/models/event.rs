use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::user::escape_like;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "event_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
    Meeting,
    Conference,
    Workshop,
    Ceremony,
    Visit,
    Other,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Draft,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Event {
    pub id: Uuid,
    pub title_en: String,
    pub title_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub event_type: EventType,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub timezone: String,
    pub location_en: Option<String>,
    pub location_ar: Option<String>,
    pub venue_en: Option<String>,
    pub venue_ar: Option<String>,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub country_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub organizer_id: Uuid,
    pub max_participants: Option<i32>,
    pub registration_required: bool,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const EVENT_COLUMNS: &str = "id, title_en, title_ar, description_en, description_ar, type, \
    start_datetime, end_datetime, timezone, location_en, location_ar, venue_en, venue_ar, is_virtual, \
    virtual_link, country_id, organization_id, organizer_id, max_participants, registration_required, \
    registration_deadline, status, created_by, created_at, updated_at";

/// A fully validated event, ready to be written.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub title_en: String,
    pub title_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub event_type: EventType,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub timezone: String,
    pub location_en: Option<String>,
    pub location_ar: Option<String>,
    pub venue_en: Option<String>,
    pub venue_ar: Option<String>,
    pub is_virtual: bool,
    pub virtual_link: Option<String>,
    pub country_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub organizer_id: Uuid,
    pub max_participants: Option<i32>,
    pub registration_required: bool,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub status: EventStatus,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub country_id: Option<Uuid>,
    pub organizer_id: Option<Uuid>,
    pub search: Option<String>,
}

impl Event {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS}, COUNT(*) OVER () AS total_count FROM events WHERE 1 = 1"
        ));
        if let Some(event_type) = filter.event_type {
            query.push(" AND type = ").push_bind(event_type);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.date_from {
            query.push(" AND start_datetime >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            query.push(" AND start_datetime <= ").push_bind(to);
        }
        if let Some(country_id) = filter.country_id {
            query.push(" AND country_id = ").push_bind(country_id);
        }
        if let Some(organizer_id) = filter.organizer_id {
            query.push(" AND organizer_id = ").push_bind(organizer_id);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(search.trim()));
            query
                .push(" AND (title_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR title_ar ILIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        query
            .push(" ORDER BY start_datetime ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build_query_as::<CountedEvent>().fetch_all(pool).await?;
        let total = rows.first().map(|r| r.total_count).unwrap_or(0);
        Ok((rows.into_iter().map(|r| r.event).collect(), total))
    }

    /// Non-cancelled events starting after now, soonest first.
    pub async fn upcoming(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE start_datetime > now() AND status <> 'cancelled'
             ORDER BY start_datetime ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn create<'e, E>(executor: E, data: &EventRecord, created_by: Uuid) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (id, title_en, title_ar, description_en, description_ar, type,
                 start_datetime, end_datetime, timezone, location_en, location_ar, venue_en, venue_ar,
                 is_virtual, virtual_link, country_id, organization_id, organizer_id, max_participants,
                 registration_required, registration_deadline, status, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                     $18, $19, $20, $21, $22, $23)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(data.event_type)
        .bind(data.start_datetime)
        .bind(data.end_datetime)
        .bind(&data.timezone)
        .bind(&data.location_en)
        .bind(&data.location_ar)
        .bind(&data.venue_en)
        .bind(&data.venue_ar)
        .bind(data.is_virtual)
        .bind(&data.virtual_link)
        .bind(data.country_id)
        .bind(data.organization_id)
        .bind(data.organizer_id)
        .bind(data.max_participants)
        .bind(data.registration_required)
        .bind(data.registration_deadline)
        .bind(data.status)
        .bind(created_by)
        .fetch_one(executor)
        .await
    }

    /// Overwrite every editable column with the merged record.
    pub async fn update(pool: &PgPool, id: Uuid, data: &EventRecord) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET
                title_en = $2, title_ar = $3, description_en = $4, description_ar = $5, type = $6,
                start_datetime = $7, end_datetime = $8, timezone = $9, location_en = $10,
                location_ar = $11, venue_en = $12, venue_ar = $13, is_virtual = $14,
                virtual_link = $15, country_id = $16, organization_id = $17, organizer_id = $18,
                max_participants = $19, registration_required = $20, registration_deadline = $21,
                status = $22, updated_at = now()
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(data.event_type)
        .bind(data.start_datetime)
        .bind(data.end_datetime)
        .bind(&data.timezone)
        .bind(&data.location_en)
        .bind(&data.location_ar)
        .bind(&data.venue_en)
        .bind(&data.venue_ar)
        .bind(data.is_virtual)
        .bind(&data.virtual_link)
        .bind(data.country_id)
        .bind(data.organization_id)
        .bind(data.organizer_id)
        .bind(data.max_participants)
        .bind(data.registration_required)
        .bind(data.registration_deadline)
        .bind(data.status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Other non-cancelled events whose time window overlaps this one and that
    /// share its venue or organizer.
    pub async fn find_overlapping(pool: &PgPool, event: &Event) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE id <> $1
               AND status <> 'cancelled'
               AND start_datetime < $3
               AND end_datetime > $2
               AND ((venue_en IS NOT NULL AND venue_en = $4) OR organizer_id = $5)
             ORDER BY start_datetime ASC"
        ))
        .bind(event.id)
        .bind(event.start_datetime)
        .bind(event.end_datetime)
        .bind(&event.venue_en)
        .bind(event.organizer_id)
        .fetch_all(pool)
        .await
    }
}

#[derive(FromRow)]
struct CountedEvent {
    #[sqlx(flatten)]
    event: Event,
    total_count: i64,
}
