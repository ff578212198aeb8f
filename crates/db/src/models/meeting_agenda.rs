use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::user::escape_like;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "agenda_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgendaStatus {
    #[default]
    Draft,
    Finalized,
    InMeeting,
    Completed,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "agenda_item_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgendaItemType {
    Opening,
    Approval,
    #[default]
    Discussion,
    Presentation,
    Decision,
    ActionReview,
    Break,
    Closing,
    Other,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "agenda_item_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgendaItemStatus {
    #[default]
    Pending,
    InProgress,
    Discussed,
    Deferred,
    Skipped,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "timing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimingStatus {
    #[default]
    NotStarted,
    OnTime,
    RunningOver,
    CompletedEarly,
    CompletedLate,
    Skipped,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "participant_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantType {
    User,
    PersonDossier,
    ExternalContact,
    Organization,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "participant_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantRole {
    Chair,
    CoChair,
    Secretary,
    Presenter,
    #[default]
    Required,
    Optional,
    Observer,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "rsvp_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RsvpStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Tentative,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "agenda_document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgendaDocumentType {
    #[default]
    Attachment,
    Presentation,
    Reference,
    Handout,
    SupportingDocument,
    AgendaPdf,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct MeetingAgenda {
    pub id: Uuid,
    pub dossier_id: Option<Uuid>,
    pub calendar_event_id: Option<Uuid>,
    pub title_en: String,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub meeting_date: DateTime<Utc>,
    pub meeting_end_date: Option<DateTime<Utc>>,
    pub location_en: Option<String>,
    pub location_ar: Option<String>,
    pub is_virtual: bool,
    pub meeting_url: Option<String>,
    pub planned_start_time: Option<DateTime<Utc>>,
    pub planned_end_time: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub timezone: String,
    pub status: AgendaStatus,
    pub is_template: bool,
    pub template_name: Option<String>,
    pub template_description: Option<String>,
    pub is_public: bool,
    pub shared_with_participants: bool,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const AGENDA_COLUMNS: &str = "id, dossier_id, calendar_event_id, title_en, title_ar, description_en, \
    description_ar, meeting_date, meeting_end_date, location_en, location_ar, is_virtual, meeting_url, \
    planned_start_time, planned_end_time, actual_start_time, actual_end_time, timezone, status, \
    is_template, template_name, template_description, is_public, shared_with_participants, created_by, \
    updated_by, created_at, updated_at";

/// Agenda fields accepted by `create` and `update`. `create` requires
/// `title_en` and `meeting_date`; `update` applies whatever is present.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct AgendaFields {
    pub dossier_id: Option<Uuid>,
    pub calendar_event_id: Option<Uuid>,
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub meeting_date: Option<DateTime<Utc>>,
    pub meeting_end_date: Option<DateTime<Utc>>,
    pub location_en: Option<String>,
    pub location_ar: Option<String>,
    pub is_virtual: Option<bool>,
    pub meeting_url: Option<String>,
    pub planned_start_time: Option<DateTime<Utc>>,
    pub planned_end_time: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub status: Option<AgendaStatus>,
    pub is_template: Option<bool>,
    pub template_name: Option<String>,
    pub template_description: Option<String>,
    pub is_public: Option<bool>,
    pub shared_with_participants: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct AgendaFilter {
    pub search: Option<String>,
    pub status: Option<AgendaStatus>,
    pub dossier_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub is_template: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Template listing row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AgendaTemplate {
    pub id: Uuid,
    pub title_en: String,
    pub title_ar: Option<String>,
    pub template_name: Option<String>,
    pub template_description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MeetingAgenda {
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MeetingAgenda>(&format!(
            "SELECT {AGENDA_COLUMNS} FROM meeting_agendas WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn search(
        pool: &PgPool,
        filter: &AgendaFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {AGENDA_COLUMNS} FROM meeting_agendas WHERE deleted_at IS NULL"
        ));
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(search.trim()));
            query
                .push(" AND (title_en ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR title_ar ILIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(dossier_id) = filter.dossier_id {
            query.push(" AND dossier_id = ").push_bind(dossier_id);
        }
        if let Some(from) = filter.from_date {
            query.push(" AND meeting_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to_date {
            query.push(" AND meeting_date <= ").push_bind(to);
        }
        if let Some(is_template) = filter.is_template {
            query.push(" AND is_template = ").push_bind(is_template);
        }
        query
            .push(" ORDER BY meeting_date DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        query.build_query_as::<MeetingAgenda>().fetch_all(pool).await
    }

    pub async fn create<'e, E>(
        executor: E,
        title_en: &str,
        meeting_date: DateTime<Utc>,
        data: &AgendaFields,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MeetingAgenda>(&format!(
            "INSERT INTO meeting_agendas (id, dossier_id, calendar_event_id, title_en, title_ar,
                 description_en, description_ar, meeting_date, meeting_end_date, location_en,
                 location_ar, is_virtual, meeting_url, planned_start_time, planned_end_time, timezone,
                 is_template, template_name, template_description, is_public,
                 shared_with_participants, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                     COALESCE($16, 'Asia/Riyadh'), $17, $18, $19, $20, $21, $22)
             RETURNING {AGENDA_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(data.dossier_id)
        .bind(data.calendar_event_id)
        .bind(title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(meeting_date)
        .bind(data.meeting_end_date)
        .bind(&data.location_en)
        .bind(&data.location_ar)
        .bind(data.is_virtual.unwrap_or(false))
        .bind(&data.meeting_url)
        .bind(data.planned_start_time)
        .bind(data.planned_end_time)
        .bind(&data.timezone)
        .bind(data.is_template.unwrap_or(false))
        .bind(&data.template_name)
        .bind(&data.template_description)
        .bind(data.is_public.unwrap_or(false))
        .bind(data.shared_with_participants.unwrap_or(true))
        .bind(created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &AgendaFields,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MeetingAgenda>(&format!(
            "UPDATE meeting_agendas AS a SET
                dossier_id = COALESCE($3, a.dossier_id),
                calendar_event_id = COALESCE($4, a.calendar_event_id),
                title_en = COALESCE($5, a.title_en),
                title_ar = COALESCE($6, a.title_ar),
                description_en = COALESCE($7, a.description_en),
                description_ar = COALESCE($8, a.description_ar),
                meeting_date = COALESCE($9, a.meeting_date),
                meeting_end_date = COALESCE($10, a.meeting_end_date),
                location_en = COALESCE($11, a.location_en),
                location_ar = COALESCE($12, a.location_ar),
                is_virtual = COALESCE($13, a.is_virtual),
                meeting_url = COALESCE($14, a.meeting_url),
                planned_start_time = COALESCE($15, a.planned_start_time),
                planned_end_time = COALESCE($16, a.planned_end_time),
                timezone = COALESCE($17, a.timezone),
                status = COALESCE($18, a.status),
                is_public = COALESCE($19, a.is_public),
                shared_with_participants = COALESCE($20, a.shared_with_participants),
                updated_by = $2,
                updated_at = now()
             WHERE a.id = $1 AND a.deleted_at IS NULL
             RETURNING {AGENDA_COLUMNS}"
        ))
        .bind(id)
        .bind(updated_by)
        .bind(data.dossier_id)
        .bind(data.calendar_event_id)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(data.meeting_date)
        .bind(data.meeting_end_date)
        .bind(&data.location_en)
        .bind(&data.location_ar)
        .bind(data.is_virtual)
        .bind(&data.meeting_url)
        .bind(data.planned_start_time)
        .bind(data.planned_end_time)
        .bind(&data.timezone)
        .bind(data.status)
        .bind(data.is_public)
        .bind(data.shared_with_participants)
        .fetch_optional(pool)
        .await
    }

    pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE meeting_agendas SET deleted_at = now(), updated_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn start_meeting(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MeetingAgenda>(&format!(
            "UPDATE meeting_agendas SET status = 'in_meeting',
                 actual_start_time = COALESCE(actual_start_time, now()), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {AGENDA_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn end_meeting(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MeetingAgenda>(&format!(
            "UPDATE meeting_agendas SET status = 'completed', actual_end_time = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {AGENDA_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_templates(pool: &PgPool) -> Result<Vec<AgendaTemplate>, sqlx::Error> {
        sqlx::query_as::<_, AgendaTemplate>(
            r#"SELECT id, title_en, title_ar, template_name, template_description, created_at
               FROM meeting_agendas
               WHERE is_template AND deleted_at IS NULL
               ORDER BY title_en"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn save_as_template(
        pool: &PgPool,
        id: Uuid,
        template_name: &str,
        template_description: Option<&str>,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MeetingAgenda>(&format!(
            "UPDATE meeting_agendas SET is_template = true, template_name = $2,
                 template_description = $3, updated_by = $4, updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {AGENDA_COLUMNS}"
        ))
        .bind(id)
        .bind(template_name)
        .bind(template_description)
        .bind(updated_by)
        .fetch_optional(pool)
        .await
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AgendaItem {
    pub id: Uuid,
    pub agenda_id: Uuid,
    pub title_en: String,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
    pub sort_order: i32,
    pub parent_item_id: Option<Uuid>,
    pub indent_level: i32,
    pub planned_duration_minutes: i32,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub actual_duration_minutes: Option<i32>,
    pub timing_status: TimingStatus,
    pub item_type: AgendaItemType,
    pub presenter_user_id: Option<Uuid>,
    pub presenter_name_en: Option<String>,
    pub presenter_name_ar: Option<String>,
    pub linked_entity_type: Option<String>,
    pub linked_entity_id: Option<Uuid>,
    pub status: AgendaItemStatus,
    pub outcome_en: Option<String>,
    pub outcome_ar: Option<String>,
    pub decision_made: bool,
    pub skip_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ITEM_COLUMNS: &str = "id, agenda_id, title_en, title_ar, description_en, description_ar, notes_en, \
    notes_ar, sort_order, parent_item_id, indent_level, planned_duration_minutes, actual_start_time, \
    actual_end_time, actual_duration_minutes, timing_status, item_type, presenter_user_id, \
    presenter_name_en, presenter_name_ar, linked_entity_type, linked_entity_id, status, outcome_en, \
    outcome_ar, decision_made, skip_reason, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct AgendaItemFields {
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub notes_en: Option<String>,
    pub notes_ar: Option<String>,
    pub sort_order: Option<i32>,
    pub parent_item_id: Option<Uuid>,
    pub indent_level: Option<i32>,
    pub planned_duration_minutes: Option<i32>,
    pub item_type: Option<AgendaItemType>,
    pub presenter_user_id: Option<Uuid>,
    pub presenter_name_en: Option<String>,
    pub presenter_name_ar: Option<String>,
    pub linked_entity_type: Option<String>,
    pub linked_entity_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ItemCompletion {
    pub ended_at: DateTime<Utc>,
    pub actual_duration_minutes: Option<i32>,
    pub timing_status: TimingStatus,
    pub outcome_en: Option<String>,
    pub outcome_ar: Option<String>,
    pub decision_made: bool,
}

impl AgendaItem {
    pub async fn find_by_agenda<'e, E>(executor: E, agenda_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, AgendaItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM agenda_items WHERE agenda_id = $1 ORDER BY sort_order ASC"
        ))
        .bind(agenda_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaItem>(&format!("SELECT {ITEM_COLUMNS} FROM agenda_items WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn next_sort_order<'e, E>(executor: E, agenda_id: Uuid) -> Result<i32, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM agenda_items WHERE agenda_id = $1",
        )
        .bind(agenda_id)
        .fetch_one(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        agenda_id: Uuid,
        title_en: &str,
        planned_duration_minutes: i32,
        sort_order: i32,
        data: &AgendaItemFields,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, AgendaItem>(&format!(
            "INSERT INTO agenda_items (id, agenda_id, title_en, title_ar, description_en, description_ar,
                 notes_en, notes_ar, sort_order, parent_item_id, indent_level, planned_duration_minutes,
                 item_type, presenter_user_id, presenter_name_en, presenter_name_ar,
                 linked_entity_type, linked_entity_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(agenda_id)
        .bind(title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(&data.notes_en)
        .bind(&data.notes_ar)
        .bind(sort_order)
        .bind(data.parent_item_id)
        .bind(data.indent_level.unwrap_or(0))
        .bind(planned_duration_minutes)
        .bind(data.item_type.unwrap_or_default())
        .bind(data.presenter_user_id)
        .bind(&data.presenter_name_en)
        .bind(&data.presenter_name_ar)
        .bind(&data.linked_entity_type)
        .bind(data.linked_entity_id)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &AgendaItemFields,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaItem>(&format!(
            "UPDATE agenda_items AS i SET
                title_en = COALESCE($2, i.title_en),
                title_ar = COALESCE($3, i.title_ar),
                description_en = COALESCE($4, i.description_en),
                description_ar = COALESCE($5, i.description_ar),
                notes_en = COALESCE($6, i.notes_en),
                notes_ar = COALESCE($7, i.notes_ar),
                sort_order = COALESCE($8, i.sort_order),
                parent_item_id = COALESCE($9, i.parent_item_id),
                indent_level = COALESCE($10, i.indent_level),
                planned_duration_minutes = COALESCE($11, i.planned_duration_minutes),
                item_type = COALESCE($12, i.item_type),
                presenter_user_id = COALESCE($13, i.presenter_user_id),
                presenter_name_en = COALESCE($14, i.presenter_name_en),
                presenter_name_ar = COALESCE($15, i.presenter_name_ar),
                linked_entity_type = COALESCE($16, i.linked_entity_type),
                linked_entity_id = COALESCE($17, i.linked_entity_id),
                updated_at = now()
             WHERE i.id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(&data.notes_en)
        .bind(&data.notes_ar)
        .bind(data.sort_order)
        .bind(data.parent_item_id)
        .bind(data.indent_level)
        .bind(data.planned_duration_minutes)
        .bind(data.item_type)
        .bind(data.presenter_user_id)
        .bind(&data.presenter_name_en)
        .bind(&data.presenter_name_ar)
        .bind(&data.linked_entity_type)
        .bind(data.linked_entity_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agenda_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_sort_order<'e, E>(
        executor: E,
        agenda_id: Uuid,
        id: Uuid,
        sort_order: i32,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE agenda_items SET sort_order = $3, updated_at = now() WHERE id = $2 AND agenda_id = $1",
        )
        .bind(agenda_id)
        .bind(id)
        .bind(sort_order)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn start(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaItem>(&format!(
            "UPDATE agenda_items SET status = 'in_progress', timing_status = 'on_time',
                 actual_start_time = now(), updated_at = now()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        completion: &ItemCompletion,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaItem>(&format!(
            "UPDATE agenda_items SET status = 'discussed', actual_end_time = $2,
                 actual_duration_minutes = $3, timing_status = $4, outcome_en = $5, outcome_ar = $6,
                 decision_made = $7, updated_at = now()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .bind(completion.ended_at)
        .bind(completion.actual_duration_minutes)
        .bind(completion.timing_status)
        .bind(&completion.outcome_en)
        .bind(&completion.outcome_ar)
        .bind(completion.decision_made)
        .fetch_optional(pool)
        .await
    }

    pub async fn skip(pool: &PgPool, id: Uuid, reason: Option<&str>) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaItem>(&format!(
            "UPDATE agenda_items SET status = 'skipped', timing_status = 'skipped', skip_reason = $2,
                 updated_at = now()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .bind(reason)
        .fetch_optional(pool)
        .await
    }

    /// Copy every item of `template_id` onto `agenda_id`, resetting progress.
    pub async fn copy_from<'e, E>(executor: E, template_id: Uuid, agenda_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"INSERT INTO agenda_items (id, agenda_id, title_en, title_ar, description_en, description_ar,
                   sort_order, indent_level, planned_duration_minutes, item_type, presenter_name_en,
                   presenter_name_ar, linked_entity_type, linked_entity_id)
               SELECT gen_random_uuid(), $2, title_en, title_ar, description_en, description_ar,
                      sort_order, indent_level, planned_duration_minutes, item_type, presenter_name_en,
                      presenter_name_ar, linked_entity_type, linked_entity_id
               FROM agenda_items WHERE agenda_id = $1
               ORDER BY sort_order"#,
        )
        .bind(template_id)
        .bind(agenda_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AgendaParticipant {
    pub id: Uuid,
    pub agenda_id: Uuid,
    pub participant_type: ParticipantType,
    pub user_id: Option<Uuid>,
    pub person_dossier_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub email: Option<String>,
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub role: ParticipantRole,
    pub rsvp_status: RsvpStatus,
    pub rsvp_at: Option<DateTime<Utc>>,
    pub rsvp_notes: Option<String>,
    pub notify_on_changes: bool,
    pub notify_before_meeting: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PARTICIPANT_COLUMNS: &str = "id, agenda_id, participant_type, user_id, person_dossier_id, \
    organization_id, name_en, name_ar, email, title_en, title_ar, role, rsvp_status, rsvp_at, \
    rsvp_notes, notify_on_changes, notify_before_meeting, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ParticipantFields {
    pub participant_type: Option<ParticipantType>,
    pub user_id: Option<Uuid>,
    pub person_dossier_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub email: Option<String>,
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub role: Option<ParticipantRole>,
    pub notify_on_changes: Option<bool>,
    pub notify_before_meeting: Option<bool>,
}

impl AgendaParticipant {
    pub async fn find_by_agenda(pool: &PgPool, agenda_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaParticipant>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM agenda_participants WHERE agenda_id = $1 ORDER BY created_at"
        ))
        .bind(agenda_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        agenda_id: Uuid,
        participant_type: ParticipantType,
        data: &ParticipantFields,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AgendaParticipant>(&format!(
            "INSERT INTO agenda_participants (id, agenda_id, participant_type, user_id, person_dossier_id,
                 organization_id, name_en, name_ar, email, title_en, title_ar, role,
                 notify_on_changes, notify_before_meeting)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(agenda_id)
        .bind(participant_type)
        .bind(data.user_id)
        .bind(data.person_dossier_id)
        .bind(data.organization_id)
        .bind(&data.name_en)
        .bind(&data.name_ar)
        .bind(&data.email)
        .bind(&data.title_en)
        .bind(&data.title_ar)
        .bind(data.role.unwrap_or_default())
        .bind(data.notify_on_changes.unwrap_or(true))
        .bind(data.notify_before_meeting.unwrap_or(true))
        .fetch_one(pool)
        .await
    }

    pub async fn update_rsvp(
        pool: &PgPool,
        id: Uuid,
        rsvp_status: RsvpStatus,
        rsvp_notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaParticipant>(&format!(
            "UPDATE agenda_participants SET rsvp_status = $2, rsvp_notes = $3, rsvp_at = now(),
                 updated_at = now()
             WHERE id = $1
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(id)
        .bind(rsvp_status)
        .bind(rsvp_notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agenda_participants WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AgendaDocument {
    pub id: Uuid,
    pub agenda_id: Uuid,
    pub agenda_item_id: Option<Uuid>,
    pub title_en: String,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub storage_path: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub document_type: AgendaDocumentType,
    pub is_public: bool,
    pub shared_before_meeting: bool,
    pub version: i32,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DOCUMENT_COLUMNS: &str = "id, agenda_id, agenda_item_id, title_en, title_ar, description_en, \
    description_ar, storage_path, file_name, file_type, file_size_bytes, mime_type, document_type, \
    is_public, shared_before_meeting, version, uploaded_by, created_at, updated_at";

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct DocumentFields {
    pub agenda_item_id: Option<Uuid>,
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub storage_path: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub document_type: Option<AgendaDocumentType>,
    pub is_public: Option<bool>,
    pub shared_before_meeting: Option<bool>,
}

/// Required document columns, checked before insert.
#[derive(Debug, Clone)]
pub struct DocumentFile<'a> {
    pub title_en: &'a str,
    pub storage_path: &'a str,
    pub file_name: &'a str,
    pub file_type: &'a str,
}

impl AgendaDocument {
    pub async fn find_by_agenda(pool: &PgPool, agenda_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgendaDocument>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM agenda_documents WHERE agenda_id = $1 ORDER BY created_at"
        ))
        .bind(agenda_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        agenda_id: Uuid,
        file: &DocumentFile<'_>,
        data: &DocumentFields,
        uploaded_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AgendaDocument>(&format!(
            "INSERT INTO agenda_documents (id, agenda_id, agenda_item_id, title_en, title_ar,
                 description_en, description_ar, storage_path, file_name, file_type, file_size_bytes,
                 mime_type, document_type, is_public, shared_before_meeting, uploaded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(agenda_id)
        .bind(data.agenda_item_id)
        .bind(file.title_en)
        .bind(&data.title_ar)
        .bind(&data.description_en)
        .bind(&data.description_ar)
        .bind(file.storage_path)
        .bind(file.file_name)
        .bind(file.file_type)
        .bind(data.file_size_bytes)
        .bind(&data.mime_type)
        .bind(data.document_type.unwrap_or_default())
        .bind(data.is_public.unwrap_or(false))
        .bind(data.shared_before_meeting.unwrap_or(true))
        .bind(uploaded_by)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agenda_documents WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
