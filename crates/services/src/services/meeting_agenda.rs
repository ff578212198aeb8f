//! Meeting agendas behind a single action-dispatched endpoint: agenda CRUD,
//! items with live timing, participants, documents and templates.

use chrono::{DateTime, Utc};
use db::models::meeting_agenda::{
    AgendaDocument, AgendaFields, AgendaFilter, AgendaItem, AgendaItemFields, AgendaItemStatus,
    AgendaParticipant, AgendaStatus, DocumentFields, DocumentFile, ItemCompletion, MeetingAgenda,
    ParticipantFields, RsvpStatus, TimingStatus,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use sqlx::PgPool;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, required, required_text};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum AgendaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AgendaAction {
    List,
    Get,
    Create,
    Update,
    Delete,
    CreateFromTemplate,
    StartMeeting,
    EndMeeting,
    GetTiming,
    AddItem,
    UpdateItem,
    DeleteItem,
    ReorderItems,
    StartItem,
    CompleteItem,
    SkipItem,
    AddParticipant,
    UpdateRsvp,
    RemoveParticipant,
    AddDocument,
    RemoveDocument,
    ListTemplates,
    SaveAsTemplate,
}

/// Body of `POST /meeting-agendas`.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct AgendaRequest {
    pub action: Option<String>,
    #[ts(type = "unknown")]
    pub data: Option<Value>,
    pub id: Option<Uuid>,
    pub agenda_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub filters: Option<AgendaFilter>,
}

impl AgendaRequest {
    pub fn parsed_action(&self) -> Result<AgendaAction, AgendaError> {
        let raw = required_text(self.action.as_deref(), "action")?;
        raw.parse().map_err(|_| AgendaError::UnknownAction(raw))
    }

    /// `data` decoded into the shape the action expects; absent data is the default.
    fn data<T: DeserializeOwned + Default>(&self) -> Result<T, ValidationError> {
        match &self.data {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ValidationError::new("data", format!("Invalid data: {e}"), "بيانات غير صالحة")
            }),
        }
    }

    fn agenda_id(&self) -> Result<Uuid, ValidationError> {
        required(self.agenda_id.or(self.id), "agenda_id")
    }

    fn item_id(&self) -> Result<Uuid, ValidationError> {
        required(self.item_id, "item_id")
    }
}

/// Action outcome; `created` maps to 201 at the HTTP layer.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub created: bool,
    pub body: Value,
}

impl ActionResult {
    fn ok(body: impl Serialize) -> Result<Self, AgendaError> {
        Ok(Self { created: false, body: serde_json::to_value(body)? })
    }

    fn created(body: impl Serialize) -> Result<Self, AgendaError> {
        Ok(Self { created: true, body: serde_json::to_value(body)? })
    }

    fn success() -> Result<Self, AgendaError> {
        Ok(Self { created: false, body: json!({ "success": true }) })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FromTemplate {
    template_id: Option<Uuid>,
    meeting_date: Option<DateTime<Utc>>,
    title_en: Option<String>,
    title_ar: Option<String>,
    dossier_id: Option<Uuid>,
    calendar_event_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemOrder {
    id: Uuid,
    sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ReorderItems {
    item_orders: Option<Vec<ItemOrder>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CompleteItem {
    outcome_en: Option<String>,
    outcome_ar: Option<String>,
    decision_made: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SkipItem {
    reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RsvpUpdate {
    participant_id: Option<Uuid>,
    rsvp_status: Option<RsvpStatus>,
    rsvp_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChildRef {
    participant_id: Option<Uuid>,
    document_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SaveTemplate {
    template_name: Option<String>,
    template_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AgendaStats {
    pub total_items: usize,
    pub completed_items: usize,
    pub skipped_items: usize,
    pub total_planned_minutes: i64,
    pub total_actual_minutes: i64,
    pub participant_count: usize,
    pub accepted_count: usize,
    pub document_count: usize,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct FullAgenda {
    pub agenda: MeetingAgenda,
    pub items: Vec<AgendaItem>,
    pub participants: Vec<AgendaParticipant>,
    pub documents: Vec<AgendaDocument>,
    pub stats: AgendaStats,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AgendaListing {
    pub items: Vec<MeetingAgenda>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct ItemTiming {
    pub item_id: Uuid,
    pub title_en: String,
    pub status: AgendaItemStatus,
    pub planned_minutes: i32,
    pub actual_minutes: Option<i32>,
    pub variance_minutes: Option<i32>,
    pub timing_status: TimingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct AgendaTiming {
    pub agenda_id: Uuid,
    pub status: AgendaStatus,
    pub total_planned_minutes: i64,
    pub total_actual_minutes: i64,
    pub variance_minutes: i64,
    pub variance_percentage: Option<f64>,
    pub items: Vec<ItemTiming>,
}

/// Whole minutes between two instants, rounded to nearest.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let seconds = (end - start).num_seconds().max(0);
    ((seconds + 30) / 60) as i32
}

/// Allowed drift before an item counts as early or late: 10% of the plan, at least a minute.
fn tolerance(planned: i32) -> i32 {
    (planned / 10).max(1)
}

/// Timing status of a finished item.
pub fn completed_timing(planned: i32, actual: i32) -> TimingStatus {
    let diff = actual - planned;
    if diff.abs() <= tolerance(planned) {
        TimingStatus::OnTime
    } else if diff < 0 {
        TimingStatus::CompletedEarly
    } else {
        TimingStatus::CompletedLate
    }
}

/// Timing status of an item still under discussion.
pub fn running_timing(planned: i32, elapsed: i32) -> TimingStatus {
    if elapsed > planned + tolerance(planned) {
        TimingStatus::RunningOver
    } else {
        TimingStatus::OnTime
    }
}

pub fn compute_timing(agenda: &MeetingAgenda, items: &[AgendaItem], now: DateTime<Utc>) -> AgendaTiming {
    let timings: Vec<ItemTiming> = items
        .iter()
        .map(|item| {
            let planned = item.planned_duration_minutes;
            let (actual, timing_status) = match item.status {
                AgendaItemStatus::InProgress => {
                    let elapsed = item.actual_start_time.map(|s| elapsed_minutes(s, now));
                    (elapsed, elapsed.map_or(TimingStatus::OnTime, |e| running_timing(planned, e)))
                }
                AgendaItemStatus::Discussed => {
                    let actual = item.actual_duration_minutes.or_else(|| {
                        item.actual_start_time
                            .zip(item.actual_end_time)
                            .map(|(s, e)| elapsed_minutes(s, e))
                    });
                    (actual, actual.map_or(item.timing_status, |a| completed_timing(planned, a)))
                }
                AgendaItemStatus::Skipped => (None, TimingStatus::Skipped),
                _ => (None, item.timing_status),
            };
            ItemTiming {
                item_id: item.id,
                title_en: item.title_en.clone(),
                status: item.status,
                planned_minutes: planned,
                actual_minutes: actual,
                variance_minutes: actual.map(|a| a - planned),
                timing_status,
            }
        })
        .collect();

    let total_planned_minutes: i64 = timings
        .iter()
        .filter(|t| t.status != AgendaItemStatus::Skipped)
        .map(|t| i64::from(t.planned_minutes))
        .sum();
    let total_actual_minutes: i64 = timings.iter().filter_map(|t| t.actual_minutes).map(i64::from).sum();
    let variance_minutes = total_actual_minutes - total_planned_minutes;
    let variance_percentage = (total_planned_minutes > 0).then(|| {
        let pct = variance_minutes as f64 / total_planned_minutes as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    });

    AgendaTiming {
        agenda_id: agenda.id,
        status: agenda.status,
        total_planned_minutes,
        total_actual_minutes,
        variance_minutes,
        variance_percentage,
        items: timings,
    }
}

pub fn agenda_stats(
    items: &[AgendaItem],
    participants: &[AgendaParticipant],
    documents: &[AgendaDocument],
) -> AgendaStats {
    let count = |status| items.iter().filter(|i| i.status == status).count();
    AgendaStats {
        total_items: items.len(),
        completed_items: count(AgendaItemStatus::Discussed),
        skipped_items: count(AgendaItemStatus::Skipped),
        total_planned_minutes: items.iter().map(|i| i64::from(i.planned_duration_minutes)).sum(),
        total_actual_minutes: items
            .iter()
            .filter_map(|i| i.actual_duration_minutes)
            .map(i64::from)
            .sum(),
        participant_count: participants.len(),
        accepted_count: participants
            .iter()
            .filter(|p| p.rsvp_status == RsvpStatus::Accepted)
            .count(),
        document_count: documents.len(),
    }
}

fn positive_duration(minutes: Option<i32>) -> Result<Option<i32>, ValidationError> {
    match minutes {
        Some(m) if m <= 0 => Err(ValidationError::new(
            "planned_duration_minutes",
            "planned_duration_minutes must be greater than 0",
            "يجب أن تكون المدة المخططة أكبر من صفر",
        )),
        other => Ok(other),
    }
}

#[derive(Clone)]
pub struct MeetingAgendaService {
    pool: PgPool,
}

impl MeetingAgendaService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn execute(&self, request: &AgendaRequest, user_id: Uuid) -> Result<ActionResult, AgendaError> {
        let action = request.parsed_action()?;
        match action {
            AgendaAction::List => ActionResult::ok(self.list(request.filters.clone().unwrap_or_default()).await?),
            AgendaAction::Get => ActionResult::ok(self.full(request.agenda_id()?).await?),
            AgendaAction::Create => ActionResult::created(self.create(request.data()?, user_id).await?),
            AgendaAction::Update => {
                let id = request.agenda_id()?;
                let fields: AgendaFields = request.data()?;
                MeetingAgenda::update(&self.pool, id, &fields, user_id)
                    .await?
                    .ok_or(AgendaError::NotFound("agenda"))
                    .and_then(ActionResult::ok)
            }
            AgendaAction::Delete => {
                if MeetingAgenda::soft_delete(&self.pool, request.agenda_id()?).await? == 0 {
                    return Err(AgendaError::NotFound("agenda"));
                }
                ActionResult::success()
            }
            AgendaAction::CreateFromTemplate => {
                ActionResult::created(self.create_from_template(request.data()?, user_id).await?)
            }
            AgendaAction::StartMeeting => MeetingAgenda::start_meeting(&self.pool, request.agenda_id()?)
                .await?
                .ok_or(AgendaError::NotFound("agenda"))
                .and_then(ActionResult::ok),
            AgendaAction::EndMeeting => MeetingAgenda::end_meeting(&self.pool, request.agenda_id()?)
                .await?
                .ok_or(AgendaError::NotFound("agenda"))
                .and_then(ActionResult::ok),
            AgendaAction::GetTiming => ActionResult::ok(self.timing(request.agenda_id()?).await?),
            AgendaAction::AddItem => {
                ActionResult::created(self.add_item(request.agenda_id()?, request.data()?).await?)
            }
            AgendaAction::UpdateItem => {
                let fields: AgendaItemFields = request.data()?;
                positive_duration(fields.planned_duration_minutes)?;
                AgendaItem::update(&self.pool, request.item_id()?, &fields)
                    .await?
                    .ok_or(AgendaError::NotFound("agenda item"))
                    .and_then(ActionResult::ok)
            }
            AgendaAction::DeleteItem => {
                if AgendaItem::delete(&self.pool, request.item_id()?).await? == 0 {
                    return Err(AgendaError::NotFound("agenda item"));
                }
                ActionResult::success()
            }
            AgendaAction::ReorderItems => {
                self.reorder_items(request.agenda_id()?, request.data()?).await?;
                ActionResult::success()
            }
            AgendaAction::StartItem => AgendaItem::start(&self.pool, request.item_id()?)
                .await?
                .ok_or(AgendaError::NotFound("agenda item"))
                .and_then(ActionResult::ok),
            AgendaAction::CompleteItem => {
                ActionResult::ok(self.complete_item(request.item_id()?, request.data()?).await?)
            }
            AgendaAction::SkipItem => {
                let data: SkipItem = request.data()?;
                AgendaItem::skip(&self.pool, request.item_id()?, data.reason.as_deref())
                    .await?
                    .ok_or(AgendaError::NotFound("agenda item"))
                    .and_then(ActionResult::ok)
            }
            AgendaAction::AddParticipant => {
                let fields: ParticipantFields = request.data()?;
                let kind = required(fields.participant_type, "participant_type")?;
                let participant =
                    AgendaParticipant::create(&self.pool, request.agenda_id()?, kind, &fields).await?;
                ActionResult::created(participant)
            }
            AgendaAction::UpdateRsvp => {
                let data: RsvpUpdate = request.data()?;
                let participant_id = required(data.participant_id.or(request.id), "participant_id")?;
                let status = required(data.rsvp_status, "rsvp_status")?;
                AgendaParticipant::update_rsvp(&self.pool, participant_id, status, data.rsvp_notes.as_deref())
                    .await?
                    .ok_or(AgendaError::NotFound("participant"))
                    .and_then(ActionResult::ok)
            }
            AgendaAction::RemoveParticipant => {
                let data: ChildRef = request.data()?;
                let participant_id = required(data.participant_id.or(request.id), "participant_id")?;
                if AgendaParticipant::delete(&self.pool, participant_id).await? == 0 {
                    return Err(AgendaError::NotFound("participant"));
                }
                ActionResult::success()
            }
            AgendaAction::AddDocument => {
                let fields: DocumentFields = request.data()?;
                let title_en = required_text(fields.title_en.as_deref(), "title_en")?;
                let storage_path = required_text(fields.storage_path.as_deref(), "storage_path")?;
                let file_name = required_text(fields.file_name.as_deref(), "file_name")?;
                let file_type = required_text(fields.file_type.as_deref(), "file_type")?;
                let file = DocumentFile {
                    title_en: &title_en,
                    storage_path: &storage_path,
                    file_name: &file_name,
                    file_type: &file_type,
                };
                let document =
                    AgendaDocument::create(&self.pool, request.agenda_id()?, &file, &fields, user_id).await?;
                ActionResult::created(document)
            }
            AgendaAction::RemoveDocument => {
                let data: ChildRef = request.data()?;
                let document_id = required(data.document_id.or(request.id), "document_id")?;
                if AgendaDocument::delete(&self.pool, document_id).await? == 0 {
                    return Err(AgendaError::NotFound("document"));
                }
                ActionResult::success()
            }
            AgendaAction::ListTemplates => {
                ActionResult::ok(json!({ "templates": MeetingAgenda::list_templates(&self.pool).await? }))
            }
            AgendaAction::SaveAsTemplate => {
                let data: SaveTemplate = request.data()?;
                let name = required_text(data.template_name.as_deref(), "template_name")?;
                MeetingAgenda::save_as_template(
                    &self.pool,
                    request.agenda_id()?,
                    &name,
                    data.template_description.as_deref(),
                    user_id,
                )
                .await?
                .ok_or(AgendaError::NotFound("agenda"))
                .and_then(ActionResult::ok)
            }
        }
    }

    pub async fn list(&self, filters: AgendaFilter) -> Result<AgendaListing, AgendaError> {
        let limit = filters.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = filters.offset.unwrap_or(0).max(0);
        let items = MeetingAgenda::search(&self.pool, &filters, limit, offset).await?;
        let has_more = items.len() as i64 >= limit;
        Ok(AgendaListing { items, has_more })
    }

    pub async fn full(&self, id: Uuid) -> Result<FullAgenda, AgendaError> {
        let agenda = MeetingAgenda::find_by_id(&self.pool, id)
            .await?
            .ok_or(AgendaError::NotFound("agenda"))?;
        let (items, participants, documents) = futures::try_join!(
            AgendaItem::find_by_agenda(&self.pool, id),
            AgendaParticipant::find_by_agenda(&self.pool, id),
            AgendaDocument::find_by_agenda(&self.pool, id),
        )?;
        let stats = agenda_stats(&items, &participants, &documents);
        Ok(FullAgenda { agenda, items, participants, documents, stats })
    }

    pub async fn create(&self, fields: AgendaFields, user_id: Uuid) -> Result<MeetingAgenda, AgendaError> {
        let title_en = required_text(fields.title_en.as_deref(), "title_en")?;
        let meeting_date = required(fields.meeting_date, "meeting_date")?;
        let agenda = MeetingAgenda::create(&self.pool, &title_en, meeting_date, &fields, user_id).await?;
        info!(agenda_id = %agenda.id, "created meeting agenda");
        Ok(agenda)
    }

    async fn create_from_template(&self, data: FromTemplate, user_id: Uuid) -> Result<FullAgenda, AgendaError> {
        let template_id = required(data.template_id, "template_id")?;
        let meeting_date = required(data.meeting_date, "meeting_date")?;
        let title_en = required_text(data.title_en.as_deref(), "title_en")?;

        let template = MeetingAgenda::find_by_id(&self.pool, template_id)
            .await?
            .filter(|a| a.is_template)
            .ok_or(AgendaError::NotFound("template"))?;

        let fields = AgendaFields {
            dossier_id: data.dossier_id,
            calendar_event_id: data.calendar_event_id,
            title_ar: data.title_ar,
            description_en: template.description_en,
            description_ar: template.description_ar,
            location_en: template.location_en,
            location_ar: template.location_ar,
            is_virtual: Some(template.is_virtual),
            meeting_url: template.meeting_url,
            timezone: Some(template.timezone),
            ..Default::default()
        };

        let mut tx = self.pool.begin().await?;
        let agenda = MeetingAgenda::create(&mut *tx, &title_en, meeting_date, &fields, user_id).await?;
        let copied = AgendaItem::copy_from(&mut *tx, template_id, agenda.id).await?;
        tx.commit().await?;

        info!(agenda_id = %agenda.id, %template_id, copied, "created agenda from template");
        self.full(agenda.id).await
    }

    async fn timing(&self, id: Uuid) -> Result<AgendaTiming, AgendaError> {
        let agenda = MeetingAgenda::find_by_id(&self.pool, id)
            .await?
            .ok_or(AgendaError::NotFound("agenda"))?;
        let items = AgendaItem::find_by_agenda(&self.pool, id).await?;
        Ok(compute_timing(&agenda, &items, Utc::now()))
    }

    async fn add_item(&self, agenda_id: Uuid, fields: AgendaItemFields) -> Result<AgendaItem, AgendaError> {
        let title_en = required_text(fields.title_en.as_deref(), "title_en")?;
        let planned = required(positive_duration(fields.planned_duration_minutes)?, "planned_duration_minutes")?;

        let mut tx = self.pool.begin().await?;
        if MeetingAgenda::find_by_id(&mut *tx, agenda_id).await?.is_none() {
            return Err(AgendaError::NotFound("agenda"));
        }
        let sort_order = AgendaItem::next_sort_order(&mut *tx, agenda_id).await?;
        let item = AgendaItem::create(&mut *tx, agenda_id, &title_en, planned, sort_order, &fields).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn reorder_items(&self, agenda_id: Uuid, data: ReorderItems) -> Result<(), AgendaError> {
        let orders = required(data.item_orders, "item_orders")?;
        let mut tx = self.pool.begin().await?;
        for order in &orders {
            AgendaItem::set_sort_order(&mut *tx, agenda_id, order.id, order.sort_order).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn complete_item(&self, item_id: Uuid, data: CompleteItem) -> Result<AgendaItem, AgendaError> {
        let item = AgendaItem::find_by_id(&self.pool, item_id)
            .await?
            .ok_or(AgendaError::NotFound("agenda item"))?;
        let ended_at = Utc::now();
        let actual = item.actual_start_time.map(|start| elapsed_minutes(start, ended_at));
        let completion = ItemCompletion {
            ended_at,
            actual_duration_minutes: actual,
            timing_status: actual
                .map_or(TimingStatus::OnTime, |a| completed_timing(item.planned_duration_minutes, a)),
            outcome_en: data.outcome_en,
            outcome_ar: data.outcome_ar,
            decision_made: data.decision_made.unwrap_or(false),
        };
        AgendaItem::complete(&self.pool, item_id, &completion)
            .await?
            .ok_or(AgendaError::NotFound("agenda item"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn agenda() -> MeetingAgenda {
        let now = Utc::now();
        MeetingAgenda {
            id: Uuid::new_v4(),
            dossier_id: None,
            calendar_event_id: None,
            title_en: "Joint committee".into(),
            title_ar: None,
            description_en: None,
            description_ar: None,
            meeting_date: now,
            meeting_end_date: None,
            location_en: None,
            location_ar: None,
            is_virtual: false,
            meeting_url: None,
            planned_start_time: None,
            planned_end_time: None,
            actual_start_time: None,
            actual_end_time: None,
            timezone: "Asia/Riyadh".into(),
            status: AgendaStatus::InMeeting,
            is_template: false,
            template_name: None,
            template_description: None,
            is_public: false,
            shared_with_participants: true,
            created_by: Uuid::new_v4(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(planned: i32, status: AgendaItemStatus, actual: Option<i32>) -> AgendaItem {
        let now = Utc::now();
        AgendaItem {
            id: Uuid::new_v4(),
            agenda_id: Uuid::new_v4(),
            title_en: "Item".into(),
            title_ar: None,
            description_en: None,
            description_ar: None,
            notes_en: None,
            notes_ar: None,
            sort_order: 0,
            parent_item_id: None,
            indent_level: 0,
            planned_duration_minutes: planned,
            actual_start_time: None,
            actual_end_time: None,
            actual_duration_minutes: actual,
            timing_status: TimingStatus::NotStarted,
            item_type: Default::default(),
            presenter_user_id: None,
            presenter_name_en: None,
            presenter_name_ar: None,
            linked_entity_type: None,
            linked_entity_id: None,
            status,
            outcome_en: None,
            outcome_ar: None,
            decision_made: false,
            skip_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_action_parsing() {
        let request = AgendaRequest { action: Some("reorder_items".into()), ..Default::default() };
        assert_eq!(request.parsed_action().unwrap(), AgendaAction::ReorderItems);

        let request = AgendaRequest { action: Some("explode".into()), ..Default::default() };
        assert!(matches!(request.parsed_action(), Err(AgendaError::UnknownAction(a)) if a == "explode"));

        let request = AgendaRequest::default();
        assert!(matches!(request.parsed_action(), Err(AgendaError::Validation(e)) if e.field == "action"));
    }

    #[test]
    fn test_invalid_data_is_a_validation_error() {
        let request = AgendaRequest {
            action: Some("reorder_items".into()),
            data: Some(json!({ "item_orders": "nope" })),
            ..Default::default()
        };
        let err = request.data::<ReorderItems>().unwrap_err();
        assert_eq!(err.field, "data");
    }

    #[test]
    fn test_completed_timing_tolerance() {
        assert_eq!(completed_timing(30, 32), TimingStatus::OnTime);
        assert_eq!(completed_timing(30, 33), TimingStatus::OnTime);
        assert_eq!(completed_timing(30, 34), TimingStatus::CompletedLate);
        assert_eq!(completed_timing(30, 20), TimingStatus::CompletedEarly);
        // Short items still get a one minute allowance.
        assert_eq!(completed_timing(5, 6), TimingStatus::OnTime);
        assert_eq!(completed_timing(5, 7), TimingStatus::CompletedLate);
    }

    #[test]
    fn test_running_timing() {
        assert_eq!(running_timing(10, 11), TimingStatus::OnTime);
        assert_eq!(running_timing(10, 12), TimingStatus::RunningOver);
    }

    #[test]
    fn test_elapsed_minutes_rounds() {
        let start = Utc::now();
        assert_eq!(elapsed_minutes(start, start + Duration::seconds(89)), 1);
        assert_eq!(elapsed_minutes(start, start + Duration::seconds(90)), 2);
        assert_eq!(elapsed_minutes(start, start - Duration::seconds(90)), 0);
    }

    #[test]
    fn test_compute_timing_totals_and_variance() {
        let now = Utc::now();
        let mut running = item(10, AgendaItemStatus::InProgress, None);
        running.actual_start_time = Some(now - Duration::minutes(15));
        let items = vec![
            item(20, AgendaItemStatus::Discussed, Some(25)),
            running,
            item(30, AgendaItemStatus::Skipped, None),
            item(10, AgendaItemStatus::Pending, None),
        ];
        let timing = compute_timing(&agenda(), &items, now);

        assert_eq!(timing.total_planned_minutes, 40);
        assert_eq!(timing.total_actual_minutes, 40);
        assert_eq!(timing.variance_minutes, 0);
        assert_eq!(timing.variance_percentage, Some(0.0));
        assert_eq!(timing.items[0].timing_status, TimingStatus::CompletedLate);
        assert_eq!(timing.items[0].variance_minutes, Some(5));
        assert_eq!(timing.items[1].timing_status, TimingStatus::RunningOver);
        assert_eq!(timing.items[2].timing_status, TimingStatus::Skipped);
        assert_eq!(timing.items[3].actual_minutes, None);
    }

    #[test]
    fn test_variance_percentage_absent_without_plan() {
        let timing = compute_timing(&agenda(), &[], Utc::now());
        assert_eq!(timing.variance_percentage, None);
    }

    #[test]
    fn test_agenda_stats() {
        let items = vec![
            item(20, AgendaItemStatus::Discussed, Some(18)),
            item(15, AgendaItemStatus::Skipped, None),
            item(5, AgendaItemStatus::Pending, None),
        ];
        let stats = agenda_stats(&items, &[], &[]);
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.completed_items, 1);
        assert_eq!(stats.skipped_items, 1);
        assert_eq!(stats.total_planned_minutes, 40);
        assert_eq!(stats.total_actual_minutes, 18);
    }

    #[test]
    fn test_positive_duration() {
        assert!(positive_duration(Some(0)).is_err());
        assert_eq!(positive_duration(Some(15)).unwrap(), Some(15));
        assert_eq!(positive_duration(None).unwrap(), None);
    }
}
