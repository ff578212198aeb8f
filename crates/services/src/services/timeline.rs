//! Unified dossier timeline merged from several source tables.

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::{
    dossier::{Dossier, DossierType},
    timeline::{
        CalendarEntryRow, InteractionRow, IntelligenceReportRow, MouTimelineRow, TimelineWindow,
    },
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, required};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimelineEventType {
    Calendar,
    Interaction,
    Intelligence,
    Document,
    Mou,
    Position,
    Relationship,
    Commitment,
    Decision,
}

/// Event types shown for a dossier when the caller does not choose any.
pub fn default_event_types(dossier_type: DossierType) -> &'static [TimelineEventType] {
    use TimelineEventType::*;
    match dossier_type {
        DossierType::Country => &[Intelligence, Mou, Calendar, Document, Relationship],
        DossierType::Organization => &[Interaction, Mou, Calendar, Document, Relationship],
        DossierType::Person => &[Interaction, Position, Calendar, Relationship],
        DossierType::Engagement => &[Calendar, Commitment, Decision, Document],
        DossierType::Forum => &[Calendar, Decision, Document, Relationship],
        DossierType::WorkingGroup => &[Calendar, Commitment, Decision, Document],
        DossierType::Topic | DossierType::Theme => &[Document, Calendar, Intelligence, Relationship],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TimelineEvent {
    pub id: String,
    pub event_type: TimelineEventType,
    pub source_table: String,
    pub source_id: Uuid,
    pub title_en: String,
    pub title_ar: String,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    pub event_date: DateTime<Utc>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub metadata: Value,
}

impl TimelineEvent {
    fn new(
        event_type: TimelineEventType,
        source_table: &str,
        source_id: Uuid,
        event_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("{event_type}-{source_id}"),
            event_type,
            source_table: source_table.to_string(),
            source_id,
            title_en: String::new(),
            title_ar: String::new(),
            description_en: None,
            description_ar: None,
            event_date,
            priority: None,
            status: None,
            metadata: Value::Object(Default::default()),
        }
    }

    fn matches_search(&self, needle: &str) -> bool {
        [
            Some(self.title_en.as_str()),
            Some(self.title_ar.as_str()),
            self.description_en.as_deref(),
            self.description_ar.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TimelineFilters {
    #[serde(default)]
    pub event_types: Vec<TimelineEventType>,
    #[serde(default)]
    pub priority: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct TimelineRequest {
    pub dossier_id: Option<Uuid>,
    pub dossier_type: Option<DossierType>,
    #[serde(default)]
    pub filters: TimelineFilters,
    pub cursor: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TimelinePage {
    pub events: Vec<TimelineEvent>,
    pub has_more: bool,
    pub next_cursor: Option<DateTime<Utc>>,
    pub total_count: usize,
}

#[async_trait]
pub trait TimelineSource: Send + Sync {
    fn event_type(&self) -> TimelineEventType;

    async fn fetch(
        &self,
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<TimelineEvent>, sqlx::Error>;
}

pub struct CalendarSource;

#[async_trait]
impl TimelineSource for CalendarSource {
    fn event_type(&self) -> TimelineEventType {
        TimelineEventType::Calendar
    }

    async fn fetch(
        &self,
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<TimelineEvent>, sqlx::Error> {
        let rows = CalendarEntryRow::find_for_dossier(pool, dossier_id, window).await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelineEvent {
                title_en: row.title_en,
                title_ar: row.title_ar,
                description_en: row.description_en,
                description_ar: row.description_ar,
                status: Some(row.status),
                metadata: json!({ "entry_type": row.entry_type, "created_by": row.created_by }),
                ..TimelineEvent::new(self.event_type(), "calendar_entries", row.id, row.occurred_at)
            })
            .collect())
    }
}

pub struct InteractionSource;

#[async_trait]
impl TimelineSource for InteractionSource {
    fn event_type(&self) -> TimelineEventType {
        TimelineEventType::Interaction
    }

    async fn fetch(
        &self,
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<TimelineEvent>, sqlx::Error> {
        let rows = InteractionRow::find_for_dossier(pool, dossier_id, window).await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelineEvent {
                title_en: row.summary_en,
                title_ar: row.summary_ar,
                description_en: row.details_en,
                description_ar: row.details_ar,
                priority: Some(row.priority),
                metadata: json!({ "interaction_type": row.interaction_type }),
                ..TimelineEvent::new(self.event_type(), "interactions", row.id, row.interaction_date)
            })
            .collect())
    }
}

pub struct IntelligenceSource;

#[async_trait]
impl TimelineSource for IntelligenceSource {
    fn event_type(&self) -> TimelineEventType {
        TimelineEventType::Intelligence
    }

    async fn fetch(
        &self,
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<TimelineEvent>, sqlx::Error> {
        let rows = IntelligenceReportRow::find_for_dossier(pool, dossier_id, window).await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelineEvent {
                title_en: row.title_en,
                title_ar: row.title_ar,
                description_en: row.summary_en,
                description_ar: row.summary_ar,
                priority: Some(row.priority),
                status: Some(row.status),
                metadata: json!({ "confidence_level": row.confidence_level }),
                ..TimelineEvent::new(self.event_type(), "intelligence_reports", row.id, row.reported_at)
            })
            .collect())
    }
}

pub struct MouSource;

#[async_trait]
impl TimelineSource for MouSource {
    fn event_type(&self) -> TimelineEventType {
        TimelineEventType::Mou
    }

    async fn fetch(
        &self,
        pool: &PgPool,
        dossier_id: Uuid,
        window: &TimelineWindow,
    ) -> Result<Vec<TimelineEvent>, sqlx::Error> {
        let rows = MouTimelineRow::find_for_dossier(pool, dossier_id, window).await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelineEvent {
                title_en: row.title_en,
                title_ar: row.title_ar,
                status: Some(row.workflow_state.to_string()),
                metadata: json!({
                    "reference_number": row.reference_number,
                    "expiry_date": row.expiry_date,
                }),
                ..TimelineEvent::new(self.event_type(), "mous", row.id, row.occurred_at)
            })
            .collect())
    }
}

pub struct TimelineService {
    pool: PgPool,
    sources: Vec<Arc<dyn TimelineSource>>,
}

impl TimelineService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            sources: vec![
                Arc::new(CalendarSource),
                Arc::new(InteractionSource),
                Arc::new(IntelligenceSource),
                Arc::new(MouSource),
            ],
        }
    }

    pub async fn fetch(&self, request: TimelineRequest) -> Result<TimelinePage, TimelineError> {
        let dossier_id = required(request.dossier_id, "dossier_id")?;
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let requested: Vec<TimelineEventType> = if request.filters.event_types.is_empty() {
            let dossier_type = match request.dossier_type {
                Some(t) => Some(t),
                None => Dossier::find_by_id(&self.pool, dossier_id)
                    .await?
                    .map(|d| d.dossier_type),
            };
            match dossier_type {
                Some(t) => default_event_types(t).to_vec(),
                None => self.sources.iter().map(|s| s.event_type()).collect(),
            }
        } else {
            request.filters.event_types.clone()
        };

        let window = TimelineWindow {
            before: request.cursor,
            from: request.filters.date_from,
            to: request.filters.date_to,
            limit: limit + 1,
        };

        let active: Vec<_> = self
            .sources
            .iter()
            .filter(|s| requested.contains(&s.event_type()))
            .collect();
        debug!(
            dossier_id = %dossier_id,
            sources = active.len(),
            requested = requested.len(),
            "Fetching timeline"
        );

        let batches = try_join_all(
            active
                .iter()
                .map(|source| source.fetch(&self.pool, dossier_id, &window)),
        )
        .await?;

        Ok(merge_events(batches, &request.filters, limit))
    }
}

/// Merge per-source batches into one page, newest first.
pub fn merge_events(
    batches: Vec<Vec<TimelineEvent>>,
    filters: &TimelineFilters,
    limit: i64,
) -> TimelinePage {
    let needle = filters
        .search_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let mut events: Vec<TimelineEvent> = batches
        .into_iter()
        .flatten()
        .filter(|e| needle.as_deref().is_none_or(|n| e.matches_search(n)))
        .filter(|e| matches_any(&filters.priority, e.priority.as_deref()))
        .filter(|e| matches_any(&filters.status, e.status.as_deref()))
        .collect();

    events.sort_by(|a, b| match b.event_date.cmp(&a.event_date) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });

    let total_count = events.len();
    let limit = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
    let has_more = events.len() > limit;
    events.truncate(limit);
    let next_cursor = if has_more {
        events.last().map(|e| e.event_date)
    } else {
        None
    };

    TimelinePage {
        events,
        has_more,
        next_cursor,
        total_count,
    }
}

fn matches_any(wanted: &[String], value: Option<&str>) -> bool {
    if wanted.is_empty() {
        return true;
    }
    value.is_some_and(|v| wanted.iter().any(|w| w.eq_ignore_ascii_case(v)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn event(kind: TimelineEventType, day: u32, title: &str) -> TimelineEvent {
        TimelineEvent {
            title_en: title.to_string(),
            title_ar: "عنوان".to_string(),
            ..TimelineEvent::new(
                kind,
                "test",
                Uuid::new_v4(),
                Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            )
        }
    }

    #[test]
    fn test_merge_sorts_newest_first_and_pages() {
        let batches = vec![
            vec![
                event(TimelineEventType::Calendar, 5, "a"),
                event(TimelineEventType::Calendar, 1, "b"),
            ],
            vec![
                event(TimelineEventType::Mou, 9, "c"),
                event(TimelineEventType::Mou, 3, "d"),
            ],
        ];
        let page = merge_events(batches, &TimelineFilters::default(), 3);

        let titles: Vec<_> = page.events.iter().map(|e| e.title_en.as_str()).collect();
        assert_eq!(titles, ["c", "a", "d"]);
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(page.events[2].event_date));
        assert_eq!(page.total_count, 4);
    }

    #[test]
    fn test_merge_without_more_has_no_cursor() {
        let batches = vec![vec![event(TimelineEventType::Interaction, 2, "only")]];
        let page = merge_events(batches, &TimelineFilters::default(), 20);
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_search_is_case_insensitive_over_titles_and_descriptions() {
        let mut described = event(TimelineEventType::Calendar, 4, "Visit");
        described.description_en = Some("Trade DELEGATION arrives".into());
        let batches = vec![vec![
            described,
            event(TimelineEventType::Calendar, 3, "Delegation briefing"),
            event(TimelineEventType::Calendar, 2, "Unrelated"),
        ]];
        let filters = TimelineFilters {
            search_query: Some("delegation".into()),
            ..Default::default()
        };
        let page = merge_events(batches, &filters, 20);
        assert_eq!(page.events.len(), 2);
    }

    #[test]
    fn test_priority_filter_drops_unprioritised_events() {
        let mut urgent = event(TimelineEventType::Interaction, 2, "urgent");
        urgent.priority = Some("high".into());
        let batches = vec![vec![urgent, event(TimelineEventType::Calendar, 3, "none")]];
        let filters = TimelineFilters {
            priority: vec!["HIGH".into()],
            ..Default::default()
        };
        let page = merge_events(batches, &filters, 20);
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].title_en, "urgent");
    }

    #[test]
    fn test_synthetic_id_and_defaults() {
        let e = event(TimelineEventType::Mou, 1, "x");
        assert!(e.id.starts_with("mou-"));
        assert_eq!(
            default_event_types(DossierType::Person),
            &[
                TimelineEventType::Interaction,
                TimelineEventType::Position,
                TimelineEventType::Calendar,
                TimelineEventType::Relationship
            ]
        );
    }
}
