//! Diplomatic events with validation and venue/organizer conflict detection.

use chrono::{DateTime, Utc};
use db::models::event::{Event, EventFilter, EventRecord, EventStatus, EventType};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use strum_macros::Display;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::validation::{ValidationError, required, required_text};

pub const DEFAULT_TIMEZONE: &str = "Asia/Riyadh";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("event not found")]
    NotFound,
}

/// Event fields as sent by clients; every field is optional so the same type
/// serves creation and partial updates.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct EventInput {
    pub title_en: Option<String>,
    pub title_ar: Option<String>,
    pub description_en: Option<String>,
    pub description_ar: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub start_datetime: Option<DateTime<Utc>>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub location_en: Option<String>,
    pub location_ar: Option<String>,
    pub venue_en: Option<String>,
    pub venue_ar: Option<String>,
    pub is_virtual: Option<bool>,
    pub virtual_link: Option<String>,
    pub country_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub organizer_id: Option<Uuid>,
    pub max_participants: Option<i32>,
    pub registration_required: Option<bool>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
}

impl From<Event> for EventInput {
    fn from(e: Event) -> Self {
        Self {
            title_en: Some(e.title_en),
            title_ar: Some(e.title_ar),
            description_en: e.description_en,
            description_ar: e.description_ar,
            event_type: Some(e.event_type),
            start_datetime: Some(e.start_datetime),
            end_datetime: Some(e.end_datetime),
            timezone: Some(e.timezone),
            location_en: e.location_en,
            location_ar: e.location_ar,
            venue_en: e.venue_en,
            venue_ar: e.venue_ar,
            is_virtual: Some(e.is_virtual),
            virtual_link: e.virtual_link,
            country_id: e.country_id,
            organization_id: e.organization_id,
            organizer_id: Some(e.organizer_id),
            max_participants: e.max_participants,
            registration_required: Some(e.registration_required),
            registration_deadline: e.registration_deadline,
            status: Some(e.status),
        }
    }
}

impl EventInput {
    /// Fields present in `self` win over `base`.
    pub fn overlay(self, base: EventInput) -> EventInput {
        EventInput {
            title_en: self.title_en.or(base.title_en),
            title_ar: self.title_ar.or(base.title_ar),
            description_en: self.description_en.or(base.description_en),
            description_ar: self.description_ar.or(base.description_ar),
            event_type: self.event_type.or(base.event_type),
            start_datetime: self.start_datetime.or(base.start_datetime),
            end_datetime: self.end_datetime.or(base.end_datetime),
            timezone: self.timezone.or(base.timezone),
            location_en: self.location_en.or(base.location_en),
            location_ar: self.location_ar.or(base.location_ar),
            venue_en: self.venue_en.or(base.venue_en),
            venue_ar: self.venue_ar.or(base.venue_ar),
            is_virtual: self.is_virtual.or(base.is_virtual),
            virtual_link: self.virtual_link.or(base.virtual_link),
            country_id: self.country_id.or(base.country_id),
            organization_id: self.organization_id.or(base.organization_id),
            organizer_id: self.organizer_id.or(base.organizer_id),
            max_participants: self.max_participants.or(base.max_participants),
            registration_required: self.registration_required.or(base.registration_required),
            registration_deadline: self.registration_deadline.or(base.registration_deadline),
            status: self.status.or(base.status),
        }
    }

    /// Check the record as a whole and produce something writable.
    pub fn validate(self, default_organizer: Uuid) -> Result<EventRecord, ValidationError> {
        let title_en = required_text(self.title_en.as_deref(), "title_en")?;
        let title_ar = required_text(self.title_ar.as_deref(), "title_ar")?;
        let event_type = required(self.event_type, "type")?;
        let start = required(self.start_datetime, "start_datetime")?;
        let end = required(self.end_datetime, "end_datetime")?;

        if end <= start {
            return Err(ValidationError::new(
                "end_datetime",
                "End date must be after start date",
                "يجب أن يكون تاريخ الانتهاء بعد تاريخ البدء",
            ));
        }

        let is_virtual = self.is_virtual.unwrap_or(false);
        let virtual_link = self.virtual_link.filter(|l| !l.trim().is_empty());
        if is_virtual && virtual_link.is_none() {
            return Err(ValidationError::new(
                "virtual_link",
                "Virtual events require a meeting link",
                "تتطلب الفعاليات الافتراضية رابط الاجتماع",
            ));
        }

        if self.registration_deadline.is_some_and(|d| d > start) {
            return Err(ValidationError::new(
                "registration_deadline",
                "Registration deadline must be on or before the start date",
                "يجب أن يكون الموعد النهائي للتسجيل قبل تاريخ البدء أو في نفس اليوم",
            ));
        }

        if self.max_participants.is_some_and(|m| m <= 0) {
            return Err(ValidationError::new(
                "max_participants",
                "Maximum participants must be greater than zero",
                "يجب أن يكون الحد الأقصى للمشاركين أكبر من صفر",
            ));
        }

        Ok(EventRecord {
            title_en,
            title_ar,
            description_en: self.description_en,
            description_ar: self.description_ar,
            event_type,
            start_datetime: start,
            end_datetime: end,
            timezone: self.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            location_en: self.location_en,
            location_ar: self.location_ar,
            venue_en: self.venue_en,
            venue_ar: self.venue_ar,
            is_virtual,
            virtual_link,
            country_id: self.country_id,
            organization_id: self.organization_id,
            organizer_id: self.organizer_id.unwrap_or(default_organizer),
            max_participants: self.max_participants,
            registration_required: self.registration_required.unwrap_or(false),
            registration_deadline: self.registration_deadline,
            status: self.status.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConflictType {
    Venue,
    Organizer,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct EventConflict {
    pub conflicting_event: Event,
    pub conflict_type: ConflictType,
    pub conflict_details: String,
}

/// Why `other` clashes with `event`, assuming their time windows overlap.
pub fn classify_conflict(event: &Event, other: &Event) -> Option<(ConflictType, String)> {
    let shared_venue = event
        .venue_en
        .as_ref()
        .filter(|v| other.venue_en.as_ref() == Some(*v));
    if let Some(venue) = shared_venue {
        return Some((
            ConflictType::Venue,
            format!("Venue '{venue}' is already booked for '{}'", other.title_en),
        ));
    }
    (event.organizer_id == other.organizer_id).then(|| {
        (
            ConflictType::Organizer,
            format!("Organizer is already running '{}' at the same time", other.title_en),
        )
    })
}

pub struct EventService {
    pool: PgPool,
}

impl EventService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Event>, i64), EventError> {
        Ok(Event::list(&self.pool, filter, limit, offset).await?)
    }

    pub async fn upcoming(&self, limit: i64) -> Result<Vec<Event>, EventError> {
        Ok(Event::upcoming(&self.pool, limit).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Event, EventError> {
        Event::find_by_id(&self.pool, id)
            .await?
            .ok_or(EventError::NotFound)
    }

    pub async fn create(&self, input: EventInput, user_id: Uuid) -> Result<Event, EventError> {
        let record = input.validate(user_id)?;
        let event = Event::create(&self.pool, &record, user_id).await?;
        info!(event_id = %event.id, event_type = %event.event_type, "Event created");
        Ok(event)
    }

    pub async fn update(&self, id: Uuid, patch: EventInput, user_id: Uuid) -> Result<Event, EventError> {
        let existing = self.get(id).await?;
        let record = patch.overlay(existing.into()).validate(user_id)?;
        Event::update(&self.pool, id, &record)
            .await?
            .ok_or(EventError::NotFound)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), EventError> {
        match Event::delete(&self.pool, id).await? {
            0 => Err(EventError::NotFound),
            _ => {
                info!(event_id = %id, "Event deleted");
                Ok(())
            }
        }
    }

    pub async fn conflicts(&self, id: Uuid) -> Result<Vec<EventConflict>, EventError> {
        let event = self.get(id).await?;
        let overlapping = Event::find_overlapping(&self.pool, &event).await?;
        Ok(overlapping
            .into_iter()
            .filter_map(|other| {
                classify_conflict(&event, &other).map(|(conflict_type, conflict_details)| {
                    EventConflict {
                        conflicting_event: other,
                        conflict_type,
                        conflict_details,
                    }
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn valid_input() -> EventInput {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        EventInput {
            title_en: Some("Bilateral talks".into()),
            title_ar: Some("محادثات ثنائية".into()),
            event_type: Some(EventType::Meeting),
            start_datetime: Some(start),
            end_datetime: Some(start + Duration::hours(2)),
            ..Default::default()
        }
    }

    fn event(venue: Option<&str>, organizer: Uuid) -> Event {
        let record = EventInput {
            venue_en: venue.map(str::to_string),
            organizer_id: Some(organizer),
            ..valid_input()
        }
        .validate(organizer)
        .unwrap();
        Event {
            id: Uuid::new_v4(),
            title_en: record.title_en,
            title_ar: record.title_ar,
            description_en: None,
            description_ar: None,
            event_type: record.event_type,
            start_datetime: record.start_datetime,
            end_datetime: record.end_datetime,
            timezone: record.timezone,
            location_en: None,
            location_ar: None,
            venue_en: record.venue_en,
            venue_ar: None,
            is_virtual: false,
            virtual_link: None,
            country_id: None,
            organization_id: None,
            organizer_id: record.organizer_id,
            max_participants: None,
            registration_required: false,
            registration_deadline: None,
            status: record.status,
            created_by: organizer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_event_gets_defaults() {
        let organizer = Uuid::new_v4();
        let record = valid_input().validate(organizer).unwrap();
        assert_eq!(record.timezone, DEFAULT_TIMEZONE);
        assert_eq!(record.status, EventStatus::Draft);
        assert_eq!(record.organizer_id, organizer);
    }

    #[test]
    fn test_end_must_follow_start() {
        let mut input = valid_input();
        input.end_datetime = input.start_datetime;
        assert_eq!(input.validate(Uuid::nil()).unwrap_err().field, "end_datetime");
    }

    #[test]
    fn test_virtual_event_requires_link() {
        let input = EventInput {
            is_virtual: Some(true),
            virtual_link: Some("  ".into()),
            ..valid_input()
        };
        assert_eq!(input.validate(Uuid::nil()).unwrap_err().field, "virtual_link");
    }

    #[test]
    fn test_registration_deadline_and_capacity() {
        let base = valid_input();
        let late = EventInput {
            registration_deadline: base.start_datetime.map(|s| s + Duration::minutes(1)),
            ..valid_input()
        };
        assert_eq!(late.validate(Uuid::nil()).unwrap_err().field, "registration_deadline");

        let on_time = EventInput {
            registration_deadline: base.start_datetime,
            ..valid_input()
        };
        assert!(on_time.validate(Uuid::nil()).is_ok());

        let empty = EventInput {
            max_participants: Some(0),
            ..valid_input()
        };
        assert_eq!(empty.validate(Uuid::nil()).unwrap_err().field, "max_participants");
    }

    #[test]
    fn test_missing_type_is_reported() {
        let input = EventInput {
            event_type: None,
            ..valid_input()
        };
        assert_eq!(input.validate(Uuid::nil()).unwrap_err().field, "type");
    }

    #[test]
    fn test_patch_overlay_revalidates_merged_record() {
        let organizer = Uuid::new_v4();
        let existing: EventInput = event(Some("Hall A"), organizer).into();
        let patch = EventInput {
            title_en: Some("Renamed".into()),
            end_datetime: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let merged = patch.overlay(existing);
        assert_eq!(merged.title_en.as_deref(), Some("Renamed"));
        assert_eq!(merged.venue_en.as_deref(), Some("Hall A"));
        assert!(merged.validate(organizer).is_err());
    }

    #[test]
    fn test_conflict_classification() {
        let organizer = Uuid::new_v4();
        let base = event(Some("Hall A"), organizer);
        let same_venue = event(Some("Hall A"), Uuid::new_v4());
        let same_organizer = event(Some("Hall B"), organizer);
        let unrelated = event(None, Uuid::new_v4());

        assert_eq!(classify_conflict(&base, &same_venue).unwrap().0, ConflictType::Venue);
        assert_eq!(
            classify_conflict(&base, &same_organizer).unwrap().0,
            ConflictType::Organizer
        );
        assert!(classify_conflict(&base, &unrelated).is_none());
    }
}
