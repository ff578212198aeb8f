//! Events calendar: CRUD, the upcoming list and the conflict check for
//! overlapping events that share a venue or organizer.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{DateTime, NaiveDate, Utc};
use db::models::event::{Event, EventFilter, EventStatus, EventType};
use serde::{Deserialize, Deserializer, de};
use services::services::events::{EventConflict, EventInput, EventService};
use utils::response::{DataResponse, OffsetPagination, Paginated, SuccessResponse, clamp_limit};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{Json, Query},
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;
const DEFAULT_UPCOMING_LIMIT: i64 = 10;

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = raw.parse::<DateTime<Utc>>() {
        return Some(at);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn date_or_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid date '{raw}', expected YYYY-MM-DD or RFC 3339")))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    #[serde(default, deserialize_with = "date_or_timestamp")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "date_or_timestamp")]
    pub date_to: Option<DateTime<Utc>>,
    pub country_id: Option<Uuid>,
    pub organizer_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
}

impl EventListQuery {
    fn filter(self) -> EventFilter {
        EventFilter {
            event_type: self.event_type,
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
            country_id: self.country_id,
            organizer_id: self.organizer_id,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

/// GET /api/events
///
/// Filters combine with AND. `date_from`/`date_to` bound the start time and
/// accept either a date or a full timestamp.
pub async fn list_events(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<EventListQuery>,
) -> Result<ResponseJson<Paginated<Event, OffsetPagination>>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = query.offset.max(0);

    let (data, total) = EventService::new(state.pool())
        .list(&query.filter(), limit, offset)
        .await?;
    Ok(ResponseJson(Paginated {
        data,
        pagination: OffsetPagination::new(total, limit, offset),
    }))
}

/// GET /api/events/upcoming
/// Future events that are not cancelled, soonest first.
pub async fn upcoming_events(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<UpcomingQuery>,
) -> Result<ResponseJson<DataResponse<Vec<Event>>>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_UPCOMING_LIMIT, MAX_LIMIT);
    let events = EventService::new(state.pool()).upcoming(limit).await?;
    Ok(ResponseJson(DataResponse::new(events)))
}

/// GET /api/events/{id}
/// Fetch one event.
pub async fn get_event(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<DataResponse<Event>>, ApiError> {
    let event = EventService::new(state.pool()).get(id).await?;
    Ok(ResponseJson(DataResponse::new(event)))
}

/// POST /api/events
/// Create an event after validating its dates and bilingual titles.
pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<EventInput>,
) -> Result<(StatusCode, ResponseJson<DataResponse<Event>>), ApiError> {
    let event = EventService::new(state.pool())
        .create(payload, user.id)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(DataResponse::new(event))))
}

/// PATCH /api/events/{id}
/// The patch is merged over the stored event and the result re-validated.
pub async fn update_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventInput>,
) -> Result<ResponseJson<DataResponse<Event>>, ApiError> {
    let event = EventService::new(state.pool())
        .update(id, payload, user.id)
        .await?;
    Ok(ResponseJson(DataResponse::new(event)))
}

/// DELETE /api/events/{id}
/// Hard delete.
pub async fn delete_event(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    EventService::new(state.pool()).delete(id).await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

/// GET /api/events/{id}/conflicts
/// Cancelled events never conflict.
pub async fn event_conflicts(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<DataResponse<Vec<EventConflict>>>, ApiError> {
    let conflicts = EventService::new(state.pool()).conflicts(id).await?;
    Ok(ResponseJson(DataResponse::new(conflicts)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/events",
        Router::new()
            .route("/", get(list_events).post(create_event))
            .route("/upcoming", get(upcoming_events))
            .route(
                "/{id}",
                get(get_event).patch(update_event).delete(delete_event),
            )
            .route("/{id}/conflicts", get(event_conflicts)),
    )
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequestParts, http::Request};
    use chrono::TimeZone;

    use super::*;

    async fn list_query(uri: &str) -> Result<EventListQuery, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Query::<EventListQuery>::from_request_parts(&mut parts, &())
            .await
            .map(|Query(q)| q)
    }

    #[test]
    fn test_parse_date_accepts_dates_and_timestamps() {
        assert_eq!(
            parse_date("2025-03-01"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2025-03-02T10:30:00Z"),
            Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_date("March"), None);
    }

    #[tokio::test]
    async fn test_list_query_parses_filters() {
        let query = list_query("/events?type=conference&status=in_progress&date_from=2025-03-01&search=%20summit%20")
            .await
            .unwrap();
        assert_eq!(query.event_type, Some(EventType::Conference));
        assert_eq!(query.status, Some(EventStatus::InProgress));
        assert_eq!(query.date_from, Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(query.date_to, None);
        assert_eq!(query.filter().search.as_deref(), Some("summit"));
    }

    #[tokio::test]
    async fn test_list_query_rejects_bad_values() {
        for uri in ["/events?date_to=March", "/events?type=party", "/events?country_id=7", "/events?offset=x"] {
            assert!(
                matches!(list_query(uri).await, Err(ApiError::BadRequest { code: "VALIDATION_ERROR", .. })),
                "{uri}"
            );
        }
    }
}
