//! Personal watchlist: the entities a user follows, the change events
//! recorded for them and reusable watch templates.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use db::models::{
    priority::Priority,
    watchlist::{NewWatch, UpdateWatch, WatchFilter, WatchableEntityType, WatchlistItem, WatchlistTemplate},
};
use serde::{Deserialize, Serialize};
use services::services::{
    validation::required,
    watchlist::{
        DEFAULT_EVENTS_LIMIT, DEFAULT_LIMIT, MAX_EVENTS_LIMIT, MAX_LIMIT, WatchCheck, WatchEventsPage,
        WatchSummary, WatchlistPage, WatchlistService,
    },
};
use ts_rs::TS;
use utils::response::{SuccessResponse, clamp_limit};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{Json, Query},
};

#[derive(Debug, Serialize, TS)]
pub struct TemplatesResponse {
    pub templates: Vec<WatchlistTemplate>,
}

#[derive(Debug, Serialize, TS)]
pub struct WatchAdded {
    pub success: bool,
    pub watch_id: Uuid,
}

#[derive(Debug, Serialize, TS)]
pub struct AddedCount {
    pub success: bool,
    pub added_count: usize,
}

#[derive(Debug, Serialize, TS)]
pub struct RemovedCount {
    pub success: bool,
    pub removed_count: u64,
}

#[derive(Debug, Serialize, TS)]
pub struct ActiveState {
    pub success: bool,
    pub is_active: bool,
}

#[derive(Debug, Serialize, TS)]
pub struct WatchUpdated {
    pub success: bool,
    pub watch: WatchlistItem,
}

#[derive(Debug, Deserialize, TS)]
pub struct BulkAdd {
    #[serde(default)]
    pub items: Vec<NewWatch>,
}

#[derive(Debug, Deserialize, TS)]
pub struct BulkRemove {
    #[serde(default)]
    pub watch_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, TS)]
pub struct ApplyTemplate {
    pub template_id: Uuid,
    #[serde(default = "default_auto_sync")]
    pub auto_sync: bool,
}

fn default_auto_sync() -> bool {
    true
}

#[derive(Debug, Deserialize, TS)]
pub struct ToggleActive {
    pub watch_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct WatchlistQuery {
    pub entity_type: Option<WatchableEntityType>,
    pub priority: Option<Priority>,
    #[serde(default = "default_active_only")]
    pub active_only: bool,
    /// `created_at` of the last item on the previous page.
    pub cursor: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub include_details: bool,
}

fn default_active_only() -> bool {
    true
}

impl WatchlistQuery {
    fn filter(&self) -> WatchFilter {
        WatchFilter {
            entity_type: self.entity_type,
            priority: self.priority,
            active_only: self.active_only,
            before: self.cursor,
        }
    }
}

/// Identifies one watched entity; both fields are required.
#[derive(Debug, Deserialize)]
pub struct EntityRef {
    pub entity_type: Option<WatchableEntityType>,
    pub entity_id: Option<Uuid>,
}

impl EntityRef {
    fn require(self) -> Result<(WatchableEntityType, Uuid), ApiError> {
        Ok((
            required(self.entity_type, "entity_type")?,
            required(self.entity_id, "entity_id")?,
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct WatchEventsQuery {
    pub watch_id: Option<Uuid>,
    pub cursor: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// GET /api/watchlist
///
/// Cursor paginated, newest watch first. With `include_details=true` each item
/// carries the watched entity's English and Arabic name.
pub async fn list_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<WatchlistQuery>,
) -> Result<ResponseJson<WatchlistPage>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let page = WatchlistService::new(state.pool())
        .list(user.id, &query.filter(), limit, query.include_details)
        .await?;
    Ok(ResponseJson(page))
}

/// GET /api/watchlist/summary
/// Watch counts per entity type and priority, plus total and active counts.
pub async fn watchlist_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<WatchSummary>, ApiError> {
    Ok(ResponseJson(WatchlistService::new(state.pool()).summary(user.id).await?))
}

/// GET /api/watchlist/templates
/// The caller's own templates plus the shared ones offered to their role.
pub async fn list_templates(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<TemplatesResponse>, ApiError> {
    let templates = WatchlistService::new(state.pool())
        .templates(user.id, &user.role)
        .await?;
    Ok(ResponseJson(TemplatesResponse { templates }))
}

/// GET /api/watchlist/check
/// Whether the caller watches one entity, and the watch if so.
pub async fn check_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Query(entity): Query<EntityRef>,
) -> Result<ResponseJson<WatchCheck>, ApiError> {
    let (entity_type, entity_id) = entity.require()?;
    let check = WatchlistService::new(state.pool())
        .check(user.id, entity_type, entity_id)
        .await?;
    Ok(ResponseJson(check))
}

/// GET /api/watchlist/events
///
/// Change events across all of the caller's watches, or one watch when
/// `watch_id` is given.
pub async fn watch_events(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<WatchEventsQuery>,
) -> Result<ResponseJson<WatchEventsPage>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_EVENTS_LIMIT, MAX_EVENTS_LIMIT);
    let page = WatchlistService::new(state.pool())
        .events(user.id, query.watch_id, query.cursor, limit)
        .await?;
    Ok(ResponseJson(page))
}

/// POST /api/watchlist/add
/// Watch an entity; 409 when it is already watched.
pub async fn add_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewWatch>,
) -> Result<ResponseJson<WatchAdded>, ApiError> {
    let watch_id = WatchlistService::new(state.pool())
        .add(user.id, &payload)
        .await?;
    Ok(ResponseJson(WatchAdded {
        success: true,
        watch_id,
    }))
}

/// POST /api/watchlist/bulk-add
/// Entities already watched are skipped.
pub async fn bulk_add(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkAdd>,
) -> Result<ResponseJson<AddedCount>, ApiError> {
    let added_count = WatchlistService::new(state.pool())
        .bulk_add(user.id, &payload.items)
        .await?;
    Ok(ResponseJson(AddedCount {
        success: true,
        added_count,
    }))
}

/// POST /api/watchlist/bulk-remove
/// Remove several of the caller's watches by id.
pub async fn bulk_remove(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkRemove>,
) -> Result<ResponseJson<RemovedCount>, ApiError> {
    let removed_count = WatchlistService::new(state.pool())
        .bulk_remove(user.id, &payload.watch_ids)
        .await?;
    Ok(ResponseJson(RemovedCount {
        success: true,
        removed_count,
    }))
}

/// POST /api/watchlist/apply-template
/// Watch every entity a template selects, skipping ones already watched.
pub async fn apply_template(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ApplyTemplate>,
) -> Result<ResponseJson<AddedCount>, ApiError> {
    let added_count = WatchlistService::new(state.pool())
        .apply_template(user.id, payload.template_id, payload.auto_sync)
        .await?;
    Ok(ResponseJson(AddedCount {
        success: true,
        added_count,
    }))
}

/// POST /api/watchlist/toggle-active
/// Pause or resume a watch.
pub async fn toggle_active(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ToggleActive>,
) -> Result<ResponseJson<ActiveState>, ApiError> {
    let is_active = WatchlistService::new(state.pool())
        .toggle_active(user.id, payload.watch_id)
        .await?;
    Ok(ResponseJson(ActiveState {
        success: true,
        is_active,
    }))
}

/// PATCH /api/watchlist/{id}
/// Update priority, notification settings or notes of a watch.
pub async fn update_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWatch>,
) -> Result<ResponseJson<WatchUpdated>, ApiError> {
    let watch = WatchlistService::new(state.pool())
        .update(user.id, id, &payload)
        .await?;
    Ok(ResponseJson(WatchUpdated {
        success: true,
        watch,
    }))
}

/// DELETE /api/watchlist/{id}
/// Remove a watch by id.
pub async fn remove_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    WatchlistService::new(state.pool()).remove(user.id, id).await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

/// DELETE /api/watchlist?entity_type&entity_id
/// Remove the caller's watch on an entity.
pub async fn remove_entity_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Query(entity): Query<EntityRef>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    let (entity_type, entity_id) = entity.require()?;
    WatchlistService::new(state.pool())
        .remove_entity(user.id, entity_type, entity_id)
        .await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/watchlist",
        Router::new()
            .route("/", get(list_watchlist).delete(remove_entity_watch))
            .route("/summary", get(watchlist_summary))
            .route("/templates", get(list_templates))
            .route("/check", get(check_watch))
            .route("/events", get(watch_events))
            .route("/add", post(add_watch))
            .route("/bulk-add", post(bulk_add))
            .route("/bulk-remove", post(bulk_remove))
            .route("/apply-template", post(apply_template))
            .route("/toggle-active", post(toggle_active))
            .route("/{id}", patch(update_watch).delete(remove_watch)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_reports_missing_field() {
        let missing_id = EntityRef {
            entity_type: Some(WatchableEntityType::Person),
            entity_id: None,
        };
        match missing_id.require() {
            Err(ApiError::Validation(e)) => assert_eq!(e.field, "entity_id"),
            other => panic!("unexpected {other:?}"),
        }

        let id = Uuid::new_v4();
        let complete = EntityRef {
            entity_type: Some(WatchableEntityType::Person),
            entity_id: Some(id),
        };
        assert_eq!(complete.require().unwrap(), (WatchableEntityType::Person, id));
    }
}
