//! Unified dossier timeline.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use services::services::timeline::{TimelinePage, TimelineRequest, TimelineService};

use crate::{AppState, auth::AuthUser, error::ApiError, extract::Json};

/// POST /api/timeline
/// Unified, cursor-paginated activity for one dossier.
pub async fn fetch_timeline(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<TimelineRequest>,
) -> Result<ResponseJson<TimelinePage>, ApiError> {
    let page = TimelineService::new(state.pool()).fetch(payload).await?;
    Ok(ResponseJson(page))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/timeline", post(fetch_timeline))
}
