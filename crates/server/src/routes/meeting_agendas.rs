//! Meeting agendas behind a single action-dispatch endpoint.

use axum::{Router, extract::State, http::StatusCode, response::Json as ResponseJson, routing::post};
use serde_json::Value;
use services::services::meeting_agenda::{AgendaRequest, MeetingAgendaService};

use crate::{AppState, auth::AuthUser, error::ApiError, extract::Json};

/// POST /api/meeting-agendas
/// Action dispatch: `{ action, data?, id?, agenda_id?, item_id?, filters? }`.
pub async fn agenda_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AgendaRequest>,
) -> Result<(StatusCode, ResponseJson<Value>), ApiError> {
    let result = MeetingAgendaService::new(state.pool())
        .execute(&request, user.id)
        .await?;
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, ResponseJson(result.body)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/meeting-agendas", post(agenda_action))
}
