//! AI executive summaries for dossiers, generated on demand and stored.

use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use db::models::ai_summary::AiSummary;
use serde::Serialize;
use services::services::ai_summary::{AiSummaryService, GenerateSummary};
use ts_rs::TS;

use crate::{AppState, auth::AuthUser, error::ApiError, extract::Json};

#[derive(Debug, Serialize, TS)]
pub struct SummaryResponse {
    pub summary: AiSummary,
}

/// POST /api/ai/summaries
/// Generate and store an executive summary; 503 with a fallback when the model is unavailable.
pub async fn generate_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateSummary>,
) -> Result<ResponseJson<SummaryResponse>, ApiError> {
    let summary = AiSummaryService::new(state.pool(), state.llm(), state.llm_model())
        .generate(user.id, payload)
        .await?;
    Ok(ResponseJson(SummaryResponse { summary }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/ai/summaries", post(generate_summary))
}
