//! Waiting queue of assignments awaiting action, plus the user's saved
//! filter preferences.
//!
//! Filters may repeat (`?priority=high&priority=urgent`), so this module reads
//! the query through [`QueryParams`] instead of a typed `Query`. Queue
//! responses carry an ETag and honour `If-None-Match`.

use axum::{
    Router,
    extract::{DefaultBodyLimit, RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
};
use serde_json::Value;
use services::services::waiting_queue::{WaitingQueueQuery, WaitingQueueService};
use sha2::{Digest, Sha256};
use utils::{query::QueryParams, response::DataResponse};

use crate::{AppState, auth::AuthUser, error::ApiError, extract::Json};

const CACHE_CONTROL: &str = "private, max-age=60";
const MAX_PREFERENCES_BYTES: usize = 10 * 1024;

/// Quoted hex sha256 of the response body.
pub fn etag_for(body: &[u8]) -> String {
    format!("\"{:x}\"", Sha256::digest(body))
}

/// Whether `If-None-Match` names `etag` (weak validators compare equal).
pub fn matches_etag(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|tag| tag.trim().trim_start_matches("W/"))
        .any(|tag| tag == "*" || tag == etag || tag.trim_matches('"') == etag.trim_matches('"'))
}

/// GET /api/waiting-queue
///
/// Answers 304 with no body when the client's `If-None-Match` still matches.
pub async fn list_waiting_queue(
    State(state): State<AppState>,
    _user: AuthUser,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let params = QueryParams::parse(query.as_deref());
    let query = WaitingQueueQuery::from_params(&params)?;
    let page = WaitingQueueService::new(state.pool()).list(&query).await?;

    let body = serde_json::to_vec(&page).map_err(|e| ApiError::Internal(e.to_string()))?;
    let etag = etag_for(&body);
    let cache_headers = [
        (header::ETAG, etag.clone()),
        (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
    ];

    if matches_etag(&headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, cache_headers).into_response());
    }
    Ok((
        cache_headers,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// GET /api/waiting-queue/preferences
/// `data` is null until the user saves preferences.
pub async fn get_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<DataResponse<Option<Value>>>, ApiError> {
    let saved = WaitingQueueService::new(state.pool())
        .preferences(user.id)
        .await?;
    Ok(ResponseJson(DataResponse::new(saved)))
}

/// POST /api/waiting-queue/preferences
/// Bodies over 10 KiB are rejected with 413.
pub async fn save_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(filters): Json<Value>,
) -> Result<ResponseJson<DataResponse<Value>>, ApiError> {
    let saved = WaitingQueueService::new(state.pool())
        .save_preferences(user.id, &filters)
        .await?;
    Ok(ResponseJson(DataResponse::new(saved)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/waiting-queue",
        Router::new().route("/", get(list_waiting_queue)).route(
            "/preferences",
            get(get_preferences)
                .post(save_preferences)
                .layer(DefaultBodyLimit::max(MAX_PREFERENCES_BYTES)),
        ),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_etag_is_stable_hex() {
        let etag = etag_for(b"{}");
        assert_eq!(etag, etag_for(b"{}"));
        assert_ne!(etag, etag_for(b"[]"));
        assert_eq!(etag.len(), 66);
        assert!(etag.starts_with('"') && etag.ends_with('"'));
    }

    #[test]
    fn test_if_none_match() {
        let etag = etag_for(b"body");
        let mut headers = HeaderMap::new();
        assert!(!matches_etag(&headers, &etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&format!("W/{etag}")).unwrap());
        assert!(matches_etag(&headers, &etag));

        let bare = etag.trim_matches('"').to_string();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&format!("\"other\", {bare}")).unwrap());
        assert!(matches_etag(&headers, &etag));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        assert!(!matches_etag(&headers, &etag));
    }
}
