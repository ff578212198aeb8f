//! MoU renewal workflow, expiry alerts and the two cron entry points
//! (`process-alerts`, `auto-expire`) that require the cron secret.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{
    mou::{ExpiringMou, MouVersion},
    mou_alert::{AlertFilter, AlertStatus, AlertType, MouExpirationAlert},
    mou_negotiation::{CreateNegotiation, MouNegotiation},
    mou_renewal::{MouRenewal, MouRenewalWithMou, RenewalStatus},
};
use serde::Deserialize;
use services::services::mou_renewal::{
    AlertRun, CompleteRenewal, ExpiryRun, InitiateRenewal, MouRenewalService, UpdateRenewalStatus,
};
use ts_rs::TS;
use utils::response::{DataResponse, MessageResponse, PagePagination, Paginated, clamp_limit};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{Json, Query},
};

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;
const DEFAULT_DAYS_AHEAD: i32 = 90;

#[derive(Debug, Deserialize, TS)]
pub struct AcknowledgeAlert {
    pub alert_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenewalListQuery {
    pub mou_id: Option<Uuid>,
    pub status: Option<RenewalStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListQuery {
    pub mou_id: Option<Uuid>,
    pub status: Option<AlertStatus>,
    #[serde(rename = "type")]
    pub alert_type: Option<AlertType>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i32,
    #[serde(default)]
    pub include_expired: bool,
}

fn default_days_ahead() -> i32 {
    DEFAULT_DAYS_AHEAD
}

fn page_and_limit(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (
        page.unwrap_or(1).max(1),
        clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT),
    )
}

/// GET /api/mou-renewals
/// Renewals joined with their MoU, page-paginated.
pub async fn list_renewals(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<RenewalListQuery>,
) -> Result<ResponseJson<Paginated<MouRenewalWithMou, PagePagination>>, ApiError> {
    let (page, limit) = page_and_limit(query.page, query.limit);
    let (data, total) = MouRenewalService::new(state.pool())
        .list(query.mou_id, query.status, page, limit)
        .await?;
    Ok(ResponseJson(Paginated {
        data,
        pagination: PagePagination::new(page, limit, total),
    }))
}

/// GET /api/mou-renewals/expiring
///
/// Active MoUs expiring within `days_ahead` days (default 90), soonest first.
/// `include_expired=true` adds MoUs already past expiry.
pub async fn expiring_mous(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ExpiringQuery>,
) -> Result<ResponseJson<DataResponse<Vec<ExpiringMou>>>, ApiError> {
    let data = MouRenewalService::new(state.pool())
        .expiring(query.days_ahead, query.include_expired)
        .await?;
    Ok(ResponseJson(DataResponse::new(data)))
}

/// GET /api/mou-renewals/alerts
/// Expiration alerts, filterable by MoU, status and `type`.
pub async fn list_alerts(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<AlertListQuery>,
) -> Result<ResponseJson<Paginated<MouExpirationAlert, PagePagination>>, ApiError> {
    let (page, limit) = page_and_limit(query.page, query.limit);
    let filter = AlertFilter {
        mou_id: query.mou_id,
        status: query.status,
        alert_type: query.alert_type,
    };
    let (data, total) = MouRenewalService::new(state.pool())
        .alerts(&filter, page, limit)
        .await?;
    Ok(ResponseJson(Paginated {
        data,
        pagination: PagePagination::new(page, limit, total),
    }))
}

/// GET /api/mou-renewals/{id}
/// Fetch one renewal with its MoU.
pub async fn get_renewal(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<DataResponse<MouRenewalWithMou>>, ApiError> {
    let renewal = MouRenewalService::new(state.pool()).get(id).await?;
    Ok(ResponseJson(DataResponse::new(renewal)))
}

/// GET /api/mou-renewals/{id}/negotiations
/// Negotiation rounds recorded for a renewal.
pub async fn list_negotiations(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<DataResponse<Vec<MouNegotiation>>>, ApiError> {
    let negotiations = MouRenewalService::new(state.pool()).negotiations(id).await?;
    Ok(ResponseJson(DataResponse::new(negotiations)))
}

/// GET /api/mou-renewals/{mou_id}/version-chain
/// Every version linked through `previous_version_id`, oldest first.
pub async fn version_chain(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(mou_id): Path<Uuid>,
) -> Result<ResponseJson<DataResponse<Vec<MouVersion>>>, ApiError> {
    let chain = MouRenewalService::new(state.pool()).version_chain(mou_id).await?;
    Ok(ResponseJson(DataResponse::new(chain)))
}

/// POST /api/mou-renewals/initiate
///
/// Opens a renewal for an active MoU. Only one open renewal per MoU; a second
/// request gets 409 with the existing renewal's id.
pub async fn initiate_renewal(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiateRenewal>,
) -> Result<(StatusCode, ResponseJson<MessageResponse<MouRenewal>>), ApiError> {
    let renewal = MouRenewalService::new(state.pool())
        .initiate(payload, user.id)
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(MessageResponse {
            message: "Renewal initiated successfully".to_string(),
            data: renewal,
        }),
    ))
}

/// POST /api/mou-renewals/status
/// Move a renewal along the status machine; disallowed moves list the allowed targets.
pub async fn update_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<UpdateRenewalStatus>,
) -> Result<ResponseJson<MessageResponse<MouRenewal>>, ApiError> {
    let renewal = MouRenewalService::new(state.pool())
        .update_status(payload)
        .await?;
    Ok(ResponseJson(MessageResponse {
        message: format!("Renewal status updated to {}", renewal.renewal_status),
        data: renewal,
    }))
}

/// POST /api/mou-renewals/complete
///
/// Links a signed renewal to its successor MoU. The original MoU is marked
/// renewed and the successor's previous version points back at it.
pub async fn complete_renewal(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CompleteRenewal>,
) -> Result<ResponseJson<MessageResponse<MouRenewal>>, ApiError> {
    let renewal = MouRenewalService::new(state.pool()).complete(payload).await?;
    Ok(ResponseJson(MessageResponse {
        message: "Renewal completed successfully".to_string(),
        data: renewal,
    }))
}

/// POST /api/mou-renewals/negotiations
/// Record a negotiation round against an existing renewal.
pub async fn record_negotiation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateNegotiation>,
) -> Result<(StatusCode, ResponseJson<DataResponse<MouNegotiation>>), ApiError> {
    let negotiation = MouRenewalService::new(state.pool())
        .record_negotiation(payload, user.id)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(DataResponse::new(negotiation))))
}

/// POST /api/mou-renewals/acknowledge
/// Mark an alert acknowledged by the caller.
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AcknowledgeAlert>,
) -> Result<ResponseJson<MessageResponse<MouExpirationAlert>>, ApiError> {
    let alert = MouRenewalService::new(state.pool())
        .acknowledge_alert(payload.alert_id, user.id)
        .await?;
    Ok(ResponseJson(MessageResponse {
        message: "Alert acknowledged".to_string(),
        data: alert,
    }))
}

/// DELETE /api/mou-renewals/alerts/{id}
/// Dismiss an alert; the row is kept with status `dismissed`.
pub async fn dismiss_alert(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<MessageResponse<MouExpirationAlert>>, ApiError> {
    let alert = MouRenewalService::new(state.pool()).dismiss_alert(id).await?;
    Ok(ResponseJson(MessageResponse {
        message: "Alert dismissed".to_string(),
        data: alert,
    }))
}

/// POST /api/mou-renewals/process-alerts
/// Cron only.
pub async fn process_alerts(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<AlertRun>, ApiError> {
    user.require_cron()?;
    let run = MouRenewalService::new(state.pool()).process_alerts().await?;
    Ok(ResponseJson(run))
}

/// POST /api/mou-renewals/auto-expire
/// Cron only. Expires overdue MoUs and closes their open renewals.
pub async fn auto_expire(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<ResponseJson<ExpiryRun>, ApiError> {
    user.require_cron()?;
    let run = MouRenewalService::new(state.pool()).auto_expire().await?;
    Ok(ResponseJson(run))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/mou-renewals",
        Router::new()
            .route("/", get(list_renewals))
            .route("/expiring", get(expiring_mous))
            .route("/alerts", get(list_alerts))
            .route("/alerts/{id}", delete(dismiss_alert))
            .route("/initiate", post(initiate_renewal))
            .route("/status", post(update_status))
            .route("/complete", post(complete_renewal))
            .route("/negotiations", post(record_negotiation))
            .route("/acknowledge", post(acknowledge_alert))
            .route("/process-alerts", post(process_alerts))
            .route("/auto-expire", post(auto_expire))
            .route("/{id}", get(get_renewal))
            .route("/{id}/negotiations", get(list_negotiations))
            .route("/{id}/version-chain", get(version_chain)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_and_limit_defaults_and_clamps() {
        assert_eq!(page_and_limit(None, None), (1, DEFAULT_PAGE_LIMIT));
        assert_eq!(page_and_limit(Some(0), Some(500)), (1, MAX_PAGE_LIMIT));
        assert_eq!(page_and_limit(Some(3), Some(5)), (3, 5));
    }
}
