use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use db::models::mou_renewal::RenewalStatus;
use serde_json::{Value, json};
use services::services::{
    ai_summary::AiSummaryError, comments::CommentError, events::EventError,
    meeting_agenda::AgendaError, mou_renewal::MouRenewalError, persons::PersonError,
    timeline::TimelineError, validation::ValidationError, waiting_queue::WaitingQueueError,
    watchlist::WatchlistError,
};
use thiserror::Error;
use utils::response::ErrorEnvelope;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{code}: {message_en}")]
    BadRequest {
        code: &'static str,
        message_en: String,
        message_ar: String,
        details: Option<Value>,
    },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden")]
    Forbidden,
    #[error("{message_en}")]
    NotFound {
        message_en: &'static str,
        message_ar: &'static str,
    },
    #[error("{message_en}")]
    Conflict {
        code: &'static str,
        message_en: String,
        message_ar: String,
        details: Option<Value>,
    },
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("service unavailable: {message_en}")]
    Unavailable {
        code: &'static str,
        message_en: String,
        message_ar: String,
        details: Option<Value>,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message_en: &'static str, message_ar: &'static str) -> Self {
        Self::NotFound { message_en, message_ar }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(self) -> ErrorEnvelope {
        match self {
            Self::Validation(e) => ErrorEnvelope::new(
                "VALIDATION_ERROR",
                e.message_en,
                e.message_ar,
                Some(json!({ "field": e.field })),
            ),
            Self::BadRequest { code, message_en, message_ar, details }
            | Self::Conflict { code, message_en, message_ar, details }
            | Self::Unavailable { code, message_en, message_ar, details } => {
                ErrorEnvelope::new(code, message_en, message_ar, details)
            }
            Self::Unauthorized(reason) => ErrorEnvelope::new(
                "UNAUTHORIZED",
                "Authentication required",
                "المصادقة مطلوبة",
                Some(json!({ "reason": reason })),
            ),
            Self::Forbidden => ErrorEnvelope::new(
                "FORBIDDEN",
                "You do not have permission to perform this action",
                "ليس لديك صلاحية لتنفيذ هذا الإجراء",
                None,
            ),
            Self::NotFound { message_en, message_ar } => {
                ErrorEnvelope::new("NOT_FOUND", message_en, message_ar, None)
            }
            Self::RateLimited { retry_after_secs } => ErrorEnvelope::new(
                "RATE_LIMIT",
                "Too many requests, please slow down",
                "طلبات كثيرة جدًا، يرجى التمهل",
                Some(json!({ "retry_after": retry_after_secs })),
            ),
            Self::UnsupportedMediaType => ErrorEnvelope::new(
                "UNSUPPORTED_MEDIA_TYPE",
                "Content-Type must be application/json",
                "يجب أن يكون نوع المحتوى application/json",
                None,
            ),
            Self::PayloadTooLarge => ErrorEnvelope::new(
                "PAYLOAD_TOO_LARGE",
                "Request body is too large",
                "حجم الطلب كبير جدًا",
                None,
            ),
            err @ (Self::Database(_) | Self::Internal(_)) => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, error = %err, "request failed");
                ErrorEnvelope::new(
                    "INTERNAL_ERROR",
                    "An unexpected error occurred",
                    "حدث خطأ غير متوقع",
                    Some(json!({ "correlation_id": correlation_id })),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            Self::RateLimited { retry_after_secs } => HeaderValue::from_str(&retry_after_secs.to_string()).ok(),
            _ => None,
        };
        let mut response = (status, Json(self.envelope())).into_response();
        if let Some(value) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::UNSUPPORTED_MEDIA_TYPE => Self::UnsupportedMediaType,
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge,
            _ => Self::BadRequest {
                code: "INVALID_JSON",
                message_en: rejection.body_text(),
                message_ar: "نص الطلب ليس JSON صالحًا".to_string(),
                details: None,
            },
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            code: "VALIDATION_ERROR",
            message_en: rejection.body_text(),
            message_ar: "معاملات الاستعلام غير صالحة".to_string(),
            details: None,
        }
    }
}

impl From<MouRenewalError> for ApiError {
    fn from(err: MouRenewalError) -> Self {
        match err {
            MouRenewalError::Database(e) => Self::Database(e),
            MouRenewalError::Validation(e) => Self::Validation(e),
            MouRenewalError::MouNotFound => Self::not_found("MoU not found", "مذكرة التفاهم غير موجودة"),
            MouRenewalError::RenewalNotFound => Self::not_found("Renewal not found", "التجديد غير موجود"),
            MouRenewalError::AlertNotFound => Self::not_found("Alert not found", "التنبيه غير موجود"),
            MouRenewalError::MouNotActive(state) => Self::BadRequest {
                code: "INVALID_STATE",
                message_en: format!("Only active MoUs can be renewed (current state: {state})"),
                message_ar: "يمكن تجديد مذكرات التفاهم السارية فقط".to_string(),
                details: Some(json!({ "workflow_state": state })),
            },
            MouRenewalError::RenewalAlreadyOpen(existing) => Self::Conflict {
                code: "RENEWAL_EXISTS",
                message_en: "An active renewal already exists for this MoU".to_string(),
                message_ar: "يوجد تجديد نشط بالفعل لمذكرة التفاهم هذه".to_string(),
                details: Some(json!({ "existing_renewal_id": existing })),
            },
            MouRenewalError::InvalidTransition { from, to, allowed } => Self::BadRequest {
                code: "INVALID_TRANSITION",
                message_en: format!("Cannot transition from {from} to {to}"),
                message_ar: format!("لا يمكن الانتقال من {from} إلى {to}"),
                details: Some(json!({
                    "current_status": from,
                    "requested_status": to,
                    "allowed_transitions": allowed,
                })),
            },
            MouRenewalError::NotSigned(status) => Self::BadRequest {
                code: "INVALID_STATE",
                message_en: format!("Renewal must be signed before completion (current status: {status})"),
                message_ar: "يجب توقيع التجديد قبل إكماله".to_string(),
                details: Some(json!({ "required_status": RenewalStatus::Signed, "current_status": status })),
            },
        }
    }
}

impl From<TimelineError> for ApiError {
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::Database(e) => Self::Database(e),
            TimelineError::Validation(e) => Self::Validation(e),
        }
    }
}

impl From<WaitingQueueError> for ApiError {
    fn from(err: WaitingQueueError) -> Self {
        match err {
            WaitingQueueError::Database(e) => Self::Database(e),
            WaitingQueueError::Validation(e) => Self::Validation(e),
        }
    }
}

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::Database(e) => Self::Database(e),
            CommentError::Validation(e) => Self::Validation(e),
            CommentError::NotFound => Self::not_found("Comment not found", "التعليق غير موجود"),
            CommentError::ParentNotFound => {
                Self::not_found("Parent comment not found", "التعليق الأصلي غير موجود")
            }
            CommentError::NotAuthor(_) => Self::Forbidden,
            CommentError::RateLimited { retry_after_secs } => Self::RateLimited {
                retry_after_secs: retry_after_secs.max(0) as u64,
            },
            CommentError::InvalidReaction(emoji) => Self::BadRequest {
                code: "INVALID_REACTION",
                message_en: format!("Emoji {emoji} is not an allowed reaction"),
                message_ar: "هذا الرمز التعبيري غير مسموح به".to_string(),
                details: None,
            },
        }
    }
}

impl From<WatchlistError> for ApiError {
    fn from(err: WatchlistError) -> Self {
        match err {
            WatchlistError::Database(e) => Self::Database(e),
            WatchlistError::Validation(e) => Self::Validation(e),
            WatchlistError::NotFound => Self::not_found("Watch not found", "عنصر المتابعة غير موجود"),
            WatchlistError::TemplateNotFound => Self::not_found("Template not found", "القالب غير موجود"),
            WatchlistError::AlreadyWatched => Self::Conflict {
                code: "ALREADY_WATCHED",
                message_en: "This entity is already on your watchlist".to_string(),
                message_ar: "هذا الكيان موجود بالفعل في قائمة المتابعة".to_string(),
                details: None,
            },
        }
    }
}

impl From<PersonError> for ApiError {
    fn from(err: PersonError) -> Self {
        match err {
            PersonError::Database(e) => Self::Database(e),
            PersonError::Validation(e) => Self::Validation(e),
            PersonError::NotFound => Self::not_found("Person not found", "الشخص غير موجود"),
            PersonError::ChildNotFound(_) => Self::not_found("Record not found", "السجل غير موجود"),
        }
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Database(e) => Self::Database(e),
            EventError::Validation(e) => Self::Validation(e),
            EventError::NotFound => Self::not_found("Event not found", "الفعالية غير موجودة"),
        }
    }
}

impl From<AgendaError> for ApiError {
    fn from(err: AgendaError) -> Self {
        match err {
            AgendaError::Database(e) => Self::Database(e),
            AgendaError::Validation(e) => Self::Validation(e),
            AgendaError::NotFound(_) => Self::not_found("Agenda record not found", "سجل جدول الأعمال غير موجود"),
            AgendaError::UnknownAction(action) => Self::BadRequest {
                code: "INVALID_ACTION",
                message_en: format!("Unknown action: {action}"),
                message_ar: format!("إجراء غير معروف: {action}"),
                details: None,
            },
            AgendaError::Serialize(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<AiSummaryError> for ApiError {
    fn from(err: AiSummaryError) -> Self {
        match err {
            AiSummaryError::Database(e) => Self::Database(e),
            AiSummaryError::Validation(e) => Self::Validation(e),
            AiSummaryError::Timeline(e) => e.into(),
            AiSummaryError::NotFound => {
                Self::not_found("Entity not found or access denied", "الكيان غير موجود أو الوصول مرفوض")
            }
            AiSummaryError::Unavailable { reason, fallback } => Self::Unavailable {
                code: "AI_UNAVAILABLE",
                message_en: "AI summary generation is unavailable".to_string(),
                message_ar: "خدمة إنشاء الملخص بالذكاء الاصطناعي غير متاحة".to_string(),
                details: Some(json!({ "reason": reason, "fallback": fallback })),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_envelope() {
        let response = ApiError::from(ValidationError::required("mou_id")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "mou_id");
        assert!(body["error"]["message_ar"].as_str().unwrap().contains("mou_id"));
    }

    #[tokio::test]
    async fn test_internal_error_carries_correlation_id() {
        let response = ApiError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        let id = body["error"]["details"]["correlation_id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_transition_lists_allowed() {
        let err = MouRenewalError::InvalidTransition {
            from: RenewalStatus::Initiated,
            to: RenewalStatus::Signed,
            allowed: &[RenewalStatus::Negotiation, RenewalStatus::Declined],
        };
        let body = body_json(ApiError::from(err).into_response()).await;
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
        assert_eq!(body["error"]["details"]["allowed_transitions"], json!(["negotiation", "declined"]));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_unknown_agenda_action_is_bad_request() {
        let err: ApiError = AgendaError::UnknownAction("explode".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
