//! Response bodies shared by every API surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Body of the uniform bilingual error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ErrorBody {
    pub code: String,
    pub message_en: String,
    pub message_ar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub details: Option<Value>,
}

/// `{ "error": { code, message_en, message_ar, details? } }`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message_en: impl Into<String>,
        message_ar: impl Into<String>,
        details: Option<Value>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message_en: message_en.into(),
                message_ar: message_ar.into(),
                details,
            },
        }
    }
}

/// `{ "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{ "message": ..., "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MessageResponse<T> {
    pub message: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Offset based pagination block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct OffsetPagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl OffsetPagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        }
    }
}

/// Page based pagination block, as used by the renewal listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PagePagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl PagePagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total_pages(total, limit),
        }
    }
}

/// `{ "data": [...], "pagination": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Paginated<T, P> {
    pub data: Vec<T>,
    pub pagination: P,
}

/// Ceiling division that tolerates a zero page size.
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

/// Clamp a caller supplied page size into `1..=max`, falling back to `default`.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    match requested {
        Some(n) if n > 0 => n.min(max),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_omits_missing_details() {
        let body = ErrorEnvelope::new("NOT_FOUND", "Not found", "غير موجود", None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_offset_pagination_has_more() {
        assert!(OffsetPagination::new(120, 50, 50).has_more);
        assert!(!OffsetPagination::new(100, 50, 50).has_more);
        assert!(!OffsetPagination::new(100, 50, i64::MAX).has_more);
    }

    #[test]
    fn test_page_pagination_serializes_total_pages_camel_case() {
        let json = serde_json::to_value(PagePagination::new(1, 20, 41)).unwrap();
        assert_eq!(json["totalPages"], 3);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(500), 20, 100), 100);
        assert_eq!(clamp_limit(Some(0), 20, 100), 20);
        assert_eq!(clamp_limit(Some(7), 20, 100), 7);
    }
}
