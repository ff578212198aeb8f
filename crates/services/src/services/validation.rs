//! Field level validation failures carried in both languages.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, TS)]
#[error("{field}: {message_en}")]
pub struct ValidationError {
    pub field: String,
    pub message_en: String,
    pub message_ar: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        message_en: impl Into<String>,
        message_ar: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message_en: message_en.into(),
            message_ar: message_ar.into(),
        }
    }

    /// "`field` is required" in both languages.
    pub fn required(field: &str) -> Self {
        Self::new(
            field,
            format!("{field} is required"),
            format!("الحقل {field} مطلوب"),
        )
    }
}

/// Trimmed, non-empty text or a `required` error for `field`.
pub fn required_text(value: Option<&str>, field: &str) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::required(field)),
    }
}

/// `Some(value)` or a `required` error for `field`.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::required(field))
}

/// Row offset of a 1-based `page`; pages past the addressable range are rejected.
pub fn page_offset(page: i64, limit: i64) -> Result<i64, ValidationError> {
    (page.max(1) - 1).checked_mul(limit).ok_or_else(|| {
        ValidationError::new(
            "page",
            format!("Page {page} is out of range"),
            format!("رقم الصفحة {page} خارج النطاق"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset_bounds() {
        assert_eq!(page_offset(1, 20).unwrap(), 0);
        assert_eq!(page_offset(3, 25).unwrap(), 50);
        assert_eq!(page_offset(0, 20).unwrap(), 0);
        assert_eq!(page_offset(i64::MAX, 20).unwrap_err().field, "page");
        assert_eq!(page_offset(i64::MAX, 1).unwrap(), i64::MAX - 1);
    }

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text(Some("  hi "), "name").unwrap(), "hi");
        let err = required_text(Some("   "), "name").unwrap_err();
        assert_eq!(err.field, "name");
        assert!(required_text(None, "name").is_err());
    }
}
