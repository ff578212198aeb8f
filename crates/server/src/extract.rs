//! Request extractors whose rejections use the bilingual error envelope.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// `axum::Json` with rejections mapped to 400/413/415 envelopes.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

/// `axum::extract::Query`; a missing or malformed parameter is a 400 `VALIDATION_ERROR`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequestParts, http::Request};
    use serde::Deserialize;
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Listing {
        entity_id: Uuid,
        limit: Option<i64>,
        #[serde(default)]
        archived: bool,
    }

    async fn extract(uri: &str) -> Result<Listing, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Query::<Listing>::from_request_parts(&mut parts, &())
            .await
            .map(|Query(q)| q)
    }

    #[tokio::test]
    async fn test_query_deserializes_typed_fields() {
        let id = Uuid::new_v4();
        let q = extract(&format!("/x?entity_id={id}&limit=5&archived=true")).await.unwrap();
        assert_eq!(q.entity_id, id);
        assert_eq!(q.limit, Some(5));
        assert!(q.archived);

        let q = extract(&format!("/x?entity_id={id}")).await.unwrap();
        assert_eq!(q.limit, None);
        assert!(!q.archived);
    }

    #[tokio::test]
    async fn test_query_rejections_are_validation_errors() {
        for uri in ["/x?limit=5", "/x?entity_id=nope", "/x?entity_id=00000000-0000-0000-0000-000000000000&limit=abc"] {
            let err = extract(uri).await.unwrap_err();
            assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST, "{uri}");
            assert!(
                matches!(err, ApiError::BadRequest { code: "VALIDATION_ERROR", .. }),
                "{uri}: {err:?}"
            );
        }
    }
}
