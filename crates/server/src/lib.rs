pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub use state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Allow-listed origins when configured, otherwise any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::IF_NONE_MATCH,
        ])
        .expose_headers([header::ETAG, header::LOCATION, header::RETRY_AFTER])
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    Router::new()
        .nest("/api", routes::api_router(&state))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use db::DBService;
    use http_body_util::BodyExt;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use utils::jwt::{Claims, encode_token};
    use uuid::Uuid;

    use super::*;

    const SECRET: &str = "router-test-secret";

    fn app() -> Router {
        let db = DBService::new_lazy("postgres://localhost/diplomatic_test", 1).unwrap();
        let state = AppState::new(db, SecretString::from(SECRET.to_string()), None, None);
        build_router(state, &[])
    }

    fn token() -> String {
        let claims = Claims::new(Uuid::new_v4(), Some("user".to_string()), 3600);
        encode_token(&claims, SECRET.as_bytes()).unwrap()
    }

    fn post_json(uri: &str, body: Value, auth: bool) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token()));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let response = app()
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_event_validation_runs_before_storage() {
        let response = app()
            .oneshot(post_json(
                "/api/events",
                json!({ "title_en": "Summit", "title_ar": "قمة", "type": "meeting" }),
                true,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "start_datetime");
    }

    #[tokio::test]
    async fn test_unknown_agenda_action() {
        let response = app()
            .oneshot(post_json("/api/meeting-agendas", json!({ "action": "teleport" }), true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_ACTION");
    }

    #[tokio::test]
    async fn test_malformed_json_body() {
        let request = Request::post("/api/timeline")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token()))
            .body(Body::from("{not json"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_JSON");
    }

    fn get_authed(uri: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token()))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_query_values_are_rejected() {
        for uri in [
            "/api/persons?limit=abc",
            "/api/events?type=party",
            "/api/events?date_from=March",
            "/api/watchlist?priority=extreme",
            "/api/mou-renewals?status=unknown",
            "/api/mou-renewals/expiring?include_expired=maybe",
        ] {
            let response = app().oneshot(get_authed(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_missing_entity_reference_names_the_field() {
        let entity_id = Uuid::new_v4();
        let response = app()
            .oneshot(get_authed(&format!("/api/entity-comments?entity_id={entity_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["details"]["field"], "entity_type");

        let response = app()
            .oneshot(get_authed("/api/watchlist/check?entity_type=person"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["details"]["field"], "entity_id");
    }

    #[tokio::test]
    async fn test_cron_routes_reject_regular_users() {
        let response = app()
            .oneshot(post_json("/api/mou-renewals/process-alerts", json!({}), true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
