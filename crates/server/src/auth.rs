//! Bearer-token authentication for every `/api` route except health.

use axum::{extract::FromRequestParts, http::{header, request::Parts}};
use utils::jwt::{Claims, bearer_token, decode_token};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const CRON_ROLES: &[&str] = &["admin", "service_role"];

/// The caller, taken from a verified HS256 token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role.unwrap_or_else(|| "user".to_string()),
        }
    }
}

impl AuthUser {
    /// Scheduled jobs may only be triggered by admins or the service role.
    pub fn require_cron(&self) -> Result<(), ApiError> {
        if CRON_ROLES.contains(&self.role.as_str()) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header).map_err(|e| ApiError::Unauthorized(e.to_string()))?;
        let claims = decode_token(token, state.jwt_secret()).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::Unauthorized(e.to_string())
        })?;
        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<&str>) -> AuthUser {
        Claims::new(Uuid::new_v4(), role.map(str::to_string), 60).into()
    }

    #[test]
    fn test_role_defaults_to_user() {
        assert_eq!(user(None).role, "user");
    }

    #[test]
    fn test_cron_roles() {
        assert!(user(Some("admin")).require_cron().is_ok());
        assert!(user(Some("service_role")).require_cron().is_ok());
        assert!(matches!(user(Some("user")).require_cron(), Err(ApiError::Forbidden)));
    }
}
