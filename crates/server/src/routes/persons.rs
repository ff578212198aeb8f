//! Person dossiers: profile CRUD plus the roles, affiliations and
//! person-to-person relationships that make up the network view.

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{delete, get, post},
};
use db::models::person::{
    CreatePersonAffiliation, CreatePersonRelationship, CreatePersonRole, PersonAffiliation,
    PersonFilter, PersonListItem, PersonRelationship, PersonRole,
};
use serde::Deserialize;
use services::services::persons::{CreatePerson, PersonDetail, PersonNetwork, PersonService, UpdatePerson};
use utils::response::{DataResponse, OffsetPagination, Paginated, SuccessResponse, clamp_limit};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{Json, Query},
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PersonListQuery {
    /// Case-insensitive match on the English or Arabic name.
    pub search: Option<String>,
    pub organization_id: Option<Uuid>,
    pub nationality_id: Option<Uuid>,
    pub importance_level: Option<i32>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
}

impl PersonListQuery {
    fn filter(&self) -> PersonFilter {
        PersonFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            organization_id: self.organization_id,
            nationality_id: self.nationality_id,
            importance_level: self.importance_level,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NetworkQuery {
    #[serde(default = "default_network_depth")]
    pub depth: i32,
}

fn default_network_depth() -> i32 {
    1
}

/// GET /api/persons
///
/// Active persons ordered by importance, then English name.
pub async fn list_persons(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PersonListQuery>,
) -> Result<ResponseJson<Paginated<PersonListItem, OffsetPagination>>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = query.offset.max(0);

    let (data, total) = PersonService::new(state.pool())
        .list(&query.filter(), limit, offset)
        .await?;
    Ok(ResponseJson(Paginated {
        data,
        pagination: OffsetPagination::new(total, limit, offset),
    }))
}

/// GET /api/persons/{id}
/// Profile with roles, affiliations and direct relationships.
pub async fn get_person(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<PersonDetail>, ApiError> {
    Ok(ResponseJson(PersonService::new(state.pool()).get(id).await?))
}

/// GET /api/persons/{id}/network
///
/// Graph of the person's relationships out to `depth` hops (clamped by the service).
pub async fn person_network(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<NetworkQuery>,
) -> Result<ResponseJson<PersonNetwork>, ApiError> {
    Ok(ResponseJson(
        PersonService::new(state.pool()).network(id, query.depth).await?,
    ))
}

/// POST /api/persons
/// Responds 201 with a `Location` header pointing at the new person.
pub async fn create_person(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePerson>,
) -> Result<Response, ApiError> {
    let created = PersonService::new(state.pool())
        .create(payload, user.id)
        .await?;
    let location = HeaderValue::from_str(&format!("/persons/{}", created.dossier.id))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        ResponseJson(created),
    )
        .into_response())
}

/// PATCH /api/persons/{id}
/// Partial update of the person and their dossier names.
pub async fn update_person(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePerson>,
) -> Result<ResponseJson<DataResponse<PersonListItem>>, ApiError> {
    let person = PersonService::new(state.pool()).update(id, payload).await?;
    Ok(ResponseJson(DataResponse::new(person)))
}

/// DELETE /api/persons/{id}
/// Soft delete; the dossier row is archived, never removed.
pub async fn archive_person(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    PersonService::new(state.pool()).archive(id).await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

/// POST /api/persons/{id}/roles
/// Add a role to a person.
pub async fn add_role(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreatePersonRole>,
) -> Result<(StatusCode, ResponseJson<DataResponse<PersonRole>>), ApiError> {
    let role = PersonService::new(state.pool()).add_role(id, &payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(DataResponse::new(role))))
}

/// DELETE /api/persons/{id}/roles/{role_id}
/// Remove a role from a person.
pub async fn remove_role(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    PersonService::new(state.pool()).remove_role(id, role_id).await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

/// POST /api/persons/{id}/affiliations
/// Link a person to an organization.
pub async fn add_affiliation(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreatePersonAffiliation>,
) -> Result<(StatusCode, ResponseJson<DataResponse<PersonAffiliation>>), ApiError> {
    let affiliation = PersonService::new(state.pool())
        .add_affiliation(id, &payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(DataResponse::new(affiliation))))
}

/// DELETE /api/persons/{id}/affiliations/{affiliation_id}
/// Remove an organization affiliation from a person.
pub async fn remove_affiliation(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((id, affiliation_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    PersonService::new(state.pool())
        .remove_affiliation(id, affiliation_id)
        .await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

/// POST /api/persons/{id}/relationships
/// Self-relationships are rejected; the other person must exist.
pub async fn add_relationship(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreatePersonRelationship>,
) -> Result<(StatusCode, ResponseJson<DataResponse<PersonRelationship>>), ApiError> {
    let relationship = PersonService::new(state.pool())
        .add_relationship(id, &payload, user.id)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(DataResponse::new(relationship))))
}

/// DELETE /api/persons/{id}/relationships/{relationship_id}
/// Remove a relationship between two persons.
pub async fn remove_relationship(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((id, relationship_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    PersonService::new(state.pool())
        .remove_relationship(id, relationship_id)
        .await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/persons",
        Router::new()
            .route("/", get(list_persons).post(create_person))
            .route(
                "/{id}",
                get(get_person).patch(update_person).delete(archive_person),
            )
            .route("/{id}/network", get(person_network))
            .route("/{id}/roles", post(add_role))
            .route("/{id}/roles/{role_id}", delete(remove_role))
            .route("/{id}/affiliations", post(add_affiliation))
            .route("/{id}/affiliations/{affiliation_id}", delete(remove_affiliation))
            .route("/{id}/relationships", post(add_relationship))
            .route("/{id}/relationships/{relationship_id}", delete(remove_relationship)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_dropped_from_filter() {
        let query = PersonListQuery {
            search: Some("   ".to_string()),
            importance_level: Some(4),
            ..Default::default()
        };
        let filter = query.filter();
        assert_eq!(filter.search, None);
        assert_eq!(filter.importance_level, Some(4));

        let query = PersonListQuery { search: Some(" Amira ".to_string()), ..Default::default() };
        assert_eq!(query.filter().search.as_deref(), Some("Amira"));
    }
}
