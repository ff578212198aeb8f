//! Threaded comments attachable to any dossier-like entity, with
//! reactions and `@mention` autocomplete.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::{
    comment::{CommentEntityType, CommentWithAuthor},
    user::UserSummary,
};
use serde::{Deserialize, Serialize};
use services::services::{
    comments::{
        CommentListing, CommentNode, CommentService, CreateComment, MAX_THREAD_DEPTH, ReactionAction,
        UpdateComment,
    },
    validation::required,
};
use ts_rs::TS;
use utils::response::{SuccessResponse, clamp_limit};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{Json, Query},
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;
const DEFAULT_SEARCH_LIMIT: i64 = 10;
const MAX_SEARCH_LIMIT: i64 = 20;

#[derive(Debug, Serialize, TS)]
pub struct CommentResponse {
    pub comment: CommentWithAuthor,
}

#[derive(Debug, Serialize, TS)]
pub struct ThreadResponse {
    pub thread: CommentNode,
}

#[derive(Debug, Serialize, TS)]
pub struct ReactionResponse {
    pub action: ReactionAction,
}

#[derive(Debug, Serialize, TS)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Deserialize, TS)]
pub struct ToggleReaction {
    pub emoji: Option<String>,
}

/// `entity_type`/`entity_id` are optional here only so a missing one is
/// reported as a field error.
#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub entity_type: Option<CommentEntityType>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_include_replies")]
    pub include_replies: bool,
}

fn default_include_replies() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub max_depth: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

/// GET /api/entity-comments
///
/// Top-level comments for one entity, newest first. Replies are nested under
/// their parents unless `include_replies=false`.
pub async fn list_comments(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<CommentListQuery>,
) -> Result<ResponseJson<CommentListing>, ApiError> {
    let entity_type = required(query.entity_type, "entity_type")?;
    let entity_id = required(query.entity_id, "entity_id")?;
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = query.offset.max(0);

    let listing = CommentService::new(state.pool())
        .list(entity_type, entity_id, limit, offset, query.include_replies)
        .await?;
    Ok(ResponseJson(listing))
}

/// POST /api/entity-comments
/// Rate limited per author and entity; mentions in the body notify the mentioned users.
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, ResponseJson<CommentResponse>), ApiError> {
    let comment = CommentService::new(state.pool())
        .create(user.id, payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(CommentResponse { comment })))
}

/// PATCH /api/entity-comments/{id}
/// Author only; a new body is re-rendered and its mentions re-synced.
pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateComment>,
) -> Result<ResponseJson<CommentResponse>, ApiError> {
    let comment = CommentService::new(state.pool())
        .update(id, user.id, payload)
        .await?;
    Ok(ResponseJson(CommentResponse { comment }))
}

/// DELETE /api/entity-comments/{id}
/// Author only.
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<SuccessResponse>, ApiError> {
    CommentService::new(state.pool()).delete(id, user.id).await?;
    Ok(ResponseJson(SuccessResponse::ok()))
}

/// GET /api/entity-comments/{id}/thread
///
/// The comment and its replies as a tree, cut off at `max_depth` levels.
pub async fn comment_thread(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<ResponseJson<ThreadResponse>, ApiError> {
    let max_depth = query.max_depth.unwrap_or(MAX_THREAD_DEPTH);
    let thread = CommentService::new(state.pool())
        .thread(id, max_depth)
        .await?;
    Ok(ResponseJson(ThreadResponse { thread }))
}

/// POST /api/entity-comments/{id}/reactions
/// Toggles; 201 when the reaction was added, 200 when removed.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleReaction>,
) -> Result<(StatusCode, ResponseJson<ReactionResponse>), ApiError> {
    let emoji = payload.emoji.unwrap_or_default();
    let action = CommentService::new(state.pool())
        .toggle_reaction(id, user.id, emoji.trim())
        .await?;
    let status = match action {
        ReactionAction::Added => StatusCode::CREATED,
        ReactionAction::Removed => StatusCode::OK,
    };
    Ok((status, ResponseJson(ReactionResponse { action })))
}

/// GET /api/entity-comments/users/search
/// Prefix match on username or full name, for `@mention` autocomplete.
pub async fn search_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<ResponseJson<UsersResponse>, ApiError> {
    let limit = clamp_limit(query.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);
    let users = CommentService::new(state.pool())
        .search_users(&query.q, limit)
        .await?;
    Ok(ResponseJson(UsersResponse { users }))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/entity-comments",
        Router::new()
            .route("/", get(list_comments).post(create_comment))
            .route("/users/search", get(search_users))
            .route("/{id}", patch(update_comment).delete(delete_comment))
            .route("/{id}/thread", get(comment_thread))
            .route("/{id}/reactions", post(toggle_reaction)),
    )
}
