//! Forum comment API endpoints
//!
//! - GET/POST /api/v1/forum/posts/{id}/comments
//! - DELETE /api/v1/forum/comments/{id}
//! - POST /api/v1/forum/comments/{id}/like

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::api::common::{Json, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{
    CommentMutationResponse, CommentResponse, CommentThreadResponse, PageResponse, ToggleResponse,
};
use crate::models::CreateCommentInput;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(post_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<CommentThreadResponse>>, ApiError> {
    let viewer = viewer.map(|v| v.0);
    let page = state.comment_service.list(&post_id, &query.params()).await?;
    Ok(Json(PageResponse::new(page, |t| {
        CommentThreadResponse::new(t, viewer.as_ref())
    })))
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(post_id): Path<String>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateCommentInput {
        content: body.content,
        parent_id: body.parent_id,
        is_anonymous: body.is_anonymous,
    };
    let (comment, mutation) = state.comment_service.add(&post_id, &user, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentMutationResponse::added(
            CommentResponse::new(comment, Some(&user)),
            mutation,
        )),
    ))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<CommentMutationResponse>, ApiError> {
    let mutation = state.comment_service.delete(&id, &user).await?;
    Ok(Json(CommentMutationResponse::deleted(mutation)))
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let outcome = state.comment_service.toggle_like(&id, &user).await?;
    Ok(Json(ToggleResponse::comment_like(outcome)))
}
