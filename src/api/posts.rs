//! Forum post API endpoints
//!
//! - GET /api/v1/forum/posts - global feed
//! - POST /api/v1/forum/posts
//! - GET/PUT/DELETE /api/v1/forum/posts/{id}
//! - POST /api/v1/forum/posts/{id}/like
//! - POST /api/v1/forum/posts/{id}/collect
//! - POST /api/v1/forum/posts/{id}/bounty
//! - GET /api/v1/forum/collections

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::api::common::{FeedParams, Json, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{CreatedResponse, PageResponse, PostDetailResponse, PostResponse, ToggleResponse};
use crate::models::{CreatePostInput, FeedScope, UpdatePostInput};

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub course_id: Option<i64>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl From<CreatePostRequest> for CreatePostInput {
    fn from(req: CreatePostRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            course_id: req.course_id,
            category_id: req.category_id,
            tags: req.tags,
            is_anonymous: req.is_anonymous,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub tags: Option<String>,
    pub is_anonymous: Option<bool>,
}

impl From<UpdatePostRequest> for UpdatePostInput {
    fn from(req: UpdatePostRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            category_id: req.category_id,
            tags: req.tags,
            is_anonymous: req.is_anonymous,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BountyRequest {
    pub amount: i64,
}

pub async fn global_feed(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Query(params): Query<FeedParams>,
) -> Result<Json<PageResponse<PostResponse>>, ApiError> {
    let viewer = viewer.map(|v| v.0);
    let page = state.post_service.feed(&params.into_query(FeedScope::Global)).await?;
    Ok(Json(PageResponse::new(page, |p| PostResponse::new(p, viewer.as_ref()))))
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.post_service.create(&user, body.into()).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: post.id })))
}

pub async fn get_post(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let viewer = viewer.map(|v| v.0);
    let detail = state.post_service.get(&id, viewer.as_ref()).await?;
    Ok(Json(PostDetailResponse::new(detail, viewer.as_ref())))
}

pub async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state.post_service.update(&id, &user, body.into()).await?;
    Ok(Json(PostResponse::new(post, Some(&user))))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(&id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let outcome = state.post_service.toggle_like(&id, &user).await?;
    Ok(Json(ToggleResponse::like(outcome)))
}

pub async fn toggle_collect(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let outcome = state.post_service.toggle_collect(&id, &user).await?;
    Ok(Json(ToggleResponse::collect(outcome)))
}

pub async fn set_bounty(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<BountyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.post_service.set_bounty(&id, &user, body.amount).await?;
    Ok(Json(serde_json::json!({ "success": true, "amount": body.amount })))
}

pub async fn list_collections(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<PostResponse>>, ApiError> {
    let page = state.post_service.list_collected(&user, &query.params()).await?;
    Ok(Json(PageResponse::new(page, |p| PostResponse::new(p, Some(&user)))))
}
