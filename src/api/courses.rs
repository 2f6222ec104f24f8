//! Course API endpoints
//!
//! - GET /api/v1/courses
//! - POST /api/v1/courses (teacher or admin)
//! - GET /api/v1/courses/{id}
//! - GET /api/v1/courses/{id}/posts - course feed

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::api::common::{FeedParams, Json};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{CourseResponse, PageResponse, PostResponse};
use crate::models::{CreateCourseInput, FeedScope};

pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let courses = state.course_service.list().await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

pub async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCourseInput>,
) -> Result<impl IntoResponse, ApiError> {
    let course = state.course_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CourseResponse>, ApiError> {
    Ok(Json(state.course_service.get(id).await?.into()))
}

pub async fn course_feed(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
    Query(params): Query<FeedParams>,
) -> Result<Json<PageResponse<PostResponse>>, ApiError> {
    let viewer = viewer.map(|v| v.0);
    let page = state
        .post_service
        .feed(&params.into_query(FeedScope::Course(id)))
        .await?;
    Ok(Json(PageResponse::new(page, |p| PostResponse::new(p, viewer.as_ref()))))
}
