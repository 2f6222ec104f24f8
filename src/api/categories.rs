//! Category API endpoints
//!
//! - GET /api/v1/categories

use axum::extract::State;

use crate::api::common::Json;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::CategoryResponse;

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.category_service.list().await?;
    Ok(Json(categories.into_iter().map(CategoryResponse::from).collect()))
}
