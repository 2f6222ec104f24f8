//! Admin API endpoints
//!
//! Every route here sits behind `require_auth` + `require_admin`.
//! - POST /api/v1/admin/forum/heat/refresh - recompute all heat scores

use axum::extract::State;

use crate::api::common::Json;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::HeatRefreshResponse;

pub async fn refresh_heat(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<HeatRefreshResponse>, ApiError> {
    let updated = state.post_service.refresh_all_heat(&user).await?;
    Ok(Json(HeatRefreshResponse { success: true, updated }))
}
