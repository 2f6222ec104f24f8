//! Common API utilities and shared types
//!
//! Query parameters arrive as raw strings so that malformed values fall back
//! to defaults instead of rejecting the request. Request bodies go through
//! [`Json`], which reports decoding failures in the API error format.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;
use crate::models::{FeedQuery, FeedScope, FeedSort, ListParams};

/// [`axum::Json`] whose rejection is a `VALIDATION_ERROR` payload
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "expected an application/json body".to_string(),
            other => other.body_text(),
        };
        tracing::debug!("Rejected request body: {}", rejection);
        ApiError::validation_error("body", message)
    }
}

/// `?page=` on paginated endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn params(&self) -> ListParams {
        ListParams::from_param(self.page.as_deref())
    }
}

/// Feed query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

impl FeedParams {
    pub fn into_query(self, scope: FeedScope) -> FeedQuery {
        let mut query = FeedQuery::new(scope).sort(FeedSort::from_param(self.sort.as_deref()));
        query.params = ListParams::from_param(self.page.as_deref());
        if let Some(keyword) = self.keyword {
            query = query.keyword(keyword);
        }
        if let Some(category_id) = self.category.and_then(|c| c.trim().parse::<i64>().ok()) {
            query = query.category(category_id);
        }
        query
    }
}
