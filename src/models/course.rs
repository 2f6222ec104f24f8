//! Course model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course; its forum posts are scoped to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    /// Catalogue code, e.g. `CS101` (unique)
    pub code: String,
    pub name: String,
    pub description: String,
    pub teacher_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a course
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
