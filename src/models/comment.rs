//! Forum comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on a post. Replies point at a parent comment of the same post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// UUID v4 string
    pub id: String,
    pub post_id: String,
    pub author_id: i64,
    /// Author display name, joined from `users`
    pub author_name: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub is_anonymous: bool,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Input for adding a comment
#[derive(Debug, Clone, Default)]
pub struct CreateCommentInput {
    pub content: String,
    pub parent_id: Option<String>,
    pub is_anonymous: bool,
}

/// A top-level comment with every reply beneath it, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Counters returned after a comment was added or removed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommentMutation {
    /// Comments removed (1 + descendants) or added (1)
    pub affected: i64,
    pub comment_count: i64,
    pub heat_score: f64,
}

/// Outcome of inserting a comment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommentInsert {
    Added(CommentMutation),
    PostNotFound,
    ParentNotFound,
    /// The parent comment belongs to another post
    ParentOnOtherPost,
}

/// Result of a comment like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommentLikeOutcome {
    pub active: bool,
    pub like_count: i64,
}
