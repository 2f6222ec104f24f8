//! Shared API response types
//!
//! Response bodies are built here rather than serialising models directly,
//! so anonymity masking and timestamp formatting happen in one place.

use serde::{Deserialize, Serialize};

use crate::models::{
    Comment, CommentLikeOutcome, CommentMutation, CommentThread, ContentCategory, Course, PagedResult, Post,
    ToggleOutcome, User,
};
use crate::services::PostDetail;

/// Display name shown in place of an anonymous author
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Whether `viewer` gets to see who wrote anonymous content by `author_id`
fn reveals_author(is_anonymous: bool, author_id: i64, viewer: Option<&User>) -> bool {
    !is_anonymous || viewer.is_some_and(|v| v.id == author_id)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

// ============================================================================
// Courses and categories
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseResponse {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub teacher_id: i64,
    pub created_at: String,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            code: course.code,
            name: course.name,
            description: course.description,
            teacher_id: course.teacher_id,
            created_at: course.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub kind: String,
    pub name: String,
}

impl From<ContentCategory> for CategoryResponse {
    fn from(category: ContentCategory) -> Self {
        Self {
            id: category.id,
            kind: category.kind.to_string(),
            name: category.name,
        }
    }
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    /// Hidden for anonymous posts unless the viewer wrote them
    pub author_id: Option<i64>,
    pub author_name: String,
    pub course_id: Option<i64>,
    pub category_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_anonymous: bool,
    pub like_count: i64,
    pub collect_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub heat_score: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResponse {
    pub fn new(post: Post, viewer: Option<&User>) -> Self {
        let revealed = reveals_author(post.is_anonymous, post.author_id, viewer);
        let tags = post.tag_list().into_iter().map(String::from).collect();
        Self {
            id: post.id,
            author_id: revealed.then_some(post.author_id),
            author_name: if revealed {
                post.author_name
            } else {
                ANONYMOUS_NAME.to_string()
            },
            course_id: post.course_id,
            category_id: post.category_id,
            title: post.title,
            content: post.content,
            tags,
            is_anonymous: post.is_anonymous,
            like_count: post.like_count,
            collect_count: post.collect_count,
            comment_count: post.comment_count,
            view_count: post.view_count,
            heat_score: post.heat_score,
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: PostResponse,
    pub has_liked: bool,
    pub has_collected: bool,
    pub comments: PageResponse<CommentThreadResponse>,
}

impl PostDetailResponse {
    pub fn new(detail: PostDetail, viewer: Option<&User>) -> Self {
        Self {
            post: PostResponse::new(detail.post, viewer),
            has_liked: detail.has_liked,
            has_collected: detail.has_collected,
            comments: PageResponse::new(detail.comments, |t| CommentThreadResponse::new(t, viewer)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: String,
    pub content: String,
    pub is_anonymous: bool,
    pub like_count: i64,
    pub created_at: String,
}

impl CommentResponse {
    pub fn new(comment: Comment, viewer: Option<&User>) -> Self {
        let revealed = reveals_author(comment.is_anonymous, comment.author_id, viewer);
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author_id: revealed.then_some(comment.author_id),
            author_name: if revealed {
                comment.author_name
            } else {
                ANONYMOUS_NAME.to_string()
            },
            content: comment.content,
            is_anonymous: comment.is_anonymous,
            like_count: comment.like_count,
            created_at: comment.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentThreadResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub replies: Vec<CommentResponse>,
}

impl CommentThreadResponse {
    pub fn new(thread: CommentThread, viewer: Option<&User>) -> Self {
        Self {
            comment: CommentResponse::new(thread.comment, viewer),
            replies: thread
                .replies
                .into_iter()
                .map(|r| CommentResponse::new(r, viewer))
                .collect(),
        }
    }
}

/// Counters after a comment was added or deleted
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentMutationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentResponse>,
    /// Comments removed, 1 + descendants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<i64>,
    pub comment_count: i64,
    pub heat_score: f64,
}

impl CommentMutationResponse {
    pub fn added(comment: CommentResponse, mutation: CommentMutation) -> Self {
        Self {
            success: true,
            comment: Some(comment),
            removed: None,
            comment_count: mutation.comment_count,
            heat_score: mutation.heat_score,
        }
    }

    pub fn deleted(mutation: CommentMutation) -> Self {
        Self {
            success: true,
            comment: None,
            removed: Some(mutation.affected),
            comment_count: mutation.comment_count,
            heat_score: mutation.heat_score,
        }
    }
}

// ============================================================================
// Toggles
// ============================================================================

/// Result of a like, collect or comment-like toggle
#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heat_score: Option<f64>,
}

impl ToggleResponse {
    pub fn like(outcome: ToggleOutcome) -> Self {
        Self {
            success: true,
            action: if outcome.active { "like" } else { "unlike" }.to_string(),
            like_count: Some(outcome.count),
            collect_count: None,
            heat_score: Some(outcome.heat_score),
        }
    }

    pub fn collect(outcome: ToggleOutcome) -> Self {
        Self {
            success: true,
            action: if outcome.active { "collect" } else { "uncollect" }.to_string(),
            like_count: None,
            collect_count: Some(outcome.count),
            heat_score: Some(outcome.heat_score),
        }
    }

    pub fn comment_like(outcome: CommentLikeOutcome) -> Self {
        Self {
            success: true,
            action: if outcome.active { "like" } else { "unlike" }.to_string(),
            like_count: Some(outcome.like_count),
            collect_count: None,
            heat_score: None,
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PageResponse<T> {
    pub fn new<U>(page: PagedResult<U>, f: impl FnMut(U) -> T) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(f);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeatRefreshResponse {
    pub success: bool,
    pub updated: u64,
}
