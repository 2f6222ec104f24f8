//! Data models
//!
//! Database entities of the forum plus the value types passed between the
//! repositories, services and API handlers.

mod category;
mod comment;
mod course;
mod post;
mod session;
mod user;

pub use category::{CategoryKind, ContentCategory};
pub use comment::{
    Comment, CommentInsert, CommentLikeOutcome, CommentMutation, CommentThread, CreateCommentInput,
};
pub use course::{Course, CreateCourseInput};
pub use post::{
    CreatePostInput, Engagement, FeedQuery, FeedScope, FeedSort, ListParams, PagedResult, Post,
    ToggleOutcome, UpdatePostInput, FORUM_PAGE_SIZE,
};
pub use session::Session;
pub use user::{User, UserRole};
