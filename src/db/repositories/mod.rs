//! Database repositories
//!
//! One repository per aggregate, each a trait plus its SQLx implementation
//! for SQLite and MySQL.

pub mod category;
pub mod comment;
pub mod course;
pub mod post;
pub mod session;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use course::{CourseRepository, SqlxCourseRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
