//! Services layer - Business logic
//!
//! Services enforce permissions and validation, then hand persistence to
//! the repositories. Heat scoring lives in [`heat`] and is passed down to
//! every repository call that changes a post's counters.

pub mod bounty;
pub mod category;
pub mod comment;
pub mod course;
pub mod heat;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod user;

pub use bounty::{BountyLedger, NoopBountyLedger};
pub use category::CategoryService;
pub use comment::CommentService;
pub use course::{CourseService, CourseServiceError};
pub use heat::{HeatCalculator, HeatWeights};
pub use password::{hash_password, verify_password};
pub use post::{ForumError, PostDetail, PostService};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
