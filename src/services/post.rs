//! Forum post service
//!
//! Post lifecycle, feeds and the like/collect toggles. Heat is recomputed
//! by the repository inside the same transaction as every counter change;
//! this service only decides who may do what.

use crate::db::repositories::{CommentRepository, CourseRepository, PostRepository};
use crate::models::{
    CommentThread, CreatePostInput, FeedQuery, FeedScope, ListParams, PagedResult, Post, ToggleOutcome,
    UpdatePostInput, User,
};
use crate::services::bounty::{BountyLedger, NoopBountyLedger};
use crate::services::category::CategoryService;
use crate::services::heat::HeatCalculator;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_TAGS_LEN: usize = 512;

/// Errors shared by the forum services
#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ForumError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// A post as shown on its detail page
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub has_liked: bool,
    pub has_collected: bool,
    /// First page of comment threads
    pub comments: PagedResult<CommentThread>,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    courses: Arc<dyn CourseRepository>,
    categories: Arc<CategoryService>,
    bounty: Arc<dyn BountyLedger>,
    heat: HeatCalculator,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        courses: Arc<dyn CourseRepository>,
        categories: Arc<CategoryService>,
        heat: HeatCalculator,
    ) -> Self {
        Self {
            posts,
            comments,
            courses,
            categories,
            bounty: Arc::new(NoopBountyLedger),
            heat,
        }
    }

    /// Replace the default no-op bounty ledger
    pub fn with_bounty_ledger(mut self, ledger: Arc<dyn BountyLedger>) -> Self {
        self.bounty = ledger;
        self
    }

    pub fn heat(&self) -> &HeatCalculator {
        &self.heat
    }

    /// Create a post; returns it with counters and heat at zero
    pub async fn create(&self, actor: &User, input: CreatePostInput) -> Result<Post, ForumError> {
        if !actor.can_post() {
            return Err(ForumError::PermissionDenied("administrators cannot create posts"));
        }

        let title = input.title.trim().to_string();
        let tags = normalize_tags(&input.tags);
        validate_title(&title)?;
        validate_content(&input.content)?;
        validate_tags(&tags)?;

        if let Some(course_id) = input.course_id {
            self.ensure_course(course_id).await?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4().to_string(),
            author_id: actor.id,
            author_name: actor.display_name.clone(),
            course_id: input.course_id,
            category_id: input.category_id,
            title,
            content: input.content,
            tags,
            is_anonymous: input.is_anonymous,
            like_count: 0,
            collect_count: 0,
            comment_count: 0,
            view_count: 0,
            heat_score: 0.0,
            created_at: now,
            updated_at: now,
        };

        let created = self.posts.create(&post).await?;
        tracing::info!(post_id = %created.id, author_id = actor.id, "Post created");
        Ok(created)
    }

    /// Load a post for display and count the view
    pub async fn get(&self, id: &str, viewer: Option<&User>) -> Result<PostDetail, ForumError> {
        if !self.posts.increment_view(id).await? {
            return Err(ForumError::NotFound("post"));
        }
        let post = self.find(id).await?;

        let (has_liked, has_collected) = match viewer {
            Some(user) => (
                self.posts.has_liked(id, user.id).await?,
                self.posts.has_collected(id, user.id).await?,
            ),
            None => (false, false),
        };
        let comments = self.comments.list_threads(id, &ListParams::default()).await?;

        Ok(PostDetail {
            post,
            has_liked,
            has_collected,
            comments,
        })
    }

    /// Author-only partial update
    pub async fn update(&self, id: &str, actor: &User, input: UpdatePostInput) -> Result<Post, ForumError> {
        let mut post = self.find(id).await?;
        if post.author_id != actor.id {
            return Err(ForumError::PermissionDenied("only the author can edit this post"));
        }
        if input.is_empty() {
            return Ok(post);
        }

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_title(&title)?;
            post.title = title;
        }
        if let Some(content) = input.content {
            validate_content(&content)?;
            post.content = content;
        }
        if let Some(tags) = input.tags {
            let tags = normalize_tags(&tags);
            validate_tags(&tags)?;
            post.tags = tags;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
            post.category_id = Some(category_id);
        }
        if let Some(is_anonymous) = input.is_anonymous {
            post.is_anonymous = is_anonymous;
        }
        post.updated_at = Utc::now();

        Ok(self.posts.update(&post).await?)
    }

    /// Delete a post with everything hanging off it (author or admin)
    pub async fn delete(&self, id: &str, actor: &User) -> Result<(), ForumError> {
        let post = self.find(id).await?;
        if !actor.can_moderate(post.author_id) {
            return Err(ForumError::PermissionDenied("only the author or an admin can delete this post"));
        }

        if !self.posts.delete(id).await? {
            return Err(ForumError::NotFound("post"));
        }
        tracing::info!(post_id = %id, actor_id = actor.id, "Post deleted");
        Ok(())
    }

    pub async fn feed(&self, query: &FeedQuery) -> Result<PagedResult<Post>, ForumError> {
        if let FeedScope::Course(course_id) = query.scope {
            self.ensure_course(course_id).await?;
        }
        Ok(self.posts.feed(query).await?)
    }

    pub async fn toggle_like(&self, id: &str, actor: &User) -> Result<ToggleOutcome, ForumError> {
        self.posts
            .toggle_like(id, actor.id, &self.heat, Utc::now())
            .await?
            .ok_or(ForumError::NotFound("post"))
    }

    pub async fn toggle_collect(&self, id: &str, actor: &User) -> Result<ToggleOutcome, ForumError> {
        self.posts
            .toggle_collect(id, actor.id, &self.heat, Utc::now())
            .await?
            .ok_or(ForumError::NotFound("post"))
    }

    /// Posts the actor collected, most recent first
    pub async fn list_collected(&self, actor: &User, params: &ListParams) -> Result<PagedResult<Post>, ForumError> {
        Ok(self.posts.list_collected(actor.id, params).await?)
    }

    /// Offer a bounty on one's own post
    pub async fn set_bounty(&self, id: &str, actor: &User, amount: i64) -> Result<(), ForumError> {
        let post = self.find(id).await?;
        if post.author_id != actor.id {
            return Err(ForumError::PermissionDenied("only the author can set a bounty"));
        }
        if amount <= 0 {
            return Err(ForumError::validation("amount", "must be positive"));
        }
        self.bounty
            .set_bounty(id, actor.id, amount)
            .await
            .context("Bounty ledger rejected the request")?;
        Ok(())
    }

    /// Recompute the heat of every post (admin only)
    pub async fn refresh_all_heat(&self, actor: &User) -> Result<u64, ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::PermissionDenied("only admins can refresh heat scores"));
        }
        let updated = self.posts.refresh_all_heat(&self.heat, Utc::now()).await?;
        tracing::info!(updated, "Heat scores refreshed");
        Ok(updated)
    }

    async fn find(&self, id: &str) -> Result<Post, ForumError> {
        self.posts.get_by_id(id).await?.ok_or(ForumError::NotFound("post"))
    }

    async fn ensure_course(&self, course_id: i64) -> Result<(), ForumError> {
        if self.courses.exists(course_id).await? {
            Ok(())
        } else {
            Err(ForumError::NotFound("course"))
        }
    }

    async fn ensure_category(&self, category_id: i64) -> Result<(), ForumError> {
        if self.categories.exists(category_id).await? {
            Ok(())
        } else {
            Err(ForumError::validation("category_id", "unknown category"))
        }
    }
}

/// Trim each comma separated tag and drop empties
fn normalize_tags(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn validate_title(title: &str) -> Result<(), ForumError> {
    if title.is_empty() {
        return Err(ForumError::validation("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ForumError::validation(
            "title",
            format!("must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ForumError> {
    if content.trim().is_empty() {
        return Err(ForumError::validation("content", "must not be empty"));
    }
    Ok(())
}

fn validate_tags(tags: &str) -> Result<(), ForumError> {
    if tags.chars().count() > MAX_TAGS_LEN {
        return Err(ForumError::validation(
            "tags",
            format!("must be at most {} characters", MAX_TAGS_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxCommentRepository, SqlxCourseRepository, SqlxPostRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Course, UserRole};
    use crate::services::comment::CommentService;

    pub struct Forum {
        pub pool: DynDatabasePool,
        pub posts: PostService,
        pub comments: CommentService,
        pub admin: User,
        pub alice: User,
        pub bob: User,
        pub course_id: i64,
    }

    async fn user(pool: &DynDatabasePool, name: &str, role: UserRole) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(name.into(), "hash".into(), name.to_uppercase(), role))
            .await
            .unwrap()
    }

    pub async fn forum() -> Forum {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let admin = user(&pool, "admin", UserRole::Admin).await;
        let alice = user(&pool, "alice", UserRole::Student).await;
        let bob = user(&pool, "bob", UserRole::Teacher).await;

        let now = Utc::now();
        let course_id = SqlxCourseRepository::new(pool.clone())
            .create(&Course {
                id: 0,
                code: "CS101".into(),
                name: "Intro".into(),
                description: String::new(),
                teacher_id: bob.id,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
            .id;

        let categories = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        ));
        let heat = HeatCalculator::default();
        let posts = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxCourseRepository::boxed(pool.clone()),
            categories,
            heat.clone(),
        );
        let comments = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
            heat,
        );

        Forum {
            pool,
            posts,
            comments,
            admin,
            alice,
            bob,
            course_id,
        }
    }

    pub fn input(title: &str, course_id: Option<i64>) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            content: format!("{} body", title),
            course_id,
            category_id: Some(1),
            tags: String::new(),
            is_anonymous: false,
        }
    }
}
