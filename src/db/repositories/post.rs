//! Forum post repository
//!
//! Posts, their like/collect memberships and the feed queries.
//!
//! Every mutation of an engagement counter happens in one transaction that
//! also re-reads the counters and stores the recomputed heat score, so the
//! stored `heat_score` always matches the stored counters.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Engagement, FeedQuery, FeedScope, FeedSort, ListParams, PagedResult, Post, ToggleOutcome};
use crate::services::heat::HeatCalculator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a fully built post (id, counters and heat included)
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Post>>;

    /// Persist the editable fields of `post`
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post with its comments, comment likes, likes and collects.
    /// Returns false when the post did not exist.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn feed(&self, query: &FeedQuery) -> Result<PagedResult<Post>>;

    /// Returns false when the post did not exist
    async fn increment_view(&self, id: &str) -> Result<bool>;

    /// Flip the user's like. `None` when the post does not exist.
    async fn toggle_like(
        &self,
        post_id: &str,
        user_id: i64,
        heat: &HeatCalculator,
        now: DateTime<Utc>,
    ) -> Result<Option<ToggleOutcome>>;

    /// Flip the user's collect. `None` when the post does not exist.
    async fn toggle_collect(
        &self,
        post_id: &str,
        user_id: i64,
        heat: &HeatCalculator,
        now: DateTime<Utc>,
    ) -> Result<Option<ToggleOutcome>>;

    async fn has_liked(&self, post_id: &str, user_id: i64) -> Result<bool>;

    async fn has_collected(&self, post_id: &str, user_id: i64) -> Result<bool>;

    /// Posts collected by `user_id`, most recently collected first
    async fn list_collected(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<Post>>;

    /// Recompute and store the heat of every post; returns the number updated
    async fn refresh_all_heat(&self, heat: &HeatCalculator, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

/// The two per-user memberships a post keeps a counter for
#[derive(Debug, Clone, Copy)]
enum Interaction {
    Like,
    Collect,
}

impl Interaction {
    fn table(self) -> &'static str {
        match self {
            Interaction::Like => "forum_post_likes",
            Interaction::Collect => "forum_post_collects",
        }
    }

    fn counter(self) -> &'static str {
        match self {
            Interaction::Like => "like_count",
            Interaction::Collect => "collect_count",
        }
    }

    fn count_of(self, engagement: Engagement) -> i64 {
        match self {
            Interaction::Like => engagement.likes,
            Interaction::Collect => engagement.collects,
        }
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await?,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await?,
        }
        self.get_by_id(&post.id)
            .await?
            .context("Post not found after insert")
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Post>> {
        let sql = format!("{} WHERE p.id = ?", POST_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.map(|r| row_to_post_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.map(|r| row_to_post_mysql(&r)))
            }
        }
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post).await?,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post).await?,
        }
        self.get_by_id(&post.id)
            .await?
            .context("Post not found after update")
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn feed(&self, query: &FeedQuery) -> Result<PagedResult<Post>> {
        let filter = FeedFilter::from_query(query);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => feed_sqlite(self.pool.sqlite()?, &filter, query).await,
            DatabaseDriver::Mysql => feed_mysql(self.pool.mysql()?, &filter, query).await,
        }
    }

    async fn increment_view(&self, id: &str) -> Result<bool> {
        const SQL: &str = "UPDATE forum_posts SET view_count = view_count + 1 WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to increment view count")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to increment view count")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn toggle_like(
        &self,
        post_id: &str,
        user_id: i64,
        heat: &HeatCalculator,
        now: DateTime<Utc>,
    ) -> Result<Option<ToggleOutcome>> {
        self.toggle(Interaction::Like, post_id, user_id, heat, now).await
    }

    async fn toggle_collect(
        &self,
        post_id: &str,
        user_id: i64,
        heat: &HeatCalculator,
        now: DateTime<Utc>,
    ) -> Result<Option<ToggleOutcome>> {
        self.toggle(Interaction::Collect, post_id, user_id, heat, now).await
    }

    async fn has_liked(&self, post_id: &str, user_id: i64) -> Result<bool> {
        self.has_interaction(Interaction::Like, post_id, user_id).await
    }

    async fn has_collected(&self, post_id: &str, user_id: i64) -> Result<bool> {
        self.has_interaction(Interaction::Collect, post_id, user_id).await
    }

    async fn list_collected(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_collected_sqlite(self.pool.sqlite()?, user_id, params).await,
            DatabaseDriver::Mysql => list_collected_mysql(self.pool.mysql()?, user_id, params).await,
        }
    }

    async fn refresh_all_heat(&self, heat: &HeatCalculator, now: DateTime<Utc>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => refresh_all_heat_sqlite(self.pool.sqlite()?, heat, now).await,
            DatabaseDriver::Mysql => refresh_all_heat_mysql(self.pool.mysql()?, heat, now).await,
        }
    }
}

impl SqlxPostRepository {
    async fn toggle(
        &self,
        kind: Interaction,
        post_id: &str,
        user_id: i64,
        heat: &HeatCalculator,
        now: DateTime<Utc>,
    ) -> Result<Option<ToggleOutcome>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => toggle_sqlite(self.pool.sqlite()?, kind, post_id, user_id, heat, now).await,
            DatabaseDriver::Mysql => toggle_mysql(self.pool.mysql()?, kind, post_id, user_id, heat, now).await,
        }
    }

    async fn has_interaction(&self, kind: Interaction, post_id: &str, user_id: i64) -> Result<bool> {
        let sql = format!("SELECT COUNT(*) as count FROM {} WHERE post_id = ? AND user_id = ?", kind.table());
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(post_id)
                .bind(user_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to read interaction")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(post_id)
                .bind(user_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to read interaction")?
                .get("count"),
        };
        Ok(count > 0)
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.author_id, u.display_name AS author_name, p.course_id, p.category_id,
           p.title, p.content, p.tags, p.is_anonymous, p.like_count, p.collect_count,
           p.comment_count, p.view_count, p.heat_score, p.created_at, p.updated_at
    FROM forum_posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Escape character used in `LIKE` patterns
const LIKE_ESCAPE: char = '!';

/// `%keyword%` with the LIKE wildcards of `keyword` escaped.
///
/// Case folding is left to the database: SQLite `LIKE` ignores ASCII case and
/// MySQL compares under the column's `_ci` collation.
pub(crate) fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for ch in keyword.chars() {
        if ch == '%' || ch == '_' || ch == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

enum FeedBind {
    Int(i64),
    Text(String),
}

/// WHERE clause and its bind values for a feed query
struct FeedFilter {
    clause: String,
    binds: Vec<FeedBind>,
}

impl FeedFilter {
    fn from_query(query: &FeedQuery) -> Self {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        match query.scope {
            FeedScope::Course(course_id) => {
                conditions.push("p.course_id = ?".to_string());
                binds.push(FeedBind::Int(course_id));
            }
            FeedScope::Global => conditions.push("p.course_id IS NULL".to_string()),
        }

        if let Some(category_id) = query.category_id {
            conditions.push("p.category_id = ?".to_string());
            binds.push(FeedBind::Int(category_id));
        }

        if let Some(keyword) = &query.keyword {
            conditions.push(format!(
                "(p.title LIKE ? ESCAPE '{e}' OR p.content LIKE ? ESCAPE '{e}')",
                e = LIKE_ESCAPE
            ));
            let pattern = like_pattern(keyword);
            binds.push(FeedBind::Text(pattern.clone()));
            binds.push(FeedBind::Text(pattern));
        }

        Self {
            clause: conditions.join(" AND "),
            binds,
        }
    }
}

fn order_by(sort: FeedSort) -> &'static str {
    match sort {
        FeedSort::Heat => "p.heat_score DESC, p.created_at DESC, p.id ASC",
        FeedSort::Newest => "p.created_at DESC, p.id ASC",
        FeedSort::Popular => "p.view_count DESC, p.created_at DESC, p.id ASC",
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO forum_posts (id, author_id, course_id, category_id, title, content, tags,
                                 is_anonymous, like_count, collect_count, comment_count,
                                 view_count, heat_score, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.id)
    .bind(post.author_id)
    .bind(post.course_id)
    .bind(post.category_id)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.tags)
    .bind(post.is_anonymous)
    .bind(post.like_count)
    .bind(post.collect_count)
    .bind(post.comment_count)
    .bind(post.view_count)
    .bind(post.heat_score)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(())
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE forum_posts
        SET title = ?, content = ?, category_id = ?, tags = ?, is_anonymous = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.category_id)
    .bind(&post.tags)
    .bind(post.is_anonymous)
    .bind(post.updated_at)
    .bind(&post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(())
}

async fn delete_post_sqlite(pool: &SqlitePool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(
        "DELETE FROM forum_comment_likes WHERE comment_id IN (SELECT id FROM forum_comments WHERE post_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete comment likes")?;

    sqlx::query("UPDATE forum_comments SET parent_id = NULL WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to detach replies")?;

    for sql in [
        "DELETE FROM forum_comments WHERE post_id = ?",
        "DELETE FROM forum_post_likes WHERE post_id = ?",
        "DELETE FROM forum_post_collects WHERE post_id = ?",
    ] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete post dependents")?;
    }

    let affected = sqlx::query("DELETE FROM forum_posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?
        .rows_affected();

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(affected > 0)
}

async fn feed_sqlite(pool: &SqlitePool, filter: &FeedFilter, query: &FeedQuery) -> Result<PagedResult<Post>> {
    let count_sql = format!("SELECT COUNT(*) as count FROM forum_posts p WHERE {}", filter.clause);
    let mut count_query = sqlx::query(&count_sql);
    for bind in &filter.binds {
        count_query = match bind {
            FeedBind::Int(v) => count_query.bind(*v),
            FeedBind::Text(s) => count_query.bind(s.as_str()),
        };
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count feed posts")?
        .get("count");

    let sql = format!(
        "{} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        POST_SELECT,
        filter.clause,
        order_by(query.sort)
    );
    let mut page_query = sqlx::query(&sql);
    for bind in &filter.binds {
        page_query = match bind {
            FeedBind::Int(v) => page_query.bind(*v),
            FeedBind::Text(s) => page_query.bind(s.as_str()),
        };
    }
    let rows = page_query
        .bind(query.params.limit())
        .bind(query.params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to load feed")?;

    let posts = rows.iter().map(row_to_post_sqlite).collect();
    Ok(PagedResult::new(posts, total, &query.params))
}

async fn toggle_sqlite(
    pool: &SqlitePool,
    kind: Interaction,
    post_id: &str,
    user_id: i64,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<Option<ToggleOutcome>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Writing first takes the write lock before anything is read.
    let removed = sqlx::query(&format!("DELETE FROM {} WHERE post_id = ? AND user_id = ?", kind.table()))
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove interaction")?
        .rows_affected();

    let active = if removed > 0 {
        sqlx::query(&format!(
            "UPDATE forum_posts SET {c} = MAX(0, {c} - 1) WHERE id = ?",
            c = kind.counter()
        ))
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement counter")?;
        false
    } else {
        let exists = sqlx::query("SELECT id FROM forum_posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to check post")?
            .is_some();
        if !exists {
            return Ok(None);
        }

        sqlx::query(&format!(
            "INSERT INTO {} (post_id, user_id, created_at) VALUES (?, ?, ?)",
            kind.table()
        ))
        .bind(post_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to add interaction")?;

        sqlx::query(&format!("UPDATE forum_posts SET {c} = {c} + 1 WHERE id = ?", c = kind.counter()))
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .context("Failed to increment counter")?;
        true
    };

    let (engagement, heat_score) = recompute_heat_sqlite(&mut tx, post_id, heat, now).await?;
    tx.commit().await.context("Failed to commit toggle")?;

    Ok(Some(ToggleOutcome {
        active,
        count: kind.count_of(engagement),
        heat_score,
    }))
}

/// Re-read the counters of `post_id` and store its recomputed heat.
/// Must run on the connection of the surrounding transaction.
pub(crate) async fn recompute_heat_sqlite(
    conn: &mut SqliteConnection,
    post_id: &str,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<(Engagement, f64)> {
    let row = sqlx::query(
        "SELECT like_count, comment_count, collect_count, created_at FROM forum_posts WHERE id = ?",
    )
    .bind(post_id)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to read post counters")?;

    let engagement = Engagement {
        likes: row.get("like_count"),
        comments: row.get("comment_count"),
        collects: row.get("collect_count"),
    };
    let created_at: DateTime<Utc> = row.get("created_at");
    let score = heat.score(engagement, created_at, now);

    sqlx::query("UPDATE forum_posts SET heat_score = ? WHERE id = ?")
        .bind(score)
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to store heat score")?;

    Ok((engagement, score))
}

async fn list_collected_sqlite(pool: &SqlitePool, user_id: i64, params: &ListParams) -> Result<PagedResult<Post>> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM forum_post_collects WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count collections")?
        .get("count");

    let sql = format!(
        "{} JOIN forum_post_collects c ON c.post_id = p.id WHERE c.user_id = ? \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        POST_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list collections")?;

    Ok(PagedResult::new(rows.iter().map(row_to_post_sqlite).collect(), total, params))
}

async fn refresh_all_heat_sqlite(pool: &SqlitePool, heat: &HeatCalculator, now: DateTime<Utc>) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let ids: Vec<String> = sqlx::query("SELECT id FROM forum_posts")
        .fetch_all(&mut *tx)
        .await
        .context("Failed to list posts")?
        .iter()
        .map(|row| row.get("id"))
        .collect();

    for id in &ids {
        recompute_heat_sqlite(&mut tx, id, heat, now).await?;
    }

    tx.commit().await.context("Failed to commit heat refresh")?;
    Ok(ids.len() as u64)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        course_id: row.get("course_id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags: row.get("tags"),
        is_anonymous: row.get("is_anonymous"),
        like_count: row.get("like_count"),
        collect_count: row.get("collect_count"),
        comment_count: row.get("comment_count"),
        view_count: row.get("view_count"),
        heat_score: row.get("heat_score"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO forum_posts (id, author_id, course_id, category_id, title, content, tags,
                                 is_anonymous, like_count, collect_count, comment_count,
                                 view_count, heat_score, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.id)
    .bind(post.author_id)
    .bind(post.course_id)
    .bind(post.category_id)
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.tags)
    .bind(post.is_anonymous)
    .bind(post.like_count)
    .bind(post.collect_count)
    .bind(post.comment_count)
    .bind(post.view_count)
    .bind(post.heat_score)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(())
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE forum_posts
        SET title = ?, content = ?, category_id = ?, tags = ?, is_anonymous = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.category_id)
    .bind(&post.tags)
    .bind(post.is_anonymous)
    .bind(post.updated_at)
    .bind(&post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(())
}

async fn delete_post_mysql(pool: &MySqlPool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let exists = sqlx::query("SELECT id FROM forum_posts WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock post")?
        .is_some();
    if !exists {
        return Ok(false);
    }

    sqlx::query(
        "DELETE FROM forum_comment_likes WHERE comment_id IN (SELECT id FROM forum_comments WHERE post_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to delete comment likes")?;

    sqlx::query("UPDATE forum_comments SET parent_id = NULL WHERE post_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to detach replies")?;

    for sql in [
        "DELETE FROM forum_comments WHERE post_id = ?",
        "DELETE FROM forum_post_likes WHERE post_id = ?",
        "DELETE FROM forum_post_collects WHERE post_id = ?",
        "DELETE FROM forum_posts WHERE id = ?",
    ] {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete post")?;
    }

    tx.commit().await.context("Failed to commit post deletion")?;
    Ok(true)
}

async fn feed_mysql(pool: &MySqlPool, filter: &FeedFilter, query: &FeedQuery) -> Result<PagedResult<Post>> {
    let count_sql = format!("SELECT COUNT(*) as count FROM forum_posts p WHERE {}", filter.clause);
    let mut count_query = sqlx::query(&count_sql);
    for bind in &filter.binds {
        count_query = match bind {
            FeedBind::Int(v) => count_query.bind(*v),
            FeedBind::Text(s) => count_query.bind(s.as_str()),
        };
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count feed posts")?
        .get("count");

    let sql = format!(
        "{} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        POST_SELECT,
        filter.clause,
        order_by(query.sort)
    );
    let mut page_query = sqlx::query(&sql);
    for bind in &filter.binds {
        page_query = match bind {
            FeedBind::Int(v) => page_query.bind(*v),
            FeedBind::Text(s) => page_query.bind(s.as_str()),
        };
    }
    let rows = page_query
        .bind(query.params.limit())
        .bind(query.params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to load feed")?;

    let posts = rows.iter().map(row_to_post_mysql).collect();
    Ok(PagedResult::new(posts, total, &query.params))
}

async fn toggle_mysql(
    pool: &MySqlPool,
    kind: Interaction,
    post_id: &str,
    user_id: i64,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<Option<ToggleOutcome>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Serializes concurrent toggles on the same post.
    let exists = sqlx::query("SELECT id FROM forum_posts WHERE id = ? FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock post")?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let removed = sqlx::query(&format!("DELETE FROM {} WHERE post_id = ? AND user_id = ?", kind.table()))
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove interaction")?
        .rows_affected();

    let active = if removed > 0 {
        sqlx::query(&format!(
            "UPDATE forum_posts SET {c} = GREATEST(0, {c} - 1) WHERE id = ?",
            c = kind.counter()
        ))
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement counter")?;
        false
    } else {
        sqlx::query(&format!(
            "INSERT INTO {} (post_id, user_id, created_at) VALUES (?, ?, ?)",
            kind.table()
        ))
        .bind(post_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to add interaction")?;

        sqlx::query(&format!("UPDATE forum_posts SET {c} = {c} + 1 WHERE id = ?", c = kind.counter()))
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .context("Failed to increment counter")?;
        true
    };

    let (engagement, heat_score) = recompute_heat_mysql(&mut tx, post_id, heat, now).await?;
    tx.commit().await.context("Failed to commit toggle")?;

    Ok(Some(ToggleOutcome {
        active,
        count: kind.count_of(engagement),
        heat_score,
    }))
}

/// MySQL counterpart of [`recompute_heat_sqlite`]
pub(crate) async fn recompute_heat_mysql(
    conn: &mut MySqlConnection,
    post_id: &str,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<(Engagement, f64)> {
    let row = sqlx::query(
        "SELECT like_count, comment_count, collect_count, created_at FROM forum_posts WHERE id = ?",
    )
    .bind(post_id)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to read post counters")?;

    let engagement = Engagement {
        likes: row.get("like_count"),
        comments: row.get("comment_count"),
        collects: row.get("collect_count"),
    };
    let created_at: DateTime<Utc> = row.get("created_at");
    let score = heat.score(engagement, created_at, now);

    sqlx::query("UPDATE forum_posts SET heat_score = ? WHERE id = ?")
        .bind(score)
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to store heat score")?;

    Ok((engagement, score))
}

async fn list_collected_mysql(pool: &MySqlPool, user_id: i64, params: &ListParams) -> Result<PagedResult<Post>> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM forum_post_collects WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count collections")?
        .get("count");

    let sql = format!(
        "{} JOIN forum_post_collects c ON c.post_id = p.id WHERE c.user_id = ? \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        POST_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list collections")?;

    Ok(PagedResult::new(rows.iter().map(row_to_post_mysql).collect(), total, params))
}

async fn refresh_all_heat_mysql(pool: &MySqlPool, heat: &HeatCalculator, now: DateTime<Utc>) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let ids: Vec<String> = sqlx::query("SELECT id FROM forum_posts FOR UPDATE")
        .fetch_all(&mut *tx)
        .await
        .context("Failed to list posts")?
        .iter()
        .map(|row| row.get("id"))
        .collect();

    for id in &ids {
        recompute_heat_mysql(&mut tx, id, heat, now).await?;
    }

    tx.commit().await.context("Failed to commit heat refresh")?;
    Ok(ids.len() as u64)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        course_id: row.get("course_id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags: row.get("tags"),
        is_anonymous: row.get("is_anonymous"),
        like_count: row.get("like_count"),
        collect_count: row.get("collect_count"),
        comment_count: row.get("comment_count"),
        view_count: row.get("view_count"),
        heat_score: row.get("heat_score"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::repositories::{CourseRepository, SqlxCourseRepository, SqlxUserRepository, UserRepository};
    use crate::config::DatabaseConfig;
    use crate::db::{create_pool, create_test_pool, migrations};
    use crate::models::{Course, User, UserRole};
    use uuid::Uuid;

    pub struct Fixture {
        pub pool: DynDatabasePool,
        pub alice: i64,
        pub bob: i64,
        pub course: i64,
    }

    pub async fn fixture() -> Fixture {
        seed(create_test_pool().await.expect("Failed to create test pool")).await
    }

    /// Fixture on a SQLite file inside `dir`, with a pool of many connections
    pub async fn file_fixture(dir: &std::path::Path) -> Fixture {
        let config = DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: dir.join("forum.db").to_string_lossy().to_string(),
        };
        seed(create_pool(&config).await.expect("Failed to create pool")).await
    }

    async fn seed(pool: DynDatabasePool) -> Fixture {
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let alice = users
            .create(&User::new("alice".into(), "hash".into(), "Alice".into(), UserRole::Student))
            .await
            .unwrap()
            .id;
        let bob = users
            .create(&User::new("bob".into(), "hash".into(), "Bob".into(), UserRole::Teacher))
            .await
            .unwrap()
            .id;

        let now = Utc::now();
        let course = SqlxCourseRepository::new(pool.clone())
            .create(&Course {
                id: 0,
                code: "CS101".into(),
                name: "Intro".into(),
                description: String::new(),
                teacher_id: bob,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
            .id;

        Fixture { pool, alice, bob, course }
    }

    pub fn post(author_id: i64, course_id: Option<i64>, title: &str, created_at: DateTime<Utc>) -> Post {
        Post {
            id: Uuid::new_v4().to_string(),
            author_id,
            author_name: String::new(),
            course_id,
            category_id: Some(1),
            title: title.to_string(),
            content: format!("body of {}", title),
            tags: String::new(),
            is_anonymous: false,
            like_count: 0,
            collect_count: 0,
            comment_count: 0,
            view_count: 0,
            heat_score: HeatCalculator::default().score(Engagement::default(), created_at, created_at),
            created_at,
            updated_at: created_at,
        }
    }
}
