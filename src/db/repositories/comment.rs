//! Forum comment repository
//!
//! Comments form a reply tree inside one post. Adding or removing comments
//! adjusts the post's `comment_count` and heat in the same transaction.

use crate::config::DatabaseDriver;
use crate::db::repositories::post::{recompute_heat_mysql, recompute_heat_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{
    Comment, CommentInsert, CommentLikeOutcome, CommentMutation, CommentThread, ListParams, PagedResult,
};
use crate::services::heat::HeatCalculator;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a comment and bump its post's counter. The post and the
    /// parent comment are checked inside the same transaction.
    async fn create(&self, comment: &Comment, heat: &HeatCalculator, now: DateTime<Utc>) -> Result<CommentInsert>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Comment>>;

    /// Delete a comment and every reply beneath it.
    /// `None` when the comment does not exist.
    async fn delete_subtree(&self, id: &str, heat: &HeatCalculator, now: DateTime<Utc>)
        -> Result<Option<CommentMutation>>;

    /// Flip the user's like on a comment. `None` when the comment does not exist.
    async fn toggle_like(&self, id: &str, user_id: i64) -> Result<Option<CommentLikeOutcome>>;

    /// A page of top-level comments, oldest first, each with its replies
    async fn list_threads(&self, post_id: &str, params: &ListParams) -> Result<PagedResult<CommentThread>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment, heat: &HeatCalculator, now: DateTime<Utc>) -> Result<CommentInsert> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_comment_sqlite(self.pool.sqlite()?, comment, heat, now).await,
            DatabaseDriver::Mysql => create_comment_mysql(self.pool.mysql()?, comment, heat, now).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE c.id = ?", COMMENT_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get comment by ID")?;
                Ok(row.map(|r| row_to_comment_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get comment by ID")?;
                Ok(row.map(|r| row_to_comment_mysql(&r)))
            }
        }
    }

    async fn delete_subtree(
        &self,
        id: &str,
        heat: &HeatCalculator,
        now: DateTime<Utc>,
    ) -> Result<Option<CommentMutation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_subtree_sqlite(self.pool.sqlite()?, id, heat, now).await,
            DatabaseDriver::Mysql => delete_subtree_mysql(self.pool.mysql()?, id, heat, now).await,
        }
    }

    async fn toggle_like(&self, id: &str, user_id: i64) -> Result<Option<CommentLikeOutcome>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => toggle_comment_like_sqlite(self.pool.sqlite()?, id, user_id).await,
            DatabaseDriver::Mysql => toggle_comment_like_mysql(self.pool.mysql()?, id, user_id).await,
        }
    }

    async fn list_threads(&self, post_id: &str, params: &ListParams) -> Result<PagedResult<CommentThread>> {
        let (tops, replies, total) = match self.pool.driver() {
            DatabaseDriver::Sqlite => load_threads_sqlite(self.pool.sqlite()?, post_id, params).await?,
            DatabaseDriver::Mysql => load_threads_mysql(self.pool.mysql()?, post_id, params).await?,
        };
        Ok(PagedResult::new(group_threads(tops, replies), total, params))
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.display_name AS author_name, c.parent_id,
           c.content, c.is_anonymous, c.like_count, c.created_at
    FROM forum_comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Rejection for a reply whose parent lives on `parent_post`
/// (`None` when the parent is gone)
fn parent_rejection(comment: &Comment, parent_post: Option<String>) -> Option<CommentInsert> {
    match parent_post {
        None => Some(CommentInsert::ParentNotFound),
        Some(post_id) if post_id != comment.post_id => Some(CommentInsert::ParentOnOtherPost),
        Some(_) => None,
    }
}

/// Ids of `root` and all of its descendants, parents before children
pub(crate) fn subtree_ids(root: &str, edges: &[(String, Option<String>)]) -> Vec<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, parent) in edges {
        if let Some(parent) = parent {
            children.entry(parent.as_str()).or_default().push(id.as_str());
        }
    }

    let mut ids = vec![root.to_string()];
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for &child in children.get(current).into_iter().flatten() {
            if !ids.iter().any(|seen| seen == child) {
                ids.push(child.to_string());
                queue.push_back(child);
            }
        }
    }
    ids
}

/// Attach each reply to the top-level comment at the root of its chain.
/// Replies keep their input (creation) order.
pub(crate) fn group_threads(tops: Vec<Comment>, replies: Vec<Comment>) -> Vec<CommentThread> {
    let parents: HashMap<&str, &str> = replies
        .iter()
        .filter_map(|r| r.parent_id.as_deref().map(|p| (r.id.as_str(), p)))
        .collect();

    let root_of = |id: &str| -> String {
        let mut current = id;
        // Bounded walk so corrupt cyclic data cannot loop forever.
        for _ in 0..=parents.len() {
            match parents.get(current) {
                Some(&parent) => current = parent,
                None => break,
            }
        }
        current.to_string()
    };

    let mut by_root: HashMap<String, Vec<Comment>> = HashMap::new();
    for reply in &replies {
        by_root.entry(root_of(&reply.id)).or_default().push(reply.clone());
    }

    tops.into_iter()
        .map(|comment| {
            let replies = by_root.remove(&comment.id).unwrap_or_default();
            CommentThread { comment, replies }
        })
        .collect()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_comment_sqlite(
    pool: &SqlitePool,
    comment: &Comment,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<CommentInsert> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let bumped = sqlx::query("UPDATE forum_posts SET comment_count = comment_count + 1 WHERE id = ?")
        .bind(&comment.post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment comment count")?
        .rows_affected();
    if bumped == 0 {
        return Ok(CommentInsert::PostNotFound);
    }

    if let Some(parent_id) = &comment.parent_id {
        let parent_post = sqlx::query("SELECT post_id FROM forum_comments WHERE id = ?")
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to check parent comment")?
            .map(|row| row.get::<String, _>("post_id"));
        if let Some(rejection) = parent_rejection(comment, parent_post) {
            return Ok(rejection);
        }
    }

    sqlx::query(
        r#"
        INSERT INTO forum_comments (id, post_id, author_id, parent_id, content, is_anonymous, like_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&comment.id)
    .bind(&comment.post_id)
    .bind(comment.author_id)
    .bind(&comment.parent_id)
    .bind(&comment.content)
    .bind(comment.is_anonymous)
    .bind(comment.created_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;

    let (engagement, heat_score) = recompute_heat_sqlite(&mut tx, &comment.post_id, heat, now).await?;
    tx.commit().await.context("Failed to commit comment")?;

    Ok(CommentInsert::Added(CommentMutation {
        affected: 1,
        comment_count: engagement.comments,
        heat_score,
    }))
}

async fn delete_subtree_sqlite(
    pool: &SqlitePool,
    id: &str,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<Option<CommentMutation>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // Writing first takes the write lock before anything is read.
    sqlx::query("DELETE FROM forum_comment_likes WHERE comment_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete comment likes")?;

    let post_id: String = match sqlx::query("SELECT post_id FROM forum_comments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to get comment")?
    {
        Some(row) => row.get("post_id"),
        None => return Ok(None),
    };

    let edges: Vec<(String, Option<String>)> = sqlx::query("SELECT id, parent_id FROM forum_comments WHERE post_id = ?")
        .bind(&post_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load comment tree")?
        .iter()
        .map(|row| (row.get("id"), row.get("parent_id")))
        .collect();
    let ids = subtree_ids(id, &edges);

    for comment_id in ids.iter().skip(1) {
        sqlx::query("DELETE FROM forum_comment_likes WHERE comment_id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete comment likes")?;
    }
    for comment_id in ids.iter().rev() {
        sqlx::query("DELETE FROM forum_comments WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete comment")?;
    }

    let removed = ids.len() as i64;
    sqlx::query("UPDATE forum_posts SET comment_count = MAX(0, comment_count - ?) WHERE id = ?")
        .bind(removed)
        .bind(&post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement comment count")?;

    let (engagement, heat_score) = recompute_heat_sqlite(&mut tx, &post_id, heat, now).await?;
    tx.commit().await.context("Failed to commit comment deletion")?;

    Ok(Some(CommentMutation {
        affected: removed,
        comment_count: engagement.comments,
        heat_score,
    }))
}

async fn toggle_comment_like_sqlite(pool: &SqlitePool, id: &str, user_id: i64) -> Result<Option<CommentLikeOutcome>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let removed = sqlx::query("DELETE FROM forum_comment_likes WHERE comment_id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove comment like")?
        .rows_affected();

    let active = if removed > 0 {
        sqlx::query("UPDATE forum_comments SET like_count = MAX(0, like_count - 1) WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to decrement comment likes")?;
        false
    } else {
        let bumped = sqlx::query("UPDATE forum_comments SET like_count = like_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to increment comment likes")?
            .rows_affected();
        if bumped == 0 {
            return Ok(None);
        }
        sqlx::query("INSERT INTO forum_comment_likes (comment_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("Failed to add comment like")?;
        true
    };

    let like_count: i64 = sqlx::query("SELECT like_count FROM forum_comments WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read comment likes")?
        .get("like_count");

    tx.commit().await.context("Failed to commit comment like")?;
    Ok(Some(CommentLikeOutcome { active, like_count }))
}

async fn load_threads_sqlite(
    pool: &SqlitePool,
    post_id: &str,
    params: &ListParams,
) -> Result<(Vec<Comment>, Vec<Comment>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM forum_comments WHERE post_id = ? AND parent_id IS NULL")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?
        .get("count");

    let tops_sql = format!(
        "{} WHERE c.post_id = ? AND c.parent_id IS NULL ORDER BY c.created_at ASC, c.id ASC LIMIT ? OFFSET ?",
        COMMENT_SELECT
    );
    let tops: Vec<Comment> = sqlx::query(&tops_sql)
        .bind(post_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?
        .iter()
        .map(row_to_comment_sqlite)
        .collect();

    if tops.is_empty() {
        return Ok((tops, Vec::new(), total));
    }

    let replies_sql = format!(
        "{} WHERE c.post_id = ? AND c.parent_id IS NOT NULL ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    );
    let replies = sqlx::query(&replies_sql)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list replies")?
        .iter()
        .map(row_to_comment_sqlite)
        .collect();

    Ok((tops, replies, total))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        is_anonymous: row.get("is_anonymous"),
        like_count: row.get("like_count"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_comment_mysql(
    pool: &MySqlPool,
    comment: &Comment,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<CommentInsert> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let bumped = sqlx::query("UPDATE forum_posts SET comment_count = comment_count + 1 WHERE id = ?")
        .bind(&comment.post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment comment count")?
        .rows_affected();
    if bumped == 0 {
        return Ok(CommentInsert::PostNotFound);
    }

    if let Some(parent_id) = &comment.parent_id {
        let parent_post = sqlx::query("SELECT post_id FROM forum_comments WHERE id = ? LOCK IN SHARE MODE")
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to check parent comment")?
            .map(|row| row.get::<String, _>("post_id"));
        if let Some(rejection) = parent_rejection(comment, parent_post) {
            return Ok(rejection);
        }
    }

    sqlx::query(
        r#"
        INSERT INTO forum_comments (id, post_id, author_id, parent_id, content, is_anonymous, like_count, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&comment.id)
    .bind(&comment.post_id)
    .bind(comment.author_id)
    .bind(&comment.parent_id)
    .bind(&comment.content)
    .bind(comment.is_anonymous)
    .bind(comment.created_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create comment")?;

    let (engagement, heat_score) = recompute_heat_mysql(&mut tx, &comment.post_id, heat, now).await?;
    tx.commit().await.context("Failed to commit comment")?;

    Ok(CommentInsert::Added(CommentMutation {
        affected: 1,
        comment_count: engagement.comments,
        heat_score,
    }))
}

async fn delete_subtree_mysql(
    pool: &MySqlPool,
    id: &str,
    heat: &HeatCalculator,
    now: DateTime<Utc>,
) -> Result<Option<CommentMutation>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let post_id: String = match sqlx::query("SELECT post_id FROM forum_comments WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to get comment")?
    {
        Some(row) => row.get("post_id"),
        None => return Ok(None),
    };

    sqlx::query("SELECT id FROM forum_posts WHERE id = ? FOR UPDATE")
        .bind(&post_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock post")?;

    let edges: Vec<(String, Option<String>)> = sqlx::query("SELECT id, parent_id FROM forum_comments WHERE post_id = ?")
        .bind(&post_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load comment tree")?
        .iter()
        .map(|row| (row.get("id"), row.get("parent_id")))
        .collect();
    let ids = subtree_ids(id, &edges);

    for comment_id in &ids {
        sqlx::query("DELETE FROM forum_comment_likes WHERE comment_id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete comment likes")?;
    }
    // Children first: InnoDB checks the self reference row by row.
    for comment_id in ids.iter().rev() {
        sqlx::query("DELETE FROM forum_comments WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete comment")?;
    }

    let removed = ids.len() as i64;
    sqlx::query("UPDATE forum_posts SET comment_count = GREATEST(0, comment_count - ?) WHERE id = ?")
        .bind(removed)
        .bind(&post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement comment count")?;

    let (engagement, heat_score) = recompute_heat_mysql(&mut tx, &post_id, heat, now).await?;
    tx.commit().await.context("Failed to commit comment deletion")?;

    Ok(Some(CommentMutation {
        affected: removed,
        comment_count: engagement.comments,
        heat_score,
    }))
}

async fn toggle_comment_like_mysql(pool: &MySqlPool, id: &str, user_id: i64) -> Result<Option<CommentLikeOutcome>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let exists = sqlx::query("SELECT id FROM forum_comments WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock comment")?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let removed = sqlx::query("DELETE FROM forum_comment_likes WHERE comment_id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to remove comment like")?
        .rows_affected();

    let active = if removed > 0 {
        sqlx::query("UPDATE forum_comments SET like_count = GREATEST(0, like_count - 1) WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to decrement comment likes")?;
        false
    } else {
        sqlx::query("INSERT INTO forum_comment_likes (comment_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("Failed to add comment like")?;
        sqlx::query("UPDATE forum_comments SET like_count = like_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to increment comment likes")?;
        true
    };

    let like_count: i64 = sqlx::query("SELECT like_count FROM forum_comments WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to read comment likes")?
        .get("like_count");

    tx.commit().await.context("Failed to commit comment like")?;
    Ok(Some(CommentLikeOutcome { active, like_count }))
}

async fn load_threads_mysql(
    pool: &MySqlPool,
    post_id: &str,
    params: &ListParams,
) -> Result<(Vec<Comment>, Vec<Comment>, i64)> {
    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM forum_comments WHERE post_id = ? AND parent_id IS NULL")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?
        .get("count");

    let tops_sql = format!(
        "{} WHERE c.post_id = ? AND c.parent_id IS NULL ORDER BY c.created_at ASC, c.id ASC LIMIT ? OFFSET ?",
        COMMENT_SELECT
    );
    let tops: Vec<Comment> = sqlx::query(&tops_sql)
        .bind(post_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?
        .iter()
        .map(row_to_comment_mysql)
        .collect();

    if tops.is_empty() {
        return Ok((tops, Vec::new(), total));
    }

    let replies_sql = format!(
        "{} WHERE c.post_id = ? AND c.parent_id IS NOT NULL ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    );
    let replies = sqlx::query(&replies_sql)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list replies")?
        .iter()
        .map(row_to_comment_mysql)
        .collect();

    Ok((tops, replies, total))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        is_anonymous: row.get("is_anonymous"),
        like_count: row.get("like_count"),
        created_at: row.get("created_at"),
    }
}
