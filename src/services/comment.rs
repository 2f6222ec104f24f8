//! Forum comment service
//!
//! Comments form a tree under each post. Deleting a comment removes every
//! reply beneath it and keeps the post's `comment_count` and heat in step.

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{
    Comment, CommentInsert, CommentLikeOutcome, CommentMutation, CommentThread, CreateCommentInput, ListParams,
    PagedResult, User,
};
use crate::services::heat::HeatCalculator;
use crate::services::post::ForumError;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_COMMENT_LEN: usize = 5000;

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    heat: HeatCalculator,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>, heat: HeatCalculator) -> Self {
        Self { comments, posts, heat }
    }

    /// Add a comment or a reply to `post_id`
    pub async fn add(
        &self,
        post_id: &str,
        actor: &User,
        input: CreateCommentInput,
    ) -> Result<(Comment, CommentMutation), ForumError> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(ForumError::validation("content", "must not be empty"));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(ForumError::validation(
                "content",
                format!("must be at most {} characters", MAX_COMMENT_LEN),
            ));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            author_id: actor.id,
            author_name: actor.display_name.clone(),
            parent_id: input.parent_id,
            content,
            is_anonymous: input.is_anonymous,
            like_count: 0,
            created_at: Utc::now(),
        };

        let mutation = match self.comments.create(&comment, &self.heat, comment.created_at).await? {
            CommentInsert::Added(mutation) => mutation,
            CommentInsert::PostNotFound => return Err(ForumError::NotFound("post")),
            CommentInsert::ParentNotFound => return Err(ForumError::NotFound("parent comment")),
            CommentInsert::ParentOnOtherPost => {
                return Err(ForumError::validation("parent_id", "belongs to another post"))
            }
        };

        tracing::debug!(comment_id = %comment.id, post_id, "Comment added");
        Ok((comment, mutation))
    }

    /// Delete a comment and its replies (author or admin)
    pub async fn delete(&self, id: &str, actor: &User) -> Result<CommentMutation, ForumError> {
        let comment = self
            .comments
            .get_by_id(id)
            .await?
            .ok_or(ForumError::NotFound("comment"))?;
        if !actor.can_moderate(comment.author_id) {
            return Err(ForumError::PermissionDenied(
                "only the author or an admin can delete this comment",
            ));
        }

        let mutation = self
            .comments
            .delete_subtree(id, &self.heat, Utc::now())
            .await?
            .ok_or(ForumError::NotFound("comment"))?;

        tracing::info!(
            comment_id = %id,
            post_id = %comment.post_id,
            removed = mutation.affected,
            "Comment deleted"
        );
        Ok(mutation)
    }

    pub async fn toggle_like(&self, id: &str, actor: &User) -> Result<CommentLikeOutcome, ForumError> {
        self.comments
            .toggle_like(id, actor.id)
            .await?
            .ok_or(ForumError::NotFound("comment"))
    }

    /// A page of comment threads on an existing post
    pub async fn list(&self, post_id: &str, params: &ListParams) -> Result<PagedResult<CommentThread>, ForumError> {
        if self.posts.get_by_id(post_id).await?.is_none() {
            return Err(ForumError::NotFound("post"));
        }
        Ok(self.comments.list_threads(post_id, params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::post::test_support::{forum, input};

    fn reply(content: &str, parent: Option<&str>) -> CreateCommentInput {
        CreateCommentInput {
            content: content.to_string(),
            parent_id: parent.map(str::to_string),
            is_anonymous: false,
        }
    }

    #[tokio::test]
    async fn test_add_updates_counter_and_heat() {
        let f = forum().await;
        let post = f.posts.create(&f.alice, input("q", None)).await.unwrap();

        let (comment, mutation) = f.comments.add(&post.id, &f.bob, reply(" answer ", None)).await.unwrap();
        assert_eq!(comment.content, "answer");
        assert_eq!(mutation.affected, 1);
        assert_eq!(mutation.comment_count, 1);
        assert!(mutation.heat_score > 0.0);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_input() {
        let f = forum().await;
        let post = f.posts.create(&f.alice, input("q", None)).await.unwrap();
        let other = f.posts.create(&f.alice, input("other", None)).await.unwrap();
        let (foreign, _) = f.comments.add(&other.id, &f.bob, reply("x", None)).await.unwrap();

        assert!(matches!(
            f.comments.add(&post.id, &f.bob, reply("  ", None)).await,
            Err(ForumError::Validation { field: "content", .. })
        ));
        assert!(matches!(
            f.comments.add(&post.id, &f.bob, reply("hi", Some(&foreign.id))).await,
            Err(ForumError::Validation { field: "parent_id", .. })
        ));
        assert!(matches!(
            f.comments.add(&post.id, &f.bob, reply("hi", Some("nope"))).await,
            Err(ForumError::NotFound("parent comment"))
        ));
        assert!(matches!(
            f.comments.add("missing", &f.bob, reply("hi", None)).await,
            Err(ForumError::NotFound("post"))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_replies() {
        let f = forum().await;
        let post = f.posts.create(&f.alice, input("q", None)).await.unwrap();
        let (root, _) = f.comments.add(&post.id, &f.bob, reply("root", None)).await.unwrap();
        let (child, _) = f.comments.add(&post.id, &f.alice, reply("child", Some(&root.id))).await.unwrap();
        f.comments.add(&post.id, &f.bob, reply("grandchild", Some(&child.id))).await.unwrap();
        f.comments.add(&post.id, &f.bob, reply("sibling", None)).await.unwrap();

        assert!(matches!(
            f.comments.delete(&root.id, &f.alice).await,
            Err(ForumError::PermissionDenied(_))
        ));

        let mutation = f.comments.delete(&root.id, &f.bob).await.unwrap();
        assert_eq!(mutation.affected, 3);
        assert_eq!(mutation.comment_count, 1);

        let threads = f.comments.list(&post.id, &ListParams::default()).await.unwrap();
        assert_eq!(threads.total, 1);
        assert_eq!(threads.items[0].comment.content, "sibling");
    }

    #[tokio::test]
    async fn test_admin_deletes_any_comment() {
        let f = forum().await;
        let post = f.posts.create(&f.alice, input("q", None)).await.unwrap();
        let (comment, _) = f.comments.add(&post.id, &f.bob, reply("spam", None)).await.unwrap();

        assert_eq!(f.comments.delete(&comment.id, &f.admin).await.unwrap().comment_count, 0);
        assert!(matches!(
            f.comments.delete(&comment.id, &f.admin).await,
            Err(ForumError::NotFound("comment"))
        ));
    }

    #[tokio::test]
    async fn test_toggle_like() {
        let f = forum().await;
        let post = f.posts.create(&f.alice, input("q", None)).await.unwrap();
        let (comment, _) = f.comments.add(&post.id, &f.bob, reply("nice", None)).await.unwrap();

        let liked = f.comments.toggle_like(&comment.id, &f.alice).await.unwrap();
        assert_eq!(liked, CommentLikeOutcome { active: true, like_count: 1 });
        let unliked = f.comments.toggle_like(&comment.id, &f.alice).await.unwrap();
        assert_eq!(unliked, CommentLikeOutcome { active: false, like_count: 0 });

        assert!(matches!(
            f.comments.toggle_like("missing", &f.alice).await,
            Err(ForumError::NotFound("comment"))
        ));
    }

    #[tokio::test]
    async fn test_list_on_missing_post() {
        let f = forum().await;
        assert!(matches!(
            f.comments.list("missing", &ListParams::default()).await,
            Err(ForumError::NotFound("post"))
        ));
    }
}
