//! Comments and their effect on the parent's comment counter.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AccountId, Annotated, Comment, CommentId, CommentRepository, ContentId, ContentRepository,
    CreateCommentCommand, DomainError, Result,
};
use tracing::{error, info, instrument, warn};

use crate::{CommentDelta, CounterService, OwnerAnnotator};

#[derive(Clone)]
pub struct CommentService {
    content: Arc<dyn ContentRepository>,
    comments: Arc<dyn CommentRepository>,
    counters: CounterService,
    annotator: OwnerAnnotator,
}

impl CommentService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        comments: Arc<dyn CommentRepository>,
        counters: CounterService,
        annotator: OwnerAnnotator,
    ) -> Self {
        Self {
            content,
            comments,
            counters,
            annotator,
        }
    }

    /// Stores the comment, then bumps the parent's counter exactly once.
    ///
    /// The parent must exist and be visible to `actor`. If the parent is
    /// deleted between the check and the counter update, the comment is
    /// withdrawn and the call fails with `InvalidReference`. Once the comment
    /// is committed, a counter update that exhausts its retries is logged and
    /// the comment is still returned; `reconcile_comment_count` repairs the
    /// count.
    #[instrument(skip(self, cmd), fields(content_id = %cmd.content_id))]
    pub async fn create_comment(&self, actor: AccountId, cmd: CreateCommentCommand) -> Result<Comment> {
        let visible = self
            .content
            .get_item(cmd.content_id)
            .await?
            .is_some_and(|item| item.visible_to(Some(actor)));
        if !visible {
            return Err(DomainError::InvalidReference(format!(
                "content item {} does not exist",
                cmd.content_id
            )));
        }

        let comment = cmd.into_comment(actor, Utc::now())?;
        self.comments.insert_comment(comment.clone()).await?;
        match self
            .counters
            .adjust_comment_count_with_retry(comment.content_id, CommentDelta::Added)
            .await
        {
            Ok(_) => {}
            Err(DomainError::NotFound { .. }) => {
                self.comments.delete_comment(comment.id).await?;
                warn!(comment_id = %comment.id, "parent deleted during comment creation; comment withdrawn");
                return Err(DomainError::InvalidReference(format!(
                    "content item {} does not exist",
                    comment.content_id
                )));
            }
            Err(err) => {
                error!(comment_id = %comment.id, error = %err, "comment stored but counter not adjusted");
            }
        }
        info!(comment_id = %comment.id, "comment created");
        Ok(comment)
    }

    /// Allowed for the comment's author and the parent item's owner. The
    /// delete commits first; the counter follows with retries, and a counter
    /// failure after the delete is logged rather than returned.
    #[instrument(skip(self))]
    pub async fn delete_comment(&self, actor: AccountId, id: CommentId) -> Result<()> {
        let comment = self
            .comments
            .get_comment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment", id))?;
        let parent = self.content.get_item(comment.content_id).await?;

        let is_author = comment.author == actor;
        let owns_parent = parent.as_ref().is_some_and(|item| item.owner == actor);
        if !is_author && !owns_parent {
            return Err(DomainError::Unauthorized(format!(
                "account {actor} may not delete comment {id}"
            )));
        }

        if !self.comments.delete_comment(id).await? {
            return Err(DomainError::not_found("comment", id));
        }
        if parent.is_some() {
            match self
                .counters
                .adjust_comment_count_with_retry(comment.content_id, CommentDelta::Removed)
                .await
            {
                Ok(_) => {}
                // parent deleted concurrently; nothing left to count
                Err(DomainError::NotFound { .. }) => {
                    warn!(content_id = %comment.content_id, "parent vanished before counter update");
                }
                Err(err) => {
                    error!(content_id = %comment.content_id, error = %err, "comment deleted but counter not adjusted");
                }
            }
        }
        info!("comment deleted");
        Ok(())
    }

    /// Comments on an item, oldest first, with their authors' profiles.
    #[instrument(skip(self))]
    pub async fn list_comments(&self, content_id: ContentId) -> Result<Vec<Annotated<Comment>>> {
        let comments = self.comments.comments_for(content_id).await?;
        Ok(self.annotator.annotate(comments, |c| c.author).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineOptions;
    use domains::{
        ContentItem, CreateItemCommand, MockAccountRepository, MockCommentRepository,
        MockContentRepository, Visibility,
    };
    use mockall::predicate::eq;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn parent(owner: AccountId) -> ContentItem {
        parent_with(owner, Visibility::Public)
    }

    fn parent_with(owner: AccountId, visibility: Visibility) -> ContentItem {
        CreateItemCommand {
            title: "t".into(),
            body: "b".into(),
            visibility,
            ..Default::default()
        }
        .into_item(owner, Utc::now())
        .unwrap()
    }

    fn service(content: MockContentRepository, comments: MockCommentRepository) -> CommentService {
        let content: Arc<dyn ContentRepository> = Arc::new(content);
        let comments: Arc<dyn CommentRepository> = Arc::new(comments);
        let mut accounts = MockAccountRepository::new();
        accounts.expect_profiles().returning(|_| Ok(HashMap::new()));
        let counters = CounterService::new(content.clone(), comments.clone(), EngineOptions::default());
        CommentService::new(content, comments, counters, OwnerAnnotator::new(Arc::new(accounts)))
    }

    #[tokio::test]
    async fn test_comment_on_missing_item_is_invalid_reference() {
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(|_| Ok(None));
        let mut comments = MockCommentRepository::new();
        comments.expect_insert_comment().never();

        let err = service(content, comments)
            .create_comment(
                Uuid::new_v4(),
                CreateCommentCommand {
                    content_id: Uuid::new_v4(),
                    body: "hi".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_create_increments_counter_once() {
        let item = parent(Uuid::new_v4());
        let id = item.id;
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(move |_| Ok(Some(item.clone())));
        content
            .expect_adjust_comment_count()
            .with(eq(id), eq(1))
            .times(1)
            .returning(|_, _| Ok(Some(1)));
        let mut comments = MockCommentRepository::new();
        comments.expect_insert_comment().times(1).returning(|_| Ok(()));

        let comment = service(content, comments)
            .create_comment(
                Uuid::new_v4(),
                CreateCommentCommand {
                    content_id: id,
                    body: "nice post".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(comment.content_id, id);
    }

    #[tokio::test]
    async fn test_stranger_cannot_delete_comment() {
        let item = parent(Uuid::new_v4());
        let comment = Comment {
            id: Uuid::new_v4(),
            content_id: item.id,
            author: Uuid::new_v4(),
            body: "x".into(),
            created_at: Utc::now(),
        };
        let comment_id = comment.id;
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(move |_| Ok(Some(item.clone())));
        let mut comments = MockCommentRepository::new();
        comments
            .expect_get_comment()
            .returning(move |_| Ok(Some(comment.clone())));
        comments.expect_delete_comment().never();

        let err = service(content, comments)
            .delete_comment(Uuid::new_v4(), comment_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_item_owner_may_delete_others_comments() {
        let owner = Uuid::new_v4();
        let item = parent(owner);
        let content_id = item.id;
        let comment = Comment {
            id: Uuid::new_v4(),
            content_id,
            author: Uuid::new_v4(),
            body: "x".into(),
            created_at: Utc::now(),
        };
        let comment_id = comment.id;
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(move |_| Ok(Some(item.clone())));
        content
            .expect_adjust_comment_count()
            .with(eq(content_id), eq(-1))
            .times(1)
            .returning(|_, _| Ok(Some(0)));
        let mut comments = MockCommentRepository::new();
        comments
            .expect_get_comment()
            .returning(move |_| Ok(Some(comment.clone())));
        comments
            .expect_delete_comment()
            .with(eq(comment_id))
            .times(1)
            .returning(|_| Ok(true));

        service(content, comments)
            .delete_comment(owner, comment_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_private_item_rejects_comments_from_others() {
        let owner = Uuid::new_v4();
        let item = parent_with(owner, Visibility::Private);
        let id = item.id;
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(move |_| Ok(Some(item.clone())));
        content.expect_adjust_comment_count().never();
        let mut comments = MockCommentRepository::new();
        comments.expect_insert_comment().never();

        let err = service(content, comments)
            .create_comment(
                Uuid::new_v4(),
                CreateCommentCommand {
                    content_id: id,
                    body: "let me in".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_owner_may_comment_on_own_private_item() {
        let owner = Uuid::new_v4();
        let item = parent_with(owner, Visibility::Private);
        let id = item.id;
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(move |_| Ok(Some(item.clone())));
        content
            .expect_adjust_comment_count()
            .times(1)
            .returning(|_, _| Ok(Some(1)));
        let mut comments = MockCommentRepository::new();
        comments.expect_insert_comment().times(1).returning(|_| Ok(()));

        service(content, comments)
            .create_comment(
                owner,
                CreateCommentCommand {
                    content_id: id,
                    body: "note to self".into(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_comment_is_withdrawn_when_parent_vanishes_before_count() {
        let item = parent(Uuid::new_v4());
        let id = item.id;
        let mut content = MockContentRepository::new();
        content.expect_get_item().returning(move |_| Ok(Some(item.clone())));
        // the parent is gone by the time the counter runs
        content
            .expect_adjust_comment_count()
            .times(1)
            .returning(|_, _| Ok(None));
        let mut comments = MockCommentRepository::new();
        comments.expect_insert_comment().times(1).returning(|_| Ok(()));
        comments.expect_delete_comment().times(1).returning(|_| Ok(true));

        let err = service(content, comments)
            .create_comment(
                Uuid::new_v4(),
                CreateCommentCommand {
                    content_id: id,
                    body: "too late".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidReference(_)));
    }
}
