//! Denormalized view and comment counters.
//!
//! Every change goes through the store's atomic increment primitive; nothing
//! here reads a counter, modifies it and writes it back.

use std::sync::Arc;

use domains::{CommentRepository, ContentId, ContentRepository, DomainError, Result};
use tracing::{debug, error, instrument, warn};

use crate::EngineOptions;

/// A single comment being added to or removed from an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentDelta {
    Added,
    Removed,
}

impl CommentDelta {
    pub fn as_i64(self) -> i64 {
        match self {
            CommentDelta::Added => 1,
            CommentDelta::Removed => -1,
        }
    }
}

#[derive(Clone)]
pub struct CounterService {
    content: Arc<dyn ContentRepository>,
    comments: Arc<dyn CommentRepository>,
    options: EngineOptions,
}

impl CounterService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        comments: Arc<dyn CommentRepository>,
        options: EngineOptions,
    ) -> Self {
        Self {
            content,
            comments,
            options,
        }
    }

    /// Adds exactly one view and returns the new count.
    #[instrument(skip(self))]
    pub async fn increment_view(&self, id: ContentId) -> Result<u64> {
        self.content
            .increment_views(id)
            .await?
            .ok_or_else(|| DomainError::not_found("content item", id))
    }

    /// One atomic adjustment, floored at zero. Does not touch `updated_at`.
    #[instrument(skip(self))]
    pub async fn increment_comment_count(&self, id: ContentId, delta: CommentDelta) -> Result<u64> {
        self.content
            .adjust_comment_count(id, delta.as_i64())
            .await?
            .ok_or_else(|| DomainError::not_found("content item", id))
    }

    /// Like [`Self::increment_comment_count`] but retries storage failures
    /// with linear backoff. A missing item is not retried.
    #[instrument(skip(self))]
    pub async fn adjust_comment_count_with_retry(
        &self,
        id: ContentId,
        delta: CommentDelta,
    ) -> Result<u64> {
        let attempts = self.options.counter_retry_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.content.adjust_comment_count(id, delta.as_i64()).await {
                Ok(Some(count)) => {
                    debug!(count, attempt, "comment count adjusted");
                    return Ok(count);
                }
                Ok(None) => return Err(DomainError::not_found("content item", id)),
                Err(err) if attempt < attempts => {
                    warn!(error = %err, attempt, attempts, "comment count adjustment failed, retrying");
                    tokio::time::sleep(self.options.counter_retry_backoff * attempt).await;
                }
                Err(err) => {
                    error!(error = %err, attempts, "comment count adjustment gave up; reconcile required");
                    return Err(DomainError::Storage(err));
                }
            }
        }
    }

    /// Recounts live comments and stores the result. Meant for repairing
    /// drift after an adjustment exhausted its retries; concurrent comment
    /// writes during the recount may be missed.
    #[instrument(skip(self))]
    pub async fn reconcile_comment_count(&self, id: ContentId) -> Result<u64> {
        let live = self.comments.count_for(id).await?;
        if !self.content.set_comment_count(id, live).await? {
            return Err(DomainError::not_found("content item", id));
        }
        debug!(live, "comment count reconciled");
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockCommentRepository, MockContentRepository};
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn options(attempts: u32) -> EngineOptions {
        EngineOptions {
            counter_retry_attempts: attempts,
            counter_retry_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    fn service(content: MockContentRepository, comments: MockCommentRepository, attempts: u32) -> CounterService {
        CounterService::new(Arc::new(content), Arc::new(comments), options(attempts))
    }

    #[tokio::test]
    async fn test_increment_view_missing_item_is_not_found() {
        let mut content = MockContentRepository::new();
        content.expect_increment_views().returning(|_| Ok(None));

        let err = service(content, MockCommentRepository::new(), 1)
            .increment_view(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "content item", .. }));
    }

    #[tokio::test]
    async fn test_decrement_passes_negative_delta() {
        let id = Uuid::new_v4();
        let mut content = MockContentRepository::new();
        content
            .expect_adjust_comment_count()
            .with(eq(id), eq(-1))
            .times(1)
            .returning(|_, _| Ok(Some(0)));

        let count = service(content, MockCommentRepository::new(), 1)
            .increment_comment_count(id, CommentDelta::Removed)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let mut content = MockContentRepository::new();
        content.expect_adjust_comment_count().returning(move |_, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(anyhow::anyhow!("write conflict"))
            } else {
                Ok(Some(4))
            }
        });

        let count = service(content, MockCommentRepository::new(), 5)
            .adjust_comment_count_with_retry(Uuid::new_v4(), CommentDelta::Added)
            .await
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let mut content = MockContentRepository::new();
        content
            .expect_adjust_comment_count()
            .times(3)
            .returning(|_, _| Err(anyhow::anyhow!("store unavailable")));

        let err = service(content, MockCommentRepository::new(), 3)
            .adjust_comment_count_with_retry(Uuid::new_v4(), CommentDelta::Removed)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
    }

    #[tokio::test]
    async fn test_missing_item_is_not_retried() {
        let mut content = MockContentRepository::new();
        content
            .expect_adjust_comment_count()
            .times(1)
            .returning(|_, _| Ok(None));

        let err = service(content, MockCommentRepository::new(), 5)
            .adjust_comment_count_with_retry(Uuid::new_v4(), CommentDelta::Added)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_stores_live_comment_count() {
        let id = Uuid::new_v4();
        let mut comments = MockCommentRepository::new();
        comments.expect_count_for().with(eq(id)).returning(|_| Ok(3));
        let mut content = MockContentRepository::new();
        content
            .expect_set_comment_count()
            .with(eq(id), eq(3u64))
            .times(1)
            .returning(|_, _| Ok(true));

        let live = service(content, comments, 1).reconcile_comment_count(id).await.unwrap();
        assert_eq!(live, 3);
    }
}
