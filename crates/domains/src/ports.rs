//! # Ports
//!
//! Any storage adapter must implement these traits to back the engine.
//! Adapters report failures as `anyhow::Error`; services wrap them in
//! `DomainError::Storage`.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;

use crate::filter::StoreQuery;
use crate::models::{
    Account, AccountId, Comment, CommentId, ContentId, ContentItem, FollowEdge, MediaRef,
    OwnerProfile, WallPhoto,
};

/// Persistence contract for content items.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn insert_item(&self, item: ContentItem) -> anyhow::Result<()>;
    async fn get_item(&self, id: ContentId) -> anyhow::Result<Option<ContentItem>>;

    /// Writes the editable fields (title, body, tags, media, visibility,
    /// updated_at). Counters are left to the atomic operations below.
    /// Returns `false` if the item does not exist.
    async fn update_item(&self, item: &ContentItem) -> anyhow::Result<bool>;
    async fn delete_item(&self, id: ContentId) -> anyhow::Result<bool>;

    /// Every item matching `query`, ordered by `query.order`.
    async fn find_items(&self, query: &StoreQuery) -> anyhow::Result<Vec<ContentItem>>;

    /// Whether `find_items` evaluates `StoreQuery::tag` itself. When `false`
    /// the caller filters by tag in process.
    fn supports_tag_containment(&self) -> bool;

    /// Atomic `views += 1`. `None` if the item does not exist.
    async fn increment_views(&self, id: ContentId) -> anyhow::Result<Option<u64>>;

    /// Atomic `comment_count = max(comment_count + delta, 0)`.
    /// `None` if the item does not exist.
    async fn adjust_comment_count(&self, id: ContentId, delta: i64) -> anyhow::Result<Option<u64>>;

    async fn set_comment_count(&self, id: ContentId, count: u64) -> anyhow::Result<bool>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()>;
    async fn get_comment(&self, id: CommentId) -> anyhow::Result<Option<Comment>>;
    /// Returns `false` if the comment was already gone.
    async fn delete_comment(&self, id: CommentId) -> anyhow::Result<bool>;
    /// Oldest first.
    async fn comments_for(&self, content_id: ContentId) -> anyhow::Result<Vec<Comment>>;
    async fn count_for(&self, content_id: ContentId) -> anyhow::Result<u64>;
    /// Removes every comment on an item, returning how many were removed.
    async fn delete_for_content(&self, content_id: ContentId) -> anyhow::Result<u64>;
}

/// The social graph.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Idempotent insert; returns `true` if a new edge was created.
    async fn insert_edge(&self, edge: FollowEdge) -> anyhow::Result<bool>;
    /// Returns `true` if an edge was removed.
    async fn delete_edge(&self, follower: AccountId, followee: AccountId) -> anyhow::Result<bool>;
    async fn edge_exists(&self, follower: AccountId, followee: AccountId) -> anyhow::Result<bool>;
    async fn followees_of(&self, follower: AccountId) -> anyhow::Result<Vec<AccountId>>;
    async fn followers_of(&self, followee: AccountId) -> anyhow::Result<Vec<AccountId>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn get_account(&self, id: AccountId) -> anyhow::Result<Option<Account>>;
    /// Owner projections for the ids that resolve; unknown ids are absent.
    async fn profiles(&self, ids: &[AccountId]) -> anyhow::Result<HashMap<AccountId, OwnerProfile>>;
    /// Returns `false` if the id or username is taken.
    async fn insert_account(&self, account: Account) -> anyhow::Result<bool>;
    async fn update_account(&self, account: &Account) -> anyhow::Result<bool>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WallRepository: Send + Sync {
    async fn insert_photo(&self, photo: WallPhoto) -> anyhow::Result<()>;
    async fn list_photos(&self) -> anyhow::Result<Vec<WallPhoto>>;
}

/// Binary storage for uploaded media.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn save(&self, data: Bytes, content_type: &Mime) -> anyhow::Result<MediaRef>;
    /// Deleting an unknown reference is not an error.
    async fn delete(&self, media: &str) -> anyhow::Result<()>;
    fn url(&self, media: &str) -> String;
}

/// A single backend that serves every record collection.
pub trait ContentStore:
    ContentRepository + CommentRepository + FollowRepository + AccountRepository + WallRepository
{
}

impl<T> ContentStore for T where
    T: ContentRepository + CommentRepository + FollowRepository + AccountRepository + WallRepository
{
}
