//! # In-memory ContentStore
//!
//! One `DashMap` per collection. Counter updates happen inside a `get_mut`
//! guard, which holds the shard's write lock, so concurrent increments
//! serialize per item and none are lost.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    Account, AccountId, AccountRepository, Comment, CommentId, CommentRepository, ContentId,
    ContentItem, ContentRepository, FollowEdge, FollowRepository, MediaRef, MediaStorage,
    OwnerProfile, StoreQuery, WallPhoto, WallRepository,
};
use mime::Mime;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    items: DashMap<ContentId, ContentItem>,
    comments: DashMap<CommentId, Comment>,
    follows: DashMap<(AccountId, AccountId), FollowEdge>,
    accounts: DashMap<AccountId, Account>,
    usernames: DashMap<String, AccountId>,
    photos: DashMap<Uuid, WallPhoto>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentRepository for InMemoryStore {
    async fn insert_item(&self, item: ContentItem) -> anyhow::Result<()> {
        match self.items.entry(item.id) {
            Entry::Occupied(_) => anyhow::bail!("content item {} already exists", item.id),
            Entry::Vacant(slot) => {
                slot.insert(item);
                Ok(())
            }
        }
    }

    async fn get_item(&self, id: ContentId) -> anyhow::Result<Option<ContentItem>> {
        Ok(self.items.get(&id).map(|item| item.value().clone()))
    }

    async fn update_item(&self, item: &ContentItem) -> anyhow::Result<bool> {
        let Some(mut stored) = self.items.get_mut(&item.id) else {
            return Ok(false);
        };
        stored.title = item.title.clone();
        stored.body = item.body.clone();
        stored.tags = item.tags.clone();
        stored.media = item.media.clone();
        stored.visibility = item.visibility;
        stored.updated_at = item.updated_at;
        Ok(true)
    }

    async fn delete_item(&self, id: ContentId) -> anyhow::Result<bool> {
        Ok(self.items.remove(&id).is_some())
    }

    async fn find_items(&self, query: &StoreQuery) -> anyhow::Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .items
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        query.order.sort(&mut items);
        Ok(items)
    }

    fn supports_tag_containment(&self) -> bool {
        false
    }

    async fn increment_views(&self, id: ContentId) -> anyhow::Result<Option<u64>> {
        Ok(self.items.get_mut(&id).map(|mut item| {
            item.views += 1;
            item.views
        }))
    }

    async fn adjust_comment_count(&self, id: ContentId, delta: i64) -> anyhow::Result<Option<u64>> {
        Ok(self.items.get_mut(&id).map(|mut item| {
            item.comment_count = item.comment_count.saturating_add_signed(delta);
            item.comment_count
        }))
    }

    async fn set_comment_count(&self, id: ContentId, count: u64) -> anyhow::Result<bool> {
        Ok(self
            .items
            .get_mut(&id)
            .map(|mut item| item.comment_count = count)
            .is_some())
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()> {
        self.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn get_comment(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|c| c.value().clone()))
    }

    async fn delete_comment(&self, id: CommentId) -> anyhow::Result<bool> {
        Ok(self.comments.remove(&id).is_some())
    }

    async fn comments_for(&self, content_id: ContentId) -> anyhow::Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.content_id == content_id)
            .map(|c| c.value().clone())
            .collect();
        comments.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(comments)
    }

    async fn count_for(&self, content_id: ContentId) -> anyhow::Result<u64> {
        Ok(self
            .comments
            .iter()
            .filter(|c| c.content_id == content_id)
            .count() as u64)
    }

    async fn delete_for_content(&self, content_id: ContentId) -> anyhow::Result<u64> {
        let mut removed = 0u64;
        self.comments.retain(|_, c| {
            let keep = c.content_id != content_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[async_trait]
impl FollowRepository for InMemoryStore {
    async fn insert_edge(&self, edge: FollowEdge) -> anyhow::Result<bool> {
        match self.follows.entry((edge.follower, edge.followee)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(edge);
                Ok(true)
            }
        }
    }

    async fn delete_edge(&self, follower: AccountId, followee: AccountId) -> anyhow::Result<bool> {
        Ok(self.follows.remove(&(follower, followee)).is_some())
    }

    async fn edge_exists(&self, follower: AccountId, followee: AccountId) -> anyhow::Result<bool> {
        Ok(self.follows.contains_key(&(follower, followee)))
    }

    async fn followees_of(&self, follower: AccountId) -> anyhow::Result<Vec<AccountId>> {
        let mut ids: Vec<AccountId> = self
            .follows
            .iter()
            .filter(|e| e.follower == follower)
            .map(|e| e.followee)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn followers_of(&self, followee: AccountId) -> anyhow::Result<Vec<AccountId>> {
        let mut ids: Vec<AccountId> = self
            .follows
            .iter()
            .filter(|e| e.followee == followee)
            .map(|e| e.follower)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn get_account(&self, id: AccountId) -> anyhow::Result<Option<Account>> {
        Ok(self.accounts.get(&id).map(|a| a.value().clone()))
    }

    async fn profiles(&self, ids: &[AccountId]) -> anyhow::Result<HashMap<AccountId, OwnerProfile>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.accounts
                    .get(id)
                    .map(|account| (*id, OwnerProfile::from(account.value())))
            })
            .collect())
    }

    /// The username is claimed through its index entry, so two inserts racing
    /// on one name cannot both succeed. Lock order is usernames, then accounts.
    async fn insert_account(&self, account: Account) -> anyhow::Result<bool> {
        let Entry::Vacant(name_slot) = self.usernames.entry(account.username.clone()) else {
            return Ok(false);
        };
        match self.accounts.entry(account.id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                name_slot.insert(account.id);
                slot.insert(account);
                Ok(true)
            }
        }
    }

    /// Profile fields only; the username and credentials stay as stored.
    async fn update_account(&self, account: &Account) -> anyhow::Result<bool> {
        let Some(mut stored) = self.accounts.get_mut(&account.id) else {
            return Ok(false);
        };
        stored.nickname = account.nickname.clone();
        stored.avatar = account.avatar.clone();
        stored.signature = account.signature.clone();
        stored.email = account.email.clone();
        stored.country = account.country.clone();
        stored.blog_background = account.blog_background.clone();
        Ok(true)
    }
}

#[async_trait]
impl WallRepository for InMemoryStore {
    async fn insert_photo(&self, photo: WallPhoto) -> anyhow::Result<()> {
        self.photos.insert(photo.id, photo);
        Ok(())
    }

    async fn list_photos(&self) -> anyhow::Result<Vec<WallPhoto>> {
        Ok(self.photos.iter().map(|p| p.value().clone()).collect())
    }
}

/// Media kept in process memory, for tests and ephemeral runs.
pub struct InMemoryMediaStorage {
    blobs: DashMap<MediaRef, (Bytes, Mime)>,
    url_prefix: String,
}

impl InMemoryMediaStorage {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            blobs: DashMap::new(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn contains(&self, media: &str) -> bool {
        self.blobs.contains_key(media)
    }
}

impl Default for InMemoryMediaStorage {
    fn default() -> Self {
        Self::new("/media")
    }
}

#[async_trait]
impl MediaStorage for InMemoryMediaStorage {
    async fn save(&self, data: Bytes, content_type: &Mime) -> anyhow::Result<MediaRef> {
        let media = Uuid::new_v4().simple().to_string();
        self.blobs.insert(media.clone(), (data, content_type.clone()));
        Ok(media)
    }

    async fn delete(&self, media: &str) -> anyhow::Result<()> {
        self.blobs.remove(media);
        Ok(())
    }

    fn url(&self, media: &str) -> String {
        format!("{}/{}", self.url_prefix, media)
    }
}
