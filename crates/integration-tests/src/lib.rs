//! Shared fixtures for the end-to-end tests: an engine wired against the
//! in-memory adapters, plus helpers for seeding accounts and items with
//! fixed timestamps.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use domains::{
    Account, AccountId, AccountRepository, ContentId, ContentItem, ContentRepository,
    CreateItemCommand, StoreQuery, Visibility,
};
use services::{Engine, EngineOptions};
use storage_adapters::{InMemoryMediaStorage, InMemoryStore};
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub media: Arc<InMemoryMediaStorage>,
    pub engine: Engine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(fast_options())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let media = Arc::new(InMemoryMediaStorage::default());
        let engine = Engine::new(store.clone(), media.clone(), options);
        Self { store, media, engine }
    }

    /// Registers an account whose nickname is `name`.
    pub async fn account(&self, name: &str) -> AccountId {
        insert_account(&self.store, name).await
    }

    /// Inserts an item straight into the store with a fixed creation time.
    pub async fn item_at(
        &self,
        owner: AccountId,
        title: &str,
        tags: &[&str],
        visibility: Visibility,
        created_at: DateTime<Utc>,
    ) -> ContentId {
        insert_item_at(&self.store, owner, title, tags, visibility, created_at).await
    }

    pub async fn stored(&self, id: ContentId) -> ContentItem {
        self.store.get_item(id).await.unwrap().expect("item exists")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn insert_account(store: &InMemoryStore, name: &str) -> AccountId {
    let account = Account {
        id: Uuid::new_v4(),
        username: name.to_lowercase(),
        password_hash: "argon2-hash".to_string(),
        nickname: name.to_string(),
        avatar: Some(format!("/avatars/{}.png", name.to_lowercase())),
        signature: None,
        email: Some(format!("{}@example.com", name.to_lowercase())),
        country: None,
        blog_background: None,
        created_at: Utc::now(),
    };
    let id = account.id;
    assert!(store.insert_account(account).await.unwrap());
    id
}

pub async fn insert_item_at(
    store: &InMemoryStore,
    owner: AccountId,
    title: &str,
    tags: &[&str],
    visibility: Visibility,
    created_at: DateTime<Utc>,
) -> ContentId {
    let item = CreateItemCommand {
        title: title.to_string(),
        body: format!("body of {title}"),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        media: Vec::new(),
        visibility,
    }
    .into_item(owner, created_at)
    .unwrap();
    let id = item.id;
    store.insert_item(item).await.unwrap();
    id
}

/// Default options with a short retry backoff.
pub fn fast_options() -> EngineOptions {
    EngineOptions {
        counter_retry_backoff: std::time::Duration::from_millis(1),
        ..EngineOptions::default()
    }
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Content repository whose comment counter update fails a fixed number of
/// times before delegating.
pub struct FlakyCounterStore {
    inner: Arc<InMemoryStore>,
    failures_left: AtomicU32,
    pub attempts: AtomicU32,
}

impl FlakyCounterStore {
    pub fn new(inner: Arc<InMemoryStore>, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ContentRepository for FlakyCounterStore {
    async fn insert_item(&self, item: ContentItem) -> anyhow::Result<()> {
        self.inner.insert_item(item).await
    }

    async fn get_item(&self, id: ContentId) -> anyhow::Result<Option<ContentItem>> {
        self.inner.get_item(id).await
    }

    async fn update_item(&self, item: &ContentItem) -> anyhow::Result<bool> {
        self.inner.update_item(item).await
    }

    async fn delete_item(&self, id: ContentId) -> anyhow::Result<bool> {
        self.inner.delete_item(id).await
    }

    async fn find_items(&self, query: &StoreQuery) -> anyhow::Result<Vec<ContentItem>> {
        self.inner.find_items(query).await
    }

    fn supports_tag_containment(&self) -> bool {
        self.inner.supports_tag_containment()
    }

    async fn increment_views(&self, id: ContentId) -> anyhow::Result<Option<u64>> {
        self.inner.increment_views(id).await
    }

    async fn adjust_comment_count(&self, id: ContentId, delta: i64) -> anyhow::Result<Option<u64>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("simulated write conflict");
        }
        self.inner.adjust_comment_count(id, delta).await
    }

    async fn set_comment_count(&self, id: ContentId, count: u64) -> anyhow::Result<bool> {
        self.inner.set_comment_count(id, count).await
    }
}

/// Content repository that deletes an item right after handing it out, so a
/// caller's existence check passes but every later write finds it gone.
pub struct VanishingItemStore {
    inner: Arc<InMemoryStore>,
}

impl VanishingItemStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ContentRepository for VanishingItemStore {
    async fn insert_item(&self, item: ContentItem) -> anyhow::Result<()> {
        self.inner.insert_item(item).await
    }

    async fn get_item(&self, id: ContentId) -> anyhow::Result<Option<ContentItem>> {
        let item = self.inner.get_item(id).await?;
        if item.is_some() {
            self.inner.delete_item(id).await?;
        }
        Ok(item)
    }

    async fn update_item(&self, item: &ContentItem) -> anyhow::Result<bool> {
        self.inner.update_item(item).await
    }

    async fn delete_item(&self, id: ContentId) -> anyhow::Result<bool> {
        self.inner.delete_item(id).await
    }

    async fn find_items(&self, query: &StoreQuery) -> anyhow::Result<Vec<ContentItem>> {
        self.inner.find_items(query).await
    }

    fn supports_tag_containment(&self) -> bool {
        self.inner.supports_tag_containment()
    }

    async fn increment_views(&self, id: ContentId) -> anyhow::Result<Option<u64>> {
        self.inner.increment_views(id).await
    }

    async fn adjust_comment_count(&self, id: ContentId, delta: i64) -> anyhow::Result<Option<u64>> {
        self.inner.adjust_comment_count(id, delta).await
    }

    async fn set_comment_count(&self, id: ContentId, count: u64) -> anyhow::Result<bool> {
        self.inner.set_comment_count(id, count).await
    }
}
