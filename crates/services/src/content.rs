//! Article lifecycle: create, read, edit, delete.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AccountId, Annotated, CommentRepository, ContentId, ContentItem, ContentRepository,
    CreateItemCommand, DomainError, MediaStorage, Result, SortOrder, StoreQuery, UpdateItemCommand,
};
use tracing::{info, instrument, warn};

use crate::{CounterService, OwnerAnnotator};

#[derive(Clone)]
pub struct ContentService {
    content: Arc<dyn ContentRepository>,
    comments: Arc<dyn CommentRepository>,
    media: Arc<dyn MediaStorage>,
    counters: CounterService,
    annotator: OwnerAnnotator,
}

impl ContentService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        comments: Arc<dyn CommentRepository>,
        media: Arc<dyn MediaStorage>,
        counters: CounterService,
        annotator: OwnerAnnotator,
    ) -> Self {
        Self {
            content,
            comments,
            media,
            counters,
            annotator,
        }
    }

    /// Publishes an item owned by `actor`.
    #[instrument(skip(self, cmd), fields(title = %cmd.title))]
    pub async fn create_item(&self, actor: AccountId, cmd: CreateItemCommand) -> Result<ContentItem> {
        let item = cmd.into_item(actor, Utc::now())?;
        self.content.insert_item(item.clone()).await?;
        info!(content_id = %item.id, "content item created");
        Ok(item)
    }

    /// Reads an item without counting a view. Private items resolve only
    /// for their owner.
    #[instrument(skip(self))]
    pub async fn get_item(
        &self,
        viewer: Option<AccountId>,
        id: ContentId,
    ) -> Result<Annotated<ContentItem>> {
        let item = self.visible_item(viewer, id).await?;
        let owner = item.owner;
        Ok(self.annotator.annotate_one(item, owner).await)
    }

    /// Reads an item and counts one view.
    #[instrument(skip(self))]
    pub async fn open_item(
        &self,
        viewer: Option<AccountId>,
        id: ContentId,
    ) -> Result<Annotated<ContentItem>> {
        let mut item = self.visible_item(viewer, id).await?;
        item.views = self.counters.increment_view(id).await?;
        let owner = item.owner;
        Ok(self.annotator.annotate_one(item, owner).await)
    }

    #[instrument(skip(self, cmd))]
    pub async fn update_item(
        &self,
        actor: AccountId,
        id: ContentId,
        cmd: UpdateItemCommand,
    ) -> Result<ContentItem> {
        let mut item = self.owned_item(actor, id).await?;
        cmd.apply(&mut item, Utc::now())?;
        if !self.content.update_item(&item).await? {
            return Err(DomainError::not_found("content item", id));
        }
        info!("content item updated");
        Ok(item)
    }

    /// Releases media first, then the item's comments, then the record.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, actor: AccountId, id: ContentId) -> Result<()> {
        let item = self.owned_item(actor, id).await?;

        for media in &item.media {
            if let Err(err) = self.media.delete(media).await {
                warn!(error = %err, %media, "failed to release media");
            }
        }
        let removed_comments = self.comments.delete_for_content(id).await?;
        if !self.content.delete_item(id).await? {
            return Err(DomainError::not_found("content item", id));
        }
        info!(removed_comments, "content item deleted");
        Ok(())
    }

    /// All of an owner's items, oldest first. Private items are included only
    /// when the viewer is the owner.
    #[instrument(skip(self))]
    pub async fn items_by_owner(
        &self,
        viewer: Option<AccountId>,
        owner: AccountId,
    ) -> Result<Vec<ContentItem>> {
        let query = StoreQuery {
            owners: Some(vec![owner]),
            order: SortOrder::Ascending,
            ..Default::default()
        };
        let mut items = self.content.find_items(&query).await?;
        items.retain(|item| item.visible_to(viewer));
        Ok(items)
    }

    async fn visible_item(&self, viewer: Option<AccountId>, id: ContentId) -> Result<ContentItem> {
        match self.content.get_item(id).await? {
            Some(item) if item.visible_to(viewer) => Ok(item),
            _ => Err(DomainError::not_found("content item", id)),
        }
    }

    async fn owned_item(&self, actor: AccountId, id: ContentId) -> Result<ContentItem> {
        let item = self
            .content
            .get_item(id)
            .await?
            .ok_or_else(|| DomainError::not_found("content item", id))?;
        if item.owner != actor {
            return Err(DomainError::Unauthorized(format!(
                "account {actor} does not own content item {id}"
            )));
        }
        Ok(item)
    }
}
