//! Follower-scoped and global feeds.

use std::sync::Arc;

use domains::{
    AccountId, Annotated, ContentItem, ContentRepository, FollowRepository, Result, SortOrder,
    StoreQuery, Visibility,
};
use tracing::{debug, instrument};

use crate::OwnerAnnotator;

#[derive(Clone)]
pub struct FeedResolver {
    content: Arc<dyn ContentRepository>,
    follows: Arc<dyn FollowRepository>,
    annotator: OwnerAnnotator,
    global_includes_private: bool,
}

impl FeedResolver {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        follows: Arc<dyn FollowRepository>,
        annotator: OwnerAnnotator,
        global_includes_private: bool,
    ) -> Self {
        Self {
            content,
            follows,
            annotator,
            global_includes_private,
        }
    }

    /// Public items of everyone `viewer` follows, newest first.
    #[instrument(skip(self))]
    pub async fn followed_feed(&self, viewer: AccountId) -> Result<Vec<Annotated<ContentItem>>> {
        let mut followees = self.follows.followees_of(viewer).await?;
        followees.sort_unstable();
        followees.dedup();
        if followees.is_empty() {
            debug!("viewer follows nobody");
            return Ok(Vec::new());
        }

        let query = StoreQuery {
            owners: Some(followees),
            visibility: Some(Visibility::Public),
            order: SortOrder::Descending,
            ..Default::default()
        };
        let mut items = self.content.find_items(&query).await?;
        // private items never reach another user's feed
        items.retain(ContentItem::is_public);

        Ok(self.annotator.annotate(items, |item| item.owner).await)
    }

    /// Every item, newest first. Private items are included unless the
    /// engine is configured otherwise.
    #[instrument(skip(self))]
    pub async fn global_feed(&self) -> Result<Vec<Annotated<ContentItem>>> {
        let query = StoreQuery {
            visibility: (!self.global_includes_private).then_some(Visibility::Public),
            order: SortOrder::Descending,
            ..Default::default()
        };
        let items = self.content.find_items(&query).await?;
        Ok(self.annotator.annotate(items, |item| item.owner).await)
    }
}
