//! Declarative item listing.

use std::sync::Arc;

use domains::{Annotated, ContentItem, ContentRepository, ItemFilter, Result};
use tracing::{debug, instrument};

use crate::OwnerAnnotator;

#[derive(Clone)]
pub struct QueryComposer {
    content: Arc<dyn ContentRepository>,
    annotator: OwnerAnnotator,
}

impl QueryComposer {
    pub fn new(content: Arc<dyn ContentRepository>, annotator: OwnerAnnotator) -> Self {
        Self { content, annotator }
    }

    /// Lists items matching every set field of `filter`, ordered by creation
    /// time and annotated with the owner's profile.
    ///
    /// When the store cannot evaluate tag containment, the tag predicate runs
    /// here over the complete candidate set. Pagination always comes last.
    /// A filter that can match nothing returns an empty list without a store
    /// round trip.
    #[instrument(skip(self))]
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Annotated<ContentItem>>> {
        let Some(mut query) = filter.to_store_query() else {
            debug!("filter cannot match any item");
            return Ok(Vec::new());
        };
        let post_filter_tag = if self.content.supports_tag_containment() {
            None
        } else {
            query.tag.take()
        };

        let mut items = self.content.find_items(&query).await?;
        if let Some(tag) = post_filter_tag {
            items.retain(|item| item.tags.contains(&tag));
        }
        debug!(matched = items.len(), "items matched");

        if let Some(page) = filter.page {
            items = page.apply(items);
        }

        Ok(self.annotator.annotate(items, |item| item.owner).await)
    }
}
