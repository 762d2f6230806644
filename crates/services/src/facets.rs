//! Tag and temporal facets.
//!
//! Facets are computed by a full scan at query time. They are display
//! aggregates and may lag concurrent writes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Datelike;
use domains::{
    AccountId, ContentItem, ContentRepository, Result, StatisticsOverview, StoreQuery, TagCount,
    TagsAndYears, YearCount,
};
use tracing::instrument;

#[derive(Clone)]
pub struct FacetIndexer {
    content: Arc<dyn ContentRepository>,
}

impl FacetIndexer {
    pub fn new(content: Arc<dyn ContentRepository>) -> Self {
        Self { content }
    }

    #[instrument(skip(self))]
    pub async fn tags_and_years(&self, owner: AccountId) -> Result<TagsAndYears> {
        let query = StoreQuery {
            owners: Some(vec![owner]),
            ..Default::default()
        };
        let items = self.content.find_items(&query).await?;
        Ok(tags_and_years(&items))
    }

    #[instrument(skip(self))]
    pub async fn monthly_histogram(&self) -> Result<[u64; 12]> {
        let items = self.all_items().await?;
        Ok(monthly_histogram(&items))
    }

    #[instrument(skip(self))]
    pub async fn tag_histogram(&self) -> Result<Vec<TagCount>> {
        let items = self.all_items().await?;
        Ok(tag_histogram(&items))
    }

    /// Both site-wide facets from a single scan.
    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<StatisticsOverview> {
        let items = self.all_items().await?;
        Ok(StatisticsOverview {
            monthly_count: monthly_histogram(&items),
            tag_histogram: tag_histogram(&items),
        })
    }

    async fn all_items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.content.find_items(&StoreQuery::default()).await?)
    }
}

/// Union of tags plus per-year item counts, newest year first. Items without
/// a creation time still contribute their tags.
pub fn tags_and_years(items: &[ContentItem]) -> TagsAndYears {
    let mut tags = BTreeSet::new();
    let mut years: BTreeMap<i32, u64> = BTreeMap::new();

    for item in items {
        tags.extend(item.tags.iter().cloned());
        if let Some(year) = item.created_year() {
            *years.entry(year).or_default() += 1;
        }
    }

    TagsAndYears {
        tags,
        years: years
            .into_iter()
            .rev()
            .map(|(year, count)| YearCount { year, count })
            .collect(),
    }
}

/// Items per calendar month across all years; index 0 is January.
pub fn monthly_histogram(items: &[ContentItem]) -> [u64; 12] {
    let mut months = [0u64; 12];
    for created in items.iter().filter_map(|item| item.created_at) {
        months[created.month0() as usize] += 1;
    }
    months
}

/// Number of items carrying each tag, most used first, ties by tag name.
pub fn tag_histogram(items: &[ContentItem]) -> Vec<TagCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for tag in items.iter().flat_map(|item| item.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }

    let mut histogram: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    histogram.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    histogram
}
