//! # Filters
//!
//! `ItemFilter` is what callers build; `StoreQuery` is what a
//! `ContentRepository` executes. Every field is optional and the set fields
//! are ANDed together.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AccountId, ContentItem, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Orders by creation time, id as tie-breaker. Rows without a timestamp
    /// count as the oldest.
    pub fn sort(&self, items: &mut [ContentItem]) {
        items.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if *self == SortOrder::Descending {
            items.reverse();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Caller-facing listing filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub owner: Option<AccountId>,
    /// Exact, case-sensitive tag membership.
    pub tag: Option<String>,
    /// Calendar year of `created_at`.
    pub year: Option<i32>,
    /// Case-insensitive substring over title OR body.
    pub search: Option<String>,
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub order: SortOrder,
    pub page: Option<Page>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: AccountId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.page = Some(Page { offset, limit });
        self
    }

    /// Translates to a store query. Pagination is not part of it: the
    /// composer pages only after every predicate has been applied.
    ///
    /// Returns `None` when the filter can match nothing, which is the case for
    /// a year outside the representable calendar range.
    pub fn to_store_query(&self) -> Option<StoreQuery> {
        let created_between = match self.year {
            Some(year) => Some(year_bounds(year)?),
            None => None,
        };
        Some(StoreQuery {
            owners: self.owner.map(|owner| vec![owner]),
            tag: self.tag.clone(),
            created_between,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            visibility: self.visibility,
            order: self.order,
        })
    }
}

/// Store-level selection. `created_between` is half-open: `[from, to)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreQuery {
    pub owners: Option<Vec<AccountId>>,
    pub tag: Option<String>,
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub search: Option<String>,
    pub visibility: Option<Visibility>,
    pub order: SortOrder,
}

impl StoreQuery {
    /// Reference predicate for adapters that evaluate queries in process.
    pub fn matches(&self, item: &ContentItem) -> bool {
        if let Some(owners) = &self.owners {
            if !owners.contains(&item.owner) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !item.tags.contains(tag) {
                return false;
            }
        }
        if let Some((from, to)) = self.created_between {
            match item.created_at {
                Some(ts) if ts >= from && ts < to => {}
                _ => return false,
            }
        }
        if let Some(visibility) = self.visibility {
            if item.visibility != visibility {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            if !item.title.to_lowercase().contains(&needle)
                && !item.body.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// `[Jan 1 of year, Jan 1 of year + 1)` in UTC.
pub fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let from = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let to = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
    Some((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn item(title: &str, body: &str, tags: &[&str], created: Option<DateTime<Utc>>) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            media: vec![],
            views: 0,
            comment_count: 0,
            visibility: Visibility::Public,
            created_at: created,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_year_filter_is_inclusive_of_both_ends() {
        let query = ItemFilter::new().year(2023).to_store_query().unwrap();
        let first = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert!(query.matches(&item("a", "", &[], Some(first))));
        assert!(query.matches(&item("a", "", &[], Some(last))));
        assert!(!query.matches(&item("a", "", &[], Some(next))));
        assert!(!query.matches(&item("a", "", &[], None)));
    }

    #[test]
    fn test_unrepresentable_year_matches_nothing() {
        assert!(ItemFilter::new().year(300_000).to_store_query().is_none());
        assert!(ItemFilter::new().year(i32::MIN).to_store_query().is_none());
        assert!(ItemFilter::new().year(i32::MAX).to_store_query().is_none());
        assert!(ItemFilter::new().to_store_query().is_some());
    }

    #[test]
    fn test_search_is_case_insensitive_over_title_or_body() {
        let query = ItemFilter::new().search("RuSt").to_store_query().unwrap();
        assert!(query.matches(&item("Learning rust", "", &[], None)));
        assert!(query.matches(&item("Notes", "why RUST wins", &[], None)));
        assert!(!query.matches(&item("Notes", "go go go", &[], None)));
    }

    #[test]
    fn test_blank_search_is_a_no_op() {
        let query = ItemFilter::new().search("   ").to_store_query().unwrap();
        assert_eq!(query.search, None);
    }

    #[test]
    fn test_tag_match_is_case_sensitive() {
        let query = ItemFilter::new().tag("Rust").to_store_query().unwrap();
        assert!(!query.matches(&item("t", "b", &["rust"], None)));
        assert!(query.matches(&item("t", "b", &["Rust", "go"], None)));
    }

    #[test]
    fn test_sort_puts_untimestamped_rows_first_when_ascending() {
        let older = Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap();
        let mut items = vec![
            item("new", "", &[], Some(newer)),
            item("none", "", &[], None),
            item("old", "", &[], Some(older)),
        ];

        SortOrder::Ascending.sort(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["none", "old", "new"]);

        SortOrder::Descending.sort(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["new", "old", "none"]);
    }

    #[test]
    fn test_page_skips_and_truncates() {
        let page = Page { offset: 2, limit: 2 };
        assert_eq!(page.apply(vec![1, 2, 3, 4, 5]), vec![3, 4]);
        assert_eq!(page.apply(vec![1]), Vec::<i32>::new());
    }
}
