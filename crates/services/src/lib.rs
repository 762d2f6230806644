//! services
//!
//! The content aggregation and feed engine. Every service talks to storage
//! only through the `domains` ports, so any adapter (in-memory, Postgres)
//! can back it.

use std::sync::Arc;
use std::time::Duration;

use domains::{ContentStore, MediaStorage};

mod annotate;
pub mod comments;
pub mod content;
pub mod counters;
pub mod facets;
pub mod feed;
pub mod profiles;
pub mod query;
pub mod social;
pub mod wall;

pub use annotate::OwnerAnnotator;
pub use comments::CommentService;
pub use content::ContentService;
pub use counters::{CommentDelta, CounterService};
pub use facets::FacetIndexer;
pub use feed::FeedResolver;
pub use profiles::ProfileService;
pub use query::QueryComposer;
pub use social::SocialGraphService;
pub use wall::{sample_distinct, MediaWallService};

/// Tunables shared by the services.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Attempts for a comment counter adjustment before giving up.
    pub counter_retry_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * backoff`.
    pub counter_retry_backoff: Duration,
    /// Whether the global feed lists private items too.
    pub global_feed_includes_private: bool,
    /// Default number of photos drawn for the photo wall.
    pub wall_sample_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            counter_retry_attempts: 5,
            counter_retry_backoff: Duration::from_millis(25),
            global_feed_includes_private: true,
            wall_sample_size: 12,
        }
    }
}

/// Every service wired against one store and one media backend.
#[derive(Clone)]
pub struct Engine {
    pub counters: CounterService,
    pub facets: FacetIndexer,
    pub queries: QueryComposer,
    pub feeds: FeedResolver,
    pub social: SocialGraphService,
    pub content: ContentService,
    pub comments: CommentService,
    pub profiles: ProfileService,
    pub wall: MediaWallService,
}

impl Engine {
    pub fn new<S>(store: Arc<S>, media: Arc<dyn MediaStorage>, options: EngineOptions) -> Self
    where
        S: ContentStore + 'static,
    {
        let annotator = OwnerAnnotator::new(store.clone());
        let counters = CounterService::new(store.clone(), store.clone(), options.clone());

        Self {
            facets: FacetIndexer::new(store.clone()),
            queries: QueryComposer::new(store.clone(), annotator.clone()),
            feeds: FeedResolver::new(
                store.clone(),
                store.clone(),
                annotator.clone(),
                options.global_feed_includes_private,
            ),
            social: SocialGraphService::new(store.clone(), store.clone()),
            content: ContentService::new(
                store.clone(),
                store.clone(),
                media.clone(),
                counters.clone(),
                annotator.clone(),
            ),
            comments: CommentService::new(store.clone(), store.clone(), counters.clone(), annotator),
            profiles: ProfileService::new(store.clone(), media.clone()),
            wall: MediaWallService::new(store, media, options.wall_sample_size),
            counters,
        }
    }
}
