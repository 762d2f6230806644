//! # seed
//!
//! Loads a JSON fixture of accounts, items, comments and follows into the
//! configured store, then prints the site statistics and per-account facets.
//!
//! Usage: `seed [fixture.json]`

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use domains::{
    Account, AccountId, ContentId, ContentStore, CreateCommentCommand, CreateItemCommand,
    MediaStorage, Visibility,
};
use serde::{Deserialize, Serialize};
use services::{Engine, EngineOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const DEFAULT_FIXTURE: &str = "cmd/seed/fixtures/seed.json";

#[derive(Debug, Deserialize)]
struct Fixture {
    accounts: Vec<FixtureAccount>,
    #[serde(default)]
    items: Vec<FixtureItem>,
    #[serde(default)]
    comments: Vec<FixtureComment>,
    #[serde(default)]
    follows: Vec<FixtureFollow>,
}

#[derive(Debug, Deserialize)]
struct FixtureAccount {
    username: String,
    nickname: String,
    avatar: Option<String>,
    signature: Option<String>,
    email: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FixtureItem {
    key: String,
    owner: String,
    title: String,
    body: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    visibility: Visibility,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FixtureComment {
    item: String,
    author: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct FixtureFollow {
    follower: String,
    followee: String,
}

#[derive(Debug, Serialize)]
struct SeedReport {
    accounts: usize,
    items: usize,
    comments: usize,
    follows: usize,
    overview: domains::StatisticsOverview,
    facets: BTreeMap<String, domains::TagsAndYears>,
}

fn init_tracing(log: &configs::LogSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log.level.clone().into());

    if log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn engine_options(engine: &configs::EngineSettings) -> EngineOptions {
    EngineOptions {
        counter_retry_attempts: engine.counter_retry_attempts,
        counter_retry_backoff: engine.counter_retry_backoff(),
        global_feed_includes_private: engine.global_feed_includes_private,
        wall_sample_size: engine.wall_sample_size,
    }
}

#[cfg(feature = "media-local")]
fn media_storage(settings: &configs::MediaSettings) -> Arc<dyn MediaStorage> {
    Arc::new(storage_adapters::LocalMediaStorage::new(
        settings.root.clone(),
        settings.url_prefix.clone(),
    ))
}

#[cfg(not(feature = "media-local"))]
fn media_storage(settings: &configs::MediaSettings) -> Arc<dyn MediaStorage> {
    Arc::new(storage_adapters::InMemoryMediaStorage::new(settings.url_prefix.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = configs::Settings::load().context("failed to load settings")?;
    init_tracing(&settings.log);

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_FIXTURE.to_string());
    let raw = std::fs::read_to_string(&path).with_context(|| format!("failed to read fixture {path}"))?;
    let fixture: Fixture =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse fixture {path}"))?;

    let media = media_storage(&settings.media);
    let options = engine_options(&settings.engine);

    let report = match &settings.database.url {
        #[cfg(feature = "db-postgres")]
        Some(url) => {
            use secrecy::ExposeSecret;
            let store = storage_adapters::PgStore::connect(
                url.expose_secret(),
                settings.database.max_connections,
            )
            .await?;
            store.migrate().await?;
            seed(Arc::new(store), media, options, fixture).await?
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => {
            tracing::warn!("database.url is set but postgres support is not compiled in; using memory");
            seed(Arc::new(storage_adapters::InMemoryStore::new()), media, options, fixture).await?
        }
        None => {
            info!("no database configured, seeding the in-memory store");
            seed(Arc::new(storage_adapters::InMemoryStore::new()), media, options, fixture).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn seed<S>(
    store: Arc<S>,
    media: Arc<dyn MediaStorage>,
    options: EngineOptions,
    fixture: Fixture,
) -> anyhow::Result<SeedReport>
where
    S: ContentStore + 'static,
{
    let engine = Engine::new(store.clone(), media, options);

    let mut accounts: HashMap<String, AccountId> = HashMap::new();
    for entry in fixture.accounts {
        let account = Account {
            id: Uuid::new_v4(),
            username: entry.username.clone(),
            password_hash: String::new(),
            nickname: entry.nickname,
            avatar: entry.avatar,
            signature: entry.signature,
            email: entry.email,
            country: entry.country,
            blog_background: None,
            created_at: Utc::now(),
        };
        let id = account.id;
        if !store.insert_account(account).await? {
            bail!("account {} already exists", entry.username);
        }
        accounts.insert(entry.username, id);
    }
    let lookup = |name: &str| -> anyhow::Result<AccountId> {
        accounts
            .get(name)
            .copied()
            .with_context(|| format!("fixture references unknown account {name:?}"))
    };

    // Inserted directly so fixture timestamps are kept.
    let mut items: HashMap<String, ContentId> = HashMap::new();
    for entry in &fixture.items {
        let owner = lookup(&entry.owner)?;
        let item = CreateItemCommand {
            title: entry.title.clone(),
            body: entry.body.clone(),
            tags: entry.tags.clone(),
            media: Vec::new(),
            visibility: entry.visibility,
        }
        .into_item(owner, entry.created_at)?;
        items.insert(entry.key.clone(), item.id);
        store.insert_item(item).await?;
    }

    for entry in &fixture.comments {
        let content_id = *items
            .get(&entry.item)
            .with_context(|| format!("fixture comment references unknown item {:?}", entry.item))?;
        engine
            .comments
            .create_comment(
                lookup(&entry.author)?,
                CreateCommentCommand {
                    content_id,
                    body: entry.body.clone(),
                },
            )
            .await?;
    }

    for entry in &fixture.follows {
        engine
            .social
            .follow(lookup(&entry.follower)?, lookup(&entry.followee)?)
            .await?;
    }

    let mut facets = BTreeMap::new();
    for (username, id) in &accounts {
        facets.insert(username.clone(), engine.facets.tags_and_years(*id).await?);
    }

    info!(
        accounts = accounts.len(),
        items = items.len(),
        comments = fixture.comments.len(),
        follows = fixture.follows.len(),
        "fixture loaded"
    );

    Ok(SeedReport {
        accounts: accounts.len(),
        items: items.len(),
        comments: fixture.comments.len(),
        follows: fixture.follows.len(),
        overview: engine.facets.overview().await?,
        facets,
    })
}
