//! # PostgreSQL ContentStore
//!
//! Maps the relational schema in `migrations/` onto the domain models.
//! Counters are updated with single-statement atomic UPDATEs, tag
//! containment uses `= ANY(tags)` natively.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use domains::{
    Account, AccountId, AccountRepository, Comment, CommentId, CommentRepository, ContentId,
    ContentItem, ContentRepository, FollowEdge, FollowRepository, OwnerProfile, SortOrder,
    StoreQuery, Visibility, WallPhoto, WallRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::info;

const ITEM_COLUMNS: &str =
    "id, owner_id, title, body, tags, media, views, comment_count, visibility, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        info!("database migrations applied");
        Ok(())
    }
}

fn counter(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

fn item_from_row(row: &PgRow) -> anyhow::Result<ContentItem> {
    let visibility: String = row.try_get("visibility")?;
    Ok(ContentItem {
        id: row.try_get("id")?,
        owner: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        tags: row.try_get::<Vec<String>, _>("tags")?.into_iter().collect(),
        media: row.try_get("media")?,
        views: counter(row.try_get("views")?),
        comment_count: counter(row.try_get("comment_count")?),
        visibility: Visibility::parse(&visibility)
            .with_context(|| format!("unknown visibility {visibility:?}"))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn comment_from_row(row: &PgRow) -> anyhow::Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        content_id: row.try_get("content_id")?,
        author: row.try_get("author_id")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}

fn account_from_row(row: &PgRow) -> anyhow::Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        nickname: row.try_get("nickname")?,
        avatar: row.try_get("avatar")?,
        signature: row.try_get("signature")?,
        email: row.try_get("email")?,
        country: row.try_get("country")?,
        blog_background: row.try_get("blog_background")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Escapes LIKE metacharacters so user text matches literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl ContentRepository for PgStore {
    async fn insert_item(&self, item: ContentItem) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO content_items (id, owner_id, title, body, tags, media, views, comment_count, visibility, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(item.id)
        .bind(item.owner)
        .bind(&item.title)
        .bind(&item.body)
        .bind(item.tags.iter().cloned().collect::<Vec<String>>())
        .bind(&item.media)
        .bind(i64::try_from(item.views)?)
        .bind(i64::try_from(item.comment_count)?)
        .bind(item.visibility.as_str())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_item(&self, id: ContentId) -> anyhow::Result<Option<ContentItem>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn update_item(&self, item: &ContentItem) -> anyhow::Result<bool> {
        let affected = sqlx::query(
            "UPDATE content_items \
             SET title = $2, body = $3, tags = $4, media = $5, visibility = $6, updated_at = $7 \
             WHERE id = $1",
        )
        .bind(item.id)
        .bind(&item.title)
        .bind(&item.body)
        .bind(item.tags.iter().cloned().collect::<Vec<String>>())
        .bind(&item.media)
        .bind(item.visibility.as_str())
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn delete_item(&self, id: ContentId) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM content_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn find_items(&self, query: &StoreQuery) -> anyhow::Result<Vec<ContentItem>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE TRUE"));

        if let Some(owners) = &query.owners {
            qb.push(" AND owner_id = ANY(").push_bind(owners.clone()).push(")");
        }
        if let Some(tag) = &query.tag {
            qb.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
        }
        if let Some((from, to)) = query.created_between {
            qb.push(" AND created_at >= ").push_bind(from);
            qb.push(" AND created_at < ").push_bind(to);
        }
        if let Some(visibility) = query.visibility {
            qb.push(" AND visibility = ").push_bind(visibility.as_str());
        }
        if let Some(search) = &query.search {
            let pattern = like_pattern(search);
            qb.push(" AND (title ILIKE ").push_bind(pattern.clone());
            qb.push(" OR body ILIKE ").push_bind(pattern).push(")");
        }
        qb.push(match query.order {
            SortOrder::Ascending => " ORDER BY created_at ASC NULLS FIRST, id ASC",
            SortOrder::Descending => " ORDER BY created_at DESC NULLS LAST, id DESC",
        });

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(item_from_row).collect()
    }

    fn supports_tag_containment(&self) -> bool {
        true
    }

    async fn increment_views(&self, id: ContentId) -> anyhow::Result<Option<u64>> {
        let row = sqlx::query("UPDATE content_items SET views = views + 1 WHERE id = $1 RETURNING views")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<i64, _>("views")).transpose()?.map(counter))
    }

    async fn adjust_comment_count(&self, id: ContentId, delta: i64) -> anyhow::Result<Option<u64>> {
        let row = sqlx::query(
            "UPDATE content_items SET comment_count = GREATEST(comment_count + $2, 0) \
             WHERE id = $1 RETURNING comment_count",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| r.try_get::<i64, _>("comment_count"))
            .transpose()?
            .map(counter))
    }

    async fn set_comment_count(&self, id: ContentId, count: u64) -> anyhow::Result<bool> {
        let affected = sqlx::query("UPDATE content_items SET comment_count = $2 WHERE id = $1")
            .bind(id)
            .bind(i64::try_from(count)?)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, content_id, author_id, body, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(comment.id)
        .bind(comment.content_id)
        .bind(comment.author)
        .bind(&comment.body)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_comment(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        let row = sqlx::query("SELECT id, content_id, author_id, body, created_at FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn delete_comment(&self, id: CommentId) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn comments_for(&self, content_id: ContentId) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, content_id, author_id, body, created_at FROM comments \
             WHERE content_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn count_for(&self, content_id: ContentId) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE content_id = $1")
            .bind(content_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(counter(count))
    }

    async fn delete_for_content(&self, content_id: ContentId) -> anyhow::Result<u64> {
        let affected = sqlx::query("DELETE FROM comments WHERE content_id = $1")
            .bind(content_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }
}

#[async_trait]
impl FollowRepository for PgStore {
    async fn insert_edge(&self, edge: FollowEdge) -> anyhow::Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (follower_id, followee_id) DO NOTHING \
             RETURNING follower_id",
        )
        .bind(edge.follower)
        .bind(edge.followee)
        .bind(edge.created_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }

    async fn delete_edge(&self, follower: AccountId, followee: AccountId) -> anyhow::Result<bool> {
        let affected = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn edge_exists(&self, follower: AccountId, followee: AccountId) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower)
        .bind(followee)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn followees_of(&self, follower: AccountId) -> anyhow::Result<Vec<AccountId>> {
        Ok(sqlx::query_scalar(
            "SELECT followee_id FROM follows WHERE follower_id = $1 ORDER BY followee_id",
        )
        .bind(follower)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn followers_of(&self, followee: AccountId) -> anyhow::Result<Vec<AccountId>> {
        Ok(sqlx::query_scalar(
            "SELECT follower_id FROM follows WHERE followee_id = $1 ORDER BY follower_id",
        )
        .bind(followee)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn get_account(&self, id: AccountId) -> anyhow::Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, nickname, avatar, signature, email, country, blog_background, created_at \
             FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn profiles(&self, ids: &[AccountId]) -> anyhow::Result<HashMap<AccountId, OwnerProfile>> {
        let rows = sqlx::query("SELECT id, nickname, avatar FROM accounts WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> anyhow::Result<(AccountId, OwnerProfile)> {
                let profile = OwnerProfile {
                    id: row.try_get("id")?,
                    nickname: row.try_get("nickname")?,
                    avatar: row.try_get("avatar")?,
                };
                Ok((profile.id, profile))
            })
            .collect()
    }

    async fn insert_account(&self, account: Account) -> anyhow::Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO accounts (id, username, password_hash, nickname, avatar, signature, email, country, blog_background, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT DO NOTHING RETURNING id",
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(&account.nickname)
        .bind(&account.avatar)
        .bind(&account.signature)
        .bind(&account.email)
        .bind(&account.country)
        .bind(&account.blog_background)
        .bind(account.created_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }

    async fn update_account(&self, account: &Account) -> anyhow::Result<bool> {
        let affected = sqlx::query(
            "UPDATE accounts SET nickname = $2, avatar = $3, signature = $4, email = $5, country = $6, blog_background = $7 \
             WHERE id = $1",
        )
        .bind(account.id)
        .bind(&account.nickname)
        .bind(&account.avatar)
        .bind(&account.signature)
        .bind(&account.email)
        .bind(&account.country)
        .bind(&account.blog_background)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }
}

#[async_trait]
impl WallRepository for PgStore {
    async fn insert_photo(&self, photo: WallPhoto) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO wall_photos (id, uploader_id, media, image_url, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(photo.id)
        .bind(photo.uploader)
        .bind(&photo.media)
        .bind(&photo.image_url)
        .bind(photo.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_photos(&self) -> anyhow::Result<Vec<WallPhoto>> {
        let rows = sqlx::query("SELECT id, uploader_id, media, image_url, created_at FROM wall_photos")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> anyhow::Result<WallPhoto> {
                Ok(WallPhoto {
                    id: row.try_get("id")?,
                    uploader: row.try_get("uploader_id")?,
                    media: row.try_get("media")?,
                    image_url: row.try_get("image_url")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
