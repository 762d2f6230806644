//! # Domain Models
//!
//! These structs represent the core entities of the blog engine.
//! Identifiers are UUID v4; timestamps are UTC.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;
pub type ContentId = Uuid;
pub type CommentId = Uuid;

/// Opaque handle returned by a `MediaStorage` backend.
pub type MediaRef = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// A published article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub owner: AccountId,
    pub title: String,
    pub body: String,
    pub tags: BTreeSet<String>,
    /// References handed out by `MediaStorage`, released on delete.
    pub media: Vec<MediaRef>,
    pub views: u64,
    /// Equals the number of live comments pointing at this item.
    pub comment_count: u64,
    pub visibility: Visibility,
    /// `None` only for legacy rows imported without a timestamp.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn created_year(&self) -> Option<i32> {
        self.created_at.map(|ts| ts.year())
    }

    /// Whether `viewer` may read this item at all.
    pub fn visible_to(&self, viewer: Option<AccountId>) -> bool {
        self.is_public() || viewer == Some(self.owner)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content_id: ContentId,
    pub author: AccountId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Directed edge: `follower` follows `followee`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: AccountId,
    pub followee: AccountId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Credential material. Never leaves the store through a projection.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub nickname: String,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub blog_background: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Minimal owner projection attached to listed items and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub id: AccountId,
    pub nickname: String,
    pub avatar: Option<String>,
}

impl From<&Account> for OwnerProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            nickname: account.nickname.clone(),
            avatar: account.avatar.clone(),
        }
    }
}

/// Everything about an account that may be shown to other users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: AccountId,
    pub nickname: String,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub country: Option<String>,
    pub blog_background: Option<String>,
}

impl From<&Account> for PublicProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            nickname: account.nickname.clone(),
            avatar: account.avatar.clone(),
            signature: account.signature.clone(),
            country: account.country.clone(),
            blog_background: account.blog_background.clone(),
        }
    }
}

/// A record paired with its owner's profile. `owner` is `None` when the
/// profile could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotated<T> {
    #[serde(flatten)]
    pub record: T,
    pub owner: Option<OwnerProfile>,
}

/// An image posted to the shared photo wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallPhoto {
    pub id: Uuid,
    pub uploader: AccountId,
    pub media: MediaRef,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Per-owner facets: every tag used plus item counts per year, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsAndYears {
    pub tags: BTreeSet<String>,
    pub years: Vec<YearCount>,
}

/// Site-wide statistics: items per calendar month (index 0 = January) and
/// the tag histogram.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsOverview {
    pub monthly_count: [u64; 12],
    pub tag_histogram: Vec<TagCount>,
}
