//! # Commands
//!
//! Validated inputs for mutating operations. Each command carries only the
//! fields its operation accepts; the acting account is always passed
//! separately by the caller and never read from the payload.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, Result};
use crate::models::{Account, AccountId, Comment, ContentId, ContentItem, MediaRef, Visibility};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateItemCommand {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    #[serde(default)]
    pub visibility: Visibility,
}

impl CreateItemCommand {
    pub fn into_item(self, owner: AccountId, now: DateTime<Utc>) -> Result<ContentItem> {
        let title = required("title", &self.title)?;
        let body = required("body", &self.body)?;
        Ok(ContentItem {
            id: Uuid::new_v4(),
            owner,
            title,
            body,
            tags: normalize_tags(self.tags),
            media: self.media,
            views: 0,
            comment_count: 0,
            visibility: self.visibility,
            created_at: Some(now),
            updated_at: now,
        })
    }
}

/// Partial edit. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemCommand {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub media: Option<Vec<MediaRef>>,
    pub visibility: Option<Visibility>,
}

impl UpdateItemCommand {
    /// Applies the edit. Counters and `created_at` are never touched.
    pub fn apply(self, item: &mut ContentItem, now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = self.title {
            item.title = required("title", &title)?;
        }
        if let Some(body) = self.body {
            item.body = required("body", &body)?;
        }
        if let Some(tags) = self.tags {
            item.tags = normalize_tags(tags);
        }
        if let Some(media) = self.media {
            item.media = media;
        }
        if let Some(visibility) = self.visibility {
            item.visibility = visibility;
        }
        item.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCommentCommand {
    pub content_id: ContentId,
    pub body: String,
}

impl CreateCommentCommand {
    pub fn into_comment(self, author: AccountId, now: DateTime<Utc>) -> Result<Comment> {
        Ok(Comment {
            id: Uuid::new_v4(),
            content_id: self.content_id,
            author,
            body: required("body", &self.body)?,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileCommand {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub blog_background: Option<String>,
}

impl UpdateProfileCommand {
    pub fn apply(self, account: &mut Account) -> Result<()> {
        if let Some(nickname) = self.nickname {
            account.nickname = required("nickname", &nickname)?;
        }
        if self.avatar.is_some() {
            account.avatar = self.avatar;
        }
        if self.signature.is_some() {
            account.signature = self.signature;
        }
        if self.email.is_some() {
            account.email = self.email;
        }
        if self.country.is_some() {
            account.country = self.country;
        }
        if self.blog_background.is_some() {
            account.blog_background = self.blog_background;
        }
        Ok(())
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trims, drops blanks, deduplicates. Case is preserved.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
