//! Follow edges between accounts.

use std::sync::Arc;

use chrono::Utc;
use domains::{AccountId, AccountRepository, DomainError, FollowEdge, FollowRepository, Result};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct SocialGraphService {
    follows: Arc<dyn FollowRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl SocialGraphService {
    pub fn new(follows: Arc<dyn FollowRepository>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { follows, accounts }
    }

    #[instrument(skip(self))]
    pub async fn follow(&self, follower: AccountId, followee: AccountId) -> Result<FollowEdge> {
        if follower == followee {
            return Err(DomainError::validation("an account cannot follow itself"));
        }
        self.require_account(follower).await?;
        self.require_account(followee).await?;

        let edge = FollowEdge {
            follower,
            followee,
            created_at: Utc::now(),
        };
        if !self.follows.insert_edge(edge.clone()).await? {
            return Err(DomainError::AlreadyFollowing { follower, followee });
        }
        info!("follow created");
        Ok(edge)
    }

    #[instrument(skip(self))]
    pub async fn unfollow(&self, follower: AccountId, followee: AccountId) -> Result<()> {
        if !self.follows.delete_edge(follower, followee).await? {
            return Err(DomainError::NotFollowing { follower, followee });
        }
        info!("follow removed");
        Ok(())
    }

    pub async fn is_following(&self, follower: AccountId, followee: AccountId) -> Result<bool> {
        Ok(self.follows.edge_exists(follower, followee).await?)
    }

    pub async fn followees(&self, account: AccountId) -> Result<Vec<AccountId>> {
        Ok(self.follows.followees_of(account).await?)
    }

    pub async fn followers(&self, account: AccountId) -> Result<Vec<AccountId>> {
        Ok(self.follows.followers_of(account).await?)
    }

    async fn require_account(&self, id: AccountId) -> Result<()> {
        match self.accounts.get_account(id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("account", id)),
        }
    }
}
