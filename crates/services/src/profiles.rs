use std::sync::Arc;

use bytes::Bytes;
use domains::{
    Account, AccountId, AccountRepository, DomainError, MediaStorage, PublicProfile, Result,
    UpdateProfileCommand,
};
use mime::Mime;
use tracing::{info, instrument};

/// Read and edit account profiles. The edited account is always the actor.
#[derive(Clone)]
pub struct ProfileService {
    accounts: Arc<dyn AccountRepository>,
    media: Arc<dyn MediaStorage>,
}

/// Profile images an account can upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileImage {
    Avatar,
    BlogBackground,
}

impl ProfileService {
    pub fn new(accounts: Arc<dyn AccountRepository>, media: Arc<dyn MediaStorage>) -> Self {
        Self { accounts, media }
    }

    pub async fn profile(&self, id: AccountId) -> Result<PublicProfile> {
        self.accounts
            .get_account(id)
            .await?
            .map(|account| PublicProfile::from(&account))
            .ok_or_else(|| DomainError::not_found("account", id))
    }

    #[instrument(skip(self, cmd))]
    pub async fn update_profile(&self, actor: AccountId, cmd: UpdateProfileCommand) -> Result<PublicProfile> {
        let mut account = self.account(actor).await?;
        cmd.apply(&mut account)?;
        self.store(account).await
    }

    /// Stores an image upload and points the actor's avatar at it.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_avatar(&self, actor: AccountId, data: Bytes, content_type: Mime) -> Result<PublicProfile> {
        self.upload(actor, ProfileImage::Avatar, data, content_type).await
    }

    /// Stores an image upload and makes it the actor's blog background.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_blog_background(
        &self,
        actor: AccountId,
        data: Bytes,
        content_type: Mime,
    ) -> Result<PublicProfile> {
        self.upload(actor, ProfileImage::BlogBackground, data, content_type).await
    }

    async fn upload(
        &self,
        actor: AccountId,
        image: ProfileImage,
        data: Bytes,
        content_type: Mime,
    ) -> Result<PublicProfile> {
        if data.is_empty() {
            return Err(DomainError::validation("upload is empty"));
        }
        if content_type.type_() != mime::IMAGE {
            return Err(DomainError::validation(format!(
                "{content_type} is not an image type"
            )));
        }

        let mut account = self.account(actor).await?;
        let media = self.media.save(data, &content_type).await?;
        let url = self.media.url(&media);
        match image {
            ProfileImage::Avatar => account.avatar = Some(url),
            ProfileImage::BlogBackground => account.blog_background = Some(url),
        }
        info!(?image, %media, "profile image stored");
        self.store(account).await
    }

    async fn account(&self, id: AccountId) -> Result<Account> {
        self.accounts
            .get_account(id)
            .await?
            .ok_or_else(|| DomainError::not_found("account", id))
    }

    async fn store(&self, account: Account) -> Result<PublicProfile> {
        if !self.accounts.update_account(&account).await? {
            return Err(DomainError::not_found("account", account.id));
        }
        info!(account_id = %account.id, "profile updated");
        Ok(PublicProfile::from(&account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{MockAccountRepository, MockMediaStorage};
    use uuid::Uuid;

    fn bob(id: AccountId) -> Account {
        Account {
            id,
            username: "bob".into(),
            password_hash: "hash".into(),
            nickname: "Bob".into(),
            avatar: Some("/a.png".into()),
            signature: Some("hello".into()),
            email: None,
            country: Some("NZ".into()),
            blog_background: None,
            created_at: Utc::now(),
        }
    }

    fn no_media() -> Arc<MockMediaStorage> {
        let mut media = MockMediaStorage::new();
        media.expect_save().never();
        Arc::new(media)
    }

    #[tokio::test]
    async fn test_update_touches_only_provided_fields() {
        let id = Uuid::new_v4();
        let account = bob(id);
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_account()
            .returning(move |_| Ok(Some(account.clone())));
        accounts
            .expect_update_account()
            .withf(|a| a.nickname == "Robert" && a.password_hash == "hash")
            .times(1)
            .returning(|_| Ok(true));

        let profile = ProfileService::new(Arc::new(accounts), no_media())
            .update_profile(
                id,
                UpdateProfileCommand {
                    nickname: Some("Robert".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.nickname, "Robert");
        assert_eq!(profile.signature.as_deref(), Some("hello"));
        assert_eq!(profile.country.as_deref(), Some("NZ"));
    }

    #[tokio::test]
    async fn test_avatar_upload_sets_resolved_url() {
        let id = Uuid::new_v4();
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_account()
            .returning(move |id| Ok(Some(bob(id))));
        accounts
            .expect_update_account()
            .withf(|a| a.avatar.as_deref() == Some("/media/cafe") && a.blog_background.is_none())
            .times(1)
            .returning(|_| Ok(true));
        let mut media = MockMediaStorage::new();
        media
            .expect_save()
            .times(1)
            .returning(|_, _| Ok("cafe".to_string()));
        media.expect_url().returning(|media| format!("/media/{media}"));

        let profile = ProfileService::new(Arc::new(accounts), Arc::new(media))
            .upload_avatar(id, Bytes::from_static(b"\x89PNG"), mime::IMAGE_PNG)
            .await
            .unwrap();
        assert_eq!(profile.avatar.as_deref(), Some("/media/cafe"));
        assert_eq!(profile.signature.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_blog_background_upload_leaves_avatar_alone() {
        let id = Uuid::new_v4();
        let mut accounts = MockAccountRepository::new();
        accounts
            .expect_get_account()
            .returning(move |id| Ok(Some(bob(id))));
        accounts
            .expect_update_account()
            .withf(|a| a.blog_background.as_deref() == Some("/media/beef") && a.avatar.as_deref() == Some("/a.png"))
            .times(1)
            .returning(|_| Ok(true));
        let mut media = MockMediaStorage::new();
        media.expect_save().returning(|_, _| Ok("beef".to_string()));
        media.expect_url().returning(|media| format!("/media/{media}"));

        let profile = ProfileService::new(Arc::new(accounts), Arc::new(media))
            .upload_blog_background(id, Bytes::from_static(b"GIF89a"), mime::IMAGE_GIF)
            .await
            .unwrap();
        assert_eq!(profile.blog_background.as_deref(), Some("/media/beef"));
    }

    #[tokio::test]
    async fn test_empty_or_non_image_upload_is_rejected_before_storage() {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_get_account().never();
        accounts.expect_update_account().never();
        let service = ProfileService::new(Arc::new(accounts), no_media());

        let err = service
            .upload_avatar(Uuid::new_v4(), Bytes::new(), mime::IMAGE_PNG)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));

        let err = service
            .upload_blog_background(Uuid::new_v4(), Bytes::from_static(b"plain"), mime::TEXT_PLAIN)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_upload_for_unknown_account_stores_nothing() {
        let mut accounts = MockAccountRepository::new();
        accounts.expect_get_account().returning(|_| Ok(None));
        let err = ProfileService::new(Arc::new(accounts), no_media())
            .upload_avatar(Uuid::new_v4(), Bytes::from_static(b"\x89PNG"), mime::IMAGE_PNG)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
