//! The shared photo wall.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use domains::{AccountId, DomainError, MediaStorage, Result, WallPhoto, WallRepository};
use mime::Mime;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct MediaWallService {
    wall: Arc<dyn WallRepository>,
    media: Arc<dyn MediaStorage>,
    sample_size: usize,
}

impl MediaWallService {
    pub fn new(wall: Arc<dyn WallRepository>, media: Arc<dyn MediaStorage>, sample_size: usize) -> Self {
        Self {
            wall,
            media,
            sample_size,
        }
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn post_photo(&self, actor: AccountId, data: Bytes, content_type: Mime) -> Result<WallPhoto> {
        if data.is_empty() {
            return Err(DomainError::validation("upload is empty"));
        }
        if content_type.type_() != mime::IMAGE {
            return Err(DomainError::validation(format!(
                "{content_type} is not an image type"
            )));
        }

        let media = self.media.save(data, &content_type).await?;
        let photo = WallPhoto {
            id: Uuid::new_v4(),
            uploader: actor,
            image_url: self.media.url(&media),
            media,
            created_at: Utc::now(),
        };
        self.wall.insert_photo(photo.clone()).await?;
        info!(photo_id = %photo.id, "photo posted to wall");
        Ok(photo)
    }

    /// Up to `k` distinct photos (default: the configured sample size) in
    /// random order.
    #[instrument(skip(self))]
    pub async fn sample_wall(&self, k: Option<usize>) -> Result<Vec<WallPhoto>> {
        let photos = self.wall.list_photos().await?;
        let k = k.unwrap_or(self.sample_size);
        Ok(sample_distinct(photos, k, &mut rand::thread_rng()))
    }
}

/// Draws `k` elements without replacement. A population smaller than `k`
/// comes back whole, shuffled.
pub fn sample_distinct<T, R>(mut population: Vec<T>, k: usize, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    population.shuffle(rng);
    population.truncate(k);
    population
}
