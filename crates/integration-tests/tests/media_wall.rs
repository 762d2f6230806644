use std::collections::HashSet;

use bytes::Bytes;
use domains::DomainError;
use integration_tests::Harness;

#[tokio::test]
async fn posted_photos_resolve_to_media_urls() {
    let h = Harness::new();
    let ada = h.account("Ada").await;

    let photo = h
        .engine
        .wall
        .post_photo(ada, Bytes::from_static(b"\x89PNG\r\n"), mime::IMAGE_PNG)
        .await
        .unwrap();

    assert_eq!(photo.uploader, ada);
    assert_eq!(photo.image_url, format!("/media/{}", photo.media));
    assert!(h.media.contains(&photo.media));
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let h = Harness::new();
    let ada = h.account("Ada").await;

    let err = h
        .engine
        .wall
        .post_photo(ada, Bytes::new(), mime::IMAGE_JPEG)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(_)));
}

#[tokio::test]
async fn sample_is_distinct_and_capped() {
    let h = Harness::new();
    let ada = h.account("Ada").await;
    for n in 0..20u8 {
        h.engine
            .wall
            .post_photo(ada, Bytes::from(vec![0x89, n]), mime::IMAGE_PNG)
            .await
            .unwrap();
    }

    // default sample size is 12
    let sample = h.engine.wall.sample_wall(None).await.unwrap();
    assert_eq!(sample.len(), 12);
    let ids: HashSet<_> = sample.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 12);

    assert_eq!(h.engine.wall.sample_wall(Some(5)).await.unwrap().len(), 5);
    assert_eq!(h.engine.wall.sample_wall(Some(50)).await.unwrap().len(), 20);
}

#[tokio::test]
async fn empty_wall_samples_nothing() {
    let h = Harness::new();
    assert!(h.engine.wall.sample_wall(None).await.unwrap().is_empty());
}
