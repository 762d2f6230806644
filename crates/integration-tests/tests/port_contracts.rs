//! Behaviour every ContentStore adapter must share, checked against the
//! in-memory adapter.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AccountRepository, CommentRepository, ContentRepository, CreateCommentCommand,
    MockAccountRepository, StoreQuery, Visibility,
};
use integration_tests::{at, insert_account, insert_item_at, Harness};
use services::OwnerAnnotator;
use storage_adapters::InMemoryStore;

#[tokio::test]
async fn counters_on_missing_items_report_absence() {
    let store = InMemoryStore::new();
    let missing = uuid::Uuid::new_v4();

    assert_eq!(store.increment_views(missing).await.unwrap(), None);
    assert_eq!(store.adjust_comment_count(missing, 1).await.unwrap(), None);
    assert!(!store.set_comment_count(missing, 3).await.unwrap());
}

#[tokio::test]
async fn comment_count_never_goes_negative() {
    let store = InMemoryStore::new();
    let owner = insert_account(&store, "Ada").await;
    let item = insert_item_at(&store, owner, "t", &[], Visibility::Public, at(2024, 1, 1)).await;

    assert_eq!(store.adjust_comment_count(item, -1).await.unwrap(), Some(0));
    assert_eq!(store.adjust_comment_count(item, 1).await.unwrap(), Some(1));
}

#[tokio::test]
async fn update_item_leaves_counters_alone() {
    let store = InMemoryStore::new();
    let owner = insert_account(&store, "Ada").await;
    let id = insert_item_at(&store, owner, "t", &[], Visibility::Public, at(2024, 1, 1)).await;
    store.increment_views(id).await.unwrap();

    let mut stale = store.get_item(id).await.unwrap().unwrap();
    stale.views = 0;
    stale.comment_count = 42;
    stale.title = "renamed".into();
    assert!(store.update_item(&stale).await.unwrap());

    let stored = store.get_item(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "renamed");
    assert_eq!((stored.views, stored.comment_count), (1, 0));
}

#[tokio::test]
async fn usernames_are_unique() {
    let store = InMemoryStore::new();
    insert_account(&store, "Ada").await;

    let mut twin = store
        .get_account(insert_account(&store, "Grace").await)
        .await
        .unwrap()
        .unwrap();
    twin.id = uuid::Uuid::new_v4();
    twin.username = "ada".into();
    assert!(!store.insert_account(twin).await.unwrap());
}

#[tokio::test]
async fn profile_batch_skips_unknown_ids() {
    let store = InMemoryStore::new();
    let ada = insert_account(&store, "Ada").await;
    let ghost = uuid::Uuid::new_v4();

    let profiles = store.profiles(&[ada, ghost]).await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[&ada].nickname, "Ada");
}

#[tokio::test]
async fn deleting_content_comments_reports_how_many() {
    let h = Harness::new();
    let ada = h.account("Ada").await;
    let keep = h.item_at(ada, "keep", &[], Visibility::Public, at(2024, 1, 1)).await;
    let drop = h.item_at(ada, "drop", &[], Visibility::Public, at(2024, 1, 2)).await;
    for target in [keep, drop, drop] {
        let comment = CreateCommentCommand {
            content_id: target,
            body: "hi".into(),
        }
        .into_comment(ada, Utc::now())
        .unwrap();
        h.store.insert_comment(comment).await.unwrap();
    }

    assert_eq!(h.store.delete_for_content(drop).await.unwrap(), 2);
    assert_eq!(h.store.count_for(keep).await.unwrap(), 1);
    assert_eq!(h.store.count_for(drop).await.unwrap(), 0);
}

#[tokio::test]
async fn in_process_store_filters_tags_itself_when_asked() {
    let h = Harness::new();
    let ada = h.account("Ada").await;
    h.item_at(ada, "a", &["rust"], Visibility::Public, at(2024, 1, 1)).await;
    h.item_at(ada, "b", &["go"], Visibility::Public, at(2024, 1, 2)).await;

    assert!(!h.store.supports_tag_containment());
    let query = StoreQuery {
        tag: Some("rust".into()),
        ..Default::default()
    };
    let items = h.store.find_items(&query).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "a");
}

#[tokio::test]
async fn failed_profile_lookup_degrades_to_missing_owner() {
    let mut accounts = MockAccountRepository::new();
    accounts
        .expect_profiles()
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("profile service unavailable")));
    let annotator = OwnerAnnotator::new(Arc::new(accounts));

    let owner = uuid::Uuid::new_v4();
    let annotated = annotator.annotate(vec![owner, owner], |id| *id).await;

    assert_eq!(annotated.len(), 2);
    assert!(annotated.iter().all(|a| a.owner.is_none()));
}
