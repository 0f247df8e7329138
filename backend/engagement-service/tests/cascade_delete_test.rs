//! Cascading delete of comment subtrees and the cached state behind them.

mod common;

use common::{harness, seed_node};
use engagement_service::domain::models::CounterKind;
use engagement_service::error::ServiceError;
use engagement_service::store::StoreGateway;
use uuid::Uuid;

#[tokio::test]
async fn deep_subtree_is_fully_removed() {
    let h = harness();

    // root -> a -> b -> c
    let root = seed_node(&h.store, None).await;
    let a = seed_node(&h.store, Some(root)).await;
    let b = seed_node(&h.store, Some(a)).await;
    let c = seed_node(&h.store, Some(b)).await;
    let ids = [root, a, b, c];

    for id in ids {
        h.interactions.like(Uuid::new_v4(), id, None).await.unwrap();
    }
    h.interactions.comment_added(root, a).await.unwrap();
    h.interactions.comment_added(a, b).await.unwrap();
    h.interactions.comment_added(b, c).await.unwrap();

    let outcome = h.cascade.delete_subtree(root).await.unwrap();
    assert_eq!(outcome.nodes_planned, 4);

    for id in ids {
        assert_eq!(
            h.interactions.get_count(CounterKind::Likes, id).await.unwrap(),
            0
        );
        assert_eq!(
            h.interactions.get_count(CounterKind::Comments, id).await.unwrap(),
            0
        );
        assert!(h.store.fetch_node(id).await.unwrap().is_none());
        assert_eq!(h.store.count_like_records(id).await.unwrap(), 0);
        assert!(h.interactions.top_ranked(id, 10).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn deleting_a_comment_unranks_it_from_its_parent() {
    let h = harness();
    let post = seed_node(&h.store, None).await;
    let comment = seed_node(&h.store, Some(post)).await;

    h.interactions
        .like(Uuid::new_v4(), comment, Some(post))
        .await
        .unwrap();
    assert_eq!(h.interactions.top_ranked(post, 10).await.unwrap().len(), 1);

    h.cascade.delete_subtree(comment).await.unwrap();

    assert!(h.store.fetch_node(post).await.unwrap().is_some());
    assert!(h.interactions.top_ranked(post, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_failure_surfaces_and_retries_wholesale() {
    let h = harness();
    let root = seed_node(&h.store, None).await;
    let child = seed_node(&h.store, Some(root)).await;
    h.interactions.like(Uuid::new_v4(), root, None).await.unwrap();

    h.store.set_fail_batches(true);
    let err = h.cascade.delete_subtree(root).await.unwrap_err();
    assert!(matches!(err, ServiceError::PartialCascade { planned: 2, .. }));

    // nothing was torn down, so the whole operation can be retried
    assert!(h.store.fetch_node(root).await.unwrap().is_some());
    assert!(h.store.fetch_node(child).await.unwrap().is_some());
    assert_eq!(h.interactions.get_count(CounterKind::Likes, root).await.unwrap(), 1);

    h.store.set_fail_batches(false);
    let outcome = h.cascade.delete_subtree(root).await.unwrap();
    assert_eq!(outcome.nodes_planned, 2);
    assert!(h.store.fetch_node(root).await.unwrap().is_none());
    assert!(h.store.fetch_node(child).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_root_deletes_nothing_and_succeeds() {
    let h = harness();
    let outcome = h.cascade.delete_subtree(Uuid::new_v4()).await.unwrap();
    assert_eq!(outcome.nodes_planned, 1);
}

#[tokio::test(start_paused = true)]
async fn cache_cleanup_failure_does_not_roll_back_the_delete() {
    let h = harness();
    let root = seed_node(&h.store, None).await;
    h.interactions.like(Uuid::new_v4(), root, None).await.unwrap();

    h.cache.set_unavailable(true);
    let outcome = h.cascade.delete_subtree(root).await.unwrap();
    assert_eq!(outcome.nodes_planned, 1);
    assert!(h.store.fetch_node(root).await.unwrap().is_none());

    // the stale cached count survives the failed cleanup, bounded by TTL
    h.cache.set_unavailable(false);
    assert_eq!(h.interactions.get_count(CounterKind::Likes, root).await.unwrap(), 1);

    // past the TTL the (now empty) store wins again
    tokio::time::advance(std::time::Duration::from_secs(3601)).await;
    assert_eq!(h.interactions.get_count(CounterKind::Likes, root).await.unwrap(), 0);
}
