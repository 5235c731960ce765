mod common;

use std::sync::Arc;
use std::time::Duration;

use pronofeed::domain::Toggle;
use pronofeed::error::ServiceError;
use pronofeed::feed::{spawn_feed_reconciler, PostFeed};
use pronofeed::realtime::RealtimeHub;
use pronofeed::store::{memory::FailOp, MemoryStore, SocialStore};
use tokio::sync::Mutex;
use uuid::Uuid;

use common::{prediction, seed_post, session_for};

const PAGE_SIZE: usize = 10;

#[tokio::test]
async fn toggle_like_updates_local_state_and_relation() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "safe bet").await;

    // five other users already like the post
    for _ in 0..5 {
        store.insert_post_like(post_id, Uuid::new_v4()).await.unwrap();
    }

    let mut feed = PostFeed::new(store.clone(), Some(alice.clone()), PAGE_SIZE);
    feed.load_initial().await.unwrap();
    assert_eq!(feed.posts()[0].post.likes, 5);
    assert!(!feed.posts()[0].is_liked);

    assert_eq!(feed.toggle_like(post_id).await.unwrap(), Toggle::Added);
    assert!(feed.posts()[0].is_liked);
    assert_eq!(feed.posts()[0].post.likes, 6);
    assert_eq!(store.post_like_count(post_id), 6);

    assert_eq!(feed.toggle_like(post_id).await.unwrap(), Toggle::Removed);
    assert!(!feed.posts()[0].is_liked);
    assert_eq!(feed.posts()[0].post.likes, 5);
    assert_eq!(store.post_like_count(post_id), 5);
}

#[tokio::test]
async fn toggle_parity_over_many_toggles() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "value pick").await;

    let mut feed = PostFeed::new(store.clone(), Some(alice), PAGE_SIZE);
    feed.load_initial().await.unwrap();

    for _ in 0..7 {
        feed.toggle_like(post_id).await.unwrap();
    }
    // odd number of toggles: liked, exactly one relation row
    assert!(feed.posts()[0].is_liked);
    assert_eq!(store.post_like_count(post_id), 1);

    feed.toggle_like(post_id).await.unwrap();
    assert!(!feed.posts()[0].is_liked);
    assert_eq!(store.post_like_count(post_id), 0);
}

#[tokio::test]
async fn like_conflict_rolls_back_local_state() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "late team news").await;

    let mut feed = PostFeed::new(store.clone(), Some(alice.clone()), PAGE_SIZE);
    feed.load_initial().await.unwrap();

    // another device of the same user already inserted the relation row,
    // so the local is_liked=false flag is stale
    store.insert_post_like(post_id, alice.user_id).await.unwrap();
    let likes_before = feed.posts()[0].post.likes;

    let err = feed.toggle_like(post_id).await.unwrap_err();
    assert!(err.is_conflict());
    // membership and local state unchanged from before the erroring call
    assert!(!feed.posts()[0].is_liked);
    assert_eq!(feed.posts()[0].post.likes, likes_before);
    assert_eq!(store.post_like_count(post_id), 1);
}

#[tokio::test]
async fn pagination_pages_are_disjoint_and_has_more_flips_on_short_page() {
    let store = Arc::new(MemoryStore::new());
    let author = session_for(&store, "tipster");
    for i in 0..25 {
        seed_post(&store, &author, &format!("pick {}", i)).await;
    }

    let mut feed = PostFeed::new(store.clone(), None, PAGE_SIZE);
    feed.load_initial().await.unwrap();
    assert_eq!(feed.posts().len(), 10);
    assert!(feed.has_more());

    assert!(feed.load_more().await.unwrap());
    assert_eq!(feed.posts().len(), 20);
    assert!(feed.has_more());

    assert!(feed.load_more().await.unwrap());
    assert_eq!(feed.posts().len(), 25);
    assert!(!feed.has_more(), "short page clears has_more");

    // no duplicate identifiers across pages
    let mut ids: Vec<Uuid> = feed.posts().iter().map(|p| p.post.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 25);

    // newest first
    let timestamps: Vec<_> = feed.posts().iter().map(|p| p.post.created_at).collect();
    assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));

    assert!(!feed.load_more().await.unwrap(), "exhausted feed is a no-op");
}

#[tokio::test]
async fn exact_page_boundary_needs_one_empty_fetch() {
    let store = Arc::new(MemoryStore::new());
    let author = session_for(&store, "tipster");
    for i in 0..10 {
        seed_post(&store, &author, &format!("pick {}", i)).await;
    }

    let mut feed = PostFeed::new(store.clone(), None, PAGE_SIZE);
    feed.load_initial().await.unwrap();
    assert!(feed.has_more(), "a full page keeps has_more set");

    assert!(!feed.load_more().await.unwrap());
    assert!(!feed.has_more());
    assert_eq!(feed.posts().len(), 10);
}

#[tokio::test]
async fn create_post_is_optimistic_and_reconciles_identity() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");

    let mut feed = PostFeed::new(store.clone(), Some(alice.clone()), PAGE_SIZE);
    feed.load_initial().await.unwrap();

    let post_id = feed.create_post(prediction("home win, odds drifting")).await.unwrap();

    // the provisional entry was rewritten in place with the server identity
    assert_eq!(feed.posts().len(), 1);
    assert_eq!(feed.posts()[0].post.id, post_id);
    assert_eq!(feed.posts()[0].author.as_ref().unwrap().username, "alice");
    assert_eq!(feed.posts()[0].post.likes, 0);

    // and the server actually holds it
    assert!(store.fetch_post(post_id, None).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_create_removes_provisional_entry() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");

    let mut feed = PostFeed::new(store.clone(), Some(alice), PAGE_SIZE);
    feed.load_initial().await.unwrap();

    store.fail_next(FailOp::InsertPost);
    let err = feed.create_post(prediction("doomed")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Database(_)));
    assert!(feed.posts().is_empty());
}

#[tokio::test]
async fn create_post_validates_locally() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let mut feed = PostFeed::new(store.clone(), Some(alice), PAGE_SIZE);

    let mut input = prediction("  ");
    let err = feed.create_post(input.clone()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));

    input.analysis = "fine".to_string();
    input.confidence = 0;
    assert!(feed.create_post(input).await.is_err());

    // nothing reached the store
    assert!(store.fetch_posts_page(0, 10, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn mutations_require_a_session() {
    let store = Arc::new(MemoryStore::new());
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "members only").await;

    let mut feed = PostFeed::new(store.clone(), None, PAGE_SIZE);
    feed.load_initial().await.unwrap();

    assert!(matches!(
        feed.toggle_like(post_id).await,
        Err(ServiceError::NotAuthenticated)
    ));
    assert!(matches!(
        feed.create_post(prediction("anon")).await,
        Err(ServiceError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn remote_like_is_patched_into_the_feed() {
    let hub = RealtimeHub::new();
    let store = Arc::new(MemoryStore::with_hub(hub.clone()));
    let alice = session_for(&store, "alice");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "big derby").await;

    let feed = Arc::new(Mutex::new(PostFeed::new(
        store.clone(),
        Some(alice),
        PAGE_SIZE,
    )));
    feed.lock().await.load_initial().await.unwrap();
    let _handle = spawn_feed_reconciler(feed.clone(), &hub);

    // another client likes the post
    store.insert_post_like(post_id, Uuid::new_v4()).await.unwrap();

    let mut patched = false;
    for _ in 0..100 {
        if feed.lock().await.posts()[0].post.likes == 1 {
            patched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(patched, "feed patched the changed row without a full reload");
}

#[tokio::test]
async fn own_insert_echo_does_not_duplicate_the_post() {
    let hub = RealtimeHub::new();
    let store = Arc::new(MemoryStore::with_hub(hub.clone()));
    let alice = session_for(&store, "alice");

    let feed = Arc::new(Mutex::new(PostFeed::new(
        store.clone(),
        Some(alice),
        PAGE_SIZE,
    )));
    feed.lock().await.load_initial().await.unwrap();
    let _handle = spawn_feed_reconciler(feed.clone(), &hub);

    let post_id = feed
        .lock()
        .await
        .create_post(prediction("echo check"))
        .await
        .unwrap();

    // give the echo time to arrive, then assert there is still one copy
    tokio::time::sleep(Duration::from_millis(100)).await;
    let feed = feed.lock().await;
    let copies = feed.posts().iter().filter(|p| p.post.id == post_id).count();
    assert_eq!(copies, 1);
    assert_eq!(feed.posts().len(), 1);
}
