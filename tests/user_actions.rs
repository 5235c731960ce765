mod common;

use std::sync::Arc;

use pronofeed::actions::{ReportOutcome, UserActions};
use pronofeed::domain::{ShareKind, Toggle, UserRef};
use pronofeed::error::ServiceError;
use pronofeed::store::{MemoryStore, SocialStore};

use common::{seed_post, session_for};

#[tokio::test]
async fn follow_toggles_by_id_and_by_username() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let bob = session_for(&store, "bob");

    let actions = UserActions::new(store.clone(), Some(alice.clone()));

    // by typed id
    let by_id = UserRef::from(bob.user_id);
    assert_eq!(actions.toggle_follow(&by_id).await.unwrap(), Toggle::Added);
    assert!(actions.is_following(&by_id).await.unwrap());

    // the username form resolves to the same relation
    let by_name = UserRef::parse("bob");
    assert_eq!(
        actions.toggle_follow(&by_name).await.unwrap(),
        Toggle::Removed
    );
    assert!(!actions.is_following(&by_id).await.unwrap());
}

#[tokio::test]
async fn unknown_username_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let actions = UserActions::new(store.clone(), Some(alice));

    let err = actions
        .toggle_follow(&UserRef::parse("nobody"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn blocking_removes_an_existing_follow() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let bob = session_for(&store, "bob");
    let actions = UserActions::new(store.clone(), Some(alice.clone()));

    let target = UserRef::from(bob.user_id);
    actions.toggle_follow(&target).await.unwrap();
    assert!(store.follow_exists(alice.user_id, bob.user_id).await.unwrap());

    assert_eq!(actions.toggle_block(&target).await.unwrap(), Toggle::Added);
    assert!(actions.is_blocked(&target).await.unwrap());
    assert!(
        !store.follow_exists(alice.user_id, bob.user_id).await.unwrap(),
        "blocking unfollows"
    );

    // unblocking does not restore the follow
    assert_eq!(actions.toggle_block(&target).await.unwrap(), Toggle::Removed);
    assert!(!store.follow_exists(alice.user_id, bob.user_id).await.unwrap());
}

#[tokio::test]
async fn save_and_hide_are_independent_toggles() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "keeper").await;

    let actions = UserActions::new(store.clone(), Some(alice));

    assert_eq!(actions.toggle_save(post_id).await.unwrap(), Toggle::Added);
    assert_eq!(actions.toggle_hide(post_id).await.unwrap(), Toggle::Added);
    assert!(actions.is_saved(post_id).await.unwrap());
    assert!(actions.is_hidden(post_id).await.unwrap());

    assert_eq!(actions.toggle_save(post_id).await.unwrap(), Toggle::Removed);
    assert!(!actions.is_saved(post_id).await.unwrap());
    assert!(actions.is_hidden(post_id).await.unwrap(), "hide untouched");
}

#[tokio::test]
async fn reporting_twice_yields_already_reported() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "spam?").await;

    let actions = UserActions::new(store.clone(), Some(alice));

    assert_eq!(
        actions
            .report_post(post_id, "spam", Some("repeated paid picks"))
            .await
            .unwrap(),
        ReportOutcome::Submitted
    );
    assert_eq!(
        actions.report_post(post_id, "spam", None).await.unwrap(),
        ReportOutcome::AlreadyReported
    );

    assert!(matches!(
        actions.report_post(post_id, "  ", None).await,
        Err(ServiceError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn shares_accumulate() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let bob = session_for(&store, "bob");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "worth passing on").await;

    UserActions::new(store.clone(), Some(alice))
        .share_post(post_id, ShareKind::Direct)
        .await
        .unwrap();
    UserActions::new(store.clone(), Some(bob))
        .share_post(post_id, ShareKind::External)
        .await
        .unwrap();

    assert_eq!(store.share_count(post_id), 2);
}

#[tokio::test]
async fn anonymous_membership_checks_are_false_and_mutations_fail() {
    let store = Arc::new(MemoryStore::new());
    let bob = session_for(&store, "bob");
    let author = session_for(&store, "tipster");
    let post_id = seed_post(&store, &author, "public view").await;

    let actions = UserActions::new(store.clone(), None);
    let target = UserRef::from(bob.user_id);

    assert!(!actions.is_following(&target).await.unwrap());
    assert!(!actions.is_saved(post_id).await.unwrap());

    assert!(matches!(
        actions.toggle_follow(&target).await,
        Err(ServiceError::NotAuthenticated)
    ));
    assert!(matches!(
        actions.share_post(post_id, ShareKind::Repost).await,
        Err(ServiceError::NotAuthenticated)
    ));
}
