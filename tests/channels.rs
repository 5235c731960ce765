mod common;

use std::sync::Arc;
use std::time::Duration;

use pronofeed::channels::{ChannelChat, ChannelDirectory, SubscribeOutcome};
use pronofeed::domain::NewChannel;
use pronofeed::error::ServiceError;
use pronofeed::feed::spawn_channel_reconciler;
use pronofeed::realtime::RealtimeHub;
use pronofeed::store::{MemoryStore, SocialStore};
use tokio::sync::Mutex;

use common::session_for;

fn premium_channel(name: &str) -> NewChannel {
    NewChannel {
        name: name.to_string(),
        description: "daily picks, no parlays".to_string(),
        price: 9.99,
    }
}

#[tokio::test]
async fn created_channels_appear_in_the_directory() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");

    let mut directory = ChannelDirectory::new(store.clone(), Some(alice.clone()));
    directory.refresh().await.unwrap();
    assert!(directory.channels().is_empty());

    let channel = directory.create(premium_channel("Underdogs")).await.unwrap();
    assert_eq!(channel.creator_id, alice.user_id);
    assert_eq!(directory.channels().len(), 1);
    assert_eq!(directory.channels()[0].name, "Underdogs");
}

#[tokio::test]
async fn channel_input_is_validated() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let mut directory = ChannelDirectory::new(store.clone(), Some(alice));

    let mut input = premium_channel("  ");
    assert!(matches!(
        directory.create(input.clone()).await,
        Err(ServiceError::InvalidInput(_))
    ));

    input.name = "Underdogs".to_string();
    input.price = -1.0;
    assert!(matches!(
        directory.create(input).await,
        Err(ServiceError::InvalidInput(_))
    ));

    assert!(store.fetch_channels().await.unwrap().is_empty());
}

#[tokio::test]
async fn subscribing_twice_yields_already_subscribed() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let bob = session_for(&store, "bob");

    let mut directory = ChannelDirectory::new(store.clone(), Some(alice));
    let channel = directory.create(premium_channel("Underdogs")).await.unwrap();

    let bobs = ChannelDirectory::new(store.clone(), Some(bob));
    assert_eq!(
        bobs.subscribe(channel.id).await.unwrap(),
        SubscribeOutcome::Subscribed
    );
    assert_eq!(
        bobs.subscribe(channel.id).await.unwrap(),
        SubscribeOutcome::AlreadySubscribed
    );
}

#[tokio::test]
async fn sent_messages_show_up_with_their_author() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");

    let mut directory = ChannelDirectory::new(store.clone(), Some(alice.clone()));
    let channel = directory.create(premium_channel("Underdogs")).await.unwrap();

    let mut chat = ChannelChat::new(store.clone(), Some(alice), channel.id);
    chat.refresh().await.unwrap();
    assert!(chat.messages().is_empty());

    let id = chat.send("tonight: back the away side").await.unwrap();
    assert_eq!(chat.messages().len(), 1);
    assert_eq!(chat.messages()[0].message.id, id);
    assert_eq!(chat.messages()[0].author.as_ref().unwrap().username, "alice");

    assert!(matches!(
        chat.send("  ").await,
        Err(ServiceError::InvalidInput(_))
    ));
    assert_eq!(chat.messages().len(), 1);
}

#[tokio::test]
async fn anonymous_users_cannot_create_or_send() {
    let store = Arc::new(MemoryStore::new());
    let alice = session_for(&store, "alice");
    let mut directory = ChannelDirectory::new(store.clone(), Some(alice));
    let channel = directory.create(premium_channel("Underdogs")).await.unwrap();

    let mut anon_directory = ChannelDirectory::new(store.clone(), None);
    assert!(matches!(
        anon_directory.create(premium_channel("Ghosts")).await,
        Err(ServiceError::NotAuthenticated)
    ));
    assert!(matches!(
        anon_directory.subscribe(channel.id).await,
        Err(ServiceError::NotAuthenticated)
    ));

    let mut chat = ChannelChat::new(store.clone(), None, channel.id);
    chat.refresh().await.unwrap();
    assert!(matches!(
        chat.send("hello").await,
        Err(ServiceError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn remote_messages_arrive_through_the_reconciler() {
    let hub = RealtimeHub::new();
    let store = Arc::new(MemoryStore::with_hub(hub.clone()));
    let alice = session_for(&store, "alice");
    let bob = session_for(&store, "bob");

    let mut directory = ChannelDirectory::new(store.clone(), Some(alice.clone()));
    let channel = directory.create(premium_channel("Underdogs")).await.unwrap();

    let chat = Arc::new(Mutex::new(ChannelChat::new(
        store.clone(),
        Some(alice),
        channel.id,
    )));
    chat.lock().await.refresh().await.unwrap();
    let _handle = spawn_channel_reconciler(chat.clone(), &hub, channel.id);

    store
        .insert_channel_message(channel.id, bob.user_id, "line just moved")
        .await
        .unwrap();

    let mut arrived = false;
    for _ in 0..100 {
        if chat.lock().await.messages().len() == 1 {
            arrived = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(arrived, "remote message refetched into the chat");
    assert_eq!(
        chat.lock().await.messages()[0].author.as_ref().unwrap().username,
        "bob"
    );
}
