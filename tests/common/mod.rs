#![allow(dead_code)]

use std::sync::{Arc, Once};

use pronofeed::domain::{NewPost, Profile, Session};
use pronofeed::store::{MemoryStore, SocialStore};
use uuid::Uuid;

static TRACING: Once = Once::new();

/// Route controller logs through a subscriber; `RUST_LOG` controls what a
/// failing test prints.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn profile(username: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        username: username.to_string(),
        display_name: Some(username.to_uppercase()),
        avatar_url: None,
        badge: None,
    }
}

pub fn session_for(store: &MemoryStore, username: &str) -> Session {
    init_tracing();
    let profile = profile(username);
    store.upsert_profile(profile.clone());
    Session::new(profile)
}

pub fn prediction(analysis: &str) -> NewPost {
    NewPost {
        sport: Some("football".to_string()),
        match_teams: Some("PSG - OM".to_string()),
        prediction_text: Some("PSG win".to_string()),
        analysis: analysis.to_string(),
        odds: 1.85,
        confidence: 4,
        ..Default::default()
    }
}

/// Seed a post directly through the store, bypassing any controller.
pub async fn seed_post(store: &Arc<MemoryStore>, author: &Session, analysis: &str) -> Uuid {
    store
        .insert_post(author.user_id, &prediction(analysis))
        .await
        .expect("seed post")
        .id
}
