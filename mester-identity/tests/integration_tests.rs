use std::collections::HashSet;
use std::time::Duration;

use mester_identity::config::Config;
use mester_identity::{IdentityError, IdentityService, LiveRegistry, PlayerId, PlayerName};

/// Helper to create a service on an in-memory database with the default configuration
async fn setup_service() -> IdentityService {
    IdentityService::open_in_memory(&Config::default())
        .await
        .expect("Failed to open identity service")
}

fn random_player() -> PlayerId {
    PlayerId::from_uuid(uuid::Uuid::new_v4())
}

fn name(s: &str) -> PlayerName {
    PlayerName::from(s).unwrap()
}

// =============================================================================
// SESSION TESTS
// =============================================================================

#[tokio::test]
async fn test_session_start_makes_name_resolvable() {
    // GIVEN: A running service
    let service = setup_service().await;
    let steve = random_player();

    // WHEN: Steve's session starts
    service.session_started(steve, "Steve").await.unwrap();

    // THEN: Both directions resolve from the live registry
    assert_eq!(service.names().resolve_name(steve).await, Some(name("Steve")));
    assert_eq!(
        service.names().resolve_identifier(&name("Steve")).await,
        Some(steve)
    );
    assert!(service.registry().is_online(steve).await);
}

#[tokio::test]
async fn test_session_start_rejects_invalid_name() {
    // GIVEN: A running service
    let service = setup_service().await;
    let player = random_player();

    // WHEN: A session starts with a name Minecraft would not allow
    let result = service.session_started(player, "not a name!").await;

    // THEN: It is rejected with a validation error and nothing is registered
    let err = result.unwrap_err();
    assert!(matches!(err, IdentityError::Validation(_)));
    assert_eq!(err.user_message(), "That is not a valid player name.");
    assert!(!service.registry().is_online(player).await);
    assert!(service.names().cached_name(player).is_none());
}

#[tokio::test]
async fn test_name_survives_session_end_via_cache() {
    // GIVEN: A player who was online
    let service = setup_service().await;
    let alex = random_player();
    service.session_started(alex, "Alex").await.unwrap();

    // WHEN: The session ends
    service.session_ended(alex).await;

    // THEN: The registry forgets them but the name cache still answers
    assert_eq!(service.registry().name_of(alex).await, None);
    assert_eq!(service.names().resolve_name(alex).await, Some(name("Alex")));
}

// =============================================================================
// NAME CACHE TESTS
// =============================================================================

#[tokio::test]
async fn test_flush_writes_observed_names_and_clears_cache() {
    // GIVEN: A name observed but not yet persisted
    let service = setup_service().await;
    let bob = random_player();
    service.names().observe(bob, name("Bob"));

    // WHEN: A flush cycle runs
    let written = service.names().flush().await.unwrap();

    // THEN: The name is no longer cached but still resolves from the database
    assert_eq!(written, 1);
    assert!(service.names().cached_name(bob).is_none());
    assert_eq!(service.names().resolve_name(bob).await, Some(name("Bob")));
    // ... and the lookup promoted it back into the cache
    assert_eq!(service.names().cached_name(bob), Some(name("Bob")));
}

#[tokio::test]
async fn test_close_flushes_names_to_disk() {
    // GIVEN: A file-backed service with a long flush interval
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        database_path: dir.path().join("mester.db").to_string_lossy().into_owned(),
        name_flush_interval: Duration::from_secs(3600),
        ..Config::default()
    };
    let notch = random_player();

    let service = IdentityService::open(&config).await.unwrap();
    service.session_started(notch, "Notch").await.unwrap();

    // WHEN: The service shuts down before the timer fires
    service.close().await.unwrap();

    // THEN: A fresh service on the same file resolves the name from the database
    let service = IdentityService::open(&config).await.unwrap();
    assert!(service.names().is_empty());
    assert_eq!(service.names().resolve_name(notch).await, Some(name("Notch")));
    service.close().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    // GIVEN: A configuration with an empty pool
    let config = Config {
        pool_size: 0,
        ..Config::default()
    };

    // WHEN: Opening the service
    let result = IdentityService::open_in_memory(&config).await;

    // THEN: It fails with a configuration error
    assert!(matches!(result, Err(IdentityError::Config(_))));
}

// =============================================================================
// SOCIAL GRAPH TESTS
// =============================================================================

#[tokio::test]
async fn test_friendship_lifecycle() {
    // GIVEN: Two players
    let service = setup_service().await;
    let social = service.social();
    let (a, b) = (random_player(), random_player());

    // WHEN: They become friends
    assert!(social.add_or_refresh_friendship(a, b).await);

    // THEN: The relation is visible from both sides
    assert!(social.are_friends(a, b).await);
    assert!(social.are_friends(b, a).await);
    let friends_of_b: Vec<PlayerId> = social.list_friends(b).await.iter().map(|f| f.peer).collect();
    assert_eq!(friends_of_b, vec![a]);

    // WHEN: The friendship is removed using the opposite argument order
    assert!(social.remove_friendship(b, a).await);

    // THEN: Neither side sees it any more, and a second removal reports nothing to do
    assert!(!social.are_friends(a, b).await);
    assert!(social.list_friends(a).await.is_empty());
    assert!(!social.remove_friendship(a, b).await);
}

#[tokio::test]
async fn test_re_adding_refreshes_instead_of_duplicating() {
    // GIVEN: An existing friendship
    let service = setup_service().await;
    let social = service.social();
    let (a, b) = (random_player(), random_player());
    assert!(social.add_or_refresh_friendship(a, b).await);
    let first = social.friends_since(a, b).await.unwrap();

    // WHEN: It is added again in the other direction
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(social.add_or_refresh_friendship(b, a).await);

    // THEN: There is still one friendship and its timestamp did not go back
    assert_eq!(social.friend_count(a).await, 1);
    assert_eq!(social.friend_count(b).await, 1);
    assert!(social.friends_since(b, a).await.unwrap() >= first);
}

#[tokio::test]
async fn test_self_friendship_is_rejected() {
    // GIVEN: A single player
    let service = setup_service().await;
    let a = random_player();

    // WHEN: They try to befriend themselves
    let added = service.social().add_or_refresh_friendship(a, a).await;

    // THEN: It fails and nothing is stored
    assert!(!added);
    assert_eq!(service.social().friend_count(a).await, 0);
}

#[tokio::test]
async fn test_mutual_friends_and_counts() {
    // GIVEN: Edges (A,B), (A,C), (B,C), (B,D)
    let service = setup_service().await;
    let social = service.social();
    let (a, b, c, d) = (random_player(), random_player(), random_player(), random_player());
    for (x, y) in [(a, b), (a, c), (b, c), (b, d)] {
        assert!(social.add_or_refresh_friendship(x, y).await);
    }

    // THEN: Mutual friends follow the set-intersection definition in both orders
    assert_eq!(social.mutual_friends(a, b).await, HashSet::from([c]));
    assert_eq!(social.mutual_friends(b, a).await, HashSet::from([c]));
    assert_eq!(social.mutual_friends(a, d).await, HashSet::from([b]));
    assert!(social.mutual_friends(a, random_player()).await.is_empty());

    // AND: Counts match the edges
    assert_eq!(social.friend_count(a).await, 2);
    assert_eq!(social.friend_count(b).await, 3);
    assert_eq!(social.friend_count(d).await, 1);
}

#[tokio::test]
async fn test_operations_degrade_after_close() {
    // GIVEN: A service with a friendship, then shut down while a handle is still held
    let service = setup_service().await;
    let social = service.social().clone();
    let names = service.names().clone();
    let (a, b) = (random_player(), random_player());
    assert!(social.add_or_refresh_friendship(a, b).await);
    service.close().await.unwrap();

    // WHEN / THEN: Every call returns its empty value instead of an error
    assert!(!social.are_friends(a, b).await);
    assert!(social.list_friends(a).await.is_empty());
    assert_eq!(social.friend_count(a).await, 0);
    assert!(social.mutual_friends(a, b).await.is_empty());
    assert_eq!(names.resolve_name(a).await, None);
}
