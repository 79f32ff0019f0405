//! Friendship graph operations for the command and event layer.
//!
//! Nothing here is cached. Backend failures are logged and turned into the
//! empty answer for the return type, so callers never see a database error.

use std::collections::HashSet;

use mester_db::{Database, DbError, FriendEntry, PlayerId};
use tracing::{error, warn};

use crate::helpers::now_millis;

#[derive(Clone)]
pub struct SocialGraph {
    db: Database,
}

/// Log a swallowed backend error and fall back to `default`.
fn degrade<T>(op: &'static str, result: Result<T, DbError>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!(op, error = %e, "social graph backend call failed");
            default
        }
    }
}

impl SocialGraph {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Make `a` and `b` friends, or refresh the timestamp of an existing
    /// friendship. Returns false for a self-pair or on backend failure.
    pub async fn add_or_refresh_friendship(&self, a: PlayerId, b: PlayerId) -> bool {
        if a == b {
            warn!(player = %a, "rejected self-friendship");
            return false;
        }
        let result = self.db.upsert_friendship(a, b, now_millis()).await;
        degrade("add_or_refresh_friendship", result.map(|_| true), false)
    }

    /// Remove the friendship regardless of argument order.
    /// Returns false if they were not friends.
    pub async fn remove_friendship(&self, a: PlayerId, b: PlayerId) -> bool {
        let result = self.db.delete_friendship(a, b).await;
        degrade("remove_friendship", result, false)
    }

    pub async fn are_friends(&self, a: PlayerId, b: PlayerId) -> bool {
        let result = self.db.friendship_exists(a, b).await;
        degrade("are_friends", result, false)
    }

    /// Every friend of `player` with the time the friendship was made or last
    /// refreshed (milliseconds since the Unix epoch). Unordered.
    pub async fn list_friends(&self, player: PlayerId) -> Vec<FriendEntry> {
        let result = self.db.list_friends(player).await;
        degrade("list_friends", result, Vec::new())
    }

    pub async fn friend_count(&self, player: PlayerId) -> u32 {
        let result = self.db.friend_count(player).await;
        degrade("friend_count", result, 0)
    }

    /// Players who are friends with both `a` and `b`.
    pub async fn mutual_friends(&self, a: PlayerId, b: PlayerId) -> HashSet<PlayerId> {
        let result = self.db.mutual_friends(a, b).await;
        degrade("mutual_friends", result, HashSet::new())
    }

    /// When `a` and `b` became friends, if they are.
    pub async fn friends_since(&self, a: PlayerId, b: PlayerId) -> Option<i64> {
        let result = self.db.get_friendship(a, b).await;
        degrade("friends_since", result, None).map(|f| f.established_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Database, SocialGraph) {
        let db = Database::open_in_memory().await.unwrap();
        (db.clone(), SocialGraph::new(db))
    }

    fn player(n: u128) -> PlayerId {
        PlayerId::from_u128(n)
    }

    #[tokio::test]
    async fn test_add_and_query() {
        let (_db, social) = setup().await;
        let (a, b) = (player(1), player(2));

        assert!(social.add_or_refresh_friendship(a, b).await);
        assert!(social.are_friends(a, b).await);
        assert!(social.are_friends(b, a).await);
        assert_eq!(social.friend_count(a).await, 1);
        assert!(social.friends_since(b, a).await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_keeps_single_row_and_advances() {
        let (_db, social) = setup().await;
        let (a, b) = (player(1), player(2));

        assert!(social.add_or_refresh_friendship(a, b).await);
        let first = social.friends_since(a, b).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(social.add_or_refresh_friendship(b, a).await);
        let second = social.friends_since(a, b).await.unwrap();

        assert!(second >= first);
        assert_eq!(social.friend_count(a).await, 1);
        assert_eq!(social.list_friends(b).await.len(), 1);
    }

    #[tokio::test]
    async fn test_self_friendship_fails_without_row() {
        let (_db, social) = setup().await;
        let a = player(1);

        assert!(!social.add_or_refresh_friendship(a, a).await);
        assert_eq!(social.friend_count(a).await, 0);
        assert!(!social.are_friends(a, a).await);
    }

    #[tokio::test]
    async fn test_remove_missing_friendship() {
        let (_db, social) = setup().await;
        assert!(!social.remove_friendship(player(1), player(2)).await);
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_empty() {
        let (db, social) = setup().await;
        let (a, b) = (player(1), player(2));
        assert!(social.add_or_refresh_friendship(a, b).await);

        db.close().await.unwrap();

        assert!(!social.add_or_refresh_friendship(a, player(3)).await);
        assert!(!social.remove_friendship(a, b).await);
        assert!(!social.are_friends(a, b).await);
        assert!(social.list_friends(a).await.is_empty());
        assert_eq!(social.friend_count(a).await, 0);
        assert!(social.mutual_friends(a, b).await.is_empty());
        assert_eq!(social.friends_since(a, b).await, None);
    }
}
