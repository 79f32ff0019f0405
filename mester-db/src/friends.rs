//! The `friendships` relation.
//!
//! Rows are keyed on the canonical pair (lower compact id first), so the
//! undirected relation never holds both orderings of a pair. All writes go
//! through [`FriendPair`] and the table enforces `lower_id < higher_id`.

use std::collections::HashSet;

use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::{Database, DbError, FriendEntry, FriendPair, Friendship, PlayerId, Result};

impl Database {
  /// Create a friendship, or refresh its timestamp if it already exists.
  ///
  /// The stored timestamp never moves backwards: a refresh keeps the later of
  /// the stored and the supplied value. Returns the stored row.
  pub async fn upsert_friendship(&self, a: PlayerId, b: PlayerId, now: i64) -> Result<Friendship> {
    let pair = FriendPair::new(a, b).ok_or(DbError::SelfFriendship)?;
    let (lower, higher) = (pair.lower(), pair.higher());

    let established_at: i64 = self
      .call(move |conn| {
        conn
          .prepare_cached(
            r#"
            INSERT INTO friendships (lower_id, higher_id, established_at) VALUES (?1, ?2, ?3)
            ON CONFLICT (lower_id, higher_id)
            DO UPDATE SET established_at = MAX(established_at, excluded.established_at)
            RETURNING established_at
            "#,
          )?
          .query_row(params![lower, higher, now], |row| row.get(0))
      })
      .await?;

    debug!(%lower, %higher, established_at, "upserted friendship");
    Ok(Friendship {
      pair,
      established_at,
    })
  }

  /// Delete a friendship in whichever order the players are given.
  /// Returns false if there was nothing to delete.
  pub async fn delete_friendship(&self, a: PlayerId, b: PlayerId) -> Result<bool> {
    let Some(pair) = FriendPair::new(a, b) else {
      return Ok(false);
    };
    let (lower, higher) = (pair.lower(), pair.higher());

    let deleted = self
      .call(move |conn| {
        conn
          .prepare_cached("DELETE FROM friendships WHERE lower_id = ?1 AND higher_id = ?2")?
          .execute(params![lower, higher])
      })
      .await?;

    if deleted > 0 {
      debug!(%lower, %higher, "deleted friendship");
    }
    Ok(deleted > 0)
  }

  /// Check if two players are friends.
  pub async fn friendship_exists(&self, a: PlayerId, b: PlayerId) -> Result<bool> {
    let Some(pair) = FriendPair::new(a, b) else {
      return Ok(false);
    };
    let (lower, higher) = (pair.lower(), pair.higher());

    let exists = self
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM friendships WHERE lower_id = ?1 AND higher_id = ?2)",
          )?
          .query_row(params![lower, higher], |row| row.get(0))
      })
      .await?;

    Ok(exists)
  }

  /// Get the stored friendship between two players.
  /// Returns None if they are not friends.
  pub async fn get_friendship(&self, a: PlayerId, b: PlayerId) -> Result<Option<Friendship>> {
    let Some(pair) = FriendPair::new(a, b) else {
      return Ok(None);
    };
    let (lower, higher) = (pair.lower(), pair.higher());

    let established_at: Option<i64> = self
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT established_at FROM friendships WHERE lower_id = ?1 AND higher_id = ?2",
          )?
          .query_row(params![lower, higher], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(established_at.map(|established_at| Friendship {
      pair,
      established_at,
    }))
  }

  /// Get every friend of a player with the time each friendship was made.
  /// Order follows storage order.
  pub async fn list_friends(&self, player: PlayerId) -> Result<Vec<FriendEntry>> {
    let friends = self
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          r#"
          SELECT CASE WHEN lower_id = ?1 THEN higher_id ELSE lower_id END, established_at
          FROM friendships
          WHERE lower_id = ?1 OR higher_id = ?1
          "#,
        )?;

        let friends = stmt
          .query_map(params![player], |row| {
            Ok(FriendEntry {
              peer: row.get(0)?,
              established_at: row.get(1)?,
            })
          })?
          .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(friends)
      })
      .await?;

    Ok(friends)
  }

  /// Count the friends of a player.
  pub async fn friend_count(&self, player: PlayerId) -> Result<u32> {
    let count = self
      .call(move |conn| {
        conn
          .prepare_cached("SELECT COUNT(*) FROM friendships WHERE lower_id = ?1 OR higher_id = ?1")?
          .query_row(params![player], |row| row.get(0))
      })
      .await?;

    Ok(count)
  }

  /// Players who are friends with both `a` and `b`, never including `a` or `b`.
  ///
  /// Runs as one query, but the result is exactly the intersection of the two
  /// players' friend sets.
  pub async fn mutual_friends(&self, a: PlayerId, b: PlayerId) -> Result<HashSet<PlayerId>> {
    let mutual = self
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          r#"
          WITH
            friends_a AS (
              SELECT CASE WHEN lower_id = ?1 THEN higher_id ELSE lower_id END AS peer
              FROM friendships
              WHERE lower_id = ?1 OR higher_id = ?1
            ),
            friends_b AS (
              SELECT CASE WHEN lower_id = ?2 THEN higher_id ELSE lower_id END AS peer
              FROM friendships
              WHERE lower_id = ?2 OR higher_id = ?2
            )
          SELECT DISTINCT friends_a.peer
          FROM friends_a
          INNER JOIN friends_b ON friends_a.peer = friends_b.peer
          WHERE friends_a.peer NOT IN (?1, ?2)
          "#,
        )?;

        let mutual = stmt
          .query_map(params![a, b], |row| row.get(0))?
          .collect::<std::result::Result<HashSet<PlayerId>, _>>()?;

        Ok(mutual)
      })
      .await?;

    Ok(mutual)
  }
}
