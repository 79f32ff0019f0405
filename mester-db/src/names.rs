//! The `names` relation: last known display name per player.

use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::{Database, DbError, PlayerId, PlayerName, Result};

fn to_player_name(raw: String) -> Result<PlayerName> {
  PlayerName::from(&raw).map_err(|_| DbError::InvalidName(raw.clone()))
}

impl Database {
  /// Upsert a batch of names in a single transaction.
  ///
  /// Each written row is re-inserted, so the most recently written row for a
  /// shared name also has the highest rowid. Returns the number of rows written.
  pub async fn write_names(&self, names: Vec<(PlayerId, PlayerName)>) -> Result<usize> {
    if names.is_empty() {
      return Ok(0);
    }

    let written = self
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO names (identifier, display_name) VALUES (?1, ?2)",
          )?;
          for (id, name) in &names {
            stmt.execute(params![id, name.as_str()])?;
          }
        }
        tx.commit()?;
        Ok(names.len())
      })
      .await?;

    debug!(written, "wrote names");
    Ok(written)
  }

  /// Get the stored name for a player.
  /// Returns None if not found.
  pub async fn fetch_name(&self, id: PlayerId) -> Result<Option<PlayerName>> {
    let raw: Option<String> = self
      .call(move |conn| {
        conn
          .prepare_cached("SELECT display_name FROM names WHERE identifier = ?1")?
          .query_row(params![id], |row| row.get(0))
          .optional()
      })
      .await?;

    raw.map(to_player_name).transpose()
  }

  /// Get the player who most recently stored this exact (case-sensitive) name.
  /// Returns None if not found.
  pub async fn fetch_uuid(&self, name: PlayerName) -> Result<Option<PlayerId>> {
    let id = self
      .call(move |conn| {
        conn
          .prepare_cached(
            "SELECT identifier FROM names WHERE display_name = ?1 ORDER BY rowid DESC LIMIT 1",
          )?
          .query_row(params![name.as_str()], |row| row.get(0))
          .optional()
      })
      .await?;

    Ok(id)
  }

  /// Number of stored names.
  pub async fn name_count(&self) -> Result<u64> {
    let count = self
      .call(|conn| {
        conn
          .prepare_cached("SELECT COUNT(*) FROM names")?
          .query_row([], |row| row.get(0))
      })
      .await?;

    Ok(count)
  }
}

#[cfg(test)]
mod tests {
  use crate::{Database, PlayerId, PlayerName};

  fn name(s: &str) -> PlayerName {
    PlayerName::from(s).unwrap()
  }

  #[tokio::test]
  async fn test_write_and_fetch_names() {
    let db = Database::open_in_memory().await.unwrap();
    let steve = PlayerId::from_u128(1);
    let alex = PlayerId::from_u128(2);

    let written = db
      .write_names(vec![(steve, name("Steve")), (alex, name("Alex"))])
      .await
      .unwrap();
    assert_eq!(written, 2);

    assert_eq!(db.fetch_name(steve).await.unwrap(), Some(name("Steve")));
    assert_eq!(db.fetch_uuid(name("Alex")).await.unwrap(), Some(alex));
    assert_eq!(db.name_count().await.unwrap(), 2);
  }

  #[tokio::test]
  async fn test_missing_name() {
    let db = Database::open_in_memory().await.unwrap();
    assert_eq!(db.fetch_name(PlayerId::from_u128(9)).await.unwrap(), None);
    assert_eq!(db.fetch_uuid(name("Nobody")).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_rename_overwrites_single_row() {
    let db = Database::open_in_memory().await.unwrap();
    let steve = PlayerId::from_u128(1);

    db.write_names(vec![(steve, name("Steve"))]).await.unwrap();
    db.write_names(vec![(steve, name("Herobrine"))]).await.unwrap();

    assert_eq!(db.fetch_name(steve).await.unwrap(), Some(name("Herobrine")));
    assert_eq!(db.fetch_uuid(name("Steve")).await.unwrap(), None);
    assert_eq!(db.name_count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_shared_name_resolves_to_latest_writer() {
    let db = Database::open_in_memory().await.unwrap();
    let first = PlayerId::from_u128(1);
    let second = PlayerId::from_u128(2);

    db.write_names(vec![(second, name("Notch"))]).await.unwrap();
    db.write_names(vec![(first, name("Notch"))]).await.unwrap();
    assert_eq!(db.fetch_uuid(name("Notch")).await.unwrap(), Some(first));

    db.write_names(vec![(second, name("Notch"))]).await.unwrap();
    assert_eq!(db.fetch_uuid(name("Notch")).await.unwrap(), Some(second));
  }

  #[tokio::test]
  async fn test_name_lookup_is_case_sensitive() {
    let db = Database::open_in_memory().await.unwrap();
    db.write_names(vec![(PlayerId::from_u128(1), name("jeb_"))])
      .await
      .unwrap();
    assert_eq!(db.fetch_uuid(name("JEB_")).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_empty_batch_is_noop() {
    let db = Database::open_in_memory().await.unwrap();
    assert_eq!(db.write_names(Vec::new()).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_stored_identifier_is_compact() {
    let db = Database::open_in_memory().await.unwrap();
    let id = PlayerId::from_u128(0xabc);
    db.write_names(vec![(id, name("Steve"))]).await.unwrap();

    let stored: String = db
      .call(|conn| {
        conn.query_row("SELECT identifier FROM names", [], |row| row.get(0))
      })
      .await
      .unwrap();
    assert_eq!(stored, id.compact());
    assert_eq!(stored.len(), 32);
  }
}
