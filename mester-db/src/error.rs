use std::time::Duration;

use thiserror::Error;
use tokio_rusqlite::rusqlite;

#[derive(Debug, Error)]
pub enum DbError {
  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("database connection error: {0}")]
  Connection(#[from] tokio_rusqlite::Error),

  #[error("database call timed out after {0:?}")]
  Timeout(Duration),

  #[error("a player cannot be friends with themselves")]
  SelfFriendship,

  #[error("stored name does not fit a player name: {0:?}")]
  InvalidName(String),
}

impl DbError {
  /// Transient backend failures, as opposed to rejected input.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      DbError::Sqlite(_) | DbError::Connection(_) | DbError::Timeout(_)
    )
  }
}

pub type Result<T> = std::result::Result<T, DbError>;
