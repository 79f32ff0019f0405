pub mod codec;
mod error;
mod friends;
mod models;
mod names;

pub use codec::{IdError, PlayerId};
pub use error::{DbError, Result};
pub use models::{FriendEntry, FriendPair, Friendship, PlayerName};

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_rusqlite::rusqlite::{InterruptHandle, ffi};
use tokio_rusqlite::{Connection, rusqlite};
use tracing::{debug, info, warn};

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolOptions {
  /// Number of SQLite connections (each one owns a background thread)
  pub pool_size: usize,
  /// Upper bound on a single database call
  pub timeout: Duration,
}

impl Default for PoolOptions {
  fn default() -> Self {
    Self {
      pool_size: 4,
      timeout: Duration::from_secs(5),
    }
  }
}

/// A pooled connection and the handle that aborts its running statement.
struct Slot {
  conn: Connection,
  interrupt: InterruptHandle,
}

struct Pool {
  slots: Vec<Slot>,
  next: AtomicUsize,
  timeout: Duration,
}

/// Database wrapper for player names and friendships.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct Database {
  pool: Arc<Pool>,
}

impl Database {
  /// Open or create a database at the given path with default pool settings.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, &PoolOptions::default()).await
  }

  /// Open or create a database at the given path.
  pub async fn open_with(path: impl AsRef<Path>, options: &PoolOptions) -> Result<Self> {
    let path = path.as_ref();
    let size = options.pool_size.max(1);

    let first = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let first = configure(first, options.timeout).await?;
    initialize(&first.conn).await?;

    let mut slots = Vec::with_capacity(size);
    slots.push(first);
    for _ in 1..size {
      let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
      slots.push(configure(conn, options.timeout).await?);
    }

    info!(path = %path.display(), pool_size = size, "database opened");
    Ok(Self::from_slots(slots, options.timeout))
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(&PoolOptions::default()).await
  }

  /// Create an in-memory database. The pool always holds a single
  /// connection, since separate in-memory connections do not share data.
  pub async fn open_in_memory_with(options: &PoolOptions) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let slot = configure(conn, options.timeout).await?;
    initialize(&slot.conn).await?;
    Ok(Self::from_slots(vec![slot], options.timeout))
  }

  fn from_slots(slots: Vec<Slot>, timeout: Duration) -> Self {
    Self {
      pool: Arc::new(Pool {
        slots,
        next: AtomicUsize::new(0),
        timeout,
      }),
    }
  }

  /// Number of pooled connections.
  pub fn pool_size(&self) -> usize {
    self.pool.slots.len()
  }

  /// Close every pooled connection. Calls made afterwards, from this handle
  /// or any clone, fail with a connection error.
  pub async fn close(&self) -> Result<()> {
    for slot in &self.pool.slots {
      slot.conn.clone().close().await?;
    }
    info!("database closed");
    Ok(())
  }

  /// Run `function` on one pooled connection, bounded by the pool timeout.
  ///
  /// The connection is only borrowed for the duration of the closure. On
  /// timeout the call is abandoned: if it has not started it never runs, and
  /// a running statement is interrupted, so a timed-out write does not commit.
  pub(crate) async fn call<F, R>(&self, function: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let idx = self.pool.next.fetch_add(1, Ordering::Relaxed) % self.pool.slots.len();
    let slot = &self.pool.slots[idx];

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let task = slot.conn.call(move |conn| {
      if flag.load(Ordering::Acquire) {
        return Err(interrupted());
      }
      function(conn)
    });

    match tokio::time::timeout(self.pool.timeout, task).await {
      Ok(result) => Ok(result?),
      Err(_) => {
        cancelled.store(true, Ordering::Release);
        slot.interrupt.interrupt();
        warn!(connection = idx, timeout = ?self.pool.timeout, "database call timed out");
        Err(DbError::Timeout(self.pool.timeout))
      }
    }
  }
}

fn interrupted() -> rusqlite::Error {
  rusqlite::Error::SqliteFailure(
    ffi::Error::new(ffi::SQLITE_INTERRUPT),
    Some("call abandoned after timeout".to_string()),
  )
}

/// Per-connection settings. Lock waits give up with the call timeout.
async fn configure(conn: Connection, timeout: Duration) -> Result<Slot> {
  let interrupt = conn
    .call(move |conn| {
      // WAL lets pooled readers proceed while another connection writes
      conn.pragma_update(None, "journal_mode", "WAL")?;
      conn.pragma_update(None, "foreign_keys", "ON")?;
      conn.busy_timeout(timeout)?;
      Ok::<_, rusqlite::Error>(conn.get_interrupt_handle())
    })
    .await?;
  Ok(Slot { conn, interrupt })
}

/// Initialize the database schema.
async fn initialize(conn: &Connection) -> Result<()> {
  conn
    .call(|conn| {
      conn.execute_batch(
        r#"
        -- Last known display name per player
        CREATE TABLE IF NOT EXISTS names (
            identifier TEXT PRIMARY KEY CHECK (length(identifier) = 32),
            display_name TEXT NOT NULL CHECK (length(display_name) BETWEEN 1 AND 16)
        );

        -- Reverse lookup by name
        CREATE INDEX IF NOT EXISTS idx_names_display_name ON names(display_name);

        -- Undirected friendships, one row per pair, lower identifier first
        CREATE TABLE IF NOT EXISTS friendships (
            lower_id TEXT NOT NULL CHECK (length(lower_id) = 32),
            higher_id TEXT NOT NULL CHECK (length(higher_id) = 32),
            established_at INTEGER NOT NULL,
            PRIMARY KEY (lower_id, higher_id),
            CHECK (lower_id < higher_id)
        );

        -- The primary key covers lookups by lower_id
        CREATE INDEX IF NOT EXISTS idx_friendships_higher ON friendships(higher_id);
        "#,
      )?;
      Ok::<_, rusqlite::Error>(())
    })
    .await?;

  debug!("database schema initialized");
  Ok(())
}
