//! Write-back cache for player names.
//!
//! Lookups go live registry -> cache -> database, promoting database hits
//! into the cache. Entries only reach the database through [`NameCache::flush`],
//! which the background [`FlushTask`] runs on a fixed interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mester_db::{Database, DbError, PlayerId, PlayerName};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::registry::{LiveRegistry, OnlineRegistry};

/// Forward map plus reverse index.
///
/// Names are not unique, so `by_name` points at the identifier that most
/// recently claimed a name. Every name in `by_id` has a `by_name` entry, and
/// every `by_name` entry points at an identifier currently holding that name.
#[derive(Debug, Default)]
struct CacheState {
    by_id: HashMap<PlayerId, PlayerName>,
    by_name: HashMap<PlayerName, PlayerId>,
    /// Bumped each time a flush drops written entries.
    generation: u64,
}

impl CacheState {
    fn insert(&mut self, id: PlayerId, name: PlayerName) {
        if let Some(old) = self.by_id.insert(id, name) {
            if old != name {
                self.release_name(old, id);
            }
        }
        self.by_name.insert(name, id);
    }

    /// Remove `id` only if it still maps to `name`. Returns whether it did.
    fn remove_if_unchanged(&mut self, id: PlayerId, name: PlayerName) -> bool {
        if self.by_id.get(&id) != Some(&name) {
            return false;
        }
        self.by_id.remove(&id);
        self.release_name(name, id);
        true
    }

    /// `id` no longer holds `name`; re-point the reverse entry at another
    /// holder or drop it.
    fn release_name(&mut self, name: PlayerName, id: PlayerId) {
        if self.by_name.get(&name) != Some(&id) {
            return;
        }
        match self.by_id.iter().find(|(_, n)| **n == name) {
            Some((other, _)) => {
                self.by_name.insert(name, *other);
            }
            None => {
                self.by_name.remove(&name);
            }
        }
    }

    fn snapshot(&self) -> Vec<(PlayerId, PlayerName)> {
        self.by_id.iter().map(|(id, name)| (*id, *name)).collect()
    }
}

/// Identifier <-> name cache in front of the `names` relation.
pub struct NameCache<R: LiveRegistry = OnlineRegistry> {
    db: Database,
    registry: Arc<R>,
    state: Mutex<CacheState>,
}

impl<R: LiveRegistry> NameCache<R> {
    pub fn new(db: Database, registry: Arc<R>) -> Self {
        Self {
            db,
            registry,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Resolve a player's name. Returns None only if the live registry, the
    /// cache and the database all miss (or the database is unavailable).
    pub async fn resolve_name(&self, id: PlayerId) -> Option<PlayerName> {
        if let Some(name) = self.registry.name_of(id).await {
            return Some(name);
        }

        let generation = {
            let state = self.state.lock();
            if let Some(name) = state.by_id.get(&id) {
                return Some(*name);
            }
            state.generation
        };

        match self.db.fetch_name(id).await {
            Ok(Some(name)) => Some(self.promote(id, name, generation)),
            Ok(None) => None,
            Err(e) => {
                warn!(%id, error = %e, "name lookup failed");
                None
            }
        }
    }

    /// Resolve the player currently known by exactly this name.
    pub async fn resolve_identifier(&self, name: &PlayerName) -> Option<PlayerId> {
        if let Some(id) = self.registry.id_of(name).await {
            return Some(id);
        }

        let generation = {
            let state = self.state.lock();
            if let Some(id) = state.by_name.get(name) {
                return Some(*id);
            }
            state.generation
        };

        match self.db.fetch_uuid(*name).await {
            Ok(Some(id)) => {
                self.promote(id, *name, generation);
                Some(id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%name, error = %e, "identifier lookup failed");
                None
            }
        }
    }

    /// Record a name seen on an active session. Overwrites any cached name.
    pub fn observe(&self, id: PlayerId, name: PlayerName) {
        self.state.lock().insert(id, name);
        debug!(%id, %name, "observed player name");
    }

    /// Insert a database result unless a newer observation got there first.
    /// Returns the name the cache holds afterwards, or `name` if it was not
    /// cached.
    ///
    /// `generation` is the flush generation read before the database fetch.
    /// If a flush dropped entries since then, the fetched row may predate
    /// that flush's write, so it is returned without being cached.
    fn promote(&self, id: PlayerId, name: PlayerName, generation: u64) -> PlayerName {
        let mut state = self.state.lock();
        if let Some(current) = state.by_id.get(&id) {
            return *current;
        }
        if state.generation != generation {
            debug!(%id, %name, "skipped promoting a read that overlapped a flush");
            return name;
        }
        state.insert(id, name);
        name
    }

    /// Write every cached entry to the database in one batch, then drop the
    /// entries that were written.
    ///
    /// Entries changed while the write was in flight stay for the next flush.
    /// On failure nothing is dropped.
    pub async fn flush(&self) -> Result<usize, DbError> {
        let snapshot = self.state.lock().snapshot();
        if snapshot.is_empty() {
            return Ok(0);
        }
        let pending = snapshot.len();

        match self.db.write_names(snapshot.clone()).await {
            Ok(written) => {
                let retained = {
                    let mut state = self.state.lock();
                    for (id, name) in snapshot {
                        state.remove_if_unchanged(id, name);
                    }
                    state.generation += 1;
                    state.by_id.len()
                };
                info!(written, retained, "flushed name cache");
                Ok(written)
            }
            Err(e) => {
                error!(error = %e, pending, "name cache flush failed, retrying next interval");
                Err(e)
            }
        }
    }

    /// Cached name for `id`, without consulting the registry or database.
    pub fn cached_name(&self, id: PlayerId) -> Option<PlayerName> {
        self.state.lock().by_id.get(&id).copied()
    }

    /// Cached identifier for `name`, without consulting the registry or database.
    pub fn cached_id(&self, name: &PlayerName) -> Option<PlayerId> {
        self.state.lock().by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start flushing every `period`. The first flush happens one period from now.
    pub fn spawn_flusher(self: &Arc<Self>, period: Duration) -> FlushTask<R> {
        let cache = Arc::clone(self);
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("flushing name cache");
                        // Failures are logged inside flush; entries stay cached
                        let _ = cache.flush().await;
                    }
                    _ = signal.notified() => break,
                }
            }
        });

        info!(period_secs = period.as_secs_f64(), "name cache flusher started");
        FlushTask {
            cache: Arc::clone(self),
            shutdown,
            handle: Some(handle),
        }
    }
}

/// Handle to the background flush timer.
///
/// Dropping it aborts the timer without a final flush; call
/// [`FlushTask::shutdown`] to write out what is still cached.
pub struct FlushTask<R: LiveRegistry = OnlineRegistry> {
    cache: Arc<NameCache<R>>,
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl<R: LiveRegistry> FlushTask<R> {
    /// Stop the timer and run one last flush.
    pub async fn shutdown(mut self) -> Result<usize, DbError> {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "name cache flusher ended abnormally");
            }
        }
        let written = self.cache.flush().await?;
        info!(written, "name cache flusher stopped");
        Ok(written)
    }
}

impl<R: LiveRegistry> Drop for FlushTask<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            warn!(pending = self.cache.len(), "name cache flusher dropped without shutdown");
        }
    }
}
