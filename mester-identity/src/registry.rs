use std::future::Future;

use mester_db::{PlayerId, PlayerName};
use scc::HashMap;
use scc::hash_map::Entry;

/// The host's view of players with an active session.
///
/// Lookups here are authoritative and never touch the database.
pub trait LiveRegistry: Send + Sync + 'static {
    /// Name of an online player.
    fn name_of(&self, id: PlayerId) -> impl Future<Output = Option<PlayerName>> + Send;

    /// Identifier of the online player with exactly this name.
    fn id_of(&self, name: &PlayerName) -> impl Future<Output = Option<PlayerId>> + Send;
}

/// In-memory registry of online players.
/// Uses scc::HashMap for concurrent access. Updates for one player hold that
/// player's `by_id` entry, so both maps change together.
pub struct OnlineRegistry {
    by_id: HashMap<PlayerId, PlayerName>,
    by_name: HashMap<PlayerName, PlayerId>,
}

impl OnlineRegistry {
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Called when a session becomes active.
    /// If the player is already online under another name, the old name is released.
    pub async fn connect(&self, id: PlayerId, name: PlayerName) {
        // The id entry stays locked until `by_name` agrees with it
        match self.by_id.entry_async(id).await {
            Entry::Occupied(mut current) => {
                let old = current.insert(name);
                if old != name {
                    self.release_name(&old, id).await;
                }
                self.by_name.upsert_async(name, id).await;
            }
            Entry::Vacant(vacant) => {
                let _held = vacant.insert_entry(name);
                self.by_name.upsert_async(name, id).await;
            }
        }
    }

    /// Called when a session ends.
    pub async fn disconnect(&self, id: PlayerId) {
        if let Entry::Occupied(current) = self.by_id.entry_async(id).await {
            let name = *current.get();
            self.release_name(&name, id).await;
            let _ = current.remove();
        }
    }

    /// Drop the name entry only if it still belongs to `id`.
    async fn release_name(&self, name: &PlayerName, id: PlayerId) {
        let _ = self.by_name.remove_if_async(name, |owner| *owner == id).await;
    }

    pub async fn is_online(&self, id: PlayerId) -> bool {
        self.by_id.read_async(&id, |_, _| ()).await.is_some()
    }

    /// Number of online players.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for OnlineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveRegistry for OnlineRegistry {
    async fn name_of(&self, id: PlayerId) -> Option<PlayerName> {
        self.by_id.read_async(&id, |_, name| *name).await
    }

    async fn id_of(&self, name: &PlayerName) -> Option<PlayerId> {
        self.by_name.read_async(name, |_, id| *id).await
    }
}
