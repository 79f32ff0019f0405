pub mod config;
mod error;
pub mod helpers;
mod name_cache;
mod registry;
mod social;
pub mod telemetry;
pub mod validation;

pub use error::IdentityError;
pub use mester_db::{FriendEntry, IdError, PlayerId, PlayerName};
pub use name_cache::{FlushTask, NameCache};
pub use registry::{LiveRegistry, OnlineRegistry};
pub use social::SocialGraph;

use std::sync::Arc;

use mester_db::Database;
use tracing::{info, warn};

use crate::config::Config;

/// Name resolution and friendships for one proxy.
///
/// Build one at startup and hand clones of its parts to the command and
/// event layer. Call [`IdentityService::close`] on shutdown so cached names
/// are written out.
pub struct IdentityService {
    db: Database,
    registry: Arc<OnlineRegistry>,
    names: Arc<NameCache>,
    social: SocialGraph,
    flusher: FlushTask,
}

impl IdentityService {
    /// Open the database at `config.database_path` and start the name flusher.
    pub async fn open(config: &Config) -> Result<Self, IdentityError> {
        config.validate()?;
        let db = Database::open_with(&config.database_path, &config.pool_options()).await?;
        Ok(Self::start(db, config))
    }

    /// Same as [`IdentityService::open`], backed by an in-memory database.
    pub async fn open_in_memory(config: &Config) -> Result<Self, IdentityError> {
        config.validate()?;
        let db = Database::open_in_memory_with(&config.pool_options()).await?;
        Ok(Self::start(db, config))
    }

    fn start(db: Database, config: &Config) -> Self {
        let registry = Arc::new(OnlineRegistry::new());
        let names = Arc::new(NameCache::new(db.clone(), Arc::clone(&registry)));
        let flusher = names.spawn_flusher(config.name_flush_interval);
        let social = SocialGraph::new(db.clone());

        info!(
            pool_size = db.pool_size(),
            flush_interval_secs = config.name_flush_interval.as_secs(),
            "identity service started"
        );

        Self {
            db,
            registry,
            names,
            social,
            flusher,
        }
    }

    /// A player's session became active.
    pub async fn session_started(&self, id: PlayerId, raw_name: &str) -> Result<(), IdentityError> {
        let name = validation::parse_player_name(raw_name)?;
        self.registry.connect(id, name).await;
        self.names.observe(id, name);
        Ok(())
    }

    /// A player's session ended. The cached name stays until the next flush.
    pub async fn session_ended(&self, id: PlayerId) {
        self.registry.disconnect(id).await;
    }

    pub fn names(&self) -> &Arc<NameCache> {
        &self.names
    }

    pub fn social(&self) -> &SocialGraph {
        &self.social
    }

    pub fn registry(&self) -> &Arc<OnlineRegistry> {
        &self.registry
    }

    /// Stop the flusher, write out remaining names and close the database.
    pub async fn close(self) -> Result<(), IdentityError> {
        if let Err(e) = self.flusher.shutdown().await {
            // Still close the pool; the names are recoverable from live sessions
            warn!(error = %e, "final name flush failed");
        }
        self.db.close().await?;
        info!("identity service closed");
        Ok(())
    }
}
