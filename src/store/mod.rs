pub mod context_store;
pub mod discussion_store;
pub mod message_store;

use std::sync::Arc;

pub use context_store::DiscussionContextStore;
pub use discussion_store::DiscussionStore;
pub use message_store::{CreateMessage, MessageStore};

use crate::config::Config;
use crate::events::EventBus;
use crate::storage::Database;

/// The three store services wired to one database and one event bus
#[derive(Clone)]
pub struct Stores {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub events: EventBus,
    pub discussions: Arc<DiscussionStore>,
    pub contexts: Arc<DiscussionContextStore>,
    pub messages: Arc<MessageStore>,
}

impl Stores {
    pub fn new(db: Arc<Database>, config: Arc<Config>, events: EventBus) -> Self {
        Self {
            discussions: Arc::new(DiscussionStore::new(db.clone(), config.clone(), events.clone())),
            contexts: Arc::new(DiscussionContextStore::new(
                db.clone(),
                config.clone(),
                events.clone(),
            )),
            messages: Arc::new(MessageStore::new(db.clone(), config.clone(), events.clone())),
            db,
            config,
            events,
        }
    }

    /// Fresh in-memory stores with default configuration.
    pub fn in_memory() -> anyhow::Result<Self> {
        let db = Database::in_memory()?;
        db.initialize()?;
        Ok(Self::new(Arc::new(db), Arc::new(Config::default()), EventBus::new()))
    }
}
