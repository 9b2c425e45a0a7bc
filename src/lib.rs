//! # Discussions - threaded discussions attached to arbitrary entities
//!
//! Discussions hold ordered messages and are tagged by discussion contexts,
//! typed pointers to external entities (users, pages, groups, or `*` for
//! everyone). Everything lives in a local SQLite store and is served over a
//! small REST API.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dx_discussions::store::{CreateMessage, Stores};
//!
//! fn main() -> anyhow::Result<()> {
//!     let stores = Stores::in_memory()?;
//!     let discussion = stores
//!         .discussions
//!         .create("forum", "Release plan", "", &Default::default())?
//!         .expect("title is not blank");
//!
//!     stores
//!         .messages
//!         .create(CreateMessage::new("Ship on Friday?", "alice", discussion))?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod reference;
pub mod rights;
pub mod script;
pub mod server;
pub mod storage;
pub mod store;
pub mod stream;

// Re-export main types for library consumers
pub use config::Config;
pub use error::DiscussionServerError;
pub use events::{ActionType, Event, EventBus};
pub use model::{Discussion, DiscussionContext, EntityReference, Message};
pub use reference::{
    AnyReference, DiscussionContextReference, DiscussionReference, MessageReference,
};
pub use script::DiscussionsScriptService;
pub use storage::Database;
pub use store::Stores;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
