pub mod api;
pub mod discussion_rest;
pub mod message_request;

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;

pub use api::{router, AppState};
pub use discussion_rest::{CreateDiscussion, DiscussionRest, LivetableQuery, LivetableResponse};
pub use message_request::DiscussionMessageRequestCreator;

/// Serve the data directory at `path`, overriding the configured port.
pub async fn start(port: u16, path: PathBuf) -> Result<()> {
    let config = Config {
        port,
        ..Config::load(&path)?
    };
    api::serve(config, &path).await
}
