pub mod context;
pub mod discussion;
pub mod message;

pub use context::{DiscussionContext, EntityReference};
pub use discussion::Discussion;
pub use message::Message;

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;

/// Opaque key/value parameters handed through to the store alongside a record
pub type StoreConfiguration = BTreeMap<String, String>;

/// Current time at the precision the database keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Update timestamp that never precedes the creation timestamp.
pub fn clamp_update(created: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now < created {
        created
    } else {
        now
    }
}
