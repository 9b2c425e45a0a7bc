use std::sync::Arc;
use tracing::warn;

use crate::storage::Database;

/// Looks up the users following a given user
pub trait FollowerSource: Send + Sync {
    /// Best effort: failures are logged and produce an empty list.
    fn get_followers(&self, user: &str) -> Vec<String>;
}

/// Followers derived from follow notification-filter preferences
pub struct Followers {
    db: Arc<Database>,
}

impl Followers {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl FollowerSource for Followers {
    fn get_followers(&self, user: &str) -> Vec<String> {
        match self.db.find_follow_preference_owners(user) {
            Ok(owners) => owners,
            Err(err) => {
                warn!(user, error = %err, "failed to look up followers");
                Vec::new()
            }
        }
    }
}
