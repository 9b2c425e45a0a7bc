use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::followers::FollowerSource;
use crate::model::{DiscussionContext, EntityReference};
use crate::storage::Database;
use crate::store::DiscussionContextStore;

pub const STREAM_APPLICATION_HINT: &str = "messageStream";
pub const AUTHOR_REFERENCE_TYPE: &str = "author";
pub const USER_REFERENCE_TYPE: &str = "user";
/// Entity reference standing for "everyone"
pub const PUBLIC_ENTITY: &str = "*";

/// Resolves the members of a group
pub trait GroupManager: Send + Sync {
    fn get_members(&self, group: &str) -> Result<Vec<String>>;
}

/// Group membership read from the `group_members` table
pub struct DatabaseGroupManager {
    db: Arc<Database>,
}

impl DatabaseGroupManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl GroupManager for DatabaseGroupManager {
    fn get_members(&self, group: &str) -> Result<Vec<String>> {
        self.db.get_group_members(group)
    }
}

/// Who a message stream entry is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "targets", rename_all = "camelCase")]
pub enum Audience {
    Public,
    Followers,
    Users(Vec<String>),
    Groups(Vec<String>),
}

/// Builds the set of context tags for a new message stream discussion
pub struct ContextInitializer {
    contexts: Arc<DiscussionContextStore>,
    groups: Arc<dyn GroupManager>,
    followers: Arc<dyn FollowerSource>,
}

impl ContextInitializer {
    pub fn new(
        contexts: Arc<DiscussionContextStore>,
        groups: Arc<dyn GroupManager>,
        followers: Arc<dyn FollowerSource>,
    ) -> Self {
        Self {
            contexts,
            groups,
            followers,
        }
    }

    /// Author context first, then the audience contexts, without duplicates.
    pub fn initialize(&self, author: &str, audience: &Audience) -> Result<Vec<DiscussionContext>> {
        let mut entities = vec![EntityReference::new(AUTHOR_REFERENCE_TYPE, author)];

        match audience {
            Audience::Public => {
                entities.push(EntityReference::new(USER_REFERENCE_TYPE, PUBLIC_ENTITY));
            }
            Audience::Followers => {
                entities.extend(self.user_entities(self.followers.get_followers(author)));
            }
            Audience::Users(users) => {
                entities.extend(self.user_entities(users.iter().cloned()));
            }
            Audience::Groups(groups) => {
                for group in groups {
                    match self.groups.get_members(group) {
                        Ok(members) => entities.extend(self.user_entities(members)),
                        Err(err) => {
                            warn!(group, error = %err, "skipping group whose members cannot be resolved");
                        }
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        let mut contexts = Vec::new();
        for entity in entities {
            let name = format!("{} {}", entity.reference_type, entity.entity_reference);
            let Some(context) =
                self.contexts
                    .get_or_create(STREAM_APPLICATION_HINT, &name, "", &entity)?
            else {
                debug!(?entity, "no context for entity");
                continue;
            };
            if seen.insert(context.reference.to_string()) {
                contexts.push(context);
            }
        }

        Ok(contexts)
    }

    fn user_entities(&self, users: impl IntoIterator<Item = String>) -> Vec<EntityReference> {
        users
            .into_iter()
            .filter(|user| !user.is_empty())
            .map(|user| EntityReference::new(USER_REFERENCE_TYPE, user))
            .collect()
    }
}
