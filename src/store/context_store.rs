use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::{ActionType, DiscussionContextEvent, EventBus};
use crate::model::{DiscussionContext, EntityReference, StoreConfiguration};
use crate::reference::{allocate_identifier, DiscussionContextReference, DiscussionReference};
use crate::storage::Database;

/// Persistence-facing operations on discussion contexts
pub struct DiscussionContextStore {
    db: Arc<Database>,
    config: Arc<Config>,
    events: EventBus,
}

impl DiscussionContextStore {
    pub fn new(db: Arc<Database>, config: Arc<Config>, events: EventBus) -> Self {
        Self { db, config, events }
    }

    /// Persist a new context pointing at `entity`.
    ///
    /// Absent when the hint, the name or the entity is blank.
    pub fn create(
        &self,
        application_hint: &str,
        name: &str,
        description: &str,
        entity: &EntityReference,
    ) -> Result<Option<DiscussionContextReference>> {
        if application_hint.trim().is_empty()
            || name.trim().is_empty()
            || entity.reference_type.is_empty()
            || entity.entity_reference.is_empty()
        {
            warn!(application_hint, name, ?entity, "refusing to create an incomplete context");
            return Ok(None);
        }

        let reference = DiscussionContextReference::new(
            application_hint,
            allocate_identifier(application_hint, name),
        );
        let context = DiscussionContext::new(
            reference.clone(),
            name.to_string(),
            description.to_string(),
            entity.clone(),
        );
        let namespace = self.config.contexts_namespace(application_hint);

        self.db
            .insert_context(&context, &namespace, &StoreConfiguration::new())?;
        info!(reference = %reference, namespace, "discussion context created");

        self.events
            .publish(DiscussionContextEvent::new(ActionType::Create, reference.clone()));
        Ok(Some(reference))
    }

    pub fn get(&self, reference: &DiscussionContextReference) -> Result<Option<DiscussionContext>> {
        self.db.get_context(reference)
    }

    pub fn find_by_entity(&self, entity: &EntityReference) -> Result<Option<DiscussionContext>> {
        self.db.find_context_by_entity(entity)
    }

    pub fn find_by_discussion(
        &self,
        discussion: &DiscussionReference,
    ) -> Result<Vec<DiscussionContext>> {
        self.db.find_contexts_by_discussion(discussion)
    }

    /// Look the context up by entity and create it when missing.
    ///
    /// The lookup and the insert are separate statements: two concurrent
    /// callers can both miss and create a context each.
    pub fn get_or_create(
        &self,
        application_hint: &str,
        name: &str,
        description: &str,
        entity: &EntityReference,
    ) -> Result<Option<DiscussionContext>> {
        if let Some(existing) = self.find_by_entity(entity)? {
            return Ok(Some(existing));
        }

        match self.create(application_hint, name, description, entity)? {
            Some(reference) => self.get(&reference),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DiscussionContextStore {
        let db = Arc::new(Database::in_memory().unwrap());
        db.initialize().unwrap();
        DiscussionContextStore::new(db, Arc::new(Config::default()), EventBus::new())
    }

    #[test]
    fn test_create_and_lookup_by_entity() {
        let store = store();
        let entity = EntityReference::new("document", "Main.WebHome");
        let reference = store
            .create("forum", "Home page", "Talk about the home page", &entity)
            .unwrap()
            .unwrap();

        let context = store.get(&reference).unwrap().unwrap();
        assert_eq!(context.name, "Home page");
        assert_eq!(context.entity_reference, entity);
        assert_eq!(store.find_by_entity(&entity).unwrap().unwrap().reference, reference);
    }

    #[test]
    fn test_get_or_create_reuses_existing() {
        let store = store();
        let entity = EntityReference::new("user", "alice");

        let first = store
            .get_or_create("stream", "alice", "", &entity)
            .unwrap()
            .unwrap();
        let second = store
            .get_or_create("stream", "another name", "", &entity)
            .unwrap()
            .unwrap();
        assert_eq!(first.reference, second.reference);
        assert_eq!(second.name, "alice");
    }

    #[test]
    fn test_incomplete_context_is_absent() {
        let store = store();
        let entity = EntityReference::new("user", "");
        assert_eq!(store.create("stream", "x", "", &entity).unwrap(), None);
        assert_eq!(store.get_or_create("stream", "x", "", &entity).unwrap(), None);
    }
}
