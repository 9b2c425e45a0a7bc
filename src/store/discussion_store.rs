use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::{ActionType, DiscussionContextEvent, DiscussionEvent, EventBus};
use crate::model::{Discussion, StoreConfiguration};
use crate::reference::{allocate_identifier, DiscussionContextReference, DiscussionReference};
use crate::storage::Database;

/// Persistence-facing operations on discussions
pub struct DiscussionStore {
    db: Arc<Database>,
    config: Arc<Config>,
    events: EventBus,
}

impl DiscussionStore {
    pub fn new(db: Arc<Database>, config: Arc<Config>, events: EventBus) -> Self {
        Self { db, config, events }
    }

    /// Persist a new discussion and return its freshly allocated reference.
    ///
    /// Absent when the hint or the title is blank.
    pub fn create(
        &self,
        application_hint: &str,
        title: &str,
        description: &str,
        store_configuration: &StoreConfiguration,
    ) -> Result<Option<DiscussionReference>> {
        if application_hint.trim().is_empty() || title.trim().is_empty() {
            warn!(application_hint, title, "refusing to create a discussion without hint or title");
            return Ok(None);
        }

        let reference =
            DiscussionReference::new(application_hint, allocate_identifier(application_hint, title));
        let discussion = Discussion::new(reference.clone(), title.to_string(), description.to_string());
        let namespace = self.config.discussions_namespace(application_hint);

        self.db
            .insert_discussion(&discussion, &namespace, store_configuration)?;
        info!(reference = %reference, namespace, "discussion created");

        self.events
            .publish(DiscussionEvent::new(ActionType::Create, reference.clone()));
        Ok(Some(reference))
    }

    pub fn get(&self, reference: &DiscussionReference) -> Result<Option<Discussion>> {
        self.db.get_discussion(reference)
    }

    /// Change title and description. Absent when the discussion does not exist.
    pub fn update(
        &self,
        reference: &DiscussionReference,
        title: &str,
        description: &str,
    ) -> Result<Option<Discussion>> {
        let Some(mut discussion) = self.db.get_discussion(reference)? else {
            debug!(reference = %reference, "cannot update unknown discussion");
            return Ok(None);
        };

        discussion.title = title.to_string();
        discussion.description = description.to_string();
        discussion.touch();
        self.db.update_discussion(&discussion)?;

        self.events
            .publish(DiscussionEvent::new(ActionType::Update, reference.clone()));
        Ok(Some(discussion))
    }

    /// Bump the update date, e.g. after a message was posted.
    pub fn touch(&self, reference: &DiscussionReference) -> Result<bool> {
        let Some(mut discussion) = self.db.get_discussion(reference)? else {
            return Ok(false);
        };
        discussion.touch();
        self.db.update_discussion(&discussion)
    }

    /// Tag a discussion with a context. Returns false when the link already existed.
    pub fn link(
        &self,
        discussion: &DiscussionReference,
        context: &DiscussionContextReference,
    ) -> Result<bool> {
        let linked = self.db.link_context(discussion, context)?;
        if linked {
            debug!(discussion = %discussion, context = %context, "context linked");
            self.events
                .publish(DiscussionContextEvent::new(ActionType::Update, context.clone()));
        }
        Ok(linked)
    }

    pub fn unlink(
        &self,
        discussion: &DiscussionReference,
        context: &DiscussionContextReference,
    ) -> Result<bool> {
        let unlinked = self.db.unlink_context(discussion, context)?;
        if unlinked {
            debug!(discussion = %discussion, context = %context, "context unlinked");
            self.events
                .publish(DiscussionContextEvent::new(ActionType::Update, context.clone()));
        }
        Ok(unlinked)
    }

    pub fn find_by_entity_references(
        &self,
        reference_type: &str,
        entity_references: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Discussion>> {
        self.db
            .find_discussions_by_entities(reference_type, entity_references, offset, limit)
    }

    pub fn count_by_entity_references(
        &self,
        reference_type: &str,
        entity_references: &[String],
    ) -> Result<usize> {
        self.db
            .count_discussions_by_entities(reference_type, entity_references)
    }

    pub fn find_by_context(&self, context: &DiscussionContextReference) -> Result<Vec<Discussion>> {
        self.db.find_discussions_by_context(context)
    }

    pub fn message_count(&self, reference: &DiscussionReference) -> Result<usize> {
        self.db.count_messages_by_discussion(reference)
    }

    /// Message counts of several discussions; discussions without messages map to zero.
    pub fn message_counts(
        &self,
        references: &[DiscussionReference],
    ) -> Result<HashMap<DiscussionReference, usize>> {
        let mut counts = self.db.count_messages_by_discussions(references)?;
        for reference in references {
            counts.entry(reference.clone()).or_insert(0);
        }
        Ok(counts)
    }
}
