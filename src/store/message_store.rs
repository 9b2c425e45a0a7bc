use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::{ActionType, EventBus, MessageEvent};
use crate::model::{Message, StoreConfiguration};
use crate::reference::{allocate_identifier, DiscussionReference, MessageReference};
use crate::storage::Database;

/// Everything needed to post a message
#[derive(Debug, Clone, Default)]
pub struct CreateMessage {
    pub content: String,
    /// Falls back to the configured default syntax when `None`
    pub syntax: Option<String>,
    pub author: String,
    pub discussion: Option<DiscussionReference>,
    pub reply_to: Option<MessageReference>,
    pub attachments: Vec<String>,
    pub store_configuration: StoreConfiguration,
}

impl CreateMessage {
    pub fn new(
        content: impl Into<String>,
        author: impl Into<String>,
        discussion: DiscussionReference,
    ) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
            discussion: Some(discussion),
            ..Default::default()
        }
    }
}

/// Persistence-facing operations on messages
pub struct MessageStore {
    db: Arc<Database>,
    config: Arc<Config>,
    events: EventBus,
}

impl MessageStore {
    pub fn new(db: Arc<Database>, config: Arc<Config>, events: EventBus) -> Self {
        Self { db, config, events }
    }

    /// Persist a message in its discussion.
    ///
    /// Absent when the discussion cannot be found: callers decide whether
    /// that is fatal.
    pub fn create(&self, request: CreateMessage) -> Result<Option<MessageReference>> {
        let Some(discussion_reference) = request.discussion else {
            warn!("message without discussion");
            return Ok(None);
        };
        let Some(mut discussion) = self.db.get_discussion(&discussion_reference)? else {
            warn!(discussion = %discussion_reference, "cannot post a message in an unknown discussion");
            return Ok(None);
        };

        let hint = discussion_reference.application_hint();
        let reference = MessageReference::new(hint, allocate_identifier(hint, "message"));
        let now = crate::model::now();
        let message = Message {
            reference: reference.clone(),
            content: request.content,
            syntax: request
                .syntax
                .unwrap_or_else(|| self.config.default_syntax.clone()),
            author: request.author,
            discussion: discussion_reference.clone(),
            reply_to: request.reply_to,
            attachments: request.attachments,
            creation_date: now,
            update_date: now,
        };
        let namespace = self.config.messages_namespace(hint);

        discussion.touch();
        let inserted = self.db.insert_message_and_touch(
            &message,
            &namespace,
            &request.store_configuration,
            &discussion,
        )?;
        if !inserted {
            warn!(discussion = %discussion_reference, "discussion vanished while posting a message");
            return Ok(None);
        }
        info!(reference = %reference, discussion = %discussion_reference, "message created");

        self.events
            .publish(MessageEvent::new(ActionType::Create, reference.clone()));
        Ok(Some(reference))
    }

    pub fn get(&self, reference: &MessageReference) -> Result<Option<Message>> {
        self.db.get_message(reference)
    }

    pub fn find_by_discussion(
        &self,
        discussion: &DiscussionReference,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.db.find_messages_by_discussion(discussion, offset, limit)
    }

    pub fn count_by_discussion(&self, discussion: &DiscussionReference) -> Result<usize> {
        self.db.count_messages_by_discussion(discussion)
    }

    pub fn update_content(
        &self,
        reference: &MessageReference,
        content: &str,
    ) -> Result<Option<Message>> {
        let Some(mut message) = self.db.get_message(reference)? else {
            debug!(reference = %reference, "cannot update unknown message");
            return Ok(None);
        };

        message.content = content.to_string();
        message.touch();
        self.db.update_message(&message)?;

        self.events
            .publish(MessageEvent::new(ActionType::Update, reference.clone()));
        Ok(Some(message))
    }

    /// Move a message to another discussion. Absent when either side is missing.
    pub fn reassign(
        &self,
        reference: &MessageReference,
        discussion: &DiscussionReference,
    ) -> Result<Option<Message>> {
        let Some(mut message) = self.db.get_message(reference)? else {
            return Ok(None);
        };
        if self.db.get_discussion(discussion)?.is_none() {
            warn!(message = %reference, discussion = %discussion, "cannot reassign to an unknown discussion");
            return Ok(None);
        }

        message.discussion = discussion.clone();
        message.touch();
        self.db.update_message(&message)?;
        info!(message = %reference, discussion = %discussion, "message reassigned");

        self.events
            .publish(MessageEvent::new(ActionType::Update, reference.clone()));
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DiscussionStore;

    fn stores() -> (DiscussionStore, MessageStore) {
        let db = Arc::new(Database::in_memory().unwrap());
        db.initialize().unwrap();
        let config = Arc::new(Config::default());
        let events = EventBus::new();
        (
            DiscussionStore::new(db.clone(), config.clone(), events.clone()),
            MessageStore::new(db, config, events),
        )
    }

    fn discussion(store: &DiscussionStore, title: &str) -> DiscussionReference {
        store
            .create("forum", title, "", &StoreConfiguration::new())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_create_in_missing_discussion_is_absent() {
        let (_, messages) = stores();
        let request = CreateMessage::new("hi", "alice", DiscussionReference::new("forum", "nope"));
        assert_eq!(messages.create(request).unwrap(), None);
        assert_eq!(messages.create(CreateMessage::default()).unwrap(), None);
    }

    #[test]
    fn test_create_and_list_messages() {
        let (discussions, messages) = stores();
        let d = discussion(&discussions, "Thread");
        let before = discussions.get(&d).unwrap().unwrap().update_date;

        let first = messages
            .create(CreateMessage::new("first", "alice", d.clone()))
            .unwrap()
            .unwrap();
        let second = messages
            .create(CreateMessage {
                syntax: Some("plain/1.0".into()),
                reply_to: Some(first.clone()),
                attachments: vec!["a.png".into()],
                ..CreateMessage::new("second", "bob", d.clone())
            })
            .unwrap()
            .unwrap();

        let listed = messages.find_by_discussion(&d, 0, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].reference, first);
        assert_eq!(listed[0].syntax, "markdown/1.2");
        assert_eq!(listed[1].reference, second);
        assert_eq!(listed[1].reply_to.as_ref(), Some(&first));
        assert_eq!(listed[1].attachments, vec!["a.png".to_string()]);
        assert_eq!(messages.count_by_discussion(&d).unwrap(), 2);
        assert_eq!(discussions.message_count(&d).unwrap(), 2);

        let after = discussions.get(&d).unwrap().unwrap().update_date;
        assert!(after >= before);
    }

    #[test]
    fn test_failed_touch_leaves_no_message() {
        let (discussions, messages) = stores();
        let d = discussion(&discussions, "Thread");
        messages
            .db
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_touch BEFORE UPDATE ON discussions
                 BEGIN SELECT RAISE(ABORT, 'touch rejected'); END;",
            )
            .unwrap();

        assert!(messages
            .create(CreateMessage::new("lost", "alice", d.clone()))
            .is_err());
        assert_eq!(messages.count_by_discussion(&d).unwrap(), 0);
    }

    #[test]
    fn test_update_and_reassign() {
        let (discussions, messages) = stores();
        let from = discussion(&discussions, "From");
        let to = discussion(&discussions, "To");
        let m = messages
            .create(CreateMessage::new("draft", "alice", from.clone()))
            .unwrap()
            .unwrap();

        let updated = messages.update_content(&m, "final").unwrap().unwrap();
        assert_eq!(updated.content, "final");
        assert!(updated.update_date >= updated.creation_date);

        let moved = messages.reassign(&m, &to).unwrap().unwrap();
        assert_eq!(moved.discussion, to);
        assert_eq!(messages.count_by_discussion(&from).unwrap(), 0);
        assert_eq!(messages.count_by_discussion(&to).unwrap(), 1);

        let unknown = DiscussionReference::new("forum", "unknown");
        assert_eq!(messages.reassign(&m, &unknown).unwrap(), None);
        assert_eq!(messages.get(&m).unwrap().unwrap().discussion, to);
    }
}
