//! Scripting facade over the stores.
//!
//! Every method swallows failures: errors are logged and come back as `None`,
//! `false` or an empty list, so scripts never have to handle them.

use std::sync::Arc;
use tracing::warn;

use crate::model::{Discussion, DiscussionContext, EntityReference, Message, StoreConfiguration};
use crate::reference::{
    AnyReference, DefaultReferenceResolver, ReferenceKind, ReferenceResolver, ReferenceSerializer,
};
use crate::store::{CreateMessage, Stores};
use crate::stream::context_init::STREAM_APPLICATION_HINT;
use crate::stream::{Audience, ContextInitializer, DatabaseGroupManager, Followers};

pub struct DiscussionsScriptService {
    stores: Stores,
    resolver: DefaultReferenceResolver,
    initializer: ContextInitializer,
}

impl DiscussionsScriptService {
    pub fn new(stores: Stores) -> Self {
        let initializer = ContextInitializer::new(
            stores.contexts.clone(),
            Arc::new(DatabaseGroupManager::new(stores.db.clone())),
            Arc::new(Followers::new(stores.db.clone())),
        );
        Self::with_initializer(stores, initializer)
    }

    pub fn with_initializer(stores: Stores, initializer: ContextInitializer) -> Self {
        Self {
            stores,
            resolver: DefaultReferenceResolver,
            initializer,
        }
    }

    pub fn create_discussion(
        &self,
        application_hint: &str,
        title: &str,
        description: &str,
    ) -> Option<Discussion> {
        let reference = self
            .stores
            .discussions
            .create(application_hint, title, description, &StoreConfiguration::new())
            .map_err(|err| warn!(title, error = %err, "failed to create discussion"))
            .ok()??;
        self.load_discussion(&reference.to_string())
    }

    pub fn get_discussion(&self, reference: &str) -> Option<Discussion> {
        self.load_discussion(reference)
    }

    pub fn get_or_create_context(
        &self,
        application_hint: &str,
        name: &str,
        description: &str,
        reference_type: &str,
        entity_reference: &str,
    ) -> Option<DiscussionContext> {
        let entity = EntityReference::new(reference_type, entity_reference);
        self.stores
            .contexts
            .get_or_create(application_hint, name, description, &entity)
            .map_err(|err| warn!(?entity, error = %err, "failed to get or create context"))
            .ok()?
    }

    pub fn link_context(&self, discussion: &str, context: &str) -> bool {
        let Some(discussion) = self.resolve_as(discussion, ReferenceKind::Discussion) else {
            return false;
        };
        let Some(context) = self.resolve_as(context, ReferenceKind::Context) else {
            return false;
        };
        let (AnyReference::Discussion(discussion), AnyReference::Context(context)) =
            (discussion, context)
        else {
            return false;
        };

        self.stores
            .discussions
            .link(&discussion, &context)
            .unwrap_or_else(|err| {
                warn!(discussion = %discussion, context = %context, error = %err, "failed to link context");
                false
            })
    }

    pub fn post_message(&self, discussion: &str, content: &str, author: &str) -> Option<Message> {
        let discussion = self.resolver.resolve_discussion(discussion).ok()?;
        let reference = self
            .stores
            .messages
            .create(CreateMessage::new(content, author, discussion.clone()))
            .map_err(|err| warn!(discussion = %discussion, error = %err, "failed to post message"))
            .ok()??;
        self.stores.messages.get(&reference).ok()?
    }

    pub fn get_messages(&self, discussion: &str, offset: usize, limit: usize) -> Vec<Message> {
        let Ok(discussion) = self.resolver.resolve_discussion(discussion) else {
            return Vec::new();
        };
        self.stores
            .messages
            .find_by_discussion(&discussion, offset, limit)
            .unwrap_or_else(|err| {
                warn!(discussion = %discussion, error = %err, "failed to list messages");
                Vec::new()
            })
    }

    /// Contexts tagging a discussion posted by `author` for `audience`.
    pub fn initialize_contexts(&self, author: &str, audience: &Audience) -> Vec<DiscussionContext> {
        self.initializer
            .initialize(author, audience)
            .unwrap_or_else(|err| {
                warn!(author, error = %err, "failed to initialize contexts");
                Vec::new()
            })
    }

    /// Create a discussion and tag it with the contexts of `audience`.
    pub fn create_stream_discussion(
        &self,
        author: &str,
        title: &str,
        audience: &Audience,
    ) -> Option<Discussion> {
        let discussion = self.create_discussion(STREAM_APPLICATION_HINT, title, "")?;
        for context in self.initialize_contexts(author, audience) {
            if let Err(err) = self
                .stores
                .discussions
                .link(&discussion.reference, &context.reference)
            {
                warn!(context = %context.reference, error = %err, "failed to tag stream discussion");
            }
        }
        Some(discussion)
    }

    pub fn serialize(&self, reference: &AnyReference) -> String {
        self.resolver.serialize(reference)
    }

    pub fn resolve(&self, value: &str, kind: ReferenceKind) -> Option<AnyReference> {
        self.resolve_as(value, kind)
    }

    fn resolve_as(&self, value: &str, kind: ReferenceKind) -> Option<AnyReference> {
        self.resolver.resolve(value, kind).ok()
    }

    fn load_discussion(&self, reference: &str) -> Option<Discussion> {
        let reference = self.resolver.resolve_discussion(reference).ok()?;
        self.stores
            .discussions
            .get(&reference)
            .map_err(|err| warn!(reference = %reference, error = %err, "failed to load discussion"))
            .ok()?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DiscussionsScriptService {
        DiscussionsScriptService::new(Stores::in_memory().unwrap())
    }

    #[test]
    fn test_discussion_and_messages() {
        let service = service();
        let discussion = service.create_discussion("forum", "Ideas", "").unwrap();
        let reference = discussion.reference.to_string();

        assert_eq!(service.get_discussion(&reference), Some(discussion));
        assert!(service.get_discussion("forum/unknown").is_none());
        assert!(service.get_discussion("garbage").is_none());

        let message = service.post_message(&reference, "first", "alice").unwrap();
        assert_eq!(message.content, "first");
        assert!(service.post_message("forum/unknown", "x", "alice").is_none());

        let messages = service.get_messages(&reference, 0, 10);
        assert_eq!(messages, vec![message]);
        assert!(service.get_messages("garbage", 0, 10).is_empty());
    }

    #[test]
    fn test_blank_title_is_absent() {
        assert!(service().create_discussion("forum", "  ", "").is_none());
    }

    #[test]
    fn test_link_context() {
        let service = service();
        let discussion = service.create_discussion("forum", "Ideas", "").unwrap();
        let context = service
            .get_or_create_context("forum", "Alice", "", "user", "alice")
            .unwrap();

        let d = discussion.reference.to_string();
        let c = context.reference.to_string();
        assert!(service.link_context(&d, &c));
        assert!(!service.link_context("garbage", &c));
    }

    #[test]
    fn test_stream_discussion_is_tagged() {
        let service = service();
        let discussion = service
            .create_stream_discussion("alice", "Status", &Audience::Users(vec!["bob".into()]))
            .unwrap();

        let contexts = service
            .stores
            .contexts
            .find_by_discussion(&discussion.reference)
            .unwrap();
        let mut entities: Vec<_> = contexts
            .iter()
            .map(|c| c.entity_reference.entity_reference.as_str())
            .collect();
        entities.sort();
        assert_eq!(entities, vec!["alice", "bob"]);
    }

    #[test]
    fn test_serialize_and_resolve() {
        let service = service();
        let reference = service.resolve("a\\/b/c", ReferenceKind::Message).unwrap();
        assert_eq!(reference.kind(), ReferenceKind::Message);
        assert_eq!(reference.application_hint(), "a/b");
        assert_eq!(service.serialize(&reference), "a\\/b/c");
        assert!(service.resolve("", ReferenceKind::Message).is_none());
    }
}
