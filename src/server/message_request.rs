use std::collections::HashMap;
use tracing::{error, info};

use crate::error::{DiscussionServerError, ServerResult};
use crate::model::{Message, StoreConfiguration};
use crate::reference::{DefaultReferenceResolver, ReferenceResolver};
use crate::store::{CreateMessage, Stores};

pub const DISCUSSION_REFERENCE_PARAMETER: &str = "discussionReference";
pub const CONTENT_PARAMETER: &str = "content";
pub const CONTENT_SYNTAX_PARAMETER: &str = "content_syntax";
pub const REPLY_TO_PARAMETER: &str = "replyTo";
pub const ATTACHMENTS_PARAMETER: &str = "temporaryUploadedAttachments";
pub const STORE_CONFIGURATION_PREFIX: &str = "storeConfiguration_";

/// Creates messages from named request parameters
pub struct DiscussionMessageRequestCreator {
    stores: Stores,
    resolver: DefaultReferenceResolver,
}

impl DiscussionMessageRequestCreator {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            resolver: DefaultReferenceResolver,
        }
    }

    /// Turn request parameters into a [`CreateMessage`] without touching the store.
    pub fn parse(
        &self,
        parameters: &HashMap<String, String>,
        author: &str,
    ) -> ServerResult<CreateMessage> {
        let discussion = mandatory(parameters, DISCUSSION_REFERENCE_PARAMETER)?;
        let content = mandatory(parameters, CONTENT_PARAMETER)?;

        let discussion = self.resolver.resolve_discussion(discussion)?;
        let reply_to = optional(parameters, REPLY_TO_PARAMETER)
            .map(|value| self.resolver.resolve_message(value))
            .transpose()?;
        let syntax = optional(parameters, CONTENT_SYNTAX_PARAMETER).map(str::to_string);
        let attachments = optional(parameters, ATTACHMENTS_PARAMETER)
            .map(split_attachments)
            .unwrap_or_default();

        Ok(CreateMessage {
            content: content.to_string(),
            syntax,
            author: author.to_string(),
            discussion: Some(discussion),
            reply_to,
            attachments,
            store_configuration: store_configuration(parameters),
        })
    }

    pub fn create(
        &self,
        parameters: &HashMap<String, String>,
        author: &str,
    ) -> ServerResult<Message> {
        let request = self.parse(parameters, author)?;
        let Some(discussion) = request.discussion.clone() else {
            return Err(DiscussionServerError::bad_request(format!(
                "Missing parameter [{}]",
                DISCUSSION_REFERENCE_PARAMETER
            )));
        };

        match self.stores.discussions.get(&discussion) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(DiscussionServerError::discussion_not_found(&discussion)),
            Err(err) => {
                error!(discussion = %discussion, error = %err, "failed to load discussion");
                return Err(DiscussionServerError::internal(err.to_string()));
            }
        }

        let failure = || {
            DiscussionServerError::internal(format!(
                "Fail to create a message in discussion [{}]",
                discussion
            ))
        };

        let reference = match self.stores.messages.create(request) {
            Ok(Some(reference)) => reference,
            Ok(None) => return Err(failure()),
            Err(err) => {
                error!(discussion = %discussion, error = %err, "failed to create message");
                return Err(failure());
            }
        };
        info!(reference = %reference, author, "message posted from request");

        match self.stores.messages.get(&reference) {
            Ok(Some(message)) => Ok(message),
            _ => Err(failure()),
        }
    }
}

fn mandatory<'a>(parameters: &'a HashMap<String, String>, name: &str) -> ServerResult<&'a str> {
    optional(parameters, name)
        .ok_or_else(|| DiscussionServerError::bad_request(format!("Missing parameter [{}]", name)))
}

fn optional<'a>(parameters: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    parameters
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn split_attachments(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn store_configuration(parameters: &HashMap<String, String>) -> StoreConfiguration {
    parameters
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(STORE_CONFIGURATION_PREFIX)
                .filter(|key| !key.is_empty())
                .map(|key| (key.to_string(), value.clone()))
        })
        .collect()
}
