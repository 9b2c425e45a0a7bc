//! Discussion, context and message events.
//!
//! Event matching ignores payload: two events match when they are of the same
//! kind and carry the same [`ActionType`].

pub mod bus;

use serde::{Deserialize, Serialize};

use crate::reference::{DiscussionContextReference, DiscussionReference, MessageReference};

pub use bus::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Discussion,
    Context,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionEvent {
    pub action: ActionType,
    pub reference: Option<DiscussionReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionContextEvent {
    pub action: ActionType,
    pub reference: Option<DiscussionContextReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub action: ActionType,
    pub reference: Option<MessageReference>,
}

impl DiscussionEvent {
    pub fn new(action: ActionType, reference: DiscussionReference) -> Self {
        Self {
            action,
            reference: Some(reference),
        }
    }

    /// Event without payload, used as a listener filter
    pub fn of(action: ActionType) -> Self {
        Self {
            action,
            reference: None,
        }
    }
}

impl DiscussionContextEvent {
    pub fn new(action: ActionType, reference: DiscussionContextReference) -> Self {
        Self {
            action,
            reference: Some(reference),
        }
    }

    pub fn of(action: ActionType) -> Self {
        Self {
            action,
            reference: None,
        }
    }
}

impl MessageEvent {
    pub fn new(action: ActionType, reference: MessageReference) -> Self {
        Self {
            action,
            reference: Some(reference),
        }
    }

    pub fn of(action: ActionType) -> Self {
        Self {
            action,
            reference: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    Discussion(DiscussionEvent),
    Context(DiscussionContextEvent),
    Message(MessageEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Discussion(_) => EventKind::Discussion,
            Event::Context(_) => EventKind::Context,
            Event::Message(_) => EventKind::Message,
        }
    }

    pub fn action(&self) -> ActionType {
        match self {
            Event::Discussion(e) => e.action,
            Event::Context(e) => e.action,
            Event::Message(e) => e.action,
        }
    }

    /// Same kind and same action type; everything else is ignored.
    pub fn matches(&self, other: &Event) -> bool {
        self.kind() == other.kind() && self.action() == other.action()
    }
}

impl From<DiscussionEvent> for Event {
    fn from(value: DiscussionEvent) -> Self {
        Event::Discussion(value)
    }
}

impl From<DiscussionContextEvent> for Event {
    fn from(value: DiscussionContextEvent) -> Self {
        Event::Context(value)
    }
}

impl From<MessageEvent> for Event {
    fn from(value: MessageEvent) -> Self {
        Event::Message(value)
    }
}
