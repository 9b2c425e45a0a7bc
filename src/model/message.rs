use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::{DiscussionReference, MessageReference};

/// A single authored contribution to a discussion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub reference: MessageReference,
    pub content: String,
    pub syntax: String,
    pub author: String,
    /// Owning discussion; changes only through reassignment
    pub discussion: DiscussionReference,
    pub reply_to: Option<MessageReference>,
    pub attachments: Vec<String>,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl Message {
    pub fn touch(&mut self) {
        self.update_date = super::clamp_update(self.creation_date, super::now());
    }
}
