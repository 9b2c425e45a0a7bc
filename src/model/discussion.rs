use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::DiscussionReference;

/// A named thread of messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub reference: DiscussionReference,
    pub title: String,
    pub description: String,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl Discussion {
    pub fn new(reference: DiscussionReference, title: String, description: String) -> Self {
        let now = super::now();
        Self {
            reference,
            title,
            description,
            creation_date: now,
            update_date: now,
        }
    }

    /// Record a modification, keeping `update_date >= creation_date`.
    pub fn touch(&mut self) {
        self.update_date = super::clamp_update(self.creation_date, super::now());
    }
}
