use serde::{Deserialize, Serialize};

use crate::reference::DiscussionContextReference;

/// Typed pointer to an object living outside the discussion store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    /// Kind of the target, e.g. `user`, `document`, `public`
    pub reference_type: String,
    pub entity_reference: String,
}

impl EntityReference {
    pub fn new(reference_type: impl Into<String>, entity_reference: impl Into<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            entity_reference: entity_reference.into(),
        }
    }
}

/// Tag linking discussions to an external entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionContext {
    pub reference: DiscussionContextReference,
    pub name: String,
    pub description: String,
    pub entity_reference: EntityReference,
}

impl DiscussionContext {
    pub fn new(
        reference: DiscussionContextReference,
        name: String,
        description: String,
        entity_reference: EntityReference,
    ) -> Self {
        Self {
            reference,
            name,
            description,
            entity_reference,
        }
    }
}
