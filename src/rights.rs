//! Authorization right declared by the discussions module.
//!
//! Only the descriptor lives here; enforcing it belongs to the hosting
//! application.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleState {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetEntityType {
    Wiki,
    Space,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Right {
    pub name: &'static str,
    pub default_state: RuleState,
    pub tie_resolution: RuleState,
    /// Rules set on a child entity take precedence over inherited ones
    pub inheritance_overrides_policy: bool,
    pub target_entity_types: &'static [TargetEntityType],
    pub read_only: bool,
}

impl Right {
    pub fn applies_to(&self, entity_type: TargetEntityType) -> bool {
        self.target_entity_types.contains(&entity_type)
    }
}

/// Right to create discussions and post messages
pub const DISCUSSION_WRITE: Right = Right {
    name: "discussion-write",
    default_state: RuleState::Allow,
    tie_resolution: RuleState::Deny,
    inheritance_overrides_policy: true,
    target_entity_types: &[
        TargetEntityType::Wiki,
        TargetEntityType::Space,
        TargetEntityType::Document,
    ],
    read_only: false,
};
