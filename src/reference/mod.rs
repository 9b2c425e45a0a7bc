//! Typed, serializable references to discussions, contexts and messages.
//!
//! Every reference is an `(application_hint, reference)` pair. The canonical
//! string form is `{hint}/{reference}` where `/` and `\` inside the hint are
//! backslash-escaped; the reference part is kept verbatim and may itself
//! contain `/`. [`AnyReference`] additionally carries a kind tag
//! (`discussion:`, `context:`, `message:`) so mixed collections can be
//! addressed uniformly.

pub mod resolver;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use resolver::{DefaultReferenceResolver, ReferenceResolver, ReferenceSerializer};

/// Failure to turn a string into a reference
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("empty reference")]
    Empty,

    #[error("missing '/' separator in reference [{0}]")]
    MissingSeparator(String),

    #[error("empty application hint in reference [{0}]")]
    EmptyHint(String),

    #[error("empty identifier in reference [{0}]")]
    EmptyIdentifier(String),

    #[error("dangling escape character in reference [{0}]")]
    DanglingEscape(String),

    #[error("invalid escape sequence in reference [{0}]")]
    InvalidEscape(String),

    #[error("unknown reference kind [{0}]")]
    UnknownKind(String),
}

/// The three entity kinds that can be referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Discussion,
    Context,
    Message,
}

impl ReferenceKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ReferenceKind::Discussion => "discussion",
            ReferenceKind::Context => "context",
            ReferenceKind::Message => "message",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "discussion" => Some(ReferenceKind::Discussion),
            "context" => Some(ReferenceKind::Context),
            "message" => Some(ReferenceKind::Message),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Join a hint and an identifier into the canonical string form.
pub(crate) fn join_parts(application_hint: &str, reference: &str) -> String {
    let mut out = String::with_capacity(application_hint.len() + reference.len() + 1);
    for c in application_hint.chars() {
        if c == '/' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('/');
    out.push_str(reference);
    out
}

/// Split the canonical string form back into `(hint, identifier)`.
pub(crate) fn split_parts(value: &str) -> Result<(String, String), ReferenceError> {
    if value.is_empty() {
        return Err(ReferenceError::Empty);
    }

    let mut hint = String::new();
    let mut chars = value.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped @ ('/' | '\\'))) => hint.push(escaped),
                Some(_) => return Err(ReferenceError::InvalidEscape(value.to_string())),
                None => return Err(ReferenceError::DanglingEscape(value.to_string())),
            },
            '/' => {
                let reference = &value[idx + 1..];
                if hint.is_empty() {
                    return Err(ReferenceError::EmptyHint(value.to_string()));
                }
                if reference.is_empty() {
                    return Err(ReferenceError::EmptyIdentifier(value.to_string()));
                }
                return Ok((hint, reference.to_string()));
            }
            _ => hint.push(c),
        }
    }

    Err(ReferenceError::MissingSeparator(value.to_string()))
}

macro_rules! typed_reference {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name {
            application_hint: String,
            reference: String,
        }

        impl $name {
            pub const KIND: ReferenceKind = $kind;

            /// Unchecked constructor for parts known to be non-empty; see `try_new`.
            pub fn new(application_hint: impl Into<String>, reference: impl Into<String>) -> Self {
                Self {
                    application_hint: application_hint.into(),
                    reference: reference.into(),
                }
            }

            /// Checked constructor: both parts must be non-empty, which is what
            /// makes the canonical string form resolvable again.
            pub fn try_new(
                application_hint: impl Into<String>,
                reference: impl Into<String>,
            ) -> Result<Self, ReferenceError> {
                let value = Self::new(application_hint, reference);
                if value.application_hint.is_empty() {
                    return Err(ReferenceError::EmptyHint(value.to_string()));
                }
                if value.reference.is_empty() {
                    return Err(ReferenceError::EmptyIdentifier(value.to_string()));
                }
                Ok(value)
            }

            pub fn application_hint(&self) -> &str {
                &self.application_hint
            }

            pub fn reference(&self) -> &str {
                &self.reference
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&join_parts(&self.application_hint, &self.reference))
            }
        }

        impl FromStr for $name {
            type Err = ReferenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (application_hint, reference) = split_parts(s)?;
                Ok(Self {
                    application_hint,
                    reference,
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = ReferenceError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

typed_reference!(
    /// Reference to a [`crate::model::Discussion`]
    DiscussionReference,
    ReferenceKind::Discussion
);

typed_reference!(
    /// Reference to a [`crate::model::DiscussionContext`]
    DiscussionContextReference,
    ReferenceKind::Context
);

typed_reference!(
    /// Reference to a [`crate::model::Message`]
    MessageReference,
    ReferenceKind::Message
);

/// A reference of any kind, tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnyReference {
    Discussion(DiscussionReference),
    Context(DiscussionContextReference),
    Message(MessageReference),
}

impl AnyReference {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            AnyReference::Discussion(_) => ReferenceKind::Discussion,
            AnyReference::Context(_) => ReferenceKind::Context,
            AnyReference::Message(_) => ReferenceKind::Message,
        }
    }

    pub fn application_hint(&self) -> &str {
        match self {
            AnyReference::Discussion(r) => r.application_hint(),
            AnyReference::Context(r) => r.application_hint(),
            AnyReference::Message(r) => r.application_hint(),
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            AnyReference::Discussion(r) => r.reference(),
            AnyReference::Context(r) => r.reference(),
            AnyReference::Message(r) => r.reference(),
        }
    }

    /// Build a reference of the given kind from its parts.
    pub fn from_parts(kind: ReferenceKind, application_hint: String, reference: String) -> Self {
        match kind {
            ReferenceKind::Discussion => {
                AnyReference::Discussion(DiscussionReference::new(application_hint, reference))
            }
            ReferenceKind::Context => {
                AnyReference::Context(DiscussionContextReference::new(application_hint, reference))
            }
            ReferenceKind::Message => {
                AnyReference::Message(MessageReference::new(application_hint, reference))
            }
        }
    }

    /// Canonical string form without the kind tag.
    pub fn untagged(&self) -> String {
        join_parts(self.application_hint(), self.reference())
    }

    /// Parse the tagged form `{kind}:{hint}/{reference}`.
    pub fn parse_tagged(value: &str) -> Result<Self, ReferenceError> {
        let (tag, rest) = value
            .split_once(':')
            .ok_or_else(|| ReferenceError::UnknownKind(value.to_string()))?;
        let kind =
            ReferenceKind::from_tag(tag).ok_or_else(|| ReferenceError::UnknownKind(tag.to_string()))?;
        let (hint, reference) = split_parts(rest)?;
        Ok(Self::from_parts(kind, hint, reference))
    }
}

impl fmt::Display for AnyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.untagged())
    }
}

impl From<DiscussionReference> for AnyReference {
    fn from(value: DiscussionReference) -> Self {
        AnyReference::Discussion(value)
    }
}

impl From<DiscussionContextReference> for AnyReference {
    fn from(value: DiscussionContextReference) -> Self {
        AnyReference::Context(value)
    }
}

impl From<MessageReference> for AnyReference {
    fn from(value: MessageReference) -> Self {
        AnyReference::Message(value)
    }
}

/// Allocate a fresh identifier: a slug of the hint and name plus a random suffix.
pub fn allocate_identifier(application_hint: &str, name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in application_hint.chars().chain(std::iter::once(' ')).chain(name.chars()) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= 32 {
            break;
        }
    }

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    if slug.is_empty() {
        suffix
    } else {
        format!("{}-{}", slug.trim_end_matches('-'), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_round_trip() {
        let samples = [
            DiscussionReference::new("forum", "welcome-1"),
            DiscussionReference::new("app/with/slashes", "id/with/slashes"),
            DiscussionReference::new("back\\slash", "x"),
            DiscussionReference::new("ünïcode", "ref ☃"),
        ];

        for reference in samples {
            let text = reference.to_string();
            let parsed: DiscussionReference = text.parse().unwrap();
            assert_eq!(parsed, reference, "round trip failed for {text}");
        }
    }

    #[test]
    fn test_escaping_of_hint() {
        let reference = MessageReference::new("a/b", "c");
        assert_eq!(reference.to_string(), "a\\/b/c");
    }

    #[test]
    fn test_malformed_references_fail() {
        assert_eq!("".parse::<DiscussionReference>(), Err(ReferenceError::Empty));
        assert!(matches!(
            "no-separator".parse::<DiscussionReference>(),
            Err(ReferenceError::MissingSeparator(_))
        ));
        assert!(matches!(
            "/ref".parse::<DiscussionReference>(),
            Err(ReferenceError::EmptyHint(_))
        ));
        assert!(matches!(
            "hint/".parse::<DiscussionReference>(),
            Err(ReferenceError::EmptyIdentifier(_))
        ));
        assert!(matches!(
            "hint\\".parse::<DiscussionReference>(),
            Err(ReferenceError::DanglingEscape(_))
        ));
    }

    #[test]
    fn test_only_separator_and_backslash_may_be_escaped() {
        let parsed: DiscussionReference = "a\\\\b\\/c/d".parse().unwrap();
        assert_eq!(parsed.application_hint(), "a\\b/c");
        assert_eq!(parsed.to_string(), "a\\\\b\\/c/d");

        assert!(matches!(
            "a\\b/c".parse::<DiscussionReference>(),
            Err(ReferenceError::InvalidEscape(_))
        ));
    }

    #[test]
    fn test_try_new_rejects_unresolvable_parts() {
        assert!(matches!(
            DiscussionReference::try_new("", "x"),
            Err(ReferenceError::EmptyHint(_))
        ));
        assert!(matches!(
            MessageReference::try_new("forum", ""),
            Err(ReferenceError::EmptyIdentifier(_))
        ));

        let checked = DiscussionContextReference::try_new("a/b", "c").unwrap();
        assert_eq!(checked.to_string().parse::<DiscussionContextReference>(), Ok(checked));
    }

    #[test]
    fn test_tagged_form() {
        let any = AnyReference::from(DiscussionContextReference::new("stream", "author-1"));
        let text = any.to_string();
        assert_eq!(text, "context:stream/author-1");
        assert_eq!(AnyReference::parse_tagged(&text).unwrap(), any);

        assert!(matches!(
            AnyReference::parse_tagged("page:stream/x"),
            Err(ReferenceError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let reference = DiscussionReference::new("forum", "abc");
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, "\"forum/abc\"");
        let back: DiscussionReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
        assert!(serde_json::from_str::<DiscussionReference>("\"broken\"").is_err());
    }

    #[test]
    fn test_allocate_identifier() {
        let id = allocate_identifier("Forum", "Hello, World!");
        assert!(id.starts_with("forum-hello-world-"), "{id}");
        assert_ne!(id, allocate_identifier("Forum", "Hello, World!"));
        assert_eq!(allocate_identifier("", "").len(), 32);
    }
}
