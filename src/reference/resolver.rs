use tracing::debug;

use super::{
    join_parts, split_parts, AnyReference, DiscussionContextReference, DiscussionReference,
    MessageReference, ReferenceError, ReferenceKind,
};

/// Turns a reference into its canonical string form
pub trait ReferenceSerializer: Send + Sync {
    fn serialize(&self, reference: &AnyReference) -> String;
}

/// Turns a canonical string back into a reference of the requested kind
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, value: &str, kind: ReferenceKind) -> Result<AnyReference, ReferenceError>;

    fn resolve_discussion(&self, value: &str) -> Result<DiscussionReference, ReferenceError> {
        match self.resolve(value, ReferenceKind::Discussion)? {
            AnyReference::Discussion(reference) => Ok(reference),
            other => Err(ReferenceError::UnknownKind(other.kind().to_string())),
        }
    }

    fn resolve_context(&self, value: &str) -> Result<DiscussionContextReference, ReferenceError> {
        match self.resolve(value, ReferenceKind::Context)? {
            AnyReference::Context(reference) => Ok(reference),
            other => Err(ReferenceError::UnknownKind(other.kind().to_string())),
        }
    }

    fn resolve_message(&self, value: &str) -> Result<MessageReference, ReferenceError> {
        match self.resolve(value, ReferenceKind::Message)? {
            AnyReference::Message(reference) => Ok(reference),
            other => Err(ReferenceError::UnknownKind(other.kind().to_string())),
        }
    }
}

/// Resolver/serializer pair over the `{hint}/{reference}` format
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReferenceResolver;

impl ReferenceSerializer for DefaultReferenceResolver {
    fn serialize(&self, reference: &AnyReference) -> String {
        join_parts(reference.application_hint(), reference.reference())
    }
}

impl ReferenceResolver for DefaultReferenceResolver {
    fn resolve(&self, value: &str, kind: ReferenceKind) -> Result<AnyReference, ReferenceError> {
        let (hint, reference) = split_parts(value).map_err(|err| {
            debug!(value, %kind, %err, "failed to resolve reference");
            err
        })?;
        Ok(AnyReference::from_parts(kind, hint, reference))
    }
}
