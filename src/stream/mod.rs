//! Message stream support: follower lookup and audience-to-context expansion.

pub mod context_init;
pub mod followers;

pub use context_init::{Audience, ContextInitializer, DatabaseGroupManager, GroupManager};
pub use followers::{FollowerSource, Followers};
