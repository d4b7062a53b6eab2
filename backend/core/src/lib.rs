//! `herald-core` — shared vocabulary for the Herald command framework.
//!
//! Identifiers, actors, permission flags, inbound events, and the traits
//! through which the framework talks to its host platform.

pub mod channel;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use channel::EventBus;
pub use error::HeraldError;
pub use event::{EventTag, InboundEvent, MessageEvent, ReactionEvent};
pub use traits::{
    schedule_delete, CommandMetadata, EntityLookup, MessageSink, MetadataSource,
    PermissionProvider, PersistenceStore,
};
pub use types::{
    Actor, ChannelId, ChannelRef, GuildId, GuildRef, MessageHandle, MessageId, Permission,
    PermissionSet, RoleId, RoleRef, UserId,
};
