//! `herald-commands`: command routing, argument resolution and interactive
//! flows on top of the `herald-core` collaborator traits.

pub mod arguments;
pub mod context;
pub mod detection;
pub mod dispatch;
pub mod framework;
pub mod handlers;
pub mod pagination;
pub mod permissions;
pub mod prefixes;
pub mod registry;
pub mod resolvers;
pub mod types;
pub mod waiter;

#[cfg(test)]
mod testing;

pub use arguments::{
    resolver_fn, Arguments, FailReason, FnResolver, Resolution, ResolveFailure, ResolveOutcome,
    Resolver, TokenCursor, TokenParser,
};
pub use context::{default_failure_handler, CommandContext, DispatchSettings, FailureHandler, Services};
pub use detection::{detect_trigger, Trigger};
pub use dispatch::{command_fn, Command, Dispatcher, Invocation, Raw, RawCommand};
pub use framework::{Framework, FrameworkBuilder};
pub use handlers::{builtin_commands, HelpCommand, PrefixCommand};
pub use pagination::{HelpPages, PageError, PageStates, Paginator, RenderedPage, NEXT_PAGE, PREVIOUS_PAGE};
pub use permissions::PermissionEvaluator;
pub use prefixes::PrefixMap;
pub use registry::AliasRegistry;
pub use resolvers::{ChannelArg, FloatArg, IntegerArg, LongArg, RoleArg, TextArg, UserArg};
pub use types::{CommandEntry, CommandEntryBuilder, DispatchError, DispatchOutcome};
pub use waiter::{InteractionWaiter, WaitId};
