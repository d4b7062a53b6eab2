//! Permission gating for command entries.
//!
//! Guild invocations are checked against the actor's membership in that
//! guild. Direct-message invocations of a permission-gated command that is
//! not guild-only fall back to the first guild shared by the actor and the
//! host; this mutual-guild rule is kept for compatibility with existing
//! deployments.

use std::sync::Arc;

use herald_core::{GuildId, Permission, PermissionProvider, PermissionSet, UserId};
use tracing::trace;

use crate::types::CommandEntry;

#[derive(Clone)]
pub struct PermissionEvaluator {
    provider: Arc<dyn PermissionProvider>,
    host: UserId,
}

impl PermissionEvaluator {
    pub fn new(provider: Arc<dyn PermissionProvider>, host: UserId) -> Self {
        Self { provider, host }
    }

    /// Whether `actor` may run `entry`, invoked from `guild` (or a direct
    /// message when `None`).
    pub fn can_invoke(&self, actor: UserId, guild: Option<GuildId>, entry: &CommandEntry) -> bool {
        let required = entry.permissions();
        match (guild, entry.guild_only()) {
            (None, true) => false,
            (Some(guild), _) => self.check_in_guild(actor, guild, required),
            (None, false) => match required {
                None => true,
                Some(required) => self.check_via_mutual_guild(actor, required),
            },
        }
    }

    /// Administrators bypass the restricted-channel rule.
    pub fn has_admin_override(&self, actor: UserId, guild: Option<GuildId>) -> bool {
        let Some(guild) = guild else { return false };
        self.provider.actor_has_permissions(
            actor,
            guild,
            &PermissionSet::from([Permission::Administrator]),
        )
    }

    fn check_in_guild(&self, actor: UserId, guild: GuildId, required: Option<&PermissionSet>) -> bool {
        match required {
            None => true,
            Some(required) => self.provider.actor_has_permissions(actor, guild, required),
        }
    }

    fn check_via_mutual_guild(&self, actor: UserId, required: &PermissionSet) -> bool {
        let mutual = self
            .provider
            .shared_guilds_of(actor)
            .into_iter()
            .find(|guild| self.provider.is_member(self.host, *guild));

        match mutual {
            Some(guild) => {
                trace!(actor = %actor, guild = %guild, "Checking DM invocation against mutual guild");
                self.provider.actor_has_permissions(actor, guild, required)
            }
            // No qualifying guild: only an ungated command would pass, and
            // this path is only reached for gated ones.
            None => false,
        }
    }
}
