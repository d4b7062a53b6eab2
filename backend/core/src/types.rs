use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snowflake-style identifiers
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// A user account (human or bot).
    UserId
);
id_type!(
    /// A guild: a multi-user server, as opposed to a direct message.
    GuildId
);
id_type!(ChannelId);
id_type!(MessageId);
id_type!(RoleId);

// ---------------------------------------------------------------------------
// Actors and places
// ---------------------------------------------------------------------------

/// Whoever sent an event. The host itself is also an `Actor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), bot: false }
    }

    pub fn bot(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), bot: true }
    }

    /// The `<@id>` form a chat client renders as a mention.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRef {
    pub id: GuildId,
    pub name: String,
}

impl GuildRef {
    pub fn new(id: impl Into<GuildId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
    /// `None` for direct-message channels.
    pub guild: Option<GuildId>,
}

impl ChannelRef {
    pub fn new(id: impl Into<ChannelId>, name: impl Into<String>, guild: Option<GuildId>) -> Self {
        Self { id: id.into(), name: name.into(), guild }
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
    pub guild: GuildId,
}

/// Handle to a message that was sent through a `MessageSink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel: ChannelId,
    pub message: MessageId,
}

impl MessageHandle {
    pub fn new(channel: impl Into<ChannelId>, message: impl Into<MessageId>) -> Self {
        Self { channel: channel.into(), message: message.into() }
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// Abstract capability flags. The host maps these onto its own model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Administrator,
    ManageGuild,
    ManageChannels,
    ManageRoles,
    ManageMessages,
    KickMembers,
    BanMembers,
    MentionEveryone,
    SendMessages,
    AddReactions,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Permission::Administrator => "administrator",
            Permission::ManageGuild => "manage_guild",
            Permission::ManageChannels => "manage_channels",
            Permission::ManageRoles => "manage_roles",
            Permission::ManageMessages => "manage_messages",
            Permission::KickMembers => "kick_members",
            Permission::BanMembers => "ban_members",
            Permission::MentionEveryone => "mention_everyone",
            Permission::SendMessages => "send_messages",
            Permission::AddReactions => "add_reactions",
        };
        f.write_str(s)
    }
}

/// Minimum set of flags an actor must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// True when `held` covers every flag in this set.
    pub fn is_satisfied_by(&self, held: &PermissionSet) -> bool {
        self.0.is_subset(&held.0)
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Permission; N]> for PermissionSet {
    fn from(flags: [Permission; N]) -> Self {
        flags.into_iter().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}
