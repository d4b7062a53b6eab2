use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Actor, ChannelRef, GuildRef, MessageId};

/// A chat message delivered by the host platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: MessageId,
    pub author: Actor,
    pub channel: ChannelRef,
    /// `None` when the message arrived as a direct message.
    pub guild: Option<GuildRef>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A reaction (emoji) added to an existing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub message: MessageId,
    pub channel: ChannelRef,
    pub guild: Option<GuildRef>,
    pub actor: Actor,
    pub emoji: String,
}

/// Everything the event source can deliver to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    MessageReceived(MessageEvent),
    ReactionAdded(ReactionEvent),
    Shutdown,
}

/// Discriminant of an `InboundEvent`, used to key pending waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    Message,
    Reaction,
    Shutdown,
}

impl InboundEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            InboundEvent::MessageReceived(_) => EventTag::Message,
            InboundEvent::ReactionAdded(_) => EventTag::Reaction,
            InboundEvent::Shutdown => EventTag::Shutdown,
        }
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            InboundEvent::MessageReceived(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_reaction(&self) -> Option<&ReactionEvent> {
        match self {
            InboundEvent::ReactionAdded(reaction) => Some(reaction),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelRef;

    #[test]
    fn tag_matches_variant() {
        let reaction = InboundEvent::ReactionAdded(ReactionEvent {
            message: MessageId(1),
            channel: ChannelRef::new(2, "general", None),
            guild: None,
            actor: Actor::new(3, "alice"),
            emoji: "▶".into(),
        });
        assert_eq!(reaction.tag(), EventTag::Reaction);
        assert!(reaction.as_message().is_none());
        assert!(reaction.as_reaction().is_some());
        assert_eq!(InboundEvent::Shutdown.tag(), EventTag::Shutdown);
    }

    #[test]
    fn tag_display() {
        assert_eq!(EventTag::Reaction.to_string(), "reaction");
    }
}
