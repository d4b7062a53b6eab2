//! Trigger detection: decide whether a message addresses the bot and split
//! it into an alias plus argument tokens.

use herald_core::UserId;

use crate::resolvers::parse_user_mention;

/// A detected command trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Alias as typed (case preserved).
    pub alias: String,
    pub tokens: Vec<String>,
}

/// Detect a command in `content`.
///
/// With `mention_enabled`, a first token of `<@host>` or `<@!host>` makes the
/// second token the alias. Otherwise the first token must start with
/// `prefix`; the rest of that token is the alias.
pub fn detect_trigger(
    content: &str,
    prefix: &str,
    host: UserId,
    mention_enabled: bool,
) -> Option<Trigger> {
    let mut words = content.split_whitespace();
    let first = words.next()?;

    let alias = if mention_enabled && parse_user_mention(first) == Some(host) {
        words.next()?
    } else {
        if prefix.is_empty() {
            return None;
        }
        first.strip_prefix(prefix).filter(|alias| !alias.is_empty())?
    };

    Some(Trigger { alias: alias.to_string(), tokens: words.map(str::to_string).collect() })
}
