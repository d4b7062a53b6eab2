//! Built-in token parsers.
//!
//! Entity parsers try the mention form first (`<@id>`, `<@!id>`, `<@&id>`,
//! `<#id>`) and fall back to a raw numeric id.

use herald_core::{Actor, ChannelId, ChannelRef, RoleId, RoleRef, UserId};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::arguments::TokenParser;
use crate::context::CommandContext;

static USER_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@!?(\d{1,20})>$").unwrap());
static ROLE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<@&(\d{1,20})>$").unwrap());
static CHANNEL_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<#(\d{1,20})>$").unwrap());
static RAW_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,20}$").unwrap());

/// Extract an id from `token`, preferring `mention` over a raw id.
fn mention_or_id(mention: &Regex, token: &str) -> Option<u64> {
    if let Some(caps) = mention.captures(token) {
        return caps[1].parse().ok();
    }
    if RAW_ID.is_match(token) {
        return token.parse().ok();
    }
    None
}

/// Extract the id from a user mention (`<@id>` or `<@!id>`).
pub fn parse_user_mention(token: &str) -> Option<UserId> {
    USER_MENTION.captures(token).and_then(|caps| caps[1].parse().ok()).map(UserId)
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// 32-bit signed integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerArg;

impl TokenParser for IntegerArg {
    type Output = i32;

    fn can_parse(&self, token: &str, _ctx: &CommandContext) -> bool {
        token.parse::<i32>().is_ok()
    }

    fn parse(&self, token: &str, _ctx: &CommandContext) -> Option<i32> {
        token.parse().ok()
    }
}

/// 64-bit signed integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongArg;

impl TokenParser for LongArg {
    type Output = i64;

    fn can_parse(&self, token: &str, _ctx: &CommandContext) -> bool {
        token.parse::<i64>().is_ok()
    }

    fn parse(&self, token: &str, _ctx: &CommandContext) -> Option<i64> {
        token.parse().ok()
    }
}

/// Finite floating-point number.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatArg;

impl TokenParser for FloatArg {
    type Output = f64;

    fn can_parse(&self, token: &str, _ctx: &CommandContext) -> bool {
        token.parse::<f64>().is_ok_and(f64::is_finite)
    }

    fn parse(&self, token: &str, _ctx: &CommandContext) -> Option<f64> {
        token.parse().ok()
    }
}

/// Any token, verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextArg;

impl TokenParser for TextArg {
    type Output = String;

    fn can_parse(&self, _token: &str, _ctx: &CommandContext) -> bool {
        true
    }

    fn parse(&self, token: &str, _ctx: &CommandContext) -> Option<String> {
        Some(token.to_string())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct UserArg;

impl TokenParser for UserArg {
    type Output = Actor;

    fn can_parse(&self, token: &str, _ctx: &CommandContext) -> bool {
        mention_or_id(&USER_MENTION, token).is_some()
    }

    fn parse(&self, token: &str, ctx: &CommandContext) -> Option<Actor> {
        let id = mention_or_id(&USER_MENTION, token)?;
        ctx.services.entities.user(UserId(id))
    }
}

/// Role in the invoking guild. Resolves to nothing in direct messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleArg;

impl TokenParser for RoleArg {
    type Output = RoleRef;

    fn can_parse(&self, token: &str, _ctx: &CommandContext) -> bool {
        mention_or_id(&ROLE_MENTION, token).is_some()
    }

    fn parse(&self, token: &str, ctx: &CommandContext) -> Option<RoleRef> {
        let id = mention_or_id(&ROLE_MENTION, token)?;
        let guild = ctx.guild_id()?;
        ctx.services.entities.role(guild, RoleId(id))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelArg;

impl TokenParser for ChannelArg {
    type Output = ChannelRef;

    fn can_parse(&self, token: &str, _ctx: &CommandContext) -> bool {
        mention_or_id(&CHANNEL_MENTION, token).is_some()
    }

    fn parse(&self, token: &str, ctx: &CommandContext) -> Option<ChannelRef> {
        let id = mention_or_id(&CHANNEL_MENTION, token)?;
        ctx.services.entities.channel(ChannelId(id))
    }
}
