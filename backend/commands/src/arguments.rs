//! Argument resolution over a token cursor.
//!
//! Each call to [`Arguments::next`] pops one token, runs a resolver on it
//! and classifies the result. The returned [`Resolution`] is consumed by
//! exactly one continuation: the caller's success or failure closure, or
//! the framework's default failure handler when the caller supplied none.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use crate::context::CommandContext;

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Raw argument tokens plus a consumption index that only moves forward.
#[derive(Debug, Clone, Default)]
pub struct TokenCursor {
    tokens: Vec<String>,
    index: usize,
}

impl TokenCursor {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens, index: 0 }
    }

    /// Split on whitespace.
    pub fn parse(text: &str) -> Self {
        Self::new(text.split_whitespace().map(str::to_string).collect())
    }

    /// Next token and its position, or `None` once exhausted.
    pub fn pop(&mut self) -> Option<(usize, &str)> {
        let position = self.index;
        let token = self.tokens.get(position)?;
        self.index += 1;
        Some((position, token.as_str()))
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.get(self.index).map(String::as_str)
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> &[String] {
        &self.tokens[self.index.min(self.tokens.len())..]
    }

    pub fn all(&self) -> &[String] {
        &self.tokens
    }

    /// Consume every remaining token.
    pub fn drain(&mut self) -> Vec<String> {
        let rest = self.remaining().to_vec();
        self.index = self.tokens.len();
        rest
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// No token was left to resolve.
    NotTyped,
    /// A token was present but the resolver rejected it.
    ParsedNotType,
    /// The resolver accepted the token but produced nothing (e.g. an id
    /// that names no known entity).
    ParsedNull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFailure {
    pub reason: FailReason,
    pub raw: Option<String>,
    pub position: usize,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.position + 1;
        match (self.reason, &self.raw) {
            (FailReason::NotTyped, _) => write!(f, "Missing argument #{n}."),
            (FailReason::ParsedNotType, Some(raw)) => {
                write!(f, "Argument #{n} (`{raw}`) has the wrong type.")
            }
            (FailReason::ParsedNull, Some(raw)) => write!(f, "Argument #{n} (`{raw}`) was not found."),
            (_, None) => write!(f, "Argument #{n} is invalid."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome<T> {
    Success { value: T, raw: String },
    Failure(ResolveFailure),
}

impl<T> ResolveOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolveOutcome::Success { .. })
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ResolveOutcome::Success { value, .. } => Some(value),
            ResolveOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolveFailure> {
        match self {
            ResolveOutcome::Success { .. } => None,
            ResolveOutcome::Failure(failure) => Some(failure),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

/// Converts one raw token into a `T`.
///
/// `Err` means the token is not a `T`; `Ok(None)` means it parsed but
/// resolved to nothing.
pub trait Resolver<T> {
    fn resolve(&self, token: &str, ctx: &CommandContext) -> anyhow::Result<Option<T>>;
}

/// Two-phase parser: a side-effect-free check, then a parse that is only
/// called once the check passed.
pub trait TokenParser {
    type Output;

    fn can_parse(&self, token: &str, ctx: &CommandContext) -> bool;

    fn parse(&self, token: &str, ctx: &CommandContext) -> Option<Self::Output>;
}

impl<P: TokenParser> Resolver<P::Output> for P {
    fn resolve(&self, token: &str, ctx: &CommandContext) -> anyhow::Result<Option<P::Output>> {
        if !self.can_parse(token, ctx) {
            anyhow::bail!("`{token}` cannot be parsed");
        }
        Ok(self.parse(token, ctx))
    }
}

/// A resolver backed by a closure.
pub struct FnResolver<F, T> {
    f: F,
    _output: PhantomData<fn() -> T>,
}

pub fn resolver_fn<F, T>(f: F) -> FnResolver<F, T>
where
    F: Fn(&str, &CommandContext) -> anyhow::Result<Option<T>>,
{
    FnResolver { f, _output: PhantomData }
}

impl<F, T> Resolver<T> for FnResolver<F, T>
where
    F: Fn(&str, &CommandContext) -> anyhow::Result<Option<T>>,
{
    fn resolve(&self, token: &str, ctx: &CommandContext) -> anyhow::Result<Option<T>> {
        (self.f)(token, ctx)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// One resolved argument awaiting its continuation.
#[must_use = "a resolution does nothing until a continuation consumes it"]
pub struct Resolution<'c, T> {
    outcome: ResolveOutcome<T>,
    ctx: &'c CommandContext,
}

impl<'c, T> Resolution<'c, T> {
    /// Run `on_success`, or the default failure handler.
    pub fn then<R>(self, on_success: impl FnOnce(T) -> R) -> Option<R> {
        match self.outcome {
            ResolveOutcome::Success { value, .. } => Some(on_success(value)),
            ResolveOutcome::Failure(failure) => {
                (self.ctx.services.on_argument_failure)(self.ctx, &failure);
                None
            }
        }
    }

    /// Run exactly one of `on_success` or `on_failure`.
    pub fn then_or_else<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_failure: impl FnOnce(ResolveFailure) -> R,
    ) -> R {
        match self.outcome {
            ResolveOutcome::Success { value, .. } => on_success(value),
            ResolveOutcome::Failure(failure) => on_failure(failure),
        }
    }

    /// Take the outcome for explicit matching. No handler runs.
    pub fn into_outcome(self) -> ResolveOutcome<T> {
        self.outcome
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// The argument tokens of one invocation.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    cursor: TokenCursor,
}

impl Arguments {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { cursor: TokenCursor::new(tokens) }
    }

    /// Resolve the next token with `resolver`.
    pub fn next<'c, T, R>(&mut self, ctx: &'c CommandContext, resolver: R) -> Resolution<'c, T>
    where
        R: Resolver<T>,
    {
        let outcome = match self.cursor.pop() {
            None => ResolveOutcome::Failure(ResolveFailure {
                reason: FailReason::NotTyped,
                raw: None,
                position: self.cursor.position(),
            }),
            Some((position, token)) => classify(resolver.resolve(token, ctx), token, position),
        };
        Resolution { outcome, ctx }
    }

    /// Remaining tokens joined by spaces, consuming them.
    pub fn rest(&mut self) -> Option<String> {
        let rest = self.cursor.drain();
        if rest.is_empty() { None } else { Some(rest.join(" ")) }
    }

    pub fn remaining(&self) -> &[String] {
        self.cursor.remaining()
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn into_tokens(self) -> Vec<String> {
        let mut cursor = self.cursor;
        cursor.drain()
    }
}

impl From<Vec<String>> for Arguments {
    fn from(tokens: Vec<String>) -> Self {
        Self::new(tokens)
    }
}

fn classify<T>(result: anyhow::Result<Option<T>>, token: &str, position: usize) -> ResolveOutcome<T> {
    match result {
        Ok(Some(value)) => ResolveOutcome::Success { value, raw: token.to_string() },
        Ok(None) => ResolveOutcome::Failure(ResolveFailure {
            reason: FailReason::ParsedNull,
            raw: Some(token.to_string()),
            position,
        }),
        Err(_) => ResolveOutcome::Failure(ResolveFailure {
            reason: FailReason::ParsedNotType,
            raw: Some(token.to_string()),
            position,
        }),
    }
}
