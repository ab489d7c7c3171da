//! Status types returned by the bus's publish and subscribe paths.
//!
//! These are modeled as dedicated result enums rather than `Result<T, E>`
//! because every alternative is an expected, commonly handled outcome, not
//! an exceptional condition — the same choice the original engine makes
//! (`PublishResult::{SUCCESS, TIMEOUT, STOPPED}`).

use std::fmt;

/// Outcome of a call to [`super::EventBus::publish`] or
/// [`super::EventBus::try_publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The event was constructed in its slot and `published` was
    /// release-stored with this sequence number.
    Published(i64),
    /// `try_publish`'s deadline elapsed before a slot became free; a
    /// placeholder was written at this sequence number instead.
    Timeout(i64),
    /// The bus is stopped; no sequence was assigned and nothing was
    /// written.
    Stopped,
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Published(seq) => write!(f, "published at seq {seq}"),
            PublishOutcome::Timeout(seq) => write!(f, "timed out, placeholder at seq {seq}"),
            PublishOutcome::Stopped => write!(f, "bus is stopped"),
        }
    }
}

/// Why [`super::EventBus::subscribe`] refused a new consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubscribeError {
    /// `subscribe` was called after `start()`; subscription discipline
    /// requires every consumer to be registered before the bus starts.
    AlreadyStarted,
    /// The bus's compile-time consumer ceiling has been reached.
    TooManyConsumers,
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::AlreadyStarted => {
                write!(f, "cannot subscribe after the bus has started")
            }
            SubscribeError::TooManyConsumers => {
                write!(f, "consumer count exceeds the bus's compile-time ceiling")
            }
        }
    }
}

impl std::error::Error for SubscribeError {}
