//! Relay core: queue, verbosity, operator checks, classification and the
//! dispatcher actor that ties them together.
//!
//! Adapters and spawned helper tasks talk to the [`dispatcher::Dispatcher`]
//! only through [`Inbound`] messages on a single mpsc channel; the
//! dispatcher owns all mutable relay state.

pub mod classify;
pub mod dispatcher;
pub mod format;
pub mod permission;
pub mod queue;
pub mod verbosity;

pub use classify::{classify, Action, Classification, Rules};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use permission::{CheckId, PermissionVerdict, Verdict};
pub use queue::{OverflowPolicy, RelayQueue};
pub use verbosity::Verbosity;

use crate::commands::CommandOutput;
use crate::types::{ChatEvent, Origin};

/// Queue contract violations. Never fatal; the dispatcher logs and moves on.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelayError {
    /// The pending queue is full.
    #[error("relay queue full ({capacity} lines)")]
    QueueOverflow {
        /// Configured capacity.
        capacity: usize,
    },

    /// The queue was already flushed for this session.
    #[error("relay queue already drained for this session")]
    QueueDrained,
}

/// Everything the dispatcher reacts to.
#[derive(Debug)]
pub enum Inbound {
    /// A normalized event from an adapter.
    Chat(Box<ChatEvent>),
    /// A transport finished logging on.
    Authenticated(Origin),
    /// An operator lookup finished.
    PermissionResolved(PermissionVerdict),
    /// A command handler produced output.
    CommandReply(CommandOutput),
}

impl From<ChatEvent> for Inbound {
    fn from(event: ChatEvent) -> Self {
        Self::Chat(Box::new(event))
    }
}
