//! Transport adapter contract shared by the IRC and Steam sides.
//!
//! Each adapter is spawned with the dispatcher's inbound channel (its
//! subscription stream) and then exposed to the dispatcher as an
//! `Arc<dyn ChatTransport>`. Line sends are non-blocking pushes into the
//! adapter's writer task, so relay order is the order of calls.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::types::{Identity, Member, Moderation, Origin, SessionState};

/// Errors surfaced by a transport adapter.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The session is not logged on yet.
    #[error("{0} session is not authenticated")]
    NotAuthenticated(Origin),

    /// The adapter's writer task is gone.
    #[error("{0} writer channel closed")]
    Closed(Origin),

    /// The writer channel is full.
    #[error("{0} writer channel full")]
    Backpressure(Origin),

    /// HTTP request to the Steam bridge failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end answered with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// A reply did not arrive in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The peer sent something unusable or internal state is broken.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Uniform interface the dispatcher uses for both transports.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Which side this adapter serves.
    fn origin(&self) -> Origin;

    /// Current connection state.
    fn session(&self) -> SessionState;

    /// Queue a line for `target` (channel or chat room).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the writer is closed or saturated, or
    /// the session cannot send yet.
    fn send_line(&self, target: &str, text: &str) -> Result<(), TransportError>;

    /// Queue a private line for a single participant.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ChatTransport::send_line`].
    fn send_private(&self, to: &Identity, text: &str) -> Result<(), TransportError>;

    /// Fetch the live member list of `target`.
    async fn query_roster(&self, target: &str) -> Result<Vec<Member>, TransportError>;

    /// Ask the transport whether `identity` holds operator status in the
    /// bridged channel.
    async fn verify_operator(&self, identity: &Identity) -> Result<bool, TransportError>;

    /// Apply a moderation primitive to `identity` in `target`.
    async fn moderate(
        &self,
        action: Moderation,
        target: &str,
        identity: &Identity,
        requested_by: &str,
    ) -> Result<(), TransportError>;
}

/// Lock-free session flags owned by an adapter and read by the dispatcher.
#[derive(Debug, Default)]
pub struct SessionFlags {
    connected: AtomicBool,
    authenticated: AtomicBool,
}

impl SessionFlags {
    /// Snapshot both flags.
    pub fn snapshot(&self) -> SessionState {
        SessionState {
            connected: self.connected.load(Ordering::Acquire),
            authenticated: self.authenticated.load(Ordering::Acquire),
        }
    }

    /// The underlying connection came up.
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// The session logged on.
    pub fn mark_authenticated(&self) {
        self.connected.store(true, Ordering::Release);
        self.authenticated.store(true, Ordering::Release);
    }

    /// The connection dropped; both flags clear.
    pub fn mark_disconnected(&self) {
        self.authenticated.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Release);
    }
}
