//! Steam adapter: HTTP bridge client, event types, persisted logon state
//! and the transport the dispatcher talks to.
//!
//! Steam has no native Rust client, so all Steam traffic goes through a
//! Steam-client sidecar ("bridge") speaking JSON over HTTP, with a
//! long-poll `/events/poll` endpoint for inbound events.

pub mod client;
pub mod events;
pub mod persist;
pub mod transport;

pub use client::BridgeClient;
pub use events::SteamEvent;
pub use persist::SteamState;
pub use transport::{SteamLogin, SteamTransport};

use crate::transport::TransportError;

/// Errors from the Steam adapter.
#[derive(Debug, thiserror::Error)]
pub enum SteamError {
    /// HTTP request to the bridge failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with an error.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Reading or writing persisted state failed.
    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted or received JSON was invalid.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Sentry data was not valid base64.
    #[error("invalid sentry encoding: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl From<SteamError> for TransportError {
    fn from(e: SteamError) -> Self {
        match e {
            SteamError::Http(e) => Self::Http(e),
            SteamError::Io(e) => Self::Io(e),
            other => Self::Remote(other.to_string()),
        }
    }
}
