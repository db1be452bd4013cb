//! IRC adapter.
//!
//! A plain TCP connection framed by [`tokio_util::codec::LinesCodec`].
//! The connection loop registers, joins the bridged channel, answers
//! `PING`, normalizes channel traffic into [`crate::types::ChatEvent`]s and
//! collects WHOIS/NAMES replies for operator checks and roster queries.

pub mod client;
pub mod message;
pub mod pending;

pub use client::IrcTransport;
