//! steamrelay: bridges an IRC channel and a Steam group chat room.
//!
//! Both sides feed [`relay::Inbound`] messages into one dispatcher actor,
//! which mirrors chat according to the verbosity level, holds lines for
//! Steam until it logs on, checks operator status before moderation, and
//! runs chat commands from [`commands`].
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod transport;
pub mod types;

pub mod irc;
pub mod steam;

pub mod commands;
pub mod relay;

pub mod bot;
