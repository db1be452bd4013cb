//! Core relay types shared by the adapters and the dispatcher.
//!
//! Adapters normalize their native protocol traffic into [`ChatEvent`]s;
//! the dispatcher consumes each event exactly once.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which transport an event came from (or a line is going to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The IRC channel side.
    Irc,
    /// The Steam group chat side.
    Steam,
}

impl Origin {
    /// The transport on the other side of the bridge.
    pub fn other(self) -> Self {
        match self {
            Self::Irc => Self::Steam,
            Self::Steam => Self::Irc,
        }
    }

    /// Short lowercase label used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Irc => "irc",
            Self::Steam => "steam",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant on one of the transports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Transport-level identifier: IRC nick or SteamID64.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl Identity {
    /// Build an identity from an id and a display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Build an IRC identity, where the nick is both id and name.
    pub fn irc(nick: impl Into<String>) -> Self {
        let nick = nick.into();
        Self {
            id: nick.clone(),
            name: nick,
        }
    }
}

/// A roster entry returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Who is in the room.
    pub identity: Identity,
    /// IRC channel prefix (`@`, `+`, ...) if the member holds one.
    pub rank: Option<char>,
}

/// Origin-specific capability bits attached to an event.
///
/// Steam chat permission values are carried as-is; IRC events carry
/// [`Permissions::NONE`] because IRC privileges are verified with WHOIS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub u32);

impl Permissions {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// Steam `EChatPermission.Kick`.
    pub const KICK: Self = Self(16);
    /// Steam `EChatPermission.Ban`.
    pub const BAN: Self = Self(256);

    /// Whether every bit in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

/// Kick/ban/unban.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moderation {
    /// Remove the member from the room.
    Kick,
    /// Ban and remove the member.
    Ban,
    /// Lift an existing ban.
    Unban,
}

impl Moderation {
    /// Map an in-chat trigger token to its action.
    pub fn from_trigger(token: &str) -> Option<Self> {
        match token {
            ".k" => Some(Self::Kick),
            ".kb" => Some(Self::Ban),
            ".unban" => Some(Self::Unban),
            _ => None,
        }
    }

    /// Steam capability bit needed to request this action from the Steam side.
    pub fn required_permission(self) -> Permissions {
        match self {
            Self::Kick => Permissions::KICK,
            Self::Ban | Self::Unban => Permissions::BAN,
        }
    }

    /// Lowercase verb used on the wire and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::Unban => "unban",
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A plain chat line.
    Message,
    /// An emote (`/me`).
    Action,
    /// The sender entered the channel or room.
    Join,
    /// The sender left.
    Part {
        /// Quit message or Steam state-change detail.
        reason: Option<String>,
    },
    /// `target` was removed from the room by the sender.
    Kick {
        /// Who was removed.
        target: Identity,
        /// Kick reason, if the transport supplies one.
        reason: Option<String>,
        /// Whether the removal was a ban.
        ban: bool,
    },
    /// A channel mode change performed by the sender.
    ModeChange {
        /// `true` for `+`, `false` for `-`.
        adding: bool,
        /// Mode character.
        mode: char,
        /// Mode argument (ban mask, nick, ...).
        argument: Option<String>,
    },
    /// The transport session itself was lost.
    Disconnect {
        /// Human-readable reason, if available.
        reason: Option<String>,
    },
}

/// A normalized inbound event from either transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Which transport produced the event.
    pub origin: Origin,
    /// What happened.
    pub kind: EventKind,
    /// Who did it.
    pub sender: Identity,
    /// Line text; empty for non-message events.
    pub body: String,
    /// Sender capability bits (Steam only).
    pub permissions: Permissions,
    /// Whether the sender is currently in game (Steam only).
    pub in_game: bool,
    /// When the adapter received the event.
    pub received_at: DateTime<Utc>,
}

impl ChatEvent {
    /// Build an event with no permission bits, stamped now.
    pub fn new(origin: Origin, kind: EventKind, sender: Identity, body: impl Into<String>) -> Self {
        Self {
            origin,
            kind,
            sender,
            body: body.into(),
            permissions: Permissions::NONE,
            in_game: false,
            received_at: Utc::now(),
        }
    }

    /// Attach Steam permission bits.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Mark the sender as in game.
    pub fn with_in_game(mut self, in_game: bool) -> Self {
        self.in_game = in_game;
        self
    }
}

/// Connection state of a transport, as reported by its adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// The underlying connection is up.
    pub connected: bool,
    /// The session is logged on and may send.
    pub authenticated: bool,
}
