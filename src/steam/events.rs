//! Events delivered by the bridge's `/events/poll` endpoint and their
//! normalization into [`ChatEvent`]s.

use serde::Deserialize;

use crate::types::{ChatEvent, EventKind, Identity, Origin, Permissions};

use super::persist::ServerEndpoint;

/// Display name used when the bridge does not say who kicked or banned.
pub const UNKNOWN_ACTOR: &str = "someone";

/// Kind of a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEntry {
    /// Plain message.
    Chat,
    /// `/me` emote.
    Emote,
    /// Typing notifications and other entries.
    #[serde(other)]
    Other,
}

/// Room membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStateChange {
    /// Member entered the room.
    Entered,
    /// Member left.
    Left,
    /// Member's client disconnected.
    Disconnected,
    /// Member was kicked.
    Kicked,
    /// Member was banned.
    Banned,
    /// Anything else (voice, rank changes).
    #[serde(other)]
    Other,
}

/// An event from the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SteamEvent {
    /// Logon completed.
    LoggedOn,
    /// The Steam session ended.
    LoggedOff {
        /// Result code or reason, if the bridge reports one.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Fresh CM server list to persist.
    Servers {
        /// Server endpoints.
        servers: Vec<ServerEndpoint>,
    },
    /// Fresh sentry blob to persist.
    Sentry {
        /// Base64 sentry bytes.
        data: String,
    },
    /// A chat message in a room.
    ChatMsg {
        /// Room SteamID.
        room: String,
        /// Sender SteamID64.
        sender: String,
        /// Sender persona name.
        name: String,
        /// Message text.
        message: String,
        /// Message or emote.
        entry: ChatEntry,
        /// Sender chat permission bits.
        #[serde(default)]
        permissions: u32,
        /// Whether the sender is in game.
        #[serde(default)]
        in_game: bool,
    },
    /// A room membership change.
    ChatState {
        /// Room SteamID.
        room: String,
        /// What happened.
        state: ChatStateChange,
        /// Member the change applies to.
        acted_on: String,
        /// Their persona name.
        acted_on_name: String,
        /// Member who caused it (kicks and bans).
        #[serde(default)]
        acted_by: Option<String>,
        /// Their persona name.
        #[serde(default)]
        acted_by_name: Option<String>,
    },
    /// Events this version does not know.
    #[serde(other)]
    Unknown,
}

impl SteamEvent {
    /// Normalize a room event for `room`. Other rooms and non-chat events
    /// yield `None`.
    pub fn to_chat_event(&self, room: &str) -> Option<ChatEvent> {
        match self {
            Self::ChatMsg {
                room: from,
                sender,
                name,
                message,
                entry,
                permissions,
                in_game,
            } if from == room => {
                let kind = match entry {
                    ChatEntry::Chat => EventKind::Message,
                    ChatEntry::Emote => EventKind::Action,
                    ChatEntry::Other => return None,
                };
                Some(
                    ChatEvent::new(
                        Origin::Steam,
                        kind,
                        Identity::new(sender.as_str(), name.as_str()),
                        message.as_str(),
                    )
                    .with_permissions(Permissions(*permissions))
                    .with_in_game(*in_game),
                )
            }
            Self::ChatState {
                room: from,
                state,
                acted_on,
                acted_on_name,
                acted_by,
                acted_by_name,
            } if from == room => {
                let member = Identity::new(acted_on.as_str(), acted_on_name.as_str());
                let actor = || match acted_by.as_deref().filter(|id| !id.trim().is_empty()) {
                    Some(id) => Identity::new(
                        id,
                        acted_by_name
                            .as_deref()
                            .filter(|name| !name.trim().is_empty())
                            .unwrap_or(id),
                    ),
                    None => Identity::new(room, UNKNOWN_ACTOR),
                };
                let event = match state {
                    ChatStateChange::Entered => {
                        ChatEvent::new(Origin::Steam, EventKind::Join, member, "")
                    }
                    ChatStateChange::Left => ChatEvent::new(
                        Origin::Steam,
                        EventKind::Part { reason: None },
                        member,
                        "",
                    ),
                    ChatStateChange::Disconnected => ChatEvent::new(
                        Origin::Steam,
                        EventKind::Part {
                            reason: Some("disconnected".to_owned()),
                        },
                        member,
                        "",
                    ),
                    ChatStateChange::Kicked | ChatStateChange::Banned => ChatEvent::new(
                        Origin::Steam,
                        EventKind::Kick {
                            target: member,
                            reason: None,
                            ban: *state == ChatStateChange::Banned,
                        },
                        actor(),
                        "",
                    ),
                    ChatStateChange::Other => return None,
                };
                Some(event)
            }
            _ => None,
        }
    }
}
