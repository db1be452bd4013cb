//! Pure classification of inbound events.
//!
//! [`classify`] decides what an event means without touching any transport
//! or relay state. The dispatcher then carries out the result. Mirroring is
//! decided independently of the action: a `.k bob` line from IRC is both
//! mirrored (verbosity permitting) and turned into an operator check.

use std::sync::LazyLock;

use regex::Regex;

use crate::commands::{Invocation, MAX_ARGS};
use crate::types::{ChatEvent, EventKind, Identity, Moderation, Origin, Permissions};

use super::format::LineFormatter;
use super::permission::PrivilegedAction;
use super::verbosity::{Verbosity, MAX_VERBOSITY};

/// Token that asks for the other side's member list.
pub const USERLIST_TOKEN: &str = ".userlist";

/// Token that changes the verbosity level.
pub const VERBOSITY_TOKEN: &str = ".verbosity";

/// Bare words that look like host names (`example.com`, `my-site.org`).
static HOSTLIKE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^-][0-9A-Za-z-]+\.[A-Za-z]+$").ok());

/// Static classification inputs.
#[derive(Debug, Clone)]
pub struct Rules {
    /// Prefix that relays the rest of a line verbatim.
    pub echo_prefix: String,
    /// Mirror templates.
    pub formatter: LineFormatter,
}

/// A line to send to the other side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    /// Destination transport.
    pub to: Origin,
    /// Rendered line.
    pub line: String,
}

/// What the dispatcher should do beyond mirroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing.
    None,
    /// The event is unusable and is dropped.
    Malformed(&'static str),
    /// A privileged request from a sender without the needed capability.
    Denied {
        /// Who asked.
        requester: Identity,
        /// Trigger token.
        token: String,
    },
    /// Verify the requester's operator status, then run `request`.
    CheckOperator {
        /// Transport to verify against.
        origin: Origin,
        /// Who asked.
        requester: Identity,
        /// Deferred action.
        request: PrivilegedAction,
    },
    /// Issue an IRC moderation primitive on behalf of a Steam moderator.
    ModerateIrc {
        /// Kick, ban or unban.
        action: Moderation,
        /// IRC nick to act on.
        nick: String,
        /// Display name of the Steam moderator.
        requested_by: String,
    },
    /// Change the verbosity level (already authorized).
    SetVerbosity(u8),
    /// Reply privately with the other side's member list.
    Roster {
        /// Side the request came from.
        origin: Origin,
        /// Who gets the reply.
        requester: Identity,
    },
    /// Hand the line to the command registry.
    Command {
        /// Side the request came from.
        origin: Origin,
        /// Who asked.
        requester: Identity,
        /// Token plus arguments.
        invocation: Invocation,
    },
    /// The transport lost its session.
    SessionLost {
        /// Which transport.
        origin: Origin,
        /// Reason reported by the adapter.
        reason: Option<String>,
    },
}

/// Result of classifying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Line to mirror, if any.
    pub mirror: Option<Mirror>,
    /// What to do next.
    pub action: Action,
    /// `http://` links to post in the Steam room.
    pub links: Vec<String>,
}

impl Classification {
    fn only(action: Action) -> Self {
        Self {
            mirror: None,
            action,
            links: Vec::new(),
        }
    }
}

/// Classify `event` under the given verbosity and rules.
pub fn classify(event: &ChatEvent, verbosity: Verbosity, rules: &Rules) -> Classification {
    if event.sender.id.trim().is_empty() && !matches!(event.kind, EventKind::Disconnect { .. }) {
        return Classification::only(Action::Malformed("missing sender"));
    }

    match &event.kind {
        EventKind::Message | EventKind::Action if event.body.trim().is_empty() => {
            Classification::only(Action::Malformed("empty body"))
        }
        EventKind::Message => classify_message(event, verbosity, rules),
        EventKind::Action => Classification {
            mirror: gated(verbosity.mirrors_chat(), event, rules.formatter.chat(event)),
            action: Action::None,
            links: Vec::new(),
        },
        EventKind::Join => Classification {
            mirror: gated(
                verbosity.mirrors_presence(),
                event,
                Some(rules.formatter.join(event)),
            ),
            action: Action::None,
            links: Vec::new(),
        },
        EventKind::Part { reason } => Classification {
            mirror: gated(
                verbosity.mirrors_presence(),
                event,
                Some(rules.formatter.part(event, reason.as_deref())),
            ),
            action: Action::None,
            links: Vec::new(),
        },
        EventKind::Kick {
            target,
            reason,
            ban,
        } => Classification {
            mirror: gated(
                verbosity.mirrors_chat(),
                event,
                Some(rules.formatter.kick(event, target, reason.as_deref(), *ban)),
            ),
            action: Action::None,
            links: Vec::new(),
        },
        EventKind::ModeChange {
            adding,
            mode: 'b',
            argument: Some(argument),
        } => Classification {
            mirror: gated(
                verbosity.mirrors_chat(),
                event,
                Some(rules.formatter.ban_mode(event, *adding, argument)),
            ),
            action: Action::None,
            links: Vec::new(),
        },
        EventKind::ModeChange { .. } => Classification::only(Action::None),
        EventKind::Disconnect { reason } => Classification::only(Action::SessionLost {
            origin: event.origin,
            reason: reason.clone(),
        }),
    }
}

fn gated(allowed: bool, event: &ChatEvent, line: Option<String>) -> Option<Mirror> {
    if !allowed {
        return None;
    }
    line.map(|line| Mirror {
        to: event.origin.other(),
        line,
    })
}

fn classify_message(event: &ChatEvent, verbosity: Verbosity, rules: &Rules) -> Classification {
    let body = event.body.trim();
    let (token, rest) = split_token(body);

    if token == rules.echo_prefix {
        let mirror = (!rest.is_empty()).then(|| Mirror {
            to: event.origin.other(),
            line: rest.to_owned(),
        });
        return Classification {
            mirror,
            action: Action::None,
            links: Vec::new(),
        };
    }

    let mirror = gated(verbosity.mirrors_chat(), event, rules.formatter.chat(event));
    let mut links = Vec::new();

    let action = if let Some(moderation) = Moderation::from_trigger(token) {
        moderation_action(event, moderation, token, rest)
    } else if token == USERLIST_TOKEN {
        Action::Roster {
            origin: event.origin,
            requester: event.sender.clone(),
        }
    } else if token == VERBOSITY_TOKEN {
        verbosity_action(event, token, rest)
    } else if verbosity.runs_commands() {
        if event.origin == Origin::Steam {
            links = linkify(body);
        }
        Action::Command {
            origin: event.origin,
            requester: event.sender.clone(),
            invocation: tokenize(token, rest),
        }
    } else {
        Action::None
    };

    Classification {
        mirror,
        action,
        links,
    }
}

fn moderation_action(event: &ChatEvent, moderation: Moderation, token: &str, rest: &str) -> Action {
    match event.origin {
        // Display names may contain spaces, so the target is the whole rest.
        Origin::Irc if rest.is_empty() => Action::None,
        Origin::Irc => Action::CheckOperator {
            origin: Origin::Irc,
            requester: event.sender.clone(),
            request: PrivilegedAction::Moderate {
                action: moderation,
                target_name: rest.to_owned(),
            },
        },
        Origin::Steam => {
            if !event
                .permissions
                .contains(moderation.required_permission())
            {
                return Action::Denied {
                    requester: event.sender.clone(),
                    token: token.to_owned(),
                };
            }
            match rest.split_whitespace().next() {
                Some(nick) => Action::ModerateIrc {
                    action: moderation,
                    nick: nick.to_owned(),
                    requested_by: event.sender.name.clone(),
                },
                None => Action::None,
            }
        }
    }
}

fn verbosity_action(event: &ChatEvent, token: &str, rest: &str) -> Action {
    let Some(level) = rest
        .split_whitespace()
        .next()
        .and_then(|arg| arg.parse::<u8>().ok())
        .filter(|level| *level <= MAX_VERBOSITY)
    else {
        return Action::None;
    };

    match event.origin {
        Origin::Irc => Action::CheckOperator {
            origin: Origin::Irc,
            requester: event.sender.clone(),
            request: PrivilegedAction::SetVerbosity(level),
        },
        Origin::Steam if event.permissions.contains(Permissions::KICK) => {
            Action::SetVerbosity(level)
        }
        Origin::Steam => Action::Denied {
            requester: event.sender.clone(),
            token: token.to_owned(),
        },
    }
}

/// Split off the first whitespace-delimited word.
fn split_token(body: &str) -> (&str, &str) {
    match body.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim()),
        None => (body, ""),
    }
}

/// Build an invocation, keeping at most [`MAX_ARGS`] arguments.
pub fn tokenize(token: &str, rest: &str) -> Invocation {
    Invocation {
        token: token.to_owned(),
        args: rest
            .split_whitespace()
            .take(MAX_ARGS)
            .map(str::to_owned)
            .collect(),
    }
}

/// `http://`-prefixed links for every bare host-like word in `body`.
pub fn linkify(body: &str) -> Vec<String> {
    let Some(pattern) = HOSTLIKE.as_ref() else {
        return Vec::new();
    };
    body.split_whitespace()
        .filter(|word| {
            !word.starts_with("http://") && !word.starts_with("https://") && !word.starts_with("www")
        })
        .filter(|word| pattern.is_match(word))
        .map(|word| format!("http://{word}"))
        .collect()
}
