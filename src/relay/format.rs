//! Side-specific line templates for mirrored traffic.

use crate::config::FormatConfig;
use crate::types::{ChatEvent, EventKind, Identity, Origin};

/// Steam community profile URL prefix.
pub const PROFILE_URL: &str = "http://steamcommunity.com/profiles/";

/// Substitute `%s` placeholders in order with `args`.
///
/// Placeholders without a matching argument are left empty; surplus
/// arguments are ignored.
pub fn render(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len().saturating_add(32));
    let mut rest = template;
    let mut args = args.iter();
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        rest = &rest[pos.saturating_add(2)..];
    }
    out.push_str(rest);
    out
}

/// `name (http://steamcommunity.com/profiles/<id>)`.
pub fn steam_profile(identity: &Identity) -> String {
    format!("{} ({PROFILE_URL}{})", identity.name, identity.id)
}

/// Renders mirrored lines for both directions.
#[derive(Debug, Clone)]
pub struct LineFormatter {
    formats: FormatConfig,
    irc_channel: String,
}

impl LineFormatter {
    /// Build a formatter for the bridged IRC channel.
    pub fn new(formats: FormatConfig, irc_channel: impl Into<String>) -> Self {
        Self {
            formats,
            irc_channel: irc_channel.into(),
        }
    }

    /// Chat line or emote, rendered for the opposite side.
    pub fn chat(&self, event: &ChatEvent) -> Option<String> {
        let emote = match event.kind {
            EventKind::Message => false,
            EventKind::Action => true,
            _ => return None,
        };
        let line = match event.origin {
            Origin::Irc if emote => format!("{} {}", event.sender.name, event.body),
            Origin::Irc => format!("<{}> {}", event.sender.name, event.body),
            Origin::Steam => {
                let template = match (emote, event.in_game) {
                    (false, false) => &self.formats.msg_format,
                    (false, true) => &self.formats.msg_format_game,
                    (true, false) => &self.formats.emote_format,
                    (true, true) => &self.formats.emote_format_game,
                };
                render(template, &[&event.sender.name, &event.body])
            }
        };
        Some(line)
    }

    /// Kick or ban notice.
    pub fn kick(&self, event: &ChatEvent, target: &Identity, reason: Option<&str>, ban: bool) -> String {
        match event.origin {
            Origin::Irc => format!(
                "{} has kicked {} from {} ({})",
                event.sender.name,
                target.name,
                self.irc_channel,
                reason.unwrap_or_default()
            ),
            Origin::Steam => {
                let verb = if ban { "banned" } else { "kicked" };
                format!(
                    "{} was {verb} by {}.",
                    steam_profile(target),
                    event.sender.name
                )
            }
        }
    }

    /// Ban-list change notice (IRC `+b`/`-b`).
    pub fn ban_mode(&self, event: &ChatEvent, adding: bool, argument: &str) -> String {
        if adding {
            format!("{} sets ban on {argument}", event.sender.name)
        } else {
            format!("{} removes ban on {argument}", event.sender.name)
        }
    }

    /// Join notice.
    pub fn join(&self, event: &ChatEvent) -> String {
        match event.origin {
            Origin::Irc => format!("{} has joined {}", event.sender.name, self.irc_channel),
            Origin::Steam => format!("{} entered chat.", steam_profile(&event.sender)),
        }
    }

    /// Part/quit notice.
    pub fn part(&self, event: &ChatEvent, reason: Option<&str>) -> String {
        match (event.origin, reason) {
            (Origin::Irc, Some(reason)) => format!("{} has quit ({reason})", event.sender.name),
            (Origin::Irc, None) => format!("{} has left {}", event.sender.name, self.irc_channel),
            (Origin::Steam, Some("disconnected")) => {
                format!("{} disconnected.", steam_profile(&event.sender))
            }
            (Origin::Steam, _) => format!("{} left chat.", steam_profile(&event.sender)),
        }
    }
}
