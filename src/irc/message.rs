//! IRC line parsing and the outbound commands the bot sends.

/// A parsed IRC line (`[@tags] [:prefix] COMMAND params... [:trailing]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Source (`nick!user@host` or server name).
    pub prefix: Option<String>,
    /// Command or three-digit numeric, uppercased.
    pub command: String,
    /// Parameters, trailing included as the last element.
    pub params: Vec<String>,
}

impl Message {
    /// Parse one line without its terminator. Returns `None` for blank or
    /// prefix-only lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // IRCv3 message tags are not used.
        if rest.starts_with('@') {
            rest = rest.split_once(' ').map(|(_, r)| r)?;
        }

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, r) = stripped.split_once(' ')?;
            rest = r;
            Some(prefix.to_owned())
        } else {
            None
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_owned).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_owned());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of the prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }

    /// Parameter `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Last parameter.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

/// One flag of a MODE change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFlag {
    /// `+` or `-`.
    pub adding: bool,
    /// Mode letter.
    pub mode: char,
    /// Argument consumed by the flag, if it takes one.
    pub argument: Option<String>,
}

/// Whether a channel mode letter consumes an argument.
fn takes_argument(mode: char, adding: bool) -> bool {
    match mode {
        'b' | 'e' | 'I' | 'k' | 'o' | 'v' | 'h' | 'q' | 'a' => true,
        'l' => adding,
        _ => false,
    }
}

/// Split `+bo-v mask nick nick2` into individual flags.
pub fn parse_modes(modes: &str, args: &[String]) -> Vec<ModeFlag> {
    let mut flags = Vec::new();
    let mut args = args.iter();
    let mut adding = true;
    for ch in modes.chars() {
        match ch {
            '+' => adding = true,
            '-' => adding = false,
            mode => {
                let argument = if takes_argument(mode, adding) {
                    args.next().cloned()
                } else {
                    None
                };
                flags.push(ModeFlag {
                    adding,
                    mode,
                    argument,
                });
            }
        }
    }
    flags
}

/// Body of a CTCP `ACTION`, if `text` is one.
pub fn ctcp_action(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('\u{1}')?;
    let inner = inner.strip_suffix('\u{1}').unwrap_or(inner);
    inner.strip_prefix("ACTION ")
}

/// Whether `text` is any CTCP request.
pub fn is_ctcp(text: &str) -> bool {
    text.starts_with('\u{1}')
}

/// Split a NAMES entry into its rank prefix and nick.
pub fn split_rank(entry: &str) -> (Option<char>, &str) {
    match entry.chars().next() {
        Some(rank @ ('~' | '&' | '@' | '%' | '+')) => (Some(rank), &entry[rank.len_utf8()..]),
        _ => (None, entry),
    }
}

/// Strip characters that would end or split an IRC line.
fn clean(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\r' | '\n' | '\0')).collect()
}

/// `NICK <nick>`.
pub fn nick(nick: &str) -> String {
    format!("NICK {}", clean(nick))
}

/// `USER <user> 0 * :<realname>`.
pub fn user(user: &str, realname: &str) -> String {
    format!("USER {} 0 * :{}", clean(user), clean(realname))
}

/// `JOIN <channel>`.
pub fn join(channel: &str) -> String {
    format!("JOIN {}", clean(channel))
}

/// `PONG :<token>`.
pub fn pong(token: &str) -> String {
    format!("PONG :{}", clean(token))
}

/// `PRIVMSG <target> :<text>`.
pub fn privmsg(target: &str, text: &str) -> String {
    format!("PRIVMSG {} :{}", clean(target), clean(text))
}

/// `NOTICE <target> :<text>`.
pub fn notice(target: &str, text: &str) -> String {
    format!("NOTICE {} :{}", clean(target), clean(text))
}

/// `KICK <channel> <nick> :<reason>`.
pub fn kick(channel: &str, nick: &str, reason: &str) -> String {
    format!("KICK {} {} :{}", clean(channel), clean(nick), clean(reason))
}

/// `MODE <channel> <+b|-b> <mask>`.
pub fn ban(channel: &str, adding: bool, mask: &str) -> String {
    let flag = if adding { "+b" } else { "-b" };
    format!("MODE {} {flag} {}", clean(channel), clean(mask))
}

/// `NAMES <channel>`.
pub fn names(channel: &str) -> String {
    format!("NAMES {}", clean(channel))
}

/// `WHOIS <nick>`.
pub fn whois(nick: &str) -> String {
    format!("WHOIS {}", clean(nick))
}

/// `QUIT :<reason>`.
pub fn quit(reason: &str) -> String {
    format!("QUIT :{}", clean(reason))
}
