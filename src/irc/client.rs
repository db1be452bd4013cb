//! IRC transport: connection loop, event normalization and the
//! [`ChatTransport`] implementation.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::IrcConfig;
use crate::relay::Inbound;
use crate::transport::{ChatTransport, SessionFlags, TransportError};
use crate::types::{ChatEvent, EventKind, Identity, Member, Moderation, Origin, SessionState};

use super::message::{self, parse_modes, Message};
use super::pending::PendingQueries;

/// Initial reconnect backoff, in milliseconds.
const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum reconnect backoff, in milliseconds.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Outbound lines buffered for the writer.
const OUTBOUND_CAPACITY: usize = 256;

/// Longest inbound line accepted.
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// How long WHOIS and NAMES replies may take.
const REPLY_TIMEOUT_SECS: u64 = 10;

/// What the connection loop should do after reacting to a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write a raw line to the server.
    Send(String),
    /// Hand an event to the dispatcher.
    Emit(ChatEvent),
    /// Registration completed.
    Registered,
}

/// Per-connection protocol state.
#[derive(Debug, Clone)]
pub struct Session {
    nick: String,
    channel: String,
    registered: bool,
}

impl Session {
    /// Fresh state for a new connection.
    pub fn new(nick: &str, channel: &str) -> Self {
        Self {
            nick: nick.to_owned(),
            channel: channel.to_owned(),
            registered: false,
        }
    }

    /// Nick currently in use.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Whether `001` has been received.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    fn is_self(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.nick)
    }

    fn is_channel(&self, target: Option<&str>) -> bool {
        target.is_some_and(|t| t.eq_ignore_ascii_case(&self.channel))
    }

    /// React to one server line.
    pub fn react(&mut self, msg: &Message, pending: &mut PendingQueries) -> Vec<Effect> {
        match msg.command.as_str() {
            "PING" => vec![Effect::Send(message::pong(msg.trailing().unwrap_or_default()))],
            "001" => {
                if let Some(nick) = msg.param(0) {
                    nick.clone_into(&mut self.nick);
                }
                self.registered = true;
                vec![Effect::Registered, Effect::Send(message::join(&self.channel))]
            }
            // ERR_NICKNAMEINUSE
            "433" if !self.registered => {
                self.nick.push('_');
                vec![Effect::Send(message::nick(&self.nick))]
            }
            "PRIVMSG" => self.on_privmsg(msg),
            "JOIN" | "PART" | "QUIT" | "KICK" | "MODE" => self.on_membership(msg),
            // RPL_WHOISCHANNELS
            "319" => {
                if let (Some(nick), Some(channels)) = (msg.param(1), msg.param(2)) {
                    pending.whois_channels(nick, channels);
                }
                Vec::new()
            }
            // RPL_ENDOFWHOIS
            "318" => {
                if let Some(nick) = msg.param(1) {
                    pending.finish_whois(nick);
                }
                Vec::new()
            }
            // ERR_NOSUCHNICK
            "401" => {
                if let Some(nick) = msg.param(1) {
                    pending.no_such_nick(nick);
                }
                Vec::new()
            }
            // RPL_NAMREPLY
            "353" => {
                if let (Some(channel), Some(names)) = (msg.param(2), msg.param(3)) {
                    pending.names_reply(channel, names);
                }
                Vec::new()
            }
            // RPL_ENDOFNAMES
            "366" => {
                if let Some(channel) = msg.param(1) {
                    pending.finish_names(channel);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_privmsg(&self, msg: &Message) -> Vec<Effect> {
        let (Some(nick), Some(text)) = (msg.nick(), msg.param(1)) else {
            return Vec::new();
        };
        if self.is_self(nick) || !self.is_channel(msg.param(0)) {
            return Vec::new();
        }
        let sender = Identity::irc(nick);
        let event = if let Some(action) = message::ctcp_action(text) {
            ChatEvent::new(Origin::Irc, EventKind::Action, sender, action)
        } else if message::is_ctcp(text) {
            return Vec::new();
        } else {
            ChatEvent::new(Origin::Irc, EventKind::Message, sender, text)
        };
        vec![Effect::Emit(event)]
    }

    fn on_membership(&self, msg: &Message) -> Vec<Effect> {
        let Some(nick) = msg.nick() else {
            return Vec::new();
        };
        let sender = Identity::irc(nick);
        match msg.command.as_str() {
            "JOIN" if self.is_channel(msg.param(0)) => {
                if self.is_self(nick) {
                    info!(channel = %self.channel, "joined irc channel");
                    return Vec::new();
                }
                vec![Effect::Emit(ChatEvent::new(Origin::Irc, EventKind::Join, sender, ""))]
            }
            "PART" if self.is_channel(msg.param(0)) && !self.is_self(nick) => {
                vec![Effect::Emit(ChatEvent::new(
                    Origin::Irc,
                    EventKind::Part { reason: None },
                    sender,
                    "",
                ))]
            }
            "QUIT" if !self.is_self(nick) => vec![Effect::Emit(ChatEvent::new(
                Origin::Irc,
                EventKind::Part {
                    reason: Some(msg.param(0).unwrap_or_default().to_owned()),
                },
                sender,
                "",
            ))],
            "KICK" if self.is_channel(msg.param(0)) => {
                let Some(target) = msg.param(1) else {
                    return Vec::new();
                };
                let mut effects = vec![Effect::Emit(ChatEvent::new(
                    Origin::Irc,
                    EventKind::Kick {
                        target: Identity::irc(target),
                        reason: msg.param(2).map(str::to_owned),
                        ban: false,
                    },
                    sender,
                    "",
                ))];
                if self.is_self(target) {
                    warn!(by = %nick, "kicked from irc channel, rejoining");
                    effects.push(Effect::Send(message::join(&self.channel)));
                }
                effects
            }
            "MODE" if self.is_channel(msg.param(0)) => {
                let Some(modes) = msg.param(1) else {
                    return Vec::new();
                };
                let args = msg.params.get(2..).unwrap_or_default();
                parse_modes(modes, args)
                    .into_iter()
                    .map(|flag| {
                        Effect::Emit(ChatEvent::new(
                            Origin::Irc,
                            EventKind::ModeChange {
                                adding: flag.adding,
                                mode: flag.mode,
                                argument: flag.argument,
                            },
                            sender.clone(),
                            "",
                        ))
                    })
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    flags: SessionFlags,
    pending: Mutex<PendingQueries>,
}

impl Shared {
    fn pending(&self) -> Result<MutexGuard<'_, PendingQueries>, TransportError> {
        self.pending
            .lock()
            .map_err(|e| TransportError::Protocol(format!("pending query lock poisoned: {e}")))
    }
}

/// How a connection ended.
enum Outcome {
    /// The server or network closed the connection.
    Closed,
    /// The dispatcher or transport handle is gone.
    Shutdown,
}

/// IRC side of the bridge.
#[derive(Debug)]
pub struct IrcTransport {
    channel: String,
    outbound: mpsc::Sender<String>,
    shared: Arc<Shared>,
    reply_timeout: Duration,
}

impl IrcTransport {
    /// Start the connection loop and return the transport handle.
    ///
    /// Events are sent to `events`; the loop reconnects with exponential
    /// backoff until either side of the bridge goes away.
    pub fn spawn(config: IrcConfig, events: mpsc::Sender<Inbound>) -> (Arc<Self>, JoinHandle<()>) {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let shared = Arc::new(Shared::default());
        let transport = Arc::new(Self {
            channel: config.channel.clone(),
            outbound,
            shared: Arc::clone(&shared),
            reply_timeout: Duration::from_secs(REPLY_TIMEOUT_SECS),
        });
        let handle = tokio::spawn(run(config, shared, outbound_rx, events));
        (transport, handle)
    }

    fn push(&self, line: String) -> Result<(), TransportError> {
        self.outbound.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure(Origin::Irc),
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed(Origin::Irc),
        })
    }

    fn require_session(&self) -> Result<(), TransportError> {
        if self.shared.flags.snapshot().authenticated {
            Ok(())
        } else {
            Err(TransportError::NotAuthenticated(Origin::Irc))
        }
    }

    async fn whois(&self, nick: &str) -> Result<Option<Vec<String>>, TransportError> {
        self.require_session()?;
        let (tx, rx) = oneshot::channel();
        let first = self.shared.pending()?.add_whois(nick, tx);
        if first {
            self.push(message::whois(nick))?;
        }
        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(channels)) => Ok(channels),
            Ok(Err(_)) => Err(TransportError::Closed(Origin::Irc)),
            Err(_) => Err(TransportError::Timeout("WHOIS")),
        }
    }
}

#[async_trait]
impl ChatTransport for IrcTransport {
    fn origin(&self) -> Origin {
        Origin::Irc
    }

    fn session(&self) -> SessionState {
        self.shared.flags.snapshot()
    }

    fn send_line(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.require_session()?;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            self.push(message::privmsg(target, line))?;
        }
        Ok(())
    }

    fn send_private(&self, to: &Identity, text: &str) -> Result<(), TransportError> {
        self.require_session()?;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            self.push(message::notice(&to.id, line))?;
        }
        Ok(())
    }

    async fn query_roster(&self, target: &str) -> Result<Vec<Member>, TransportError> {
        self.require_session()?;
        let (tx, rx) = oneshot::channel();
        let first = self.shared.pending()?.add_names(target, tx);
        if first {
            self.push(message::names(target))?;
        }
        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(members)) => Ok(members),
            Ok(Err(_)) => Err(TransportError::Closed(Origin::Irc)),
            Err(_) => Err(TransportError::Timeout("NAMES")),
        }
    }

    async fn verify_operator(&self, identity: &Identity) -> Result<bool, TransportError> {
        let wanted = format!("@{}", self.channel);
        let channels = self.whois(&identity.id).await?;
        Ok(channels.is_some_and(|list| list.iter().any(|c| c.eq_ignore_ascii_case(&wanted))))
    }

    async fn moderate(
        &self,
        action: Moderation,
        target: &str,
        identity: &Identity,
        requested_by: &str,
    ) -> Result<(), TransportError> {
        self.require_session()?;
        let reason = format!("requested by {requested_by}");
        match action {
            Moderation::Kick => self.push(message::kick(target, &identity.id, &reason)),
            Moderation::Ban => {
                self.push(message::ban(target, true, &identity.id))?;
                self.push(message::kick(target, &identity.id, &reason))
            }
            Moderation::Unban => self.push(message::ban(target, false, &identity.id)),
        }
    }
}

/// Reconnect loop.
async fn run(
    config: IrcConfig,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::Receiver<String>,
    events: mpsc::Sender<Inbound>,
) {
    let mut backoff_ms: u64 = INITIAL_BACKOFF_MS;

    loop {
        let mut registered = false;
        let outcome = connect_once(&config, &shared, &mut outbound_rx, &events, &mut registered).await;

        shared.flags.mark_disconnected();
        if let Ok(mut pending) = shared.pending() {
            pending.clear();
        }
        // Lines queued for the dead connection are stale.
        while outbound_rx.try_recv().is_ok() {}

        let reason = match outcome {
            Ok(Outcome::Shutdown) => {
                info!("irc adapter stopping");
                return;
            }
            Ok(Outcome::Closed) => "connection closed".to_owned(),
            Err(e) => e.to_string(),
        };

        let event = ChatEvent::new(
            Origin::Irc,
            EventKind::Disconnect {
                reason: Some(reason.clone()),
            },
            Identity::irc(config.nick.as_str()),
            "",
        );
        if events.send(event.into()).await.is_err() {
            return;
        }

        if registered {
            backoff_ms = INITIAL_BACKOFF_MS;
        }
        warn!(%reason, backoff_ms, "irc connection lost, reconnecting");
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
    }
}

fn codec_error(e: LinesCodecError) -> TransportError {
    match e {
        LinesCodecError::Io(e) => TransportError::Io(e),
        LinesCodecError::MaxLineLengthExceeded => {
            TransportError::Protocol("line too long".to_owned())
        }
    }
}

async fn connect_once(
    config: &IrcConfig,
    shared: &Shared,
    outbound_rx: &mut mpsc::Receiver<String>,
    events: &mpsc::Sender<Inbound>,
    registered: &mut bool,
) -> Result<Outcome, TransportError> {
    info!(server = %config.server, port = config.port, "connecting to irc");
    let stream = TcpStream::connect((config.server.as_str(), config.port)).await?;
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    shared.flags.mark_connected();

    let mut session = Session::new(&config.nick, &config.channel);
    framed.send(message::nick(&config.nick)).await.map_err(codec_error)?;
    framed
        .send(message::user(&config.nick, &config.realname))
        .await
        .map_err(codec_error)?;

    loop {
        tokio::select! {
            incoming = framed.next() => {
                let line = match incoming {
                    None => return Ok(Outcome::Closed),
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("oversized irc line skipped");
                        continue;
                    }
                    Some(Err(e)) => return Err(codec_error(e)),
                    Some(Ok(line)) => line,
                };
                let Some(msg) = Message::parse(&line) else {
                    continue;
                };
                if msg.command == "ERROR" {
                    return Err(TransportError::Remote(msg.trailing().unwrap_or_default().to_owned()));
                }

                let effects = {
                    let mut pending = shared.pending()?;
                    session.react(&msg, &mut pending)
                };
                for effect in effects {
                    match effect {
                        Effect::Send(line) => framed.send(line).await.map_err(codec_error)?,
                        Effect::Emit(event) => {
                            if events.send(event.into()).await.is_err() {
                                return Ok(Outcome::Shutdown);
                            }
                        }
                        Effect::Registered => {
                            *registered = true;
                            shared.flags.mark_authenticated();
                            info!(nick = %session.nick(), "irc registered");
                            if events.send(Inbound::Authenticated(Origin::Irc)).await.is_err() {
                                return Ok(Outcome::Shutdown);
                            }
                        }
                    }
                }
            }
            outgoing = outbound_rx.recv(), if session.is_registered() => {
                let Some(line) = outgoing else {
                    let _ = framed.send(message::quit("shutting down")).await;
                    return Ok(Outcome::Shutdown);
                };
                debug!(%line, "irc send");
                framed.send(line).await.map_err(codec_error)?;
            }
        }
    }
}
