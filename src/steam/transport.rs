//! Steam transport: logon loop, event pump, writer task and the
//! [`ChatTransport`] implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::relay::Inbound;
use crate::transport::{ChatTransport, SessionFlags, TransportError};
use crate::types::{
    ChatEvent, EventKind, Identity, Member, Moderation, Origin, Permissions, SessionState,
};

use super::client::{BridgeClient, LogonRequest};
use super::events::SteamEvent;
use super::persist::SteamState;
use super::SteamError;

/// Initial logon backoff, in milliseconds.
const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum logon backoff, in milliseconds.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Outbound messages buffered for the writer.
const OUTBOUND_CAPACITY: usize = 256;

/// Steam account credentials.
#[derive(Clone)]
pub struct SteamLogin {
    /// Account name.
    pub account_name: String,
    /// Password.
    pub password: String,
    /// One-time Steam Guard code.
    pub auth_code: Option<String>,
}

impl std::fmt::Debug for SteamLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteamLogin")
            .field("account_name", &self.account_name)
            .field("password", &"[REDACTED]")
            .field("auth_code", &self.auth_code.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug)]
struct Outgoing {
    target: String,
    text: String,
}

/// How an event pump ended.
enum PumpEnd {
    /// Steam logged the session off.
    LoggedOff(Option<String>),
    /// The dispatcher is gone.
    Shutdown,
}

/// Steam side of the bridge.
#[derive(Debug)]
pub struct SteamTransport {
    client: Arc<BridgeClient>,
    room: String,
    flags: Arc<SessionFlags>,
    outbound: mpsc::Sender<Outgoing>,
}

impl SteamTransport {
    /// Start the writer and the logon/event loop, returning the handle.
    pub fn spawn(
        client: BridgeClient,
        room: String,
        login: SteamLogin,
        state: SteamState,
        events: mpsc::Sender<Inbound>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let client = Arc::new(client);
        let flags = Arc::new(SessionFlags::default());
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

        tokio::spawn(write_loop(Arc::clone(&client), outbound_rx));
        let handle = tokio::spawn(run(
            Arc::clone(&client),
            room.clone(),
            login,
            state,
            Arc::clone(&flags),
            events,
        ));

        let transport = Arc::new(Self {
            client,
            room,
            flags,
            outbound,
        });
        (transport, handle)
    }

    fn push(&self, target: &str, text: &str) -> Result<(), TransportError> {
        if !self.flags.snapshot().authenticated {
            return Err(TransportError::NotAuthenticated(Origin::Steam));
        }
        self.outbound
            .try_send(Outgoing {
                target: target.to_owned(),
                text: text.to_owned(),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::Backpressure(Origin::Steam),
                mpsc::error::TrySendError::Closed(_) => TransportError::Closed(Origin::Steam),
            })
    }
}

#[async_trait]
impl ChatTransport for SteamTransport {
    fn origin(&self) -> Origin {
        Origin::Steam
    }

    fn session(&self) -> SessionState {
        self.flags.snapshot()
    }

    fn send_line(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.push(target, text)
    }

    fn send_private(&self, to: &Identity, text: &str) -> Result<(), TransportError> {
        self.push(&to.id, text)
    }

    async fn query_roster(&self, target: &str) -> Result<Vec<Member>, TransportError> {
        if !self.flags.snapshot().authenticated {
            return Err(TransportError::NotAuthenticated(Origin::Steam));
        }
        let members = self.client.members(target).await?;
        Ok(members
            .into_iter()
            .map(|m| Member {
                identity: Identity::new(m.steam_id, m.name),
                rank: None,
            })
            .collect())
    }

    /// Steam chat messages carry the sender's permission bits, so the
    /// dispatcher gates Steam requests on those and never calls this.
    /// It answers from the live roster for callers that hold only an
    /// identity.
    async fn verify_operator(&self, identity: &Identity) -> Result<bool, TransportError> {
        let members = self.client.members(&self.room).await?;
        Ok(members.iter().any(|m| {
            m.steam_id == identity.id && Permissions(m.permissions).contains(Permissions::KICK)
        }))
    }

    async fn moderate(
        &self,
        action: Moderation,
        target: &str,
        identity: &Identity,
        requested_by: &str,
    ) -> Result<(), TransportError> {
        if !self.flags.snapshot().authenticated {
            return Err(TransportError::NotAuthenticated(Origin::Steam));
        }
        self.client.moderate(target, &identity.id, action).await?;
        info!(
            action = action.as_str(),
            target = %identity.id,
            by = requested_by,
            "steam moderation applied"
        );
        Ok(())
    }
}

/// Send queued messages one at a time so order is kept.
async fn write_loop(client: Arc<BridgeClient>, mut outbound: mpsc::Receiver<Outgoing>) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = client.send_chat(&message.target, &message.text).await {
            warn!(error = %e, target = %message.target, "steam send failed");
        }
    }
    debug!("steam writer stopped");
}

/// Log on, pump events, and log on again whenever the session drops.
async fn run(
    client: Arc<BridgeClient>,
    room: String,
    login: SteamLogin,
    state: SteamState,
    flags: Arc<SessionFlags>,
    events: mpsc::Sender<Inbound>,
) {
    let mut backoff_ms: u64 = INITIAL_BACKOFF_MS;

    loop {
        let request = LogonRequest {
            account_name: login.account_name.clone(),
            password: login.password.clone(),
            auth_code: login.auth_code.clone(),
            sentry: state.load_sentry(),
            servers: state.load_servers(),
        };

        let reason = match client.logon(&request).await {
            Err(e) => e.to_string(),
            Ok(()) => {
                flags.mark_connected();
                let mut logged_on = false;
                let outcome = pump(&client, &room, &state, &flags, &events, &mut logged_on).await;
                if logged_on {
                    backoff_ms = INITIAL_BACKOFF_MS;
                }
                flags.mark_disconnected();
                let reason = match outcome {
                    Ok(PumpEnd::Shutdown) => {
                        info!("steam adapter stopping");
                        return;
                    }
                    Ok(PumpEnd::LoggedOff(reason)) => {
                        reason.unwrap_or_else(|| "logged off".to_owned())
                    }
                    Err(e) => e.to_string(),
                };
                let event = ChatEvent::new(
                    Origin::Steam,
                    EventKind::Disconnect {
                        reason: Some(reason.clone()),
                    },
                    Identity::new(login.account_name.as_str(), login.account_name.as_str()),
                    "",
                );
                if events.send(event.into()).await.is_err() {
                    return;
                }
                reason
            }
        };

        warn!(%reason, backoff_ms, "steam session unavailable, retrying logon");
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
    }
}

/// Poll the bridge until the session ends.
async fn pump(
    client: &BridgeClient,
    room: &str,
    state: &SteamState,
    flags: &SessionFlags,
    events: &mpsc::Sender<Inbound>,
    logged_on: &mut bool,
) -> Result<PumpEnd, SteamError> {
    loop {
        let batch = match client.poll_events().await {
            Ok(batch) => batch,
            // Normal: long-poll expired without events.
            Err(SteamError::Http(e)) if e.is_timeout() => continue,
            Err(e) => return Err(e),
        };

        for event in batch {
            match event {
                SteamEvent::LoggedOn => {
                    client.set_online().await?;
                    client.join_chat(room).await?;
                    flags.mark_authenticated();
                    *logged_on = true;
                    info!(%room, "steam logged on and joined room");
                    if events.send(Inbound::Authenticated(Origin::Steam)).await.is_err() {
                        return Ok(PumpEnd::Shutdown);
                    }
                }
                SteamEvent::LoggedOff { reason } => return Ok(PumpEnd::LoggedOff(reason)),
                SteamEvent::Servers { servers } => {
                    if let Err(e) = state.save_servers(&servers) {
                        warn!(error = %e, "failed to save steam server list");
                    }
                }
                SteamEvent::Sentry { data } => {
                    if let Err(e) = state.save_sentry(&data) {
                        warn!(error = %e, "failed to save steam sentry");
                    }
                }
                SteamEvent::Unknown => debug!("ignoring unknown steam event"),
                other => match other.to_chat_event(room) {
                    Some(chat) => {
                        if events.send(chat.into()).await.is_err() {
                            return Ok(PumpEnd::Shutdown);
                        }
                    }
                    None => debug!(?other, "steam event outside bridged room"),
                },
            }
        }
    }
}
