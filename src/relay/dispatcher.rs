//! The dispatcher actor.
//!
//! Owns the verbosity level, the Steam relay queue and the parked operator
//! checks. Every [`Inbound`] is handled synchronously: sends are pushes into
//! adapter writer channels, and anything that has to wait (operator
//! lookups, roster queries, moderation fan-out, command handlers) runs in a
//! spawned task that reports back through the loopback sender.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::{CommandOutput, CommandRegistry, Reply, ReplyScope};
use crate::config::Config;
use crate::transport::ChatTransport;
use crate::types::{ChatEvent, Identity, Member, Moderation, Origin};

use super::classify::{classify, Action, Rules};
use super::format::{LineFormatter, PROFILE_URL};
use super::permission::{
    CheckResolution, PendingCheck, PendingChecks, PermissionVerdict, PrivilegedAction, Verdict,
};
use super::queue::{OverflowPolicy, RelayQueue};
use super::verbosity::Verbosity;
use super::{Inbound, RelayError};

/// Dispatcher knobs, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Bridged IRC channel.
    pub irc_channel: String,
    /// Bridged Steam chat room.
    pub steam_room: String,
    /// Starting verbosity.
    pub verbosity: u8,
    /// Steam pending-queue capacity.
    pub queue_capacity: usize,
    /// What to do when the queue is full.
    pub overflow: OverflowPolicy,
    /// Operator lookup timeout.
    pub permission_timeout: Duration,
    /// Classification rules.
    pub rules: Rules,
}

impl DispatcherSettings {
    /// Derive settings from a loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            irc_channel: config.irc.channel.clone(),
            steam_room: config.steam.chatroom.clone(),
            verbosity: config.relay.verbosity,
            queue_capacity: config.relay.queue_capacity,
            overflow: config.relay.overflow,
            permission_timeout: Duration::from_secs(config.relay.permission_timeout_secs),
            rules: Rules {
                echo_prefix: config.relay.echo_prefix.clone(),
                formatter: LineFormatter::new(config.format.clone(), config.irc.channel.clone()),
            },
        }
    }
}

/// Single-owner relay state machine.
pub struct Dispatcher {
    irc: Arc<dyn ChatTransport>,
    steam: Arc<dyn ChatTransport>,
    commands: Arc<CommandRegistry>,
    settings: DispatcherSettings,
    verbosity: Verbosity,
    queue: RelayQueue,
    checks: PendingChecks,
    loopback: mpsc::Sender<Inbound>,
}

impl Dispatcher {
    /// Build a dispatcher. `loopback` must feed the same channel that
    /// [`Dispatcher::run`] consumes.
    pub fn new(
        irc: Arc<dyn ChatTransport>,
        steam: Arc<dyn ChatTransport>,
        commands: Arc<CommandRegistry>,
        settings: DispatcherSettings,
        loopback: mpsc::Sender<Inbound>,
    ) -> Self {
        Self {
            irc,
            steam,
            commands,
            verbosity: Verbosity::new(settings.verbosity),
            queue: RelayQueue::new(settings.queue_capacity),
            checks: PendingChecks::new(settings.permission_timeout),
            settings,
            loopback,
        }
    }

    /// Consume inbound messages until the channel closes.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) {
        info!(
            verbosity = self.verbosity.get(),
            channel = %self.settings.irc_channel,
            room = %self.settings.steam_room,
            "dispatcher started"
        );
        while let Some(message) = inbound.recv().await {
            self.handle(message);
        }
        info!("dispatcher channel closed");
    }

    /// Handle one inbound message.
    pub fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Chat(event) => self.on_event(&event),
            Inbound::Authenticated(origin) => self.on_authenticated(origin),
            Inbound::PermissionResolved(verdict) => self.on_verdict(verdict),
            Inbound::CommandReply(output) => self.on_command_output(output),
        }
    }

    /// Current verbosity level.
    pub fn verbosity(&self) -> u8 {
        self.verbosity.get()
    }

    /// Lines waiting for Steam.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Operator checks in flight.
    pub fn pending_checks(&self) -> usize {
        self.checks.len()
    }

    fn on_event(&mut self, event: &ChatEvent) {
        let classification = classify(event, self.verbosity, &self.settings.rules);

        if let Some(mirror) = classification.mirror {
            self.relay(mirror.to, mirror.line);
        }
        for link in classification.links {
            self.relay(Origin::Steam, link);
        }

        match classification.action {
            Action::None => {}
            Action::Malformed(reason) => {
                warn!(origin = %event.origin, sender = %event.sender.id, reason, "dropping malformed event");
            }
            Action::Denied { requester, token } => {
                debug!(origin = %event.origin, sender = %requester.id, %token, "privileged request denied");
            }
            Action::CheckOperator {
                origin,
                requester,
                request,
            } => self.start_check(origin, requester, request),
            Action::ModerateIrc {
                action,
                nick,
                requested_by,
            } => self.moderate_irc(action, nick, requested_by),
            Action::SetVerbosity(level) => self.set_verbosity(level, &event.sender),
            Action::Roster { origin, requester } => self.answer_roster(origin, requester),
            Action::Command {
                origin,
                requester,
                invocation,
            } => {
                let reply = Reply::new(self.loopback.clone(), origin, requester);
                self.commands.invoke(invocation, reply);
            }
            Action::SessionLost { origin, reason } => self.on_session_lost(origin, reason),
        }
    }

    fn on_authenticated(&mut self, origin: Origin) {
        info!(%origin, "transport authenticated");
        if origin != Origin::Steam {
            return;
        }

        let steam = Arc::clone(&self.steam);
        let room = self.settings.steam_room.clone();
        let result = self.queue.drain_into(|line| {
            if let Err(e) = steam.send_line(&room, &line) {
                warn!(error = %e, "failed to flush queued line");
            }
        });
        match result {
            Ok(0) => {}
            Ok(count) => info!(count, "flushed queued lines to steam"),
            Err(e) => warn!(error = %e, "steam authenticated twice in one session"),
        }
    }

    fn on_session_lost(&mut self, origin: Origin, reason: Option<String>) {
        let cancelled = self.checks.cancel_origin(origin);
        if origin == Origin::Steam {
            self.queue.reset();
        }
        info!(
            %origin,
            reason = reason.as_deref().unwrap_or("unknown"),
            cancelled_checks = cancelled,
            "transport session lost"
        );
    }

    /// Send `line` to one side. Steam lines go through the queue until the
    /// session has logged on and the queue has been flushed.
    fn relay(&mut self, to: Origin, line: String) {
        match to {
            Origin::Irc => {
                if let Err(e) = self.irc.send_line(&self.settings.irc_channel, &line) {
                    debug!(error = %e, "irc line not sent");
                }
            }
            Origin::Steam => {
                let authenticated = self.steam.session().authenticated;
                if authenticated && self.queue.is_drained() {
                    if let Err(e) = self.steam.send_line(&self.settings.steam_room, &line) {
                        warn!(error = %e, "steam line not sent");
                    }
                    return;
                }
                if !authenticated && self.queue.is_drained() {
                    // Session dropped but its Disconnect is still in flight.
                    self.queue.reset();
                }
                self.enqueue(line);
            }
        }
    }

    fn enqueue(&mut self, line: String) {
        let result = match self.settings.overflow {
            OverflowPolicy::DropNewest => self.queue.enqueue(line.clone()).map(|()| None),
            OverflowPolicy::DropOldest => self.queue.enqueue_evicting(line.clone()),
        };
        match result {
            Ok(None) => debug!(queued = self.queue.len(), "line queued for steam"),
            Ok(Some(evicted)) => warn!(%evicted, "relay queue full, dropped oldest line"),
            Err(RelayError::QueueOverflow { capacity }) => {
                warn!(capacity, dropped = %line, "relay queue full, dropped line");
            }
            Err(RelayError::QueueDrained) => {
                debug!(dropped = %line, "steam session not ready, dropped line");
            }
        }
    }

    fn start_check(&mut self, origin: Origin, requester: Identity, request: PrivilegedAction) {
        self.checks.gc_expired();
        let Some(id) = self.checks.begin(origin, requester.clone(), request) else {
            debug!(%origin, sender = %requester.id, "operator check already in flight");
            return;
        };
        debug!(%origin, sender = %requester.id, "operator check started");

        let transport = self.transport(origin);
        let timeout = self.settings.permission_timeout;
        let loopback = self.loopback.clone();
        tokio::spawn(async move {
            let verdict =
                match tokio::time::timeout(timeout, transport.verify_operator(&requester)).await {
                    Ok(Ok(true)) => Verdict::Operator,
                    Ok(Ok(false)) => Verdict::NotOperator,
                    Ok(Err(e)) => Verdict::Failed(e.to_string()),
                    Err(_) => Verdict::TimedOut,
                };
            let _ = loopback
                .send(Inbound::PermissionResolved(PermissionVerdict { id, verdict }))
                .await;
        });
    }

    fn on_verdict(&mut self, verdict: PermissionVerdict) {
        let check = match self.checks.resolve(&verdict.id) {
            CheckResolution::Ready(check) => check,
            CheckResolution::Expired => {
                debug!(sender = %verdict.id.sender, "operator check expired");
                return;
            }
            CheckResolution::NotFound => {
                debug!(sender = %verdict.id.sender, "verdict for unknown check");
                return;
            }
        };

        match verdict.verdict {
            Verdict::Operator => self.run_privileged(check),
            Verdict::NotOperator => {
                debug!(sender = %check.requester.id, "requester is not an operator");
            }
            Verdict::TimedOut => {
                debug!(sender = %check.requester.id, "operator check timed out");
            }
            Verdict::Failed(error) => {
                warn!(sender = %check.requester.id, %error, "operator check failed");
            }
        }
    }

    fn run_privileged(&mut self, check: PendingCheck) {
        match check.action {
            PrivilegedAction::SetVerbosity(level) => self.set_verbosity(level, &check.requester),
            PrivilegedAction::Moderate {
                action,
                target_name,
            } => self.moderate_steam(action, target_name, check.requester),
        }
    }

    fn set_verbosity(&mut self, level: u8, requester: &Identity) {
        let previous = self.verbosity.get();
        if self.verbosity.set(level) {
            info!(from = previous, to = level, by = %requester.name, "verbosity changed");
        } else {
            debug!(level, "verbosity out of range, ignored");
        }
    }

    /// Moderate every Steam member whose display name equals `target_name`.
    fn moderate_steam(&self, action: Moderation, target_name: String, requester: Identity) {
        if !self.steam.session().authenticated {
            warn!(action = action.as_str(), target = %target_name, "steam not logged on, moderation skipped");
            return;
        }
        let steam = Arc::clone(&self.steam);
        let room = self.settings.steam_room.clone();
        tokio::spawn(async move {
            let members = match steam.query_roster(&room).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(error = %e, "steam roster query failed");
                    return;
                }
            };
            let mut applied: usize = 0;
            for member in members.iter().filter(|m| m.identity.name == target_name) {
                match steam
                    .moderate(action, &room, &member.identity, &requester.name)
                    .await
                {
                    Ok(()) => applied = applied.saturating_add(1),
                    Err(e) => warn!(error = %e, target = %member.identity.id, "steam moderation failed"),
                }
            }
            info!(
                action = action.as_str(),
                target = %target_name,
                by = %requester.name,
                applied,
                "steam moderation done"
            );
        });
    }

    fn moderate_irc(&self, action: Moderation, nick: String, requested_by: String) {
        let irc = Arc::clone(&self.irc);
        let channel = self.settings.irc_channel.clone();
        tokio::spawn(async move {
            let target = Identity::irc(nick);
            match irc.moderate(action, &channel, &target, &requested_by).await {
                Ok(()) => info!(action = action.as_str(), target = %target.id, by = %requested_by, "irc moderation sent"),
                Err(e) => warn!(error = %e, "irc moderation failed"),
            }
        });
    }

    fn answer_roster(&self, origin: Origin, requester: Identity) {
        let source = self.transport(origin.other());
        let reply_via = self.transport(origin);
        let target = match origin.other() {
            Origin::Irc => self.settings.irc_channel.clone(),
            Origin::Steam => self.settings.steam_room.clone(),
        };
        let channel = self.settings.irc_channel.clone();
        tokio::spawn(async move {
            let members = match source.query_roster(&target).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(error = %e, "roster query failed");
                    return;
                }
            };
            for line in roster_reply(origin, &channel, &members) {
                if let Err(e) = reply_via.send_private(&requester, &line) {
                    warn!(error = %e, "roster reply not sent");
                }
            }
        });
    }

    fn on_command_output(&mut self, output: CommandOutput) {
        match output.scope {
            ReplyScope::Broadcast => {
                self.relay(Origin::Irc, output.text.clone());
                self.relay(Origin::Steam, output.text);
            }
            ReplyScope::Private { origin, to } => {
                if let Err(e) = self.transport(origin).send_private(&to, &output.text) {
                    warn!(error = %e, "private reply not sent");
                }
            }
        }
    }

    fn transport(&self, origin: Origin) -> Arc<dyn ChatTransport> {
        match origin {
            Origin::Irc => Arc::clone(&self.irc),
            Origin::Steam => Arc::clone(&self.steam),
        }
    }
}

/// Private reply lines for a `.userlist` request from `origin`.
///
/// IRC requesters get one notice per Steam member; Steam requesters get a
/// single multi-line message listing the channel.
pub fn roster_reply(origin: Origin, channel: &str, members: &[Member]) -> Vec<String> {
    match origin {
        Origin::Irc => members
            .iter()
            .map(|m| format!("{} {PROFILE_URL}{}", m.identity.name, m.identity.id))
            .collect(),
        Origin::Steam => {
            let mut text = format!("Users in {channel}:");
            for member in members {
                text.push('\n');
                if let Some(rank) = member.rank {
                    text.push(rank);
                }
                text.push_str(&member.identity.name);
            }
            vec![text]
        }
    }
}
