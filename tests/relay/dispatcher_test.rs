//! Dispatcher scenarios against mock transports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use steamrelay::commands::{CommandError, CommandHandler, CommandRegistry, Invocation, Reply};
use steamrelay::config::FormatConfig;
use steamrelay::relay::format::LineFormatter;
use steamrelay::relay::{Dispatcher, DispatcherSettings, Inbound, OverflowPolicy, Rules};
use steamrelay::types::{
    ChatEvent, EventKind, Identity, Member, Moderation, Origin, Permissions,
};

use super::mock::{member, MockTransport, Moderated};

const CHANNEL: &str = "#relay";
const ROOM: &str = "103582791430000000";

struct Echo;

#[async_trait]
impl CommandHandler for Echo {
    fn name(&self) -> &'static str {
        ".echo"
    }
    fn usage(&self) -> &'static str {
        ".echo <text>: repeat text"
    }
    async fn handle(&self, invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        reply.send(invocation.args.join(" ")).await;
        Ok(())
    }
}

struct Whisper;

#[async_trait]
impl CommandHandler for Whisper {
    fn name(&self) -> &'static str {
        ".whisper"
    }
    fn usage(&self) -> &'static str {
        ".whisper: private reply"
    }
    async fn handle(&self, _invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        reply.send_private("psst").await;
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl CommandHandler for Broken {
    fn name(&self) -> &'static str {
        ".broken"
    }
    fn usage(&self) -> &'static str {
        ".broken: always fails"
    }
    async fn handle(&self, _invocation: &Invocation, _reply: &Reply) -> Result<(), CommandError> {
        Err(CommandError::Malformed("nope".to_owned()))
    }
}

fn settings(verbosity: u8) -> DispatcherSettings {
    DispatcherSettings {
        irc_channel: CHANNEL.to_owned(),
        steam_room: ROOM.to_owned(),
        verbosity,
        queue_capacity: 3,
        overflow: OverflowPolicy::DropNewest,
        permission_timeout: Duration::from_secs(2),
        rules: Rules {
            echo_prefix: ".say".to_owned(),
            formatter: LineFormatter::new(FormatConfig::default(), CHANNEL),
        },
    }
}

struct Harness {
    dispatcher: Dispatcher,
    rx: mpsc::Receiver<Inbound>,
    irc: Arc<MockTransport>,
    steam: Arc<MockTransport>,
}

impl Harness {
    fn new(irc: MockTransport, steam: MockTransport, settings: DispatcherSettings) -> Self {
        let irc = Arc::new(irc);
        let steam = Arc::new(steam);
        let mut registry = CommandRegistry::new(100);
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Whisper));
        registry.register(Arc::new(Broken));

        let (tx, rx) = mpsc::channel(64);
        let dispatcher = Dispatcher::new(
            Arc::clone(&irc) as Arc<dyn steamrelay::transport::ChatTransport>,
            Arc::clone(&steam) as Arc<dyn steamrelay::transport::ChatTransport>,
            Arc::new(registry),
            settings,
            tx,
        );
        Self {
            dispatcher,
            rx,
            irc,
            steam,
        }
    }

    /// Steam logged on and the (empty) queue flushed.
    fn steam_up(&mut self) {
        self.steam.set_authenticated(true);
        self.dispatcher.handle(Inbound::Authenticated(Origin::Steam));
    }

    fn event(&mut self, event: ChatEvent) {
        self.dispatcher.handle(event.into());
    }

    /// Feed the next loopback message back into the dispatcher.
    async fn pump_one(&mut self) {
        match tokio::time::timeout(Duration::from_secs(2), self.rx.recv()).await {
            Ok(Some(message)) => self.dispatcher.handle(message),
            Ok(None) => panic!("loopback channel closed"),
            Err(_) => panic!("no loopback message within 2s"),
        }
    }

    async fn assert_quiet(&mut self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Ok(message) = self.rx.try_recv() {
            panic!("unexpected loopback message: {message:?}");
        }
    }
}

fn irc_msg(nick: &str, body: &str) -> ChatEvent {
    ChatEvent::new(Origin::Irc, EventKind::Message, Identity::irc(nick), body)
}

fn steam_msg(body: &str, permissions: Permissions) -> ChatEvent {
    ChatEvent::new(
        Origin::Steam,
        EventKind::Message,
        Identity::new("76561198000000001", "gabe"),
        body,
    )
    .with_permissions(permissions)
}

fn disconnect(origin: Origin) -> ChatEvent {
    ChatEvent::new(
        origin,
        EventKind::Disconnect {
            reason: Some("connection reset".to_owned()),
        },
        Identity::irc("steamrelay"),
        "",
    )
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn queued_lines_flush_in_order_after_authentication() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );

    h.event(irc_msg("alice", "one"));
    h.event(irc_msg("alice", "two"));
    h.event(irc_msg("alice", "three"));
    assert!(h.steam.lines().is_empty());
    assert_eq!(h.dispatcher.queued(), 3);

    h.steam_up();

    assert_eq!(
        h.steam.lines(),
        vec!["<alice> one", "<alice> two", "<alice> three"]
    );
    assert!(h.steam.targets().iter().all(|t| t == ROOM));
    assert_eq!(h.dispatcher.queued(), 0);
}

#[tokio::test]
async fn overflow_drops_newest_by_default() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );

    for word in ["a", "b", "c", "d"] {
        h.event(irc_msg("alice", word));
    }
    assert_eq!(h.dispatcher.queued(), 3);

    h.steam_up();
    assert_eq!(h.steam.lines(), vec!["<alice> a", "<alice> b", "<alice> c"]);
}

#[tokio::test]
async fn overflow_can_drop_oldest() {
    let mut settings = settings(1);
    settings.overflow = OverflowPolicy::DropOldest;
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings,
    );

    for word in ["a", "b", "c", "d"] {
        h.event(irc_msg("alice", word));
    }

    h.steam_up();
    assert_eq!(h.steam.lines(), vec!["<alice> b", "<alice> c", "<alice> d"]);
}

#[tokio::test]
async fn lines_after_flush_go_straight_to_steam() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );
    h.event(irc_msg("alice", "early"));
    h.steam_up();
    h.event(irc_msg("alice", "late"));

    assert_eq!(h.steam.lines(), vec!["<alice> early", "<alice> late"]);
    assert_eq!(h.dispatcher.queued(), 0);
}

#[tokio::test]
async fn steam_session_loss_rearms_queue() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );
    h.steam_up();

    h.steam.set_authenticated(false);
    h.event(disconnect(Origin::Steam));
    h.event(irc_msg("alice", "while down"));
    assert_eq!(h.dispatcher.queued(), 1);

    h.steam_up();
    assert_eq!(h.steam.lines(), vec!["<alice> while down"]);
}

#[tokio::test]
async fn lines_survive_a_failed_steam_logon() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );
    h.event(irc_msg("alice", "one"));
    h.event(irc_msg("alice", "two"));

    h.event(disconnect(Origin::Steam));
    assert_eq!(h.dispatcher.queued(), 2);
    assert!(h.steam.lines().is_empty());

    h.steam_up();
    assert_eq!(h.steam.lines(), vec!["<alice> one", "<alice> two"]);
    assert_eq!(h.dispatcher.queued(), 0);
}

#[tokio::test]
async fn lines_queue_while_steam_disconnect_is_in_flight() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );
    h.steam_up();

    h.steam.set_authenticated(false);
    h.event(irc_msg("alice", "racing"));
    assert_eq!(h.dispatcher.queued(), 1);

    h.event(disconnect(Origin::Steam));
    assert_eq!(h.dispatcher.queued(), 1);

    h.steam_up();
    assert_eq!(h.steam.lines(), vec!["<alice> racing"]);
}

#[tokio::test]
async fn operator_kick_moderates_matching_steam_member() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice"),
        MockTransport::new(Origin::Steam).with_roster(vec![
            member("S123", "bob"),
            member("S999", "robert"),
        ]),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".k bob"));
    assert_eq!(h.dispatcher.pending_checks(), 1);
    h.pump_one().await;
    assert_eq!(h.dispatcher.pending_checks(), 0);

    let steam = Arc::clone(&h.steam);
    eventually(|| !steam.moderated().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        h.steam.moderated(),
        vec![Moderated {
            action: Moderation::Kick,
            target: ROOM.to_owned(),
            identity: Identity::new("S123", "bob"),
            requested_by: "alice".to_owned(),
        }]
    );
}

#[tokio::test]
async fn operator_ban_hits_every_member_with_that_name() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice"),
        MockTransport::new(Origin::Steam).with_roster(vec![
            member("S1", "Some Player"),
            member("S2", "Some Player"),
            member("S3", "someone"),
        ]),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".kb Some Player"));
    h.pump_one().await;

    let steam = Arc::clone(&h.steam);
    eventually(|| steam.moderated().len() == 2).await;
    let ids: Vec<String> = h
        .steam
        .moderated()
        .into_iter()
        .map(|m| m.identity.id)
        .collect();
    assert_eq!(ids, vec!["S1", "S2"]);
    assert!(h.steam.moderated().iter().all(|m| m.action == Moderation::Ban));
}

#[tokio::test]
async fn non_operator_request_never_reaches_moderate() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam).with_roster(vec![member("S123", "bob")]),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("mallory", ".k bob"));
    h.pump_one().await;
    h.assert_quiet().await;

    assert!(h.steam.moderated().is_empty());
}

#[tokio::test]
async fn moderation_skipped_while_steam_is_down() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice"),
        MockTransport::new(Origin::Steam).with_roster(vec![member("S123", "bob")]),
        settings(2),
    );

    h.event(irc_msg("alice", ".k bob"));
    h.pump_one().await;
    h.assert_quiet().await;

    assert!(h.steam.moderated().is_empty());
}

#[tokio::test]
async fn operator_check_timeout_abandons_action() {
    let mut settings = settings(2);
    settings.permission_timeout = Duration::from_millis(30);
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice")
            .with_operator_delay(Duration::from_millis(300)),
        MockTransport::new(Origin::Steam).with_roster(vec![member("S123", "bob")]),
        settings,
    );
    h.steam_up();

    h.event(irc_msg("alice", ".k bob"));
    h.pump_one().await;
    h.assert_quiet().await;

    assert!(h.steam.moderated().is_empty());
    assert_eq!(h.dispatcher.pending_checks(), 0);
}

#[tokio::test]
async fn irc_disconnect_cancels_pending_checks() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice")
            .with_operator_delay(Duration::from_millis(50)),
        MockTransport::new(Origin::Steam).with_roster(vec![member("S123", "bob")]),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".k bob"));
    h.event(disconnect(Origin::Irc));
    assert_eq!(h.dispatcher.pending_checks(), 0);

    // The verdict still arrives but finds nothing to resume.
    h.pump_one().await;
    h.assert_quiet().await;
    assert!(h.steam.moderated().is_empty());
}

#[tokio::test]
async fn one_check_per_sender_in_flight() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice")
            .with_operator_delay(Duration::from_millis(50)),
        MockTransport::new(Origin::Steam).with_roster(vec![member("S123", "bob")]),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".k bob"));
    h.event(irc_msg("Alice", ".kb bob"));
    assert_eq!(h.dispatcher.pending_checks(), 1);

    h.pump_one().await;
    let steam = Arc::clone(&h.steam);
    eventually(|| !steam.moderated().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.steam.moderated().len(), 1);
    assert_eq!(h.steam.moderated()[0].action, Moderation::Kick);
}

#[tokio::test]
async fn steam_kick_without_permission_never_reaches_moderate() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(steam_msg(".k troll", Permissions::NONE));
    h.event(steam_msg(".kb troll", Permissions::KICK));
    h.assert_quiet().await;

    assert!(h.irc.moderated().is_empty());
}

#[tokio::test]
async fn steam_moderator_kicks_on_irc() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(steam_msg(".kb troll spamming", Permissions::BAN));

    let irc = Arc::clone(&h.irc);
    eventually(|| !irc.moderated().is_empty()).await;
    assert_eq!(
        h.irc.moderated(),
        vec![Moderated {
            action: Moderation::Ban,
            target: CHANNEL.to_owned(),
            identity: Identity::irc("troll"),
            requested_by: "gabe".to_owned(),
        }]
    );
}

#[tokio::test]
async fn operator_changes_verbosity_and_bad_values_are_ignored() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc)
            .authenticated()
            .with_operator("alice"),
        MockTransport::new(Origin::Steam),
        settings(2),
    );

    h.event(irc_msg("alice", ".verbosity 3"));
    h.pump_one().await;
    assert_eq!(h.dispatcher.verbosity(), 3);

    h.event(irc_msg("alice", ".verbosity 9"));
    h.event(irc_msg("alice", ".verbosity loud"));
    h.assert_quiet().await;
    assert_eq!(h.dispatcher.verbosity(), 3);

    h.event(steam_msg(".verbosity 0", Permissions::NONE));
    assert_eq!(h.dispatcher.verbosity(), 3);
    h.event(steam_msg(".verbosity 0", Permissions::KICK));
    assert_eq!(h.dispatcher.verbosity(), 0);
}

#[tokio::test]
async fn steam_userlist_replies_privately() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated().with_roster(vec![
            Member {
                identity: Identity::irc("alice"),
                rank: Some('@'),
            },
            Member {
                identity: Identity::irc("bob"),
                rank: None,
            },
        ]),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(steam_msg(".userlist", Permissions::NONE));

    let steam = Arc::clone(&h.steam);
    eventually(|| !steam.private().is_empty()).await;
    assert_eq!(
        h.steam.private(),
        vec![(
            Identity::new("76561198000000001", "gabe"),
            "Users in #relay:\n@alice\nbob".to_owned()
        )]
    );
    assert!(h.steam.lines().is_empty());
    assert!(h.irc.private().is_empty());
    assert!(h.irc.lines().iter().all(|l| !l.contains("Users in")));
}

#[tokio::test]
async fn irc_userlist_gets_one_notice_per_steam_member() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam)
            .with_roster(vec![member("765", "gabe"), member("766", "robin")]),
        settings(0),
    );

    h.event(irc_msg("alice", ".userlist"));

    let irc = Arc::clone(&h.irc);
    eventually(|| irc.private().len() == 2).await;
    let lines: Vec<String> = h.irc.private().into_iter().map(|(_, l)| l).collect();
    assert_eq!(
        lines,
        vec![
            "gabe http://steamcommunity.com/profiles/765",
            "robin http://steamcommunity.com/profiles/766"
        ]
    );
    assert_eq!(h.dispatcher.queued(), 0);
}

#[tokio::test]
async fn unmatched_command_token_is_a_noop() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".nosuchcommand with args"));
    h.assert_quiet().await;

    assert_eq!(h.steam.lines(), vec!["<alice> .nosuchcommand with args"]);
    assert!(h.irc.lines().is_empty());
}

#[tokio::test]
async fn command_reply_goes_to_both_sides() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".echo hi there"));
    h.pump_one().await;

    assert_eq!(h.irc.lines(), vec!["hi there"]);
    assert_eq!(h.steam.lines(), vec!["<alice> .echo hi there", "hi there"]);
}

#[tokio::test]
async fn private_command_reply_reaches_requester_only() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".whisper"));
    h.pump_one().await;

    assert_eq!(h.irc.private(), vec![(Identity::irc("alice"), "psst".to_owned())]);
    assert!(h.irc.lines().is_empty());
}

#[tokio::test]
async fn failing_handler_reports_fixed_message() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".broken"));
    h.pump_one().await;

    assert_eq!(h.irc.lines(), vec!["Error running .broken"]);
}

#[tokio::test]
async fn commands_do_not_run_below_level_two() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );
    h.steam_up();

    h.event(irc_msg("alice", ".echo hi"));
    h.assert_quiet().await;
    assert_eq!(h.steam.lines(), vec!["<alice> .echo hi"]);
}

#[tokio::test]
async fn echo_prefix_relays_at_level_zero() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(0),
    );
    h.steam_up();

    h.event(irc_msg("alice", "plain chat"));
    h.event(irc_msg("alice", ".say hello steam"));
    h.event(steam_msg(".say hello irc", Permissions::NONE));

    assert_eq!(h.steam.lines(), vec!["hello steam"]);
    assert_eq!(h.irc.lines(), vec!["hello irc"]);
}

#[tokio::test]
async fn steam_bare_hosts_are_linked_in_room() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    h.event(steam_msg("go to example.com now", Permissions::NONE));
    h.assert_quiet().await;

    assert_eq!(h.steam.lines(), vec!["http://example.com"]);
    assert_eq!(h.irc.lines(), vec!["\u{3}02gabe\u{f}: go to example.com now"]);
}

#[tokio::test]
async fn malformed_events_are_dropped() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(3),
    );
    h.steam_up();

    h.event(ChatEvent::new(
        Origin::Irc,
        EventKind::Message,
        Identity::irc(""),
        "hello",
    ));
    h.event(irc_msg("alice", "   "));
    h.assert_quiet().await;

    assert!(h.steam.lines().is_empty());
}

#[tokio::test]
async fn presence_notices_follow_verbosity() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(2),
    );
    h.steam_up();

    let join = ChatEvent::new(Origin::Irc, EventKind::Join, Identity::irc("bob"), "");
    h.event(join.clone());
    assert!(h.steam.lines().is_empty());

    h.event(steam_msg(".verbosity 3", Permissions::KICK));
    h.event(join);
    assert_eq!(h.steam.lines(), vec!["bob has joined #relay"]);
}

#[tokio::test]
async fn steam_kick_without_actor_is_still_announced() {
    let mut h = Harness::new(
        MockTransport::new(Origin::Irc).authenticated(),
        MockTransport::new(Origin::Steam),
        settings(1),
    );
    h.steam_up();

    let state: steamrelay::steam::SteamEvent = serde_json::from_str(&format!(
        r#"{{"type":"chat_state","room":"{ROOM}","state":"kicked","acted_on":"42",
            "acted_on_name":"troll"}}"#
    ))
    .expect("valid event");
    let kick = state.to_chat_event(ROOM).expect("normalizes");
    h.event(kick);

    let lines = h.irc.lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("was kicked by someone"), "{lines:?}");
}
