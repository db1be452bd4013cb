//! The Steam transport's logon flow against the fake bridge.

use std::time::Duration;

use tokio::sync::mpsc;

use steamrelay::relay::Inbound;
use steamrelay::steam::{BridgeClient, SteamLogin, SteamState, SteamTransport};
use steamrelay::transport::{ChatTransport, TransportError};
use steamrelay::types::{EventKind, Identity, Origin, Permissions};

use super::fake_bridge::{self, FakeBridge};

const ROOM: &str = "103582791430000000";

fn login() -> SteamLogin {
    SteamLogin {
        account_name: "relaybot".to_owned(),
        password: "hunter2".to_owned(),
        auth_code: None,
    }
}

async fn next_inbound(rx: &mut mpsc::Receiver<Inbound>) -> Inbound {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(message)) => message,
        other => panic!("expected inbound message, got {other:?}"),
    }
}

fn spawn(
    bridge: &FakeBridge,
    dir: &tempfile::TempDir,
) -> (std::sync::Arc<SteamTransport>, mpsc::Receiver<Inbound>) {
    let (tx, rx) = mpsc::channel(32);
    let state = SteamState::new(dir.path().join("servers"), dir.path().join("sentry"));
    let (transport, _task) = SteamTransport::spawn(
        BridgeClient::new(&bridge.url),
        ROOM.to_owned(),
        login(),
        state,
        tx,
    );
    (transport, rx)
}

#[tokio::test]
async fn sends_are_refused_before_logon() {
    let bridge = fake_bridge::start("[]").await;
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (transport, _rx) = spawn(&bridge, &dir);

    match transport.send_line(ROOM, "too early") {
        Err(TransportError::NotAuthenticated(Origin::Steam)) => {}
        other => panic!("expected NotAuthenticated, got {other:?}"),
    }
}

#[tokio::test]
async fn logon_joins_room_and_normalizes_chat() {
    let mut bridge = fake_bridge::start(r#"[{"steam_id":"S123","name":"gabe","permissions":16}]"#).await;
    bridge.push_poll(r#"[{"type":"logged_on"}]"#);
    bridge.push_poll(&format!(
        r#"[{{"type":"sentry","data":"AAEC"}},
            {{"type":"servers","servers":[{{"host":"1.2.3.4","port":27017}}]}},
            {{"type":"chat_msg","room":"{ROOM}","sender":"S123","name":"gabe",
              "message":"hi irc","entry":"chat","permissions":16,"in_game":true}}]"#
    ));
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (transport, mut rx) = spawn(&bridge, &dir);

    let logon = bridge.next_call().await;
    assert_eq!(logon.path, "/logon");
    assert_eq!(logon.body["password"], "hunter2");
    assert_eq!(bridge.next_call().await.path, "/persona");
    let join = bridge.next_call().await;
    assert_eq!(join.path, "/chat/join");
    assert_eq!(join.body["room"], ROOM);

    match next_inbound(&mut rx).await {
        Inbound::Authenticated(Origin::Steam) => {}
        other => panic!("expected authenticated, got {other:?}"),
    }
    assert!(transport.session().authenticated);

    match next_inbound(&mut rx).await {
        Inbound::Chat(event) => {
            assert_eq!(event.origin, Origin::Steam);
            assert_eq!(event.kind, EventKind::Message);
            assert_eq!(event.sender, Identity::new("S123", "gabe"));
            assert!(event.permissions.contains(Permissions::KICK));
            assert!(event.in_game);
        }
        other => panic!("expected chat event, got {other:?}"),
    }
    assert!(dir.path().join("sentry").exists());
    assert!(dir.path().join("servers").exists());

    assert!(transport.send_line(ROOM, "hello steam").is_ok());
    let sent = bridge.next_call().await;
    assert_eq!(sent.path, "/chat/send");
    assert_eq!(sent.body["target"], ROOM);
    assert_eq!(sent.body["text"], "hello steam");

    match transport.verify_operator(&Identity::new("S123", "gabe")).await {
        Ok(true) => {}
        other => panic!("S123 holds the kick bit, got {other:?}"),
    }
    match transport.verify_operator(&Identity::new("S404", "lurker")).await {
        Ok(false) => {}
        other => panic!("S404 is not in the room, got {other:?}"),
    }
}

#[tokio::test]
async fn logoff_reports_disconnect_and_relogs_with_saved_state() {
    let mut bridge = fake_bridge::start("[]").await;
    bridge.push_poll(r#"[{"type":"logged_on"},{"type":"sentry","data":"AAEC"}]"#);
    bridge.push_poll(r#"[{"type":"logged_off","reason":"LoggedInElsewhere"}]"#);
    let dir = tempfile::tempdir().expect("should create temp dir");
    let (transport, mut rx) = spawn(&bridge, &dir);

    match next_inbound(&mut rx).await {
        Inbound::Authenticated(Origin::Steam) => {}
        other => panic!("expected authenticated, got {other:?}"),
    }
    match next_inbound(&mut rx).await {
        Inbound::Chat(event) => assert_eq!(
            event.kind,
            EventKind::Disconnect {
                reason: Some("LoggedInElsewhere".to_owned())
            }
        ),
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert!(!transport.session().authenticated);

    // First logon, persona, join; then the retry carries the saved sentry.
    for expected in ["/logon", "/persona", "/chat/join"] {
        assert_eq!(bridge.next_call().await.path, expected);
    }
    let retry = bridge.next_call().await;
    assert_eq!(retry.path, "/logon");
    assert_eq!(retry.body["sentry"], "AAEC");
}
