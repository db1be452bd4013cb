//! Bridge client requests and envelope handling.

use steamrelay::steam::client::{BridgeMember, LogonRequest};
use steamrelay::steam::persist::ServerEndpoint;
use steamrelay::steam::{BridgeClient, SteamError};
use steamrelay::types::Moderation;

use super::fake_bridge;

#[tokio::test]
async fn logon_posts_credentials_and_state() {
    let mut bridge = fake_bridge::start("[]").await;
    let client = BridgeClient::new(&format!("{}/", bridge.url));

    let request = LogonRequest {
        account_name: "relaybot".to_owned(),
        password: "hunter2".to_owned(),
        auth_code: None,
        sentry: Some("AAEC".to_owned()),
        servers: vec![ServerEndpoint {
            host: "1.2.3.4".to_owned(),
            port: 27017,
        }],
    };
    let result = client.logon(&request).await;
    assert!(result.is_ok());

    let seen = bridge.next_call().await;
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.path, "/logon");
    assert_eq!(seen.body["account_name"], "relaybot");
    assert_eq!(seen.body["sentry"], "AAEC");
    assert_eq!(seen.body["servers"][0]["port"], 27017);
    assert!(seen.body.get("auth_code").is_none());
}

#[tokio::test]
async fn members_and_moderation() {
    let mut bridge = fake_bridge::start(
        r#"[{"steam_id":"S123","name":"bob","permissions":16},{"steam_id":"S9","name":"eve"}]"#,
    )
    .await;
    let client = BridgeClient::new(&bridge.url);

    let members = match client.members("room1").await {
        Ok(members) => members,
        Err(err) => panic!("members should load: {err}"),
    };
    assert_eq!(
        members,
        vec![
            BridgeMember {
                steam_id: "S123".to_owned(),
                name: "bob".to_owned(),
                permissions: 16
            },
            BridgeMember {
                steam_id: "S9".to_owned(),
                name: "eve".to_owned(),
                permissions: 0
            },
        ]
    );
    assert_eq!(bridge.next_call().await.path, "/chat/room1/members");

    let result = client.moderate("room1", "S123", Moderation::Ban).await;
    assert!(result.is_ok());
    let seen = bridge.next_call().await;
    assert_eq!(seen.path, "/chat/moderate");
    assert_eq!(seen.body["action"], "ban");
    assert_eq!(seen.body["steam_id"], "S123");
}

#[tokio::test]
async fn poll_parses_event_batch() {
    let bridge = fake_bridge::start("[]").await;
    bridge.push_poll(r#"[{"type":"logged_on"},{"type":"something_new"}]"#);
    let client = BridgeClient::new(&bridge.url);

    let events = match client.poll_events().await {
        Ok(events) => events,
        Err(err) => panic!("poll should succeed: {err}"),
    };
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], steamrelay::steam::SteamEvent::LoggedOn);
    assert_eq!(events[1], steamrelay::steam::SteamEvent::Unknown);
}

#[tokio::test]
async fn unreachable_bridge_is_an_http_error() {
    let client = BridgeClient::new("http://127.0.0.1:1");
    match client.set_online().await {
        Err(SteamError::Http(_)) => {}
        other => panic!("expected HTTP error, got {other:?}"),
    }
}
