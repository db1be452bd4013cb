//! Persisted Steam logon state.

use steamrelay::steam::persist::ServerEndpoint;
use steamrelay::steam::SteamState;

fn state(dir: &tempfile::TempDir) -> SteamState {
    SteamState::new(
        dir.path().join("data/servers"),
        dir.path().join("data/sentry"),
    )
}

#[test]
fn missing_files_mean_fresh_state() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let state = state(&dir);
    assert!(state.load_servers().is_empty());
    assert!(state.load_sentry().is_none());
}

#[test]
fn servers_survive_a_restart() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let servers = vec![
        ServerEndpoint {
            host: "162.254.193.6".to_owned(),
            port: 27017,
        },
        ServerEndpoint {
            host: "162.254.193.7".to_owned(),
            port: 27018,
        },
    ];
    assert!(state(&dir).save_servers(&servers).is_ok());
    assert_eq!(state(&dir).load_servers(), servers);
}

#[test]
fn corrupt_server_list_is_ignored() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    std::fs::create_dir_all(dir.path().join("data")).expect("should create data dir");
    std::fs::write(dir.path().join("data/servers"), "not json").expect("should write");
    assert!(state(&dir).load_servers().is_empty());
}

#[test]
fn sentry_is_stored_raw_and_loaded_as_base64() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    assert!(state(&dir).save_sentry("AAEC/w==").is_ok());

    let raw = std::fs::read(dir.path().join("data/sentry")).expect("sentry file");
    assert_eq!(raw, vec![0_u8, 1, 2, 255]);
    assert_eq!(state(&dir).load_sentry().as_deref(), Some("AAEC/w=="));
}

#[test]
fn invalid_sentry_is_rejected() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    assert!(state(&dir).save_sentry("***").is_err());
    assert!(state(&dir).load_sentry().is_none());
}

#[cfg(unix)]
#[test]
fn state_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("should create temp dir");
    assert!(state(&dir).save_sentry("AAEC").is_ok());
    let mode = std::fs::metadata(dir.path().join("data/sentry"))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
