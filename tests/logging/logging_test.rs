use steamrelay::logging::{LoggingGuard, LOG_FILE_PREFIX};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn log_file_prefix_names_the_bot() {
    assert!(LOG_FILE_PREFIX.starts_with("steamrelay"));
}

// The global subscriber can only be installed once per process, so this is
// the only test in this binary that calls `init_production`.
#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("data/logs");
    assert!(!logs_dir.exists());

    let guard = steamrelay::logging::init_production(&logs_dir);
    assert!(guard.is_ok());
    assert!(logs_dir.is_dir(), "logs directory should be created");
}
