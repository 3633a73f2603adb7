//! Daemon lifecycle specs
//!
//! Verify startup, the PID file guard, and shutdown on signals.

use crate::prelude::*;

#[test]
fn daemon_reports_ready_with_bound_address() {
    let daemon = Daemon::start();
    assert_eq!(daemon.addr.ip().to_string(), "127.0.0.1");
    assert_ne!(daemon.addr.port(), 0);
}

#[test]
fn daemon_writes_pid_file() {
    let daemon = Daemon::start();
    let pid = std::fs::read_to_string(daemon.pid_file()).unwrap();
    assert_eq!(pid.trim(), daemon.pid().to_string());
}

#[test]
fn second_daemon_on_same_pid_file_fails() {
    let daemon = Daemon::start();

    kld()
        .args(["--listen", "127.0.0.1:0", "--pid-file"])
        .arg(daemon.pid_file())
        .assert()
        .failure()
        .stderr(predicate::str::contains("LockFailed"));

    // The first daemon keeps serving
    let mut client = daemon.client();
    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
}

#[test]
fn sigterm_stops_daemon_and_removes_pid_file() {
    let mut daemon = Daemon::start();
    let pid_file = daemon.pid_file();

    let status = daemon.terminate();

    assert!(status.success());
    assert!(!pid_file.exists());
    assert!(daemon.log().contains("Received SIGTERM"));
}

#[test]
fn log_file_records_startup() {
    let daemon = Daemon::start();
    assert!(wait_for(|| daemon.log().contains("Daemon ready")));
}

#[test]
fn config_file_sets_default_expire() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("kld.toml");
    std::fs::write(&config, "default_expire = \"100ms\"\n").unwrap();
    let config = config.to_string_lossy().into_owned();

    let daemon = Daemon::start_in(dir, &["--config", &config]);
    let mut client = daemon.client();

    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
    assert_eq!(client.recv(), "EXPIRED 0 0 jobs");
}
