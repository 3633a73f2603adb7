//! Exclusive lock specs
//!
//! One holder at a time; waiters are served as holders leave.

use crate::prelude::*;
use std::time::Duration;

#[test]
fn lock_then_release() {
    let daemon = Daemon::start();
    let mut client = daemon.client();

    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
    assert_eq!(client.request("release jobs"), "RELEASED 0 0 jobs");
}

#[test]
fn second_client_waits_for_release() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    assert_eq!(alice.request("lock jobs"), "LOCKED 1 0 jobs");
    bob.send("lock jobs");
    assert!(bob.is_silent_for(Duration::from_millis(100)));

    assert_eq!(alice.request("release jobs"), "RELEASED 1 0 jobs");
    assert_eq!(bob.recv(), "LOCKED 1 0 jobs");
}

#[test]
fn keys_are_independent() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    assert_eq!(alice.request("lock jobs"), "LOCKED 1 0 jobs");
    assert_eq!(bob.request("lock mail"), "LOCKED 1 0 mail");
}

#[test]
fn relock_while_holding_is_granted_again() {
    let daemon = Daemon::start();
    let mut client = daemon.client();

    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
    assert_eq!(client.request("release jobs"), "RELEASED 0 0 jobs");
}

#[test]
fn release_by_non_holder_is_refused() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    alice.request("lock jobs");
    assert_eq!(bob.request("release jobs"), "NOT_RELEASED 1 0 jobs");
    assert_eq!(bob.request("release never-used"), "NOT_RELEASED 0 0 never-used");
}

#[test]
fn disconnect_hands_lock_to_waiter() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    alice.request("lock jobs");
    bob.send("lock jobs");
    assert!(bob.is_silent_for(Duration::from_millis(100)));

    drop(alice);
    assert_eq!(bob.recv(), "LOCKED 1 0 jobs");
}

#[test]
fn quit_closes_connection_and_hands_off() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    alice.request("lock jobs");
    bob.send("lock jobs");
    assert!(bob.is_silent_for(Duration::from_millis(100)));

    alice.send("quit");
    assert!(alice.is_closed());
    assert_eq!(bob.recv(), "LOCKED 1 0 jobs");
}

#[test]
fn malformed_input_is_rejected() {
    let daemon = Daemon::start();
    let mut client = daemon.client();

    assert_eq!(client.request("grab jobs"), "INVALID_COMMAND");
    assert_eq!(client.request("lock"), "INVALID_COMMAND");
    assert_eq!(client.request("lock jobs two"), "INVALID_COMMAND");
    assert_eq!(client.request("lock jobs 0"), "INVALID_ARGUMENT 0 0 jobs");
    assert_eq!(client.request("lock jobs 1 -2"), "INVALID_ARGUMENT 0 0 jobs");

    // The connection survives bad input
    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
}
