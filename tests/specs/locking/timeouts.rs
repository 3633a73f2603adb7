//! Wait and expire timeout specs

use crate::prelude::*;
use std::time::Duration;

#[test]
fn waiter_times_out() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    alice.request("lock jobs");
    assert_eq!(bob.request("lock jobs 1 100"), "TIMEOUT 1 0 jobs");
}

#[test]
fn zero_wait_times_out_when_busy() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    alice.request("lock jobs");
    assert_eq!(bob.request("lock jobs 1 0"), "TIMEOUT 1 0 jobs");
}

#[test]
fn zero_wait_is_granted_when_free() {
    let daemon = Daemon::start();
    let mut client = daemon.client();

    assert_eq!(client.request("lock jobs 1 0"), "LOCKED 1 0 jobs");
    assert!(client.is_silent_for(Duration::from_millis(100)));
}

#[test]
fn holder_expires_and_waiter_is_admitted() {
    let daemon = Daemon::start();
    let mut alice = daemon.client();
    let mut bob = daemon.client();

    assert_eq!(alice.request("lock jobs 1 -1 100"), "LOCKED 1 0 jobs");
    bob.send("lock jobs");

    assert_eq!(bob.recv(), "LOCKED 1 0 jobs");
    assert_eq!(alice.recv(), "EXPIRED 1 0 jobs");
    assert_eq!(alice.request("release jobs"), "NOT_RELEASED 1 0 jobs");
}

#[test]
fn release_before_expiry_cancels_it() {
    let daemon = Daemon::start();
    let mut client = daemon.client();

    assert_eq!(client.request("lock jobs 1 -1 100"), "LOCKED 1 0 jobs");
    assert_eq!(client.request("release jobs"), "RELEASED 0 0 jobs");
    assert!(client.is_silent_for(Duration::from_millis(250)));
}

#[test]
fn default_expire_flag_applies() {
    let daemon = Daemon::start_with(&["--default-expire-ms", "100"]);
    let mut client = daemon.client();

    assert_eq!(client.request("lock jobs"), "LOCKED 1 0 jobs");
    assert_eq!(client.recv(), "EXPIRED 0 0 jobs");
}
