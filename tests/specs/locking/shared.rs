//! Shared lock specs
//!
//! A lock admits holders up to the smallest tolerance among them.

use crate::prelude::*;
use std::time::Duration;

#[test]
fn holders_share_up_to_tolerance() {
    let daemon = Daemon::start();
    let mut clients: Vec<Client> = (0..4).map(|_| daemon.client()).collect();

    assert_eq!(clients[0].request("lock pool 3"), "LOCKED 1 0 pool");
    assert_eq!(clients[1].request("lock pool 3"), "LOCKED 2 0 pool");
    assert_eq!(clients[2].request("lock pool 3"), "LOCKED 3 0 pool");

    clients[3].send("lock pool 3");
    assert!(clients[3].is_silent_for(Duration::from_millis(100)));

    assert_eq!(clients[0].request("release pool"), "RELEASED 3 0 pool");
    assert_eq!(clients[3].recv(), "LOCKED 3 0 pool");
}

#[test]
fn stricter_holder_lowers_the_ceiling() {
    let daemon = Daemon::start();
    let mut wide = daemon.client();
    let mut narrow = daemon.client();
    let mut late = daemon.client();

    assert_eq!(wide.request("lock pool 3"), "LOCKED 1 0 pool");
    assert_eq!(narrow.request("lock pool 2"), "LOCKED 2 0 pool");

    // Two holders already meet the ceiling of 2
    late.send("lock pool 3");
    assert!(late.is_silent_for(Duration::from_millis(100)));

    // Ceiling returns to 3 once the stricter holder leaves
    assert_eq!(narrow.request("release pool"), "RELEASED 2 0 pool");
    assert_eq!(late.recv(), "LOCKED 2 0 pool");
}

#[test]
fn exclusive_request_waits_for_shared_holders() {
    let daemon = Daemon::start();
    let mut reader = daemon.client();
    let mut writer = daemon.client();

    assert_eq!(reader.request("lock doc 5"), "LOCKED 1 0 doc");
    writer.send("lock doc 1");
    assert!(writer.is_silent_for(Duration::from_millis(100)));

    assert_eq!(reader.request("release doc"), "RELEASED 1 0 doc");
    assert_eq!(writer.recv(), "LOCKED 1 0 doc");
}
