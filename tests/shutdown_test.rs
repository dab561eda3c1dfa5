#![cfg(unix)]

use std::time::Duration;
use vps_billing::shutdown::shutdown_signal;

// ── 1. shutdown_signal_waits_for_sigterm ───────────────────────────────────
// Sends SIGTERM to this test process, so it lives in its own binary.

#[tokio::test]
async fn shutdown_signal_waits_for_sigterm() {
    let waiter = tokio::spawn(shutdown_signal());

    // Handlers are installed on first poll; without a signal nothing fires.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("shutdown signal did not resolve")
        .unwrap();
}
