#![cfg(unix)]
//! CLI surface tests.
//!
//! End-to-end spawning needs a session bus with the Flatpak development
//! interface, which test environments do not have. These tests cover
//! the argument surface and the failure path up to (and including) the
//! bus connection, which must map to the 127 sentinel.

use assert_cmd::Command;
use predicates::prelude::*;

fn host_spawn() -> Command {
    Command::cargo_bin("host-spawn").expect("binary built")
}

#[test]
fn test_help_lists_the_pty_flags() {
    host_spawn()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--pty"))
        .stdout(predicate::str::contains("--no-pty"))
        .stdout(predicate::str::contains("--env"));
}

#[test]
fn test_version_prints_the_crate_version() {
    host_spawn()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_command_is_a_usage_error() {
    host_spawn()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_conflicting_pty_flags_are_rejected() {
    host_spawn()
        .args(["--pty", "--no-pty", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unreachable_bus_exits_with_the_sentinel() {
    // An address nothing listens on: the connection fails before any
    // spawn call, no pid is ever obtained, and the caller sees 127.
    host_spawn()
        .args(["--no-pty", "echo", "hi"])
        .env("DBUS_SESSION_BUS_ADDRESS", "unix:path=/nonexistent/host-spawn-test-bus")
        .assert()
        .failure()
        .code(127)
        .stderr(predicate::str::contains("session bus"));
}
