#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_osport"))
}

fn unique_name(tag: &str) -> String {
    format!(
        "osport-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    )
}

fn wait_for_path(path: &PathBuf, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !path.exists() {
        assert!(
            Instant::now() < deadline,
            "listener socket never appeared at {path:?}"
        );
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn resolve_literal_emits_json_endpoints() {
    let output = bin()
        .args([
            "--format", "json", "resolve", "127.0.0.1", "--service", "80", "--numeric", "--kind",
            "stream",
        ])
        .output()
        .expect("binary should run");
    assert!(output.status.success(), "resolve should exit zero");

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be one JSON document");
    let endpoints = parsed["endpoints"]
        .as_array()
        .expect("result should list endpoints");
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0]["address"], "127.0.0.1");
    assert_eq!(endpoints[0]["port"], 80);
    assert_eq!(endpoints[0]["provenance"], "native");
}

#[test]
fn resolve_unknown_host_fails_nonzero() {
    let output = bin()
        .args(["resolve", "definitely-not-a-host", "--numeric"])
        .output()
        .expect("binary should run");
    assert!(!output.status.success());
}

#[test]
fn envinfo_reports_the_platform() {
    let output = bin()
        .args(["--format", "json", "envinfo"])
        .output()
        .expect("binary should run");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be one JSON document");
    assert_eq!(parsed["os"], std::env::consts::OS);
    assert_eq!(parsed["channel_transport"], "unix-domain-socket");
}

#[test]
fn listen_and_send_round_trip_through_the_binary() {
    let name = unique_name("roundtrip");
    let socket_path = PathBuf::from(format!("/tmp/{name}"));

    let listener = bin()
        .args(["--format", "raw", "listen", &name, "--echo", "--count", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listener should spawn");

    wait_for_path(&socket_path, Duration::from_secs(5));

    let send = bin()
        .args(["--format", "raw", "send", &name, "--data", "ping", "--wait"])
        .output()
        .expect("send should run");
    assert!(send.status.success(), "send should exit zero");
    assert_eq!(send.stdout, b"ping", "client should get the echo back");

    let listener = listener
        .wait_with_output()
        .expect("listener should exit after one connection");
    assert!(listener.status.success(), "listener should exit zero");
    assert_eq!(listener.stdout, b"ping", "listener should print the payload");
    assert!(
        !socket_path.exists(),
        "listener exit must leave no socket file"
    );
}
