//! Integration tests for the `radvlan` binary.
//!
//! Argument parsing, help output, completions and the offline commands run
//! without any database. The probe tests start a server in-process on
//! loopback and drive it through the binary.
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use secrecy::SecretString;
use tempfile::NamedTempFile;

use radvlan_core::{ClientRegistry, MacAddress, MemoryStore, Server, ServerConfig};

const SECRET: &str = "testing123";

const MEMORY_CONFIG: &str = r#"
[server]
bind = "127.0.0.1"
auth_port = 11812
acct_port = 11813

[clients]
nas = [
    { name = "ap-lobby", address = "10.0.0.2", secret = "testing123" },
    { name = "ap-office", address = "10.0.0.3", secret = "testing123" },
]

[store]
backend = "memory"

[[policy.exact]]
mac = "aa-bb-cc-dd-ee-ff"
vlan = 10

[[policy.prefixes]]
prefix = "00:11:22"
vlan = 30

[policy.default]
vlan = 99
"#;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `radvlan` binary with env isolation.
///
/// Clears every variable the config loader reads and points config
/// directories at a nonexistent path so tests never touch real settings.
fn radvlan_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("radvlan");
    cmd.env("HOME", "/tmp/radvlan-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/radvlan-cli-test-nonexistent")
        .env_remove("RADVLAN_CONFIG")
        .env_remove("RADVLAN_OUTPUT")
        .env_remove("RADVLAN_PROBE_SECRET")
        .env_remove("RADIUS_SECRET")
        .env_remove("RUST_LOG");
    for key in [
        "DB_HOST", "DB_PORT", "DB_NAME", "DB_USER", "DB_PASS", "LOG_FILE", "LOG_LEVEL",
        "AUTH_PORT", "ACCT_PORT",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

async fn loopback_server(store: Arc<MemoryStore>) -> Server {
    let config = ServerConfig {
        bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
        auth_port: 0,
        acct_port: None,
        ..ServerConfig::default()
    };
    let registry = ClientRegistry::new().with_client(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        "probe",
        SecretString::from(SECRET.to_owned()),
    );
    let server = Server::bind(config, registry, store.clone(), store)
        .await
        .unwrap();
    server.start().await;
    server
}

/// Run the binary off the async runtime so the in-process server keeps serving.
async fn run_blocking(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = radvlan_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    radvlan_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("VLAN")
            .and(predicate::str::contains("serve"))
            .and(predicate::str::contains("check-config"))
            .and(predicate::str::contains("probe")),
    );
}

#[test]
fn test_version_flag() {
    radvlan_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("radvlan"));
}

#[test]
fn test_completions_bash() {
    let output = radvlan_cmd().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(!output.stdout.is_empty(), "Expected completion script on stdout");
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let output = radvlan_cmd().arg("frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── normalize ───────────────────────────────────────────────────────

#[test]
fn test_normalize_prints_canonical_forms() {
    radvlan_cmd()
        .args(["normalize", "aa-bb-cc-dd-ee-ff", "aabb.ccdd.eeff", "AABBCCDDEEFF"])
        .assert()
        .success()
        .stdout("aa:bb:cc:dd:ee:ff\naa:bb:cc:dd:ee:ff\naa:bb:cc:dd:ee:ff\n");
}

#[test]
fn test_normalize_invalid_exits_with_usage_code() {
    let output = radvlan_cmd()
        .args(["normalize", "aa:bb:cc", "AA-BB-CC-DD-EE-FF"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aa:bb:cc: invalid"), "{stdout}");
    assert!(stdout.contains("aa:bb:cc:dd:ee:ff"), "{stdout}");
    assert!(
        combined_output(&output).contains("Invalid MAC address format: aa:bb:cc"),
        "{}",
        combined_output(&output)
    );
}

#[test]
fn test_normalize_json_output() {
    let output = radvlan_cmd()
        .args(["-o", "json-compact", "normalize", "00-11-22-33-44-55"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["mac"], "00:11:22:33:44:55");
    assert_eq!(value[0]["prefix"], "00:11:22");
}

// ── init-config ─────────────────────────────────────────────────────

#[test]
fn test_init_config_writes_a_loadable_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radvlan.toml");

    radvlan_cmd()
        .arg("--config")
        .arg(&path)
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(path.exists());

    let output = radvlan_cmd()
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));

    radvlan_cmd()
        .env("RADIUS_SECRET", SECRET)
        .arg("--config")
        .arg(&path)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("ap-example"));
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let file = config_file(MEMORY_CONFIG);
    let output = radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("init-config")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    assert!(combined_output(&output).contains("--force"));

    radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .args(["init-config", "--force"])
        .assert()
        .success();
}

// ── check-config ────────────────────────────────────────────────────

#[test]
fn test_check_config_missing_file_is_not_found() {
    let output = radvlan_cmd()
        .args(["--config", "/tmp/radvlan-cli-test-nonexistent/none.toml", "check-config"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("Configuration file not found"));
}

#[test]
fn test_check_config_summarizes_memory_setup() {
    let file = config_file(MEMORY_CONFIG);
    radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("127.0.0.1:11812")
                .and(predicate::str::contains("memory (1 exact, 1 prefix, default vlan 99)"))
                .and(predicate::str::contains("ap-lobby"))
                .and(predicate::str::contains("Configuration OK")),
        );
}

#[test]
fn test_check_config_rejects_port_clash() {
    let file = config_file(&MEMORY_CONFIG.replace("acct_port = 11813", "acct_port = 11812"));
    let output = radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("server.acct_port"));
}

#[test]
fn test_check_config_without_clients_fails() {
    let file = config_file("[store]\nbackend = \"memory\"\n");
    let output = radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("clients"));
}

#[test]
fn test_env_override_reaches_check_config() {
    let file = config_file(MEMORY_CONFIG);
    radvlan_cmd()
        .env("AUTH_PORT", "21812")
        .arg("--config")
        .arg(file.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1:21812"));
}

// ── resolve ─────────────────────────────────────────────────────────

#[test]
fn test_resolve_walks_the_tiers() {
    let file = config_file(MEMORY_CONFIG);
    let cases = [
        ("AA-BB-CC-DD-EE-FF", "aa:bb:cc:dd:ee:ff exact vlan=10"),
        ("00:11:22:99:88:77", "00:11:22:99:88:77 prefix vlan=30"),
        ("02:00:00:00:00:01", "02:00:00:00:00:01 default vlan=99"),
    ];
    for (mac, expected) in cases {
        radvlan_cmd()
            .arg("--config")
            .arg(file.path())
            .args(["resolve", mac])
            .assert()
            .success()
            .stdout(predicate::str::starts_with(expected));
    }
}

#[test]
fn test_resolve_without_default_rejects() {
    let config = MEMORY_CONFIG.replace("[policy.default]\nvlan = 99\n", "");
    let file = config_file(&config);
    radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .args(["-o", "json", "resolve", "02:00:00:00:00:01"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""kind": "reject""#)
                .and(predicate::str::contains(r#""code": "no_assignment""#)),
        );
}

#[test]
fn test_resolve_invalid_mac_is_usage_error() {
    let file = config_file(MEMORY_CONFIG);
    let output = radvlan_cmd()
        .arg("--config")
        .arg(file.path())
        .args(["resolve", "not-a-mac"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── probe ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_gets_vlan_from_live_server() {
    let store = Arc::new(MemoryStore::new());
    store.insert_exact(MacAddress::normalize("AA:BB:CC:DD:EE:FF").unwrap(), 42);
    let server = loopback_server(store.clone()).await;
    let addr = server.auth_addr().unwrap();

    let mut cmd = radvlan_cmd();
    cmd.args(["-o", "json", "probe", "aa:bb:cc:dd:ee:ff", "--message-authenticator"])
        .arg("--server")
        .arg(addr.to_string())
        .env("RADVLAN_PROBE_SECRET", SECRET);
    let output = run_blocking(cmd).await;
    server.shutdown().await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["response"], "Access-Accept");
    assert_eq!(value["vlan"], "42");
    assert_eq!(value["tunnel_type"], 13);
    assert_eq!(value["tunnel_medium_type"], 6);
    assert_eq!(value["message_authenticator"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_reports_reject() {
    let store = Arc::new(MemoryStore::new());
    let server = loopback_server(store).await;
    let addr = server.auth_addr().unwrap();

    let mut cmd = radvlan_cmd();
    cmd.args(["probe", "02:00:00:00:00:01", "--secret", SECRET, "--server"])
        .arg(addr.to_string());
    let output = run_blocking(cmd).await;
    server.shutdown().await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Access-Reject"), "{stdout}");
    assert!(!stdout.contains("VLAN:"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_wrong_secret_fails_verification() {
    let store = Arc::new(MemoryStore::new());
    store.set_default(99, true);
    let server = loopback_server(store).await;
    let addr = server.auth_addr().unwrap();

    let mut cmd = radvlan_cmd();
    cmd.args(["probe", "02:00:00:00:00:01", "--secret", "not-the-secret", "--server"])
        .arg(addr.to_string());
    let output = run_blocking(cmd).await;
    server.shutdown().await;

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("failed verification"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_times_out_against_silent_peer() {
    let silent = tokio::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr: SocketAddr = silent.local_addr().unwrap();

    let mut cmd = radvlan_cmd();
    cmd.args([
        "probe",
        "02:00:00:00:00:01",
        "--secret",
        SECRET,
        "--timeout",
        "1",
        "--retries",
        "1",
        "--server",
    ])
    .arg(addr.to_string());
    let output = run_blocking(cmd).await;

    assert_eq!(output.status.code(), Some(8), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("after 2 attempt(s)"));
    drop(silent);
}
