//! Integration tests for the `smartgas-discovery` binary.
//!
//! A throwaway broker on a loopback socket answers CONNACK with a chosen
//! return code, so the whole connect/publish/disconnect path runs without a
//! real MQTT server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Command with every `MQTT_*` variable cleared, run from an empty
/// directory so no `.env` file is picked up.
fn discovery_cmd(workdir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("smartgas-discovery");
    cmd.current_dir(workdir.path())
        .env_remove("MQTT_HOST")
        .env_remove("MQTT_PORT")
        .env_remove("MQTT_USER")
        .env_remove("MQTT_PASS")
        .env_remove("MQTT_SSL")
        .env_remove("MQTT_CLIENT_ID")
        .env_remove("MQTT_DISCOVERY_PREFIX")
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(60));
    cmd
}

/// Accepts one client, answers its CONNECT with `return_code` and collects
/// everything the client sends afterwards until it hangs up.
fn fake_broker(return_code: u8) -> (u16, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .unwrap();

        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).unwrap();
        stream.write_all(&[0x20, 0x02, 0x00, return_code]).unwrap();

        let mut received = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
        }
        received
    });

    (port, handle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

// ── Argument handling ───────────────────────────────────────────────

#[test]
fn test_help_mentions_options() {
    let dir = TempDir::new().unwrap();
    discovery_cmd(&dir).arg("--help").assert().success().stdout(
        predicate::str::contains("--host")
            .and(predicate::str::contains("--no-ssl"))
            .and(predicate::str::contains("MQTT_HOST")),
    );
}

#[test]
fn test_missing_host_is_usage_error() {
    let dir = TempDir::new().unwrap();
    discovery_cmd(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--host"));
}

#[test]
fn test_host_from_dotenv_file() {
    let dir = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    std::fs::write(
        dir.path().join(".env"),
        format!("MQTT_HOST=127.0.0.1\nMQTT_PORT={}\nMQTT_SSL=no\n", port),
    )
    .unwrap();

    discovery_cmd(&dir).assert().code(1).stdout(predicate::str::contains(format!(
        "[INFO] MQTT target configuration: scheme=mqtt host=127.0.0.1 port={} user=(none) password=(none)",
        port
    )));
}

#[test]
fn test_malformed_dotenv_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "MQTT_HOST 127.0.0.1\n").unwrap();

    discovery_cmd(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load .env file"));
}

// ── Connection outcomes ─────────────────────────────────────────────

#[test]
fn test_accepted_publishes_all_sensors() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(0);

    let output = discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0), "stdout:\n{stdout}");
    assert!(stdout.contains("[OK] MQTT connection established successfully."));
    assert_eq!(stdout.matches("[OK] Published discovery for ").count(), 8);
    assert!(stdout.contains(
        "to homeassistant/sensor/gaszaehler_verbrauch_energie_vorgestern/config"
    ));
    assert!(!stdout.contains("[WARN]"));

    let received = broker.join().unwrap();
    assert_eq!(count(&received, b"homeassistant/sensor/"), 8);
    assert_eq!(count(&received, b"\"payload_available\":\"Online\""), 8);
    // DISCONNECT is the last packet on the wire.
    assert!(received.ends_with(&[0xE0, 0x00]));
}

#[test]
fn test_custom_discovery_prefix() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(0);

    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--discovery-prefix", "ha-test"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "to ha-test/sensor/gaszaehler_zaehlerstand/config",
        ));

    let received = broker.join().unwrap();
    assert_eq!(count(&received, b"ha-test/sensor/"), 8);
}

#[test]
fn test_not_authorized_exits_without_publishing() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(5);

    let output = discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
    assert!(stdout.contains(
        "[ERROR] MQTT broker rejected connection: Connection refused: not authorized"
    ));
    assert!(stdout.contains("Check the username/password configured for the broker."));
    assert!(!stdout.contains("Published discovery"));

    let received = broker.join().unwrap();
    assert_eq!(count(&received, b"homeassistant/"), 0);
}

#[test]
fn test_bad_credentials_masks_password() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(4);

    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--user", "meter", "--password", "hunter2"])
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("user=meter password=h***2")
                .and(predicate::str::contains("hunter2").not())
                .and(predicate::str::contains("bad user name or password"))
                .and(predicate::str::contains("Check the username/password")),
        );

    broker.join().unwrap();
}

#[test]
fn test_server_unavailable_gets_general_guidance() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(3);

    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("Connection refused: server unavailable")
                .and(predicate::str::contains(
                    "Verify host, port, TLS settings, and broker availability.",
                )),
        );

    broker.join().unwrap();
}

#[test]
fn test_unknown_return_code_is_a_rejection() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(6);

    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains(
                "[ERROR] MQTT broker rejected connection: Connection failed with reason code 6",
            )
            .and(predicate::str::contains(
                "Verify host, port, TLS settings, and broker availability.",
            ))
            .and(predicate::str::contains("Could not reach").not()),
        );

    broker.join().unwrap();
}

#[test]
fn test_mqtt5_reason_code_uses_table_text() {
    let dir = TempDir::new().unwrap();
    let (port, broker) = fake_broker(135);

    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "[ERROR] MQTT broker rejected connection: Not authorized",
        ));

    broker.join().unwrap();
}

#[test]
fn test_unreachable_broker_fails_fast() {
    let dir = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let started = std::time::Instant::now();
    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(format!(
            "[ERROR] Could not reach MQTT broker at 127.0.0.1:{} -> ",
            port
        )));
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[test]
#[ignore = "waits out the full 20 second CONNACK timeout"]
fn test_silent_broker_times_out() {
    let dir = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let broker = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(25));
        drop(stream);
    });

    discovery_cmd(&dir)
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "[ERROR] Timed out waiting for MQTT CONNACK; broker unreachable or not responding.",
        ));

    broker.join().unwrap();
}
