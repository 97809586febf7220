use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{self, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn ws(config_root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ws").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_root).env_remove("RUST_LOG");
    cmd
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn log_flag_without_a_log_file() {
    let root = TempDir::new().unwrap();

    for flag in ["-log", "--log"] {
        ws(root.path())
            .arg(flag)
            .assert()
            .success()
            .stdout(predicate::str::contains("Log file not found:"));
    }

    let config = fs::read_to_string(root.path().join("ws").join("config.json")).unwrap();
    assert!(config.contains("\n    \"LOG_LEVEL\": \"INFO\""));
    assert!(config.contains("\"MAX_BYTES\": 500000"));
    assert!(config.contains("\"BACKUP_COUNT\": 5"));
    assert!(config.contains("\"CRITICAL_PREFIX\""));
    assert!(config.contains("\"CURRENT_DIR\""));
}

#[test]
fn existing_config_values_are_kept() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("ws");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("config.json"),
        r#"{"LOG_LEVEL": "DEBUG", "MAX_BYTES": 0, "EXTRA": true}"#,
    )
    .unwrap();

    ws(root.path()).arg("-log").assert().success();

    let config = fs::read_to_string(dir.join("config.json")).unwrap();
    assert!(config.contains("\"LOG_LEVEL\": \"DEBUG\""));
    assert!(config.contains("\"MAX_BYTES\": 500000"));
    assert!(!config.contains("EXTRA"));
}

#[test]
fn refuses_a_port_that_is_already_bound() {
    let root = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let message = format!("There is already a web server running on port {port}.");

    ws(root.path())
        .arg(port.to_string())
        .assert()
        .code(1)
        .stdout(predicate::str::contains(message.as_str()));

    let log = fs::read_to_string(root.path().join("ws").join("ws.log")).unwrap();
    assert!(log.contains(&format!("ERROR: {message}")));

    ws(root.path())
        .arg("-log")
        .assert()
        .success()
        .stdout(predicate::str::contains(message.as_str()));
}

#[test]
fn console_level_does_not_filter_the_file() {
    let root = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    ws(root.path())
        .args(["-log-level", "critical", port.as_str()])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());

    let log = fs::read_to_string(root.path().join("ws").join("ws.log")).unwrap();
    assert!(log.contains("already a web server running"));
}

#[test]
fn rejects_unknown_log_levels() {
    let root = TempDir::new().unwrap();

    ws(root.path())
        .args(["-log-level", "verbose"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("verbose"));
}

#[test]
fn help_describes_the_port() {
    let root = TempDir::new().unwrap();

    ws(root.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Port number for the web server"))
        .stdout(predicate::str::contains("--serve").not());
}

fn connect_with_retry(port: u16, timeout: Duration) -> TcpStream {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => return stream,
            Err(e) if Instant::now() >= deadline => panic!("server never came up: {e}"),
            Err(_) => thread::sleep(Duration::from_millis(50)),
        }
    }
}

#[test]
fn serves_files_and_stops_on_interrupt() {
    let root = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    fs::write(site.path().join("hello.txt"), "hello from ws").unwrap();
    let port = free_port();

    let mut parent = process::Command::new(assert_cmd::cargo::cargo_bin("ws"))
        .arg(port.to_string())
        .current_dir(site.path())
        .stdin(Stdio::null())
        .env("XDG_CONFIG_HOME", root.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut stream = connect_with_retry(port, Duration::from_secs(10));
    stream
        .write_all(b"GET /hello.txt HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("hello from ws"));

    unsafe { libc::kill(parent.id() as libc::pid_t, libc::SIGINT) };

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = parent.try_wait().unwrap() {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = parent.kill();
            panic!("launcher did not exit after interrupt");
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(status.code(), Some(0));
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());

    let log = fs::read_to_string(root.path().join("ws").join("ws.log")).unwrap();
    assert!(log.contains(&format!("INFO: Starting web server on port {port}...")));
    assert!(log.contains(&format!("DEBUG: Web server on port {port} stopped.")));
}
