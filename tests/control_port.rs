//! Integration tests for Tor control port communication
//!
//! Most tests run against a scripted fake control port on 127.0.0.1.
//! The real-daemon smoke test needs a running Tor with `ControlPort 9051`:
//! `cargo test --test control_port -- --ignored`

use rustrotate::config::TorConfig;
use rustrotate::error::ControlError;
use rustrotate::tor::{ControlChannel, TorControlChannel};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

enum Action {
    Reply(String),
    ReplyAndClose(String),
    Hang,
}

type CommandLog = Arc<Mutex<Vec<String>>>;

/// Spawn a fake control port that answers each command line via `respond`
async fn spawn_fake_tor<F>(respond: F) -> (u16, CommandLog)
where
    F: Fn(&str) -> Action + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let log: CommandLog = Arc::new(Mutex::new(Vec::new()));
    let server_log = Arc::clone(&log);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();

            while let Ok(Some(line)) = lines.next_line().await {
                server_log.lock().unwrap().push(line.clone());

                match respond(&line) {
                    Action::Reply(reply) => {
                        if write.write_all(reply.as_bytes()).await.is_err() || line == "QUIT" {
                            break;
                        }
                    },
                    Action::ReplyAndClose(reply) => {
                        let _ = write.write_all(reply.as_bytes()).await;
                        break;
                    },
                    Action::Hang => {},
                }
            }
        }
    });

    (port, log)
}

fn protocol_info(auth_line: &str) -> String {
    format!(
        "250-PROTOCOLINFO 1\r\n250-{}\r\n250-VERSION Tor=\"0.4.8.10\"\r\n250 OK\r\n",
        auth_line
    )
}

/// Well-behaved daemon offering the given AUTH line
fn daemon(auth_line: String) -> impl Fn(&str) -> Action + Send + 'static {
    move |line: &str| {
        if line.starts_with("PROTOCOLINFO") {
            Action::Reply(protocol_info(&auth_line))
        } else if line == "QUIT" {
            Action::Reply("250 closing connection\r\n".to_string())
        } else {
            Action::Reply("250 OK\r\n".to_string())
        }
    }
}

fn config_for(port: u16) -> TorConfig {
    TorConfig {
        control_host: "127.0.0.1".to_string(),
        control_port: port,
        control_timeout_secs: 1,
        ..TorConfig::default()
    }
}

fn commands(log: &CommandLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_null_auth_sequence() {
    let (port, log) = spawn_fake_tor(daemon("AUTH METHODS=NULL".to_string())).await;
    let channel = TorControlChannel::new(config_for(port));

    channel.renew(None).await.unwrap();

    assert_eq!(
        commands(&log),
        vec!["PROTOCOLINFO 1", "AUTHENTICATE", "SIGNAL NEWNYM", "QUIT"]
    );
}

#[tokio::test]
async fn test_password_auth_skips_protocolinfo() {
    let (port, log) = spawn_fake_tor(daemon("AUTH METHODS=HASHEDPASSWORD".to_string())).await;
    let channel = TorControlChannel::new(config_for(port));

    channel.renew(Some("hunter2")).await.unwrap();

    assert_eq!(
        commands(&log),
        vec!["AUTHENTICATE 68756e74657232", "SIGNAL NEWNYM", "QUIT"]
    );
}

#[tokio::test]
async fn test_cookie_auth_reads_advertised_file() {
    let mut cookie = tempfile::NamedTempFile::new().unwrap();
    cookie.write_all(&[0x01, 0x02, 0xfe, 0xff]).unwrap();
    let auth_line = format!(
        "AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE=\"{}\"",
        cookie.path().display()
    );

    let (port, log) = spawn_fake_tor(daemon(auth_line)).await;
    let channel = TorControlChannel::new(config_for(port));

    channel.renew(None).await.unwrap();

    let sent = commands(&log);
    assert_eq!(sent[1], "AUTHENTICATE 0102feff");
    assert_eq!(sent[2], "SIGNAL NEWNYM");
}

#[tokio::test]
async fn test_wrong_password_is_auth_error_and_session_closed() {
    let (port, log) = spawn_fake_tor(|line: &str| {
        if line.starts_with("AUTHENTICATE") {
            Action::Reply(
                "515 Authentication failed: Password did not match HashedControlPassword value from configuration\r\n"
                    .to_string(),
            )
        } else {
            Action::Reply("250 closing connection\r\n".to_string())
        }
    })
    .await;
    let channel = TorControlChannel::new(config_for(port));

    let err = channel.renew(Some("wrong")).await.unwrap_err();

    assert!(matches!(err, ControlError::Auth(_)), "got {:?}", err);
    assert!(err.to_string().contains("515"));
    let sent = commands(&log);
    assert!(!sent.iter().any(|c| c.starts_with("SIGNAL")));
    assert_eq!(sent.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_close_failure_does_not_mask_auth_error() {
    // Real Tor hangs up right after a failed AUTHENTICATE
    let (port, _log) = spawn_fake_tor(|_line: &str| {
        Action::ReplyAndClose("515 Authentication failed\r\n".to_string())
    })
    .await;
    let channel = TorControlChannel::new(config_for(port));

    let err = channel.renew(Some("wrong")).await.unwrap_err();
    assert!(matches!(err, ControlError::Auth(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_rejected_signal_is_signal_error() {
    let (port, log) = spawn_fake_tor(|line: &str| {
        if line.starts_with("SIGNAL") {
            Action::Reply("552 Unrecognized signal code \"NEWNYM\"\r\n".to_string())
        } else if line == "QUIT" {
            Action::Reply("250 closing connection\r\n".to_string())
        } else {
            Action::Reply("250 OK\r\n".to_string())
        }
    })
    .await;
    let channel = TorControlChannel::new(config_for(port));

    let err = channel.renew(Some("pw")).await.unwrap_err();

    assert!(matches!(err, ControlError::Signal(_)), "got {:?}", err);
    assert_eq!(commands(&log).last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_hashed_password_without_credential_is_config_error() {
    let (port, log) = spawn_fake_tor(daemon("AUTH METHODS=HASHEDPASSWORD".to_string())).await;
    let channel = TorControlChannel::new(config_for(port));

    let err = channel.renew(None).await.unwrap_err();

    assert!(matches!(err, ControlError::Auth(_)), "got {:?}", err);
    assert!(err.to_string().contains("requires a password"));
    assert_eq!(commands(&log), vec!["PROTOCOLINFO 1", "QUIT"]);
}

#[tokio::test]
async fn test_connection_refused_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let channel = TorControlChannel::new(config_for(port));
    let err = channel.renew(None).await.unwrap_err();

    assert!(matches!(err, ControlError::Connect { .. }), "got {:?}", err);
    assert_eq!(err.kind(), "connect");
}

#[tokio::test]
async fn test_unresponsive_daemon_times_out() {
    let (port, _log) = spawn_fake_tor(|line: &str| {
        if line.starts_with("SIGNAL") {
            Action::Hang
        } else {
            Action::Reply("250 OK\r\n".to_string())
        }
    })
    .await;
    let channel = TorControlChannel::new(config_for(port));

    let started = std::time::Instant::now();
    let err = channel.renew(Some("pw")).await.unwrap_err();

    assert!(matches!(err, ControlError::Signal(_)), "got {:?}", err);
    assert!(err.to_string().contains("no reply"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_timed_out_session_is_not_sent_quit() {
    let (port, log) = spawn_fake_tor(|line: &str| {
        if line.starts_with("SIGNAL") {
            Action::Hang
        } else {
            Action::Reply("250 OK\r\n".to_string())
        }
    })
    .await;
    let channel = TorControlChannel::new(config_for(port));

    let started = std::time::Instant::now();
    let err = channel.renew(Some("pw")).await.unwrap_err();

    assert!(matches!(err, ControlError::Signal(_)), "got {:?}", err);
    // One control timeout, not a second one spent waiting on QUIT
    assert!(started.elapsed() < Duration::from_millis(1900));
    assert!(!commands(&log).iter().any(|c| c == "QUIT"));
}

#[tokio::test]
async fn test_dropped_renew_closes_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (signal_tx, signal_rx) = oneshot::channel();
    let (eof_tx, eof_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut signal_tx = Some(signal_tx);

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.starts_with("SIGNAL") => {
                    // Never answer; let the client give up
                    if let Some(tx) = signal_tx.take() {
                        let _ = tx.send(());
                    }
                },
                Ok(Some(_)) => {
                    let _ = write.write_all(b"250 OK\r\n").await;
                },
                Ok(None) | Err(_) => {
                    let _ = eof_tx.send(());
                    return;
                },
            }
        }
    });

    let mut config = config_for(port);
    config.control_timeout_secs = 30;
    let channel = TorControlChannel::new(config);
    let renew = tokio::spawn(async move { channel.renew(Some("pw")).await });

    signal_rx.await.unwrap();
    renew.abort();
    assert!(renew.await.unwrap_err().is_cancelled());

    tokio::time::timeout(Duration::from_secs(5), eof_rx)
        .await
        .expect("daemon never saw the connection close")
        .unwrap();
}

#[tokio::test]
async fn test_each_renew_opens_a_new_session() {
    let (port, log) = spawn_fake_tor(daemon("AUTH METHODS=NULL".to_string())).await;
    let channel = TorControlChannel::new(config_for(port));

    channel.renew(None).await.unwrap();
    channel.renew(None).await.unwrap();

    let sent = commands(&log);
    assert_eq!(sent.iter().filter(|c| *c == "PROTOCOLINFO 1").count(), 2);
    assert_eq!(sent.iter().filter(|c| *c == "QUIT").count(), 2);
}

/// Check if Tor control port is available
fn tor_available() -> bool {
    std::net::TcpStream::connect("127.0.0.1:9051").is_ok()
}

#[tokio::test]
#[ignore = "requires running Tor daemon"]
async fn test_renew_against_local_tor() {
    if !tor_available() {
        eprintln!("Skipping: Tor control port not available");
        return;
    }

    let password = std::env::var("TOR_CONTROL_PASSWORD").ok();
    let channel = TorControlChannel::new(TorConfig::default());
    channel.renew(password.as_deref()).await.unwrap();
}
