//! Tor Control Port client
//!
//! Opens a fresh session per renewal, authenticates, sends `SIGNAL NEWNYM`
//! and closes. Sessions never outlive a single request.

use super::protocol::{read_reply, ProtocolInfo, Reply};
use crate::config::TorConfig;
use crate::error::ControlError;
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Common cookie file locations
const COOKIE_PATHS: &[&str] = &[
    "/run/tor/control.authcookie",
    "/var/run/tor/control.authcookie",
    "/var/lib/tor/control_auth_cookie",
];

/// Something that can ask Tor for a new identity
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Request a fresh circuit. `credential` is the control port password, if any.
    async fn renew(&self, credential: Option<&str>) -> Result<(), ControlError>;
}

#[async_trait]
impl<T: ControlChannel + ?Sized> ControlChannel for std::sync::Arc<T> {
    async fn renew(&self, credential: Option<&str>) -> Result<(), ControlError> {
        (**self).renew(credential).await
    }
}

/// Control signals we send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Switch to clean circuits for new traffic
    NewNym,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewNym => "NEWNYM",
        }
    }
}

/// How a session authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Null,
    Password(String),
    Cookie(Vec<u8>),
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Password(_) => "password",
            Self::Cookie(_) => "cookie",
        }
    }

    fn command(&self) -> String {
        match self {
            Self::Null => "AUTHENTICATE\r\n".to_string(),
            // Tor accepts the password hex-encoded, which avoids quoting rules
            Self::Password(password) => format!(
                "AUTHENTICATE {}\r\n",
                data_encoding::HEXLOWER.encode(password.as_bytes())
            ),
            Self::Cookie(cookie) => {
                format!("AUTHENTICATE {}\r\n", data_encoding::HEXLOWER.encode(cookie))
            },
        }
    }
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick an auth method from PROTOCOLINFO when no password was configured.
///
/// NULL wins over cookie. A port that only offers HASHEDPASSWORD is a
/// configuration error, not something to guess around. SAFECOOKIE needs an
/// HMAC challenge we do not implement, so it is only usable when plain
/// COOKIE is offered too.
pub fn choose_auth(
    info: &ProtocolInfo,
    cookie_override: Option<&Path>,
) -> Result<AuthMethod, ControlError> {
    if info.supports("NULL") {
        return Ok(AuthMethod::Null);
    }

    if info.supports("COOKIE") {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = cookie_override {
            candidates.push(path.to_path_buf());
        }
        if let Some(path) = &info.cookie_file {
            candidates.push(PathBuf::from(path));
        }
        candidates.extend(COOKIE_PATHS.iter().map(PathBuf::from));

        for path in &candidates {
            match std::fs::read(path) {
                Ok(cookie) => {
                    debug!("Using auth cookie from {:?}", path);
                    return Ok(AuthMethod::Cookie(cookie));
                },
                Err(e) => debug!("Cookie {:?} not readable: {}", path, e),
            }
        }

        return Err(ControlError::Auth(format!(
            "cookie authentication required but no readable cookie file (tried {:?})",
            candidates
        )));
    }

    if info.supports("HASHEDPASSWORD") {
        return Err(ControlError::Auth(
            "control port requires a password but none was configured".to_string(),
        ));
    }

    if info.supports("SAFECOOKIE") {
        return Err(ControlError::Auth(
            "control port only offers SAFECOOKIE authentication, which is not supported; \
             configure a control password or enable plain cookie auth"
                .to_string(),
        ));
    }

    Err(ControlError::Auth(format!(
        "no supported authentication method offered (methods: {:?})",
        info.auth_methods
    )))
}

/// One control-port connection
pub struct ControlSession {
    stream: BufReader<TcpStream>,
    addr: String,
    io_timeout: Duration,
    authenticated: bool,
    /// A previous exchange failed mid-flight; the stream may hold a late reply
    broken: bool,
}

impl ControlSession {
    /// Connect to the control port
    pub async fn open(addr: &str, io_timeout: Duration) -> Result<Self, ControlError> {
        debug!("Connecting to Tor control port: {}", addr);

        let stream = match tokio::time::timeout(io_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ControlError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            },
            Err(_) => {
                return Err(ControlError::Connect {
                    addr: addr.to_string(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            },
        };

        Ok(Self {
            stream: BufReader::new(stream),
            addr: addr.to_string(),
            io_timeout,
            authenticated: false,
            broken: false,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Send a command and read its reply, bounded by the session timeout
    async fn command(&mut self, cmd: &str) -> io::Result<Reply> {
        // Never log AUTHENTICATE arguments
        let preview = if cmd.starts_with("AUTHENTICATE") {
            "AUTHENTICATE ****"
        } else {
            cmd.trim_end()
        };
        debug!("Sending Tor command: {}", preview);

        let limit = self.io_timeout;
        let result = with_timeout(limit, self.exchange(cmd)).await;
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    async fn exchange(&mut self, cmd: &str) -> io::Result<Reply> {
        self.stream.get_mut().write_all(cmd.as_bytes()).await?;
        self.stream.get_mut().flush().await?;
        read_reply(&mut self.stream).await
    }

    /// Ask which auth methods the daemon accepts
    pub async fn protocol_info(&mut self) -> Result<ProtocolInfo, ControlError> {
        let reply = self
            .command("PROTOCOLINFO 1\r\n")
            .await
            .map_err(|e| ControlError::Auth(format!("PROTOCOLINFO failed: {}", e)))?;

        if !reply.is_ok() {
            return Err(ControlError::Auth(format!(
                "PROTOCOLINFO rejected: {}",
                reply.summary()
            )));
        }

        let info = ProtocolInfo::parse(&reply);
        debug!(
            "Tor {} offers auth methods {:?}",
            info.tor_version.as_deref().unwrap_or("(unknown version)"),
            info.auth_methods
        );
        Ok(info)
    }

    pub async fn authenticate(&mut self, method: &AuthMethod) -> Result<(), ControlError> {
        let reply = self
            .command(&method.command())
            .await
            .map_err(|e| ControlError::Auth(format!("{} auth failed: {}", method.name(), e)))?;

        if !reply.is_ok() {
            return Err(ControlError::Auth(reply.summary()));
        }

        self.authenticated = true;
        debug!("Authenticated to {} with {} auth", self.addr, method.name());
        Ok(())
    }

    pub async fn signal(&mut self, signal: Signal) -> Result<(), ControlError> {
        let cmd = format!("SIGNAL {}\r\n", signal.as_str());
        let reply = self
            .command(&cmd)
            .await
            .map_err(|e| ControlError::Signal(format!("SIGNAL {}: {}", signal.as_str(), e)))?;

        if !reply.is_ok() {
            return Err(ControlError::Signal(reply.summary()));
        }
        Ok(())
    }

    /// Say QUIT and shut the socket down.
    ///
    /// After a timed-out or failed exchange the daemon is not asked again:
    /// the socket is just shut down.
    pub async fn close(mut self) -> io::Result<()> {
        if self.broken {
            debug!("Skipping QUIT on broken session to {}", self.addr);
            return self.stream.get_mut().shutdown().await;
        }

        let quit = self.command("QUIT\r\n").await;
        let shutdown = self.stream.get_mut().shutdown().await;
        quit?;
        shutdown
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no reply from Tor within {:?}", limit),
        )),
    }
}

/// Production control channel talking to a local Tor daemon
pub struct TorControlChannel {
    config: TorConfig,
}

impl TorControlChannel {
    pub fn new(config: TorConfig) -> Self {
        Self { config }
    }

    async fn authenticate_and_signal(
        &self,
        session: &mut ControlSession,
        credential: Option<&str>,
    ) -> Result<(), ControlError> {
        let method = match credential {
            Some(password) => AuthMethod::Password(password.to_string()),
            None => {
                let info = session.protocol_info().await?;
                choose_auth(&info, self.config.cookie_path.as_deref())?
            },
        };

        session.authenticate(&method).await?;
        session.signal(Signal::NewNym).await
    }
}

#[async_trait]
impl ControlChannel for TorControlChannel {
    async fn renew(&self, credential: Option<&str>) -> Result<(), ControlError> {
        let addr = self.config.control_addr();
        let mut session = ControlSession::open(&addr, self.config.control_timeout()).await?;

        let outcome = self.authenticate_and_signal(&mut session, credential).await;

        // Close on every path; a close failure never replaces the primary outcome
        if let Err(e) = session.close().await {
            warn!("Error closing control session to {}: {}", addr, e);
        }

        if outcome.is_ok() {
            info!("NEWNYM accepted by {}", addr);
        }
        outcome
    }
}
