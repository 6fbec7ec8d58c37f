//! SSH transport: one interactive shell per controller over libssh2.
//!
//! Controllers are driven through a PTY shell rather than exec channels,
//! because `terminal length 0` and `enable` only persist within a shell.
//! Output for a command is everything between the echoed command line and
//! the next prompt.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use ssh2::{CheckResult, HostKeyType, KnownHostFileKind, KnownHostKeyFormat};

use crate::config::{ConnectionConfig, HostKeyPolicy};
use crate::session::{Connector, SessionClient, SessionError};

/// Gap between polls of a non-blocking channel.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// libssh2 LIBSSH2_ERROR_TIMEOUT.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

static PROMPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\S+?)([>#])$").unwrap());
static PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)password:\s*$").unwrap());

// ============================================================================
// Connector
// ============================================================================

pub struct SshConnector {
    config: ConnectionConfig,
}

impl SshConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

impl Connector for SshConnector {
    type Client = SshClient;

    fn connect(&self, device_id: &str) -> Result<SshClient, SessionError> {
        let cfg = &self.config;
        let addr = (device_id, cfg.port)
            .to_socket_addrs()
            .map_err(|e| SessionError::ConnectionFailed(format!("resolve {device_id}: {e}")))?
            .next()
            .ok_or_else(|| {
                SessionError::ConnectionFailed(format!("{device_id} resolved to no address"))
            })?;

        log::debug!("{device_id}: connecting to {addr}");
        let tcp = TcpStream::connect_timeout(&addr, cfg.connect_timeout).map_err(|e| {
            if e.kind() == ErrorKind::TimedOut {
                SessionError::Timeout(format!(
                    "TCP connect to {addr} after {}s",
                    cfg.connect_timeout.as_secs()
                ))
            } else {
                SessionError::ConnectionFailed(format!("TCP connect to {addr}: {e}"))
            }
        })?;

        let mut session = ssh2::Session::new()
            .map_err(|e| SessionError::ConnectionFailed(format!("create SSH session: {e}")))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(millis(cfg.connect_timeout));
        session
            .handshake()
            .map_err(|e| classify(e, &format!("SSH handshake with {device_id}")))?;

        let fingerprint = verify_host_key(&session, device_id, cfg.port, &cfg.host_key)?;
        log::debug!("{device_id}: host key {fingerprint}");

        let creds = &cfg.credentials;
        session
            .userauth_password(&creds.username, &creds.password)
            .map_err(|e| {
                if is_timeout(&e) {
                    SessionError::Timeout(format!("authentication with {device_id}"))
                } else {
                    SessionError::AuthFailed(format!("{}@{device_id}: {e}", creds.username))
                }
            })?;
        if !session.authenticated() {
            return Err(SessionError::AuthFailed(format!(
                "{}@{device_id}: not authenticated after password attempt",
                creds.username
            )));
        }

        let mut channel = session
            .channel_session()
            .map_err(|e| classify(e, "open channel"))?;
        channel
            .request_pty("vt100", None, Some((511, 24, 0, 0)))
            .map_err(|e| classify(e, "request PTY"))?;
        channel.shell().map_err(|e| classify(e, "start shell"))?;

        let mut client = SshClient {
            session,
            channel,
            prompt: String::new(),
            read_timeout: cfg.read_timeout,
        };

        let banner = client.read_until(cfg.connect_timeout, |buf| last_prompt(buf).is_some())?;
        client.prompt = last_prompt(&banner).unwrap_or_default();
        log::debug!("{device_id}: prompt '{}'", client.prompt);

        if let Some(secret) = &creds.enable_secret {
            client.enable(secret, cfg.connect_timeout)?;
        }
        client.prepare_terminal()?;

        Ok(client)
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct SshClient {
    session: ssh2::Session,
    channel: ssh2::Channel,
    prompt: String,
    read_timeout: Duration,
}

impl SshClient {
    fn send(&mut self, line: &str) -> Result<(), SessionError> {
        self.session.set_blocking(true);
        self.channel
            .write_all(format!("{line}\n").as_bytes())
            .and_then(|_| self.channel.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => SessionError::ConnectionClosed,
                _ => SessionError::Execution {
                    command: line.to_string(),
                    message: format!("write failed: {e}"),
                },
            })
    }

    /// Read until `done` holds for the accumulated text or `timeout` elapses.
    fn read_until(
        &mut self,
        timeout: Duration,
        done: impl Fn(&str) -> bool,
    ) -> Result<String, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 8192];

        self.session.set_blocking(false);
        let result = loop {
            match self.channel.read(&mut chunk) {
                Ok(0) if self.channel.eof() => break Err(SessionError::ConnectionClosed),
                Ok(0) => thread::sleep(POLL_INTERVAL),
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf);
                    if done(&text) {
                        break Ok(text.into_owned());
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    break Err(SessionError::Execution {
                        command: String::new(),
                        message: format!("read failed: {e}"),
                    })
                }
            }
            if Instant::now() >= deadline {
                break Err(SessionError::Timeout(format!(
                    "no prompt within {}s",
                    timeout.as_secs()
                )));
            }
        };
        self.session.set_blocking(true);
        result
    }

    /// Wait for the device prompt, tolerating the `>`/`#` mode change.
    fn read_to_prompt(&mut self, timeout: Duration) -> Result<String, SessionError> {
        let host = prompt_host(&self.prompt).to_string();
        let text = self.read_until(timeout, |buf| {
            last_prompt(buf).is_some_and(|p| p.starts_with(&host))
        })?;
        if let Some(p) = last_prompt(&text) {
            self.prompt = p;
        }
        Ok(text)
    }

    fn enable(&mut self, secret: &str, timeout: Duration) -> Result<(), SessionError> {
        if self.prompt.ends_with('#') {
            return Ok(());
        }
        self.send("enable")?;
        let host = prompt_host(&self.prompt).to_string();
        let reply = self.read_until(timeout, |buf| {
            PASSWORD_PROMPT.is_match(buf) || last_prompt(buf).is_some_and(|p| p.starts_with(&host))
        })?;
        if PASSWORD_PROMPT.is_match(&reply) {
            self.send(secret)?;
            self.read_to_prompt(timeout)?;
        } else if let Some(p) = last_prompt(&reply) {
            self.prompt = p;
        }
        if !self.prompt.ends_with('#') {
            return Err(SessionError::AuthFailed("enable secret rejected".into()));
        }
        Ok(())
    }

    fn prepare_terminal(&mut self) -> Result<(), SessionError> {
        for command in ["terminal length 0", "terminal width 0"] {
            self.send(command)?;
            self.read_to_prompt(self.read_timeout)
                .map_err(|e| with_command(e, command))?;
        }
        Ok(())
    }
}

impl SessionClient for SshClient {
    fn execute(&mut self, command: &str) -> Result<String, SessionError> {
        self.send(command)?;
        let raw = self
            .read_to_prompt(self.read_timeout)
            .map_err(|e| with_command(e, command))?;
        Ok(clean_output(&raw, command))
    }

    fn prompt(&self) -> Option<&str> {
        (!self.prompt.is_empty()).then_some(self.prompt.as_str())
    }

    fn close(&mut self) {
        let _ = self.channel.send_eof();
        let _ = self.channel.close();
        let _ = self.session.disconnect(None, "apfleet done", None);
    }
}

// ============================================================================
// Output shaping
// ============================================================================

/// Prompt on the last non-blank line of `buf`, if any.
fn last_prompt(buf: &str) -> Option<String> {
    let line = buf
        .lines()
        .map(|l| l.trim_end_matches('\r').trim())
        .rev()
        .find(|l| !l.is_empty())?;
    PROMPT.is_match(line).then(|| line.to_string())
}

fn prompt_host(prompt: &str) -> &str {
    prompt.trim_end_matches(['>', '#'])
}

/// Drop CRs, the echoed command line and the trailing prompt line.
fn clean_output(raw: &str, command: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "");
    let mut lines: Vec<&str> = text.lines().collect();

    if lines.last().is_some_and(|l| PROMPT.is_match(l.trim())) {
        lines.pop();
    }
    if let Some(pos) = lines.iter().position(|l| l.trim_end().ends_with(command)) {
        if pos <= 1 {
            lines.drain(..=pos);
        }
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn with_command(error: SessionError, command: &str) -> SessionError {
    match error {
        SessionError::Execution { message, .. } => SessionError::Execution {
            command: command.to_string(),
            message,
        },
        SessionError::Timeout(message) => SessionError::Timeout(format!("'{command}': {message}")),
        other => other,
    }
}

// ============================================================================
// libssh2 helpers
// ============================================================================

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

fn is_timeout(e: &ssh2::Error) -> bool {
    matches!(e.code(), ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT))
}

/// Pre-shell failures: timeouts keep their kind, the rest are connection failures.
fn classify(e: ssh2::Error, what: &str) -> SessionError {
    if is_timeout(&e) {
        SessionError::Timeout(what.to_string())
    } else {
        SessionError::ConnectionFailed(format!("{what}: {e}"))
    }
}

fn fingerprint(key: &[u8]) -> String {
    use sha2::Digest;
    let hash = sha2::Sha256::digest(key);
    format!(
        "SHA256:{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD_NO_PAD, hash),
    )
}

/// Check the presented host key against `policy`; returns its fingerprint.
fn verify_host_key(
    session: &ssh2::Session,
    host: &str,
    port: u16,
    policy: &HostKeyPolicy,
) -> Result<String, SessionError> {
    let (key, key_type) = session
        .host_key()
        .ok_or_else(|| SessionError::HostKey(format!("{host} did not present a host key")))?;
    let presented = fingerprint(key);

    let HostKeyPolicy::KnownHosts {
        path,
        trust_on_first_use,
    } = policy
    else {
        return Ok(presented);
    };

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| SessionError::HostKey(format!("init known_hosts: {e}")))?;
    if path.exists() {
        known_hosts
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|e| SessionError::HostKey(format!("read {}: {e}", path.display())))?;
    }

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(presented),
        CheckResult::NotFound if *trust_on_first_use => {
            let format = match key_type {
                HostKeyType::Rsa => KnownHostKeyFormat::SshRsa,
                HostKeyType::Dss => KnownHostKeyFormat::SshDss,
                HostKeyType::Ed25519 => KnownHostKeyFormat::Ed25519,
                HostKeyType::Ecdsa256 => KnownHostKeyFormat::Ecdsa256,
                HostKeyType::Ecdsa384 => KnownHostKeyFormat::Ecdsa384,
                HostKeyType::Ecdsa521 => KnownHostKeyFormat::Ecdsa521,
                other => {
                    return Err(SessionError::HostKey(format!(
                        "unsupported host key type {other:?}"
                    )))
                }
            };
            let entry = if port == 22 {
                host.to_string()
            } else {
                format!("[{host}]:{port}")
            };
            known_hosts
                .add(&entry, key, "added by apfleet", format)
                .map_err(|e| SessionError::HostKey(format!("add {host}: {e}")))?;
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            known_hosts
                .write_file(path, KnownHostFileKind::OpenSSH)
                .map_err(|e| SessionError::HostKey(format!("write {}: {e}", path.display())))?;
            log::info!("{host}: trusted new host key {presented}");
            Ok(presented)
        }
        CheckResult::NotFound => Err(SessionError::HostKey(format!(
            "{host}:{port} not in {} (presented {presented})",
            path.display()
        ))),
        CheckResult::Mismatch => Err(SessionError::HostKey(format!(
            "{host}:{port} key does not match {} (presented {presented})",
            path.display()
        ))),
        CheckResult::Failure => Err(SessionError::HostKey(format!(
            "{host}:{port}: known_hosts check failed"
        ))),
    }
}
