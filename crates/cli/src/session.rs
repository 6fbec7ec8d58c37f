//! Remote session abstraction and the bookended command runner.
//!
//! A [`Connector`] opens a [`SessionClient`] per device; [`SessionRunner`]
//! runs the timing probe, the data commands and the timing probe again over
//! that one client, recording raw output, timestamps and a transcript.

use chrono::{DateTime, Local};

use crate::transcript;

// ============================================================================
// Transport seam
// ============================================================================

/// One open, authenticated shell on a device.
pub trait SessionClient {
    /// Run `command` and return its output with echo and prompt removed.
    fn execute(&mut self, command: &str) -> Result<String, SessionError>;

    /// Device prompt as detected at login, if the transport knows it.
    fn prompt(&self) -> Option<&str> {
        None
    }

    /// Close the session. Errors are not reported.
    fn close(&mut self) {}
}

/// Opens sessions. Connection parameters are fixed at construction.
pub trait Connector {
    type Client: SessionClient;

    fn connect(&self, device_id: &str) -> Result<Self::Client, SessionError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while talking to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Connect or read exceeded the configured timeout.
    Timeout(String),
    AuthFailed(String),
    ConnectionFailed(String),
    /// Host key unknown or mismatched.
    HostKey(String),
    /// A command could not be completed on an open session.
    Execution { command: String, message: String },
    ConnectionClosed,
}

impl SessionError {
    /// True for failures before a usable shell existed.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::AuthFailed(_) | Self::ConnectionFailed(_) | Self::HostKey(_)
        )
    }

    /// Short machine-readable kind, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::AuthFailed(_) => "auth_failed",
            Self::ConnectionFailed(_) => "connect_failed",
            Self::HostKey(_) => "host_key",
            Self::Execution { .. } => "execution_failed",
            Self::ConnectionClosed => "connection_closed",
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            SessionError::AuthFailed(msg) => write!(f, "Authentication failed: {}", msg),
            SessionError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            SessionError::HostKey(msg) => write!(f, "Host key verification failed: {}", msg),
            SessionError::Execution { command, message } => {
                write!(f, "Command '{}' failed: {}", command, message)
            }
            SessionError::ConnectionClosed => write!(f, "Connection closed by device"),
        }
    }
}

impl std::error::Error for SessionError {}

// ============================================================================
// Session record
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CommandExecution {
    pub command: String,
    pub output: String,
    /// Local time the command completed.
    pub timestamp: DateTime<Local>,
}

/// Everything captured from one device session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub device_id: String,
    pub executions: Vec<CommandExecution>,
    pub transcript: String,
}

impl Session {
    fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            ..Self::default()
        }
    }

    /// Last − first timestamp, only when the first and last executions are
    /// the same (timing probe) command.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        let first = self.executions.first()?;
        let last = self.executions.last()?;
        if self.executions.len() < 2 || first.command != last.command {
            return None;
        }
        Some(last.timestamp - first.timestamp)
    }

    /// Raw output of a data command, skipping the bookend probes. The last
    /// execution is only a probe when the session ran to completion.
    pub fn output_for(&self, command: &str) -> Option<&str> {
        let closing = match self.elapsed() {
            Some(_) => self.executions.len() - 1,
            None => self.executions.len(),
        };
        self.executions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 0 && *i != closing)
            .find(|(_, e)| e.command == command)
            .map(|(_, e)| e.output.as_str())
    }
}

/// Session aborted part way. `partial` holds whatever ran before the error.
#[derive(Debug)]
pub struct SessionFailure {
    pub error: SessionError,
    pub partial: Session,
}

// ============================================================================
// Runner
// ============================================================================

pub struct SessionRunner {
    timing_probe: String,
}

impl SessionRunner {
    pub fn new(timing_probe: impl Into<String>) -> Self {
        Self {
            timing_probe: timing_probe.into(),
        }
    }

    /// Run probe, each command in order, probe again. Stops at the first
    /// failing command; output already captured is returned in the failure.
    pub fn run<C: SessionClient + ?Sized>(
        &self,
        client: &mut C,
        device_id: &str,
        commands: &[&str],
    ) -> Result<Session, SessionFailure> {
        let mut session = Session::new(device_id);
        let prompt = client
            .prompt()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{device_id}#"));

        let plan = std::iter::once(self.timing_probe.as_str())
            .chain(commands.iter().copied())
            .chain(std::iter::once(self.timing_probe.as_str()));

        for command in plan {
            log::debug!("{device_id}: executing '{command}'");
            match client.execute(command) {
                Ok(output) => {
                    session
                        .transcript
                        .push_str(&transcript::render_block(&prompt, command, &output));
                    session.executions.push(CommandExecution {
                        command: command.to_string(),
                        output,
                        timestamp: Local::now(),
                    });
                }
                Err(error) => {
                    session
                        .transcript
                        .push_str(&transcript::render_failure(&prompt, command, &error));
                    return Err(SessionFailure {
                        error,
                        partial: session,
                    });
                }
            }
        }

        Ok(session)
    }
}

// ============================================================================
// Tests
// ============================================================================
