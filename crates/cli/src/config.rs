//! Run configuration, assembled once by the binary and passed down.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use apfleet_recon::{ExportOptions, FieldCatalogue, ReconError};

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LOG_DIR: &str = "logs";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// A hosts or catalogue file could not be read.
    Read { path: PathBuf, message: String },
    /// Hosts file present but lists no devices.
    EmptyDeviceList(PathBuf),
    /// Neither the given nor a default hosts file exists.
    NoHostsFile(Vec<PathBuf>),
    Catalogue(ReconError),
    MissingCredential(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, message } => {
                write!(f, "cannot read {}: {}", path.display(), message)
            }
            ConfigError::EmptyDeviceList(path) => {
                write!(f, "no devices listed in {}", path.display())
            }
            ConfigError::NoHostsFile(tried) => {
                let names: Vec<String> = tried.iter().map(|p| p.display().to_string()).collect();
                write!(f, "no hosts file found (tried {})", names.join(", "))
            }
            ConfigError::Catalogue(e) => write!(f, "{}", e),
            ConfigError::MissingCredential(what) => write!(f, "{} must not be empty", what),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ReconError> for ConfigError {
    fn from(e: ReconError) -> Self {
        ConfigError::Catalogue(e)
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Enable secret; `None` leaves the session in user exec mode.
    pub enable_secret: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        enable_secret: Option<String>,
    ) -> Result<Self, ConfigError> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(ConfigError::MissingCredential("username"));
        }
        if password.is_empty() {
            return Err(ConfigError::MissingCredential("password"));
        }
        Ok(Self {
            username,
            password,
            enable_secret: enable_secret.filter(|s| !s.is_empty()),
        })
    }
}

// Secrets never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "enable_secret",
                &self.enable_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept whatever key the device presents.
    AcceptAny,
    /// Check against an OpenSSH known_hosts file.
    KnownHosts {
        path: PathBuf,
        /// Record unknown keys instead of refusing them.
        trust_on_first_use: bool,
    },
}

impl HostKeyPolicy {
    /// `~` is expanded.
    pub fn known_hosts(path: &str, trust_on_first_use: bool) -> Self {
        HostKeyPolicy::KnownHosts {
            path: PathBuf::from(shellexpand::tilde(path).into_owned()),
            trust_on_first_use,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub port: u16,
    pub connect_timeout: Duration,
    /// Max wait for a command's output to end in a prompt.
    pub read_timeout: Duration,
    pub credentials: Credentials,
    pub host_key: HostKeyPolicy,
}

impl ConnectionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            credentials,
            host_key: HostKeyPolicy::AcceptAny,
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub export: ExportOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            export: ExportOptions::default(),
        }
    }
}

/// Built-in catalogue, or the validated TOML file at `path`.
pub fn load_catalogue(path: Option<&Path>) -> Result<FieldCatalogue, ConfigError> {
    let Some(path) = path else {
        return Ok(FieldCatalogue::wireless_default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(FieldCatalogue::from_toml(&text)?)
}
