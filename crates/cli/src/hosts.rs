//! Device list files: one host per line, `#` comments and blank lines ignored.

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Tried in order when no hosts file is given.
pub const DEFAULT_HOSTS_FILES: [&str; 2] = ["wlc.txt", "aps.txt"];

/// Hosts in file order. Inline `# ...` after a host is dropped.
pub fn parse_device_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|host| !host.is_empty())
        .map(String::from)
        .collect()
}

pub fn read_device_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let devices = parse_device_list(&text);
    if devices.is_empty() {
        return Err(ConfigError::EmptyDeviceList(path.to_path_buf()));
    }
    Ok(devices)
}

/// The explicit file if given, otherwise the first default that exists in `dir`.
pub fn resolve_hosts_file(explicit: Option<&Path>, dir: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let candidates: Vec<PathBuf> = DEFAULT_HOSTS_FILES.iter().map(|n| dir.join(n)).collect();
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(ConfigError::NoHostsFile(candidates))
}
