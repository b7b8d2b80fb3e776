//! Per-container configuration model for the xattrust shim.
//!
//! The policy toggle and id mappings are loaded once when a container
//! starts and stay immutable for the container's lifetime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, XattrustError};
use crate::types::{ContainerId, IdMapping};

/// Root configuration for one shim instance (one container).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShimConfig {
    /// Container this shim serves.
    pub container: ContainerId,
    /// Unix socket the shim listens on.
    pub socket: PathBuf,
    /// Whether `trusted.*` emulation is active.
    pub allow_trusted_xattr: bool,
    /// Honored trusted attribute suffixes (without the `trusted.` prefix).
    pub honored: Vec<String>,
    /// uid mapping of the container's user namespace.
    pub uid_map: IdMapping,
    /// gid mapping of the container's user namespace.
    pub gid_map: IdMapping,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            container: ContainerId::generate(),
            socket: PathBuf::from(constants::DEFAULT_SOCKET),
            allow_trusted_xattr: true,
            honored: vec![constants::OVERLAY_OPAQUE.to_string()],
            uid_map: IdMapping::identity(),
            gid_map: IdMapping::identity(),
        }
    }
}

impl ShimConfig {
    /// Builds a configuration from the process environment, falling back
    /// to defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable holds an unparsable value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(constants::ENV_TRUSTED_XATTR) {
            config.allow_trusted_xattr = parse_bool(&raw)?;
        }
        if let Ok(raw) = std::env::var(constants::ENV_HONORED) {
            config.honored = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(raw) = std::env::var(constants::ENV_UID_MAP) {
            config.uid_map = IdMapping::parse(&raw)?;
        }
        if let Ok(raw) = std::env::var(constants::ENV_GID_MAP) {
            config.gid_map = IdMapping::parse(&raw)?;
        }
        if let Ok(raw) = std::env::var(constants::ENV_SOCKET) {
            config.socket = PathBuf::from(raw);
        }

        Ok(config)
    }

    /// Loads both id mappings from a live process's proc files, replacing
    /// whatever the environment provided.
    ///
    /// # Errors
    ///
    /// Returns an error if either map file cannot be read or parsed.
    pub fn with_proc_mappings(mut self, pid: u32) -> Result<Self> {
        self.uid_map = IdMapping::from_proc(pid, "uid_map")?;
        self.gid_map = IdMapping::from_proc(pid, "gid_map")?;
        Ok(self)
    }
}

/// Parses an environment-style boolean (`1/0`, `true/false`, `yes/no`,
/// `on/off`, case-insensitive).
fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(XattrustError::Config {
            message: format!("invalid boolean value: {other:?}"),
        }),
    }
}
