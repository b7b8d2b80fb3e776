//! Domain primitive types used across the xattrust workspace.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XattrustError};

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Linux capability identifiers relevant to attribute virtualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Allow changing file ownership.
    Chown,
    /// Bypass file read/write/execute permission checks.
    DacOverride,
    /// Bypass owner checks on operations normally restricted to the owner.
    Fowner,
    /// Allow setting group IDs.
    Setgid,
    /// Allow setting user IDs.
    Setuid,
    /// Administrative capability; gates the `trusted.*` attribute namespace.
    SysAdmin,
}

impl Capability {
    /// Bit position of this capability in the kernel's capability masks.
    #[must_use]
    pub const fn bit(self) -> u64 {
        match self {
            Self::Chown => 0,
            Self::DacOverride => 1,
            Self::Fowner => 3,
            Self::Setgid => 6,
            Self::Setuid => 7,
            Self::SysAdmin => 21,
        }
    }
}

/// A set of effective capabilities, stored as the kernel's bitmask form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(u64);

impl CapabilitySet {
    /// The empty capability set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates a set from a raw kernel bitmask (e.g. `CapEff`).
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the set with the given capability added.
    #[must_use]
    pub const fn with(self, cap: Capability) -> Self {
        Self(self.0 | (1 << cap.bit()))
    }

    /// Whether the set contains the given capability.
    #[must_use]
    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & (1 << cap.bit()) != 0
    }

    /// Raw bitmask form.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

/// In-container identity of a calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User ID as seen inside the container.
    pub uid: u32,
    /// Group ID as seen inside the container.
    pub gid: u32,
    /// Effective capability set inside the container's user namespace.
    pub effective: CapabilitySet,
}

impl Credentials {
    /// Credentials of the container's root user holding the administrative
    /// capability.
    #[must_use]
    pub const fn container_root() -> Self {
        Self {
            uid: 0,
            gid: 0,
            effective: CapabilitySet::empty().with(Capability::SysAdmin),
        }
    }

    /// Unprivileged credentials for the given uid/gid.
    #[must_use]
    pub const fn unprivileged(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            effective: CapabilitySet::empty(),
        }
    }
}

/// A single uid or gid mapping between a container's user namespace and
/// the host, the same triple the kernel accepts in `/proc/[pid]/uid_map`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    /// First ID inside the container.
    pub container_id: u32,
    /// First ID on the host it maps to.
    pub host_id: u32,
    /// Number of consecutive IDs covered by the mapping.
    pub range: u32,
}

impl IdMapping {
    /// The identity mapping covering the full 32-bit range.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            container_id: 0,
            host_id: 0,
            range: u32::MAX,
        }
    }

    /// Parses a mapping from the `/proc/[pid]/uid_map` line format
    /// (`<container> <host> <range>`).
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not contain exactly three
    /// unsigned integers or if the range is zero.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [container, host, range] = fields.as_slice() else {
            return Err(XattrustError::Config {
                message: format!("invalid id mapping: {line:?}"),
            });
        };
        let parse_field = |s: &str| {
            s.parse::<u32>().map_err(|_| XattrustError::Config {
                message: format!("invalid id mapping field: {s:?}"),
            })
        };
        let mapping = Self {
            container_id: parse_field(container)?,
            host_id: parse_field(host)?,
            range: parse_field(range)?,
        };
        if mapping.range == 0 {
            return Err(XattrustError::Config {
                message: format!("empty id mapping range: {line:?}"),
            });
        }
        Ok(mapping)
    }

    /// Reads the first mapping line of a live process's map file
    /// (`uid_map` or `gid_map`).
    ///
    /// # Errors
    ///
    /// Returns an error if the proc file cannot be read or holds no
    /// parsable mapping.
    pub fn from_proc(pid: u32, map: &str) -> Result<Self> {
        let path = format!("/proc/{pid}/{map}");
        let content =
            std::fs::read_to_string(&path).map_err(|e| XattrustError::Io {
                path: Path::new(&path).to_path_buf(),
                source: e,
            })?;
        let line = content.lines().next().ok_or_else(|| XattrustError::Config {
            message: format!("no mapping present in {path}"),
        })?;
        Self::parse(line)
    }

    /// Translates a container-side ID to its host-side counterpart.
    #[must_use]
    pub fn to_host(&self, container_id: u32) -> Option<u32> {
        let offset = container_id.checked_sub(self.container_id)?;
        (offset < self.range).then_some(self.host_id + offset)
    }

    /// Translates a host-side ID back to its container-side counterpart.
    #[must_use]
    pub fn to_container(&self, host_id: u32) -> Option<u32> {
        let offset = host_id.checked_sub(self.host_id)?;
        (offset < self.range).then_some(self.container_id + offset)
    }
}
