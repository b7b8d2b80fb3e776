//! Namespace view of a calling process.
//!
//! Captured by the transport alongside each syscall event: the caller's
//! working directory and filesystem root as the *container* sees them, the
//! host paths behind its open descriptors, and its in-container identity.
//! Resolution must use this view, not the shim process's own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xattrust_common::types::Credentials;

/// Snapshot of a calling process's namespace context at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessContext {
    /// Process ID on the host.
    pub pid: u32,
    /// Working directory, absolute inside the container.
    pub cwd: PathBuf,
    /// Host path of the container's filesystem root.
    pub rootfs: PathBuf,
    /// Open descriptors: fd number to the host path it refers to.
    pub fd_table: HashMap<i32, PathBuf>,
    /// In-container identity of the process.
    pub credentials: Credentials,
}

impl ProcessContext {
    /// Creates a context rooted at `rootfs` with cwd `/` and no open
    /// descriptors.
    #[must_use]
    pub fn rooted(pid: u32, rootfs: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            pid,
            cwd: PathBuf::from("/"),
            rootfs: rootfs.into(),
            fd_table: HashMap::new(),
            credentials,
        }
    }

    /// Replaces the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Registers an open descriptor's host path.
    #[must_use]
    pub fn with_fd(mut self, fd: i32, host_path: impl Into<PathBuf>) -> Self {
        let _ = self.fd_table.insert(fd, host_path.into());
        self
    }

    /// Host path behind an open descriptor, if known.
    #[must_use]
    pub fn fd_path(&self, fd: i32) -> Option<&Path> {
        self.fd_table.get(&fd).map(PathBuf::as_path)
    }
}
