//! Privileged proxy execution.
//!
//! The [`PrivilegedExecutor`] trait is the seam to the execution context
//! holding the initial-namespace administrative capability; how that
//! capability is obtained is a collaborator concern. [`HostExecutor`] is
//! the in-process implementation used when the shim itself carries the
//! capability: raw xattr syscalls against the resolved host path, errno
//! propagated verbatim, never retried.

use nix::errno::Errno;
use xattrust_common::error::{Result, XattrustError};
use xattrust_common::types::{Capability, CapabilitySet};

use crate::classify::SetFlags;
use crate::resolve::ResolvedTarget;

/// Executes real attribute syscalls with elevated privilege.
///
/// Implementations write physically persisted kernel state: an emulated
/// opaque marker must be honored by the real overlay driver when the
/// directory is later used as a layer.
pub trait PrivilegedExecutor: Send + Sync {
    /// Reads the full value of one attribute.
    ///
    /// # Errors
    ///
    /// The errno the real syscall produced, verbatim.
    fn get(&self, target: &ResolvedTarget, name: &str, follow: bool) -> std::result::Result<Vec<u8>, Errno>;

    /// Writes one attribute.
    ///
    /// # Errors
    ///
    /// The errno the real syscall produced, verbatim.
    fn set(
        &self,
        target: &ResolvedTarget,
        name: &str,
        value: &[u8],
        flags: SetFlags,
        follow: bool,
    ) -> std::result::Result<(), Errno>;

    /// Enumerates all attribute names, unfiltered.
    ///
    /// # Errors
    ///
    /// The errno the real syscall produced, verbatim.
    fn list(&self, target: &ResolvedTarget, follow: bool) -> std::result::Result<Vec<String>, Errno>;

    /// Removes one attribute.
    ///
    /// # Errors
    ///
    /// The errno the real syscall produced, verbatim.
    fn remove(&self, target: &ResolvedTarget, name: &str, follow: bool)
        -> std::result::Result<(), Errno>;
}

/// Reads the effective capability set of the current process from
/// `/proc/self/status`.
///
/// # Errors
///
/// Returns an error if the status file cannot be read or carries no
/// parsable `CapEff` line.
#[cfg(target_os = "linux")]
pub fn effective_capabilities() -> Result<CapabilitySet> {
    let path = "/proc/self/status";
    let status = std::fs::read_to_string(path).map_err(|e| XattrustError::Io {
        path: path.into(),
        source: e,
    })?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("CapEff:") {
            let bits = u64::from_str_radix(rest.trim(), 16).map_err(|_| XattrustError::Config {
                message: format!("unparsable CapEff line: {line:?}"),
            })?;
            return Ok(CapabilitySet::from_bits(bits));
        }
    }
    Err(XattrustError::Config {
        message: "CapEff not present in /proc/self/status".into(),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — capability inspection requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn effective_capabilities() -> Result<CapabilitySet> {
    Err(XattrustError::Config {
        message: "Linux required for capability inspection".into(),
    })
}

/// In-process executor performing real xattr syscalls.
#[derive(Debug, Clone, Copy)]
pub struct HostExecutor {
    _priv: (),
}

impl HostExecutor {
    /// Creates an executor after verifying the process holds the
    /// administrative capability. A missing capability is a fatal
    /// configuration fault for the container, not a per-call error.
    ///
    /// # Errors
    ///
    /// Returns a permission error when `CAP_SYS_ADMIN` is absent from the
    /// effective set, or a configuration error off Linux.
    pub fn new() -> Result<Self> {
        let caps = effective_capabilities()?;
        if !caps.contains(Capability::SysAdmin) {
            return Err(XattrustError::PermissionDenied {
                message: "privileged execution unavailable: CAP_SYS_ADMIN missing from the effective set"
                    .into(),
            });
        }
        tracing::debug!("privileged executor ready");
        Ok(Self { _priv: () })
    }

    /// Creates an executor without the capability preflight. Operations
    /// needing privilege then fail with the kernel's own codes.
    #[must_use]
    pub const fn unchecked() -> Self {
        Self { _priv: () }
    }
}

#[cfg(target_os = "linux")]
impl PrivilegedExecutor for HostExecutor {
    fn get(&self, target: &ResolvedTarget, name: &str, follow: bool) -> std::result::Result<Vec<u8>, Errno> {
        let path = sys::c_path(&target.host_path)?;
        let name = sys::c_name(name)?;
        // The value may grow between the size query and the fetch; retry
        // until a fetch fits.
        loop {
            let size = sys::getxattr(&path, &name, &mut [], follow)?;
            if size == 0 {
                return Ok(Vec::new());
            }
            let mut buf = vec![0u8; size];
            match sys::getxattr(&path, &name, &mut buf, follow) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(Errno::ERANGE) => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn set(
        &self,
        target: &ResolvedTarget,
        name: &str,
        value: &[u8],
        flags: SetFlags,
        follow: bool,
    ) -> std::result::Result<(), Errno> {
        let path = sys::c_path(&target.host_path)?;
        let name = sys::c_name(name)?;
        sys::setxattr(&path, &name, value, flags.bits(), follow)?;
        tracing::debug!(path = %target.host_path.display(), name = %name.to_string_lossy(), "attribute written via proxy");
        Ok(())
    }

    fn list(&self, target: &ResolvedTarget, follow: bool) -> std::result::Result<Vec<String>, Errno> {
        let path = sys::c_path(&target.host_path)?;
        loop {
            let size = sys::listxattr(&path, &mut [], follow)?;
            if size == 0 {
                return Ok(Vec::new());
            }
            let mut buf = vec![0u8; size];
            match sys::listxattr(&path, &mut buf, follow) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(split_names(&buf));
                }
                Err(Errno::ERANGE) => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn remove(
        &self,
        target: &ResolvedTarget,
        name: &str,
        follow: bool,
    ) -> std::result::Result<(), Errno> {
        let path = sys::c_path(&target.host_path)?;
        let name = sys::c_name(name)?;
        sys::removexattr(&path, &name, follow)
    }
}

/// Splits a NUL-terminated name list into individual names.
#[must_use]
pub fn split_names(buf: &[u8]) -> Vec<String> {
    buf.split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Thin unsafe wrappers over the xattr syscall family. Confined here so
/// every call site checks the return value and maps errno.
#[cfg(target_os = "linux")]
#[allow(unsafe_code, clippy::cast_sign_loss)]
mod sys {
    use std::ffi::{CStr, CString};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    use nix::errno::Errno;

    pub fn c_path(path: &Path) -> Result<CString, Errno> {
        CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)
    }

    pub fn c_name(name: &str) -> Result<CString, Errno> {
        CString::new(name).map_err(|_| Errno::EINVAL)
    }

    pub fn getxattr(
        path: &CStr,
        name: &CStr,
        buf: &mut [u8],
        follow: bool,
    ) -> Result<usize, Errno> {
        // SAFETY: writes at most `buf.len()` bytes into `buf`; a zero
        // length is the size-query form and writes nothing.
        let rc = unsafe {
            if follow {
                libc::getxattr(
                    path.as_ptr(),
                    name.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            } else {
                libc::lgetxattr(
                    path.as_ptr(),
                    name.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            }
        };
        if rc < 0 { Err(Errno::last()) } else { Ok(rc as usize) }
    }

    pub fn setxattr(
        path: &CStr,
        name: &CStr,
        value: &[u8],
        flags: i32,
        follow: bool,
    ) -> Result<(), Errno> {
        // SAFETY: reads exactly `value.len()` bytes from `value`; no
        // memory is written.
        let rc = unsafe {
            if follow {
                libc::setxattr(
                    path.as_ptr(),
                    name.as_ptr(),
                    value.as_ptr().cast(),
                    value.len(),
                    flags,
                )
            } else {
                libc::lsetxattr(
                    path.as_ptr(),
                    name.as_ptr(),
                    value.as_ptr().cast(),
                    value.len(),
                    flags,
                )
            }
        };
        if rc < 0 { Err(Errno::last()) } else { Ok(()) }
    }

    pub fn listxattr(path: &CStr, buf: &mut [u8], follow: bool) -> Result<usize, Errno> {
        // SAFETY: writes at most `buf.len()` bytes into `buf`; a zero
        // length is the size-query form and writes nothing.
        let rc = unsafe {
            if follow {
                libc::listxattr(path.as_ptr(), buf.as_mut_ptr().cast(), buf.len())
            } else {
                libc::llistxattr(path.as_ptr(), buf.as_mut_ptr().cast(), buf.len())
            }
        };
        if rc < 0 { Err(Errno::last()) } else { Ok(rc as usize) }
    }

    pub fn removexattr(path: &CStr, name: &CStr, follow: bool) -> Result<(), Errno> {
        // SAFETY: no memory is written; only the return value is
        // inspected.
        let rc = unsafe {
            if follow {
                libc::removexattr(path.as_ptr(), name.as_ptr())
            } else {
                libc::lremovexattr(path.as_ptr(), name.as_ptr())
            }
        };
        if rc < 0 { Err(Errno::last()) } else { Ok(()) }
    }
}

/// Stub executor operations for non-Linux platforms.
///
/// Every operation fails — attribute virtualization requires Linux.
#[cfg(not(target_os = "linux"))]
impl PrivilegedExecutor for HostExecutor {
    fn get(&self, _target: &ResolvedTarget, _name: &str, _follow: bool) -> std::result::Result<Vec<u8>, Errno> {
        Err(Errno::ENOSYS)
    }

    fn set(
        &self,
        _target: &ResolvedTarget,
        _name: &str,
        _value: &[u8],
        _flags: SetFlags,
        _follow: bool,
    ) -> std::result::Result<(), Errno> {
        Err(Errno::ENOSYS)
    }

    fn list(&self, _target: &ResolvedTarget, _follow: bool) -> std::result::Result<Vec<String>, Errno> {
        Err(Errno::ENOSYS)
    }

    fn remove(
        &self,
        _target: &ResolvedTarget,
        _name: &str,
        _follow: bool,
    ) -> std::result::Result<(), Errno> {
        Err(Errno::ENOSYS)
    }
}
