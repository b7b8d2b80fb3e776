//! Overlay mount helper.
//!
//! The emulated opaque marker is only worth anything if the real overlay
//! driver honors it when the marked directory is later used as a layer.
//! This module stages such a mount: read-only lower layers, one writable
//! upper layer, and the merged view the container sees.

use std::path::{Path, PathBuf};

use xattrust_common::constants::{OVERLAY_OPAQUE, XATTR_TRUSTED_PREFIX};
use xattrust_common::error::{Result, XattrustError};

/// An overlay mount over staged layers.
#[derive(Debug, Clone)]
pub struct OverlayMount {
    /// Read-only lower layers (bottom to top).
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by the overlay driver.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

/// The fully qualified opaque directory marker name.
#[must_use]
pub fn opaque_marker_name() -> String {
    format!("{XATTR_TRUSTED_PREFIX}{OVERLAY_OPAQUE}")
}

impl OverlayMount {
    /// Builds the `lowerdir=…,upperdir=…,workdir=…` option string.
    #[must_use]
    pub fn options(&self) -> String {
        let lowers = self
            .lower_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!(
            "lowerdir={},upperdir={},workdir={}",
            lowers,
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }

    /// Mounts the overlay, creating the upper, work, and merged
    /// directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails or if the mount
    /// syscall fails.
    #[cfg(target_os = "linux")]
    pub fn mount(&self) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        for dir in [&self.upper_dir, &self.work_dir, &self.merged_dir] {
            std::fs::create_dir_all(dir).map_err(|e| XattrustError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }

        let opts = self.options();
        mount(
            Some("overlay"),
            &self.merged_dir,
            Some("overlay"),
            MsFlags::empty(),
            Some(opts.as_str()),
        )
        .map_err(|e| XattrustError::PermissionDenied {
            message: format!("overlay mount failed: {e}"),
        })?;

        tracing::info!(merged = %self.merged_dir.display(), "overlay mounted");
        Ok(())
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — overlay mounting requires Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn mount(&self) -> Result<()> {
        Err(XattrustError::Config {
            message: "Linux required for overlay mounting".into(),
        })
    }

    /// Lazily unmounts the merged view.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount syscall fails.
    #[cfg(target_os = "linux")]
    pub fn unmount(&self) -> Result<()> {
        unmount_at(&self.merged_dir)
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — overlay unmounting requires Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn unmount(&self) -> Result<()> {
        Err(XattrustError::Config {
            message: "Linux required for overlay unmounting".into(),
        })
    }
}

/// Lazily detaches an overlay mounted at the given path.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
#[cfg(target_os = "linux")]
pub fn unmount_at(merged_dir: &Path) -> Result<()> {
    nix::mount::umount2(merged_dir, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
        XattrustError::PermissionDenied {
            message: format!("overlay unmount failed: {e}"),
        }
    })?;
    tracing::info!(path = %merged_dir.display(), "overlay unmounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — overlay unmounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn unmount_at(_merged_dir: &Path) -> Result<()> {
    Err(XattrustError::Config {
        message: "Linux required for overlay unmounting".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_string_orders_layers_bottom_to_top() {
        let mount = OverlayMount {
            lower_dirs: vec![PathBuf::from("/l0"), PathBuf::from("/l1")],
            upper_dir: PathBuf::from("/up"),
            work_dir: PathBuf::from("/work"),
            merged_dir: PathBuf::from("/merged"),
        };
        assert_eq!(mount.options(), "lowerdir=/l0:/l1,upperdir=/up,workdir=/work");
    }

    #[test]
    fn marker_name_is_fully_qualified() {
        assert_eq!(opaque_marker_name(), "trusted.overlay.opaque");
    }
}
