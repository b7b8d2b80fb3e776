//! Path resolution against the calling process's namespace view.
//!
//! Normalizes a syscall's path argument (absolute, relative-to-cwd,
//! descriptor-relative, or symlink-target) into a canonical host path
//! scoped under the container's rootfs. Relative paths resolve against the
//! *caller's* working directory at call time; symlink targets re-anchor at
//! the container root, never the host root; `..` above the root is an
//! escape and is rejected.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use nix::errno::Errno;
use thiserror::Error;
use xattrust_common::constants::MAX_SYMLINK_FOLLOWS;

use crate::classify::Addressing;
use crate::context::ProcessContext;

/// A canonicalized call target.
///
/// Resolution is deterministic for a given process context: the same
/// addressing and context always produce the same host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Canonical absolute path on the host.
    pub host_path: PathBuf,
    /// Working directory the resolution used.
    pub cwd: PathBuf,
    /// Container rootfs the resolution was scoped to.
    pub rootfs: PathBuf,
}

/// Why a path could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The path does not exist within the container's mount view.
    #[error("path not found in container view: {0}")]
    NotFound(PathBuf),

    /// The path traverses outside the container's visible root.
    #[error("path escapes container root: {0}")]
    Escape(PathBuf),

    /// The descriptor is not present in the caller's open-descriptor table.
    #[error("unknown file descriptor: {0}")]
    BadDescriptor(i32),

    /// Symlink traversal exceeded the kernel's bound.
    #[error("too many levels of symbolic links resolving {0}")]
    LinkLoop(PathBuf),

    /// The underlying filesystem failed during traversal.
    #[error("I/O error resolving {path}: {source}")]
    Io {
        /// Path being examined when the failure occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl ResolveError {
    /// The kernel-visible error code for this failure. Escapes surface as
    /// "no such file", indistinguishable from a path outside the mount
    /// view.
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            Self::NotFound(_) | Self::Escape(_) => Errno::ENOENT,
            Self::BadDescriptor(_) => Errno::EBADF,
            Self::LinkLoop(_) => Errno::ELOOP,
            Self::Io { source, .. } => source
                .raw_os_error()
                .map_or(Errno::EIO, Errno::from_raw),
        }
    }
}

/// Resolves a call's addressing to a canonical host path.
///
/// # Errors
///
/// See [`ResolveError`]; every variant maps to the code the real syscall
/// would have produced.
pub fn resolve(
    addressing: &Addressing,
    ctx: &ProcessContext,
) -> Result<ResolvedTarget, ResolveError> {
    let target = match addressing {
        Addressing::Fd(fd) => {
            let host = ctx
                .fd_path(*fd)
                .ok_or(ResolveError::BadDescriptor(*fd))?
                .to_path_buf();
            // The descriptor's file may have vanished since capture.
            if std::fs::symlink_metadata(&host).is_err() {
                return Err(ResolveError::NotFound(host));
            }
            ResolvedTarget {
                host_path: host,
                cwd: ctx.cwd.clone(),
                rootfs: ctx.rootfs.clone(),
            }
        }
        Addressing::Path(path) => walk(ctx, path, true)?,
        Addressing::LinkNoFollow(path) => walk(ctx, path, false)?,
    };
    tracing::trace!(host = %target.host_path.display(), "resolved call target");
    Ok(target)
}

/// One step of the component walk.
enum Step {
    Root,
    Parent,
    Name(OsString),
}

fn push_front(work: &mut VecDeque<Step>, path: &Path) {
    let mut steps = Vec::new();
    for component in path.components() {
        match component {
            Component::RootDir => steps.push(Step::Root),
            Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => steps.push(Step::Parent),
            Component::Normal(name) => steps.push(Step::Name(name.to_os_string())),
        }
    }
    for step in steps.into_iter().rev() {
        work.push_front(step);
    }
}

fn host_join(rootfs: &Path, resolved: &[OsString]) -> PathBuf {
    let mut host = rootfs.to_path_buf();
    for name in resolved {
        host.push(name);
    }
    host
}

/// Component-wise scoped walk under the container rootfs with bounded
/// symlink following.
fn walk(
    ctx: &ProcessContext,
    raw: &Path,
    follow_final: bool,
) -> Result<ResolvedTarget, ResolveError> {
    let container_path = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        ctx.cwd.join(raw)
    };

    let mut work = VecDeque::new();
    push_front(&mut work, &container_path);

    let mut resolved: Vec<OsString> = Vec::new();
    let mut links_followed = 0usize;

    while let Some(step) = work.pop_front() {
        match step {
            Step::Root => resolved.clear(),
            Step::Parent => {
                if resolved.pop().is_none() {
                    return Err(ResolveError::Escape(raw.to_path_buf()));
                }
            }
            Step::Name(name) => {
                let candidate = host_join(&ctx.rootfs, &resolved).join(&name);
                let meta = std::fs::symlink_metadata(&candidate).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ResolveError::NotFound(raw.to_path_buf())
                    } else {
                        ResolveError::Io {
                            path: candidate.clone(),
                            source: e,
                        }
                    }
                })?;

                let is_final = work.is_empty();
                if meta.file_type().is_symlink() && (!is_final || follow_final) {
                    links_followed += 1;
                    if links_followed > MAX_SYMLINK_FOLLOWS {
                        return Err(ResolveError::LinkLoop(raw.to_path_buf()));
                    }
                    let target = std::fs::read_link(&candidate).map_err(|e| ResolveError::Io {
                        path: candidate.clone(),
                        source: e,
                    })?;
                    // An absolute target re-anchors at the container root.
                    push_front(&mut work, &target);
                } else {
                    resolved.push(name);
                }
            }
        }
    }

    let host_path = host_join(&ctx.rootfs, &resolved);
    if std::fs::symlink_metadata(&host_path).is_err() {
        return Err(ResolveError::NotFound(raw.to_path_buf()));
    }

    Ok(ResolvedTarget {
        host_path,
        cwd: ctx.cwd.clone(),
        rootfs: ctx.rootfs.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    use xattrust_common::types::Credentials;

    fn rootfs() -> (tempfile::TempDir, ProcessContext) {
        let dir = tempfile::tempdir().expect("should create tempdir");
        std::fs::write(dir.path().join("a.txt"), b"a").expect("should write");
        std::fs::create_dir(dir.path().join("sub")).expect("should mkdir");
        std::fs::write(dir.path().join("sub/b.txt"), b"b").expect("should write");
        symlink("a.txt", dir.path().join("rel-link")).expect("should symlink");
        symlink("/a.txt", dir.path().join("abs-link")).expect("should symlink");
        symlink("../../etc/passwd", dir.path().join("escape-link")).expect("should symlink");
        let ctx = ProcessContext::rooted(1, dir.path(), Credentials::container_root());
        (dir, ctx)
    }

    #[test]
    fn absolute_path_resolves_under_rootfs() {
        let (dir, ctx) = rootfs();
        let target = resolve(&Addressing::Path("/a.txt".into()), &ctx).expect("should resolve");
        assert_eq!(target.host_path, dir.path().join("a.txt"));
    }

    #[test]
    fn relative_path_resolves_against_caller_cwd() {
        let (dir, ctx) = rootfs();
        let ctx = ctx.with_cwd("/sub");
        let relative =
            resolve(&Addressing::Path("../a.txt".into()), &ctx).expect("should resolve");
        let absolute =
            resolve(&Addressing::Path("/a.txt".into()), &ctx).expect("should resolve");
        assert_eq!(relative.host_path, absolute.host_path);
        assert_eq!(relative.host_path, dir.path().join("a.txt"));
    }

    #[test]
    fn final_symlink_followed_by_default() {
        let (dir, ctx) = rootfs();
        let target =
            resolve(&Addressing::Path("/rel-link".into()), &ctx).expect("should resolve");
        assert_eq!(target.host_path, dir.path().join("a.txt"));
    }

    #[test]
    fn no_follow_addresses_the_link_itself() {
        let (dir, ctx) = rootfs();
        let target = resolve(&Addressing::LinkNoFollow("/rel-link".into()), &ctx)
            .expect("should resolve");
        assert_eq!(target.host_path, dir.path().join("rel-link"));
    }

    #[test]
    fn absolute_symlink_target_reanchors_at_container_root() {
        let (dir, ctx) = rootfs();
        let target =
            resolve(&Addressing::Path("/abs-link".into()), &ctx).expect("should resolve");
        assert_eq!(target.host_path, dir.path().join("a.txt"));
    }

    #[test]
    fn parent_traversal_above_root_is_rejected() {
        let (_dir, ctx) = rootfs();
        let err = resolve(&Addressing::Path("/../a.txt".into()), &ctx)
            .expect_err("escape should fail");
        assert!(matches!(err, ResolveError::Escape(_)));
        assert_eq!(err.errno(), Errno::ENOENT);
    }

    #[test]
    fn escaping_symlink_is_rejected() {
        let (_dir, ctx) = rootfs();
        let err = resolve(&Addressing::Path("/escape-link".into()), &ctx)
            .expect_err("escape should fail");
        assert!(matches!(err, ResolveError::Escape(_)));
    }

    #[test]
    fn missing_path_is_not_found() {
        let (_dir, ctx) = rootfs();
        let err = resolve(&Addressing::Path("/missing".into()), &ctx)
            .expect_err("missing should fail");
        assert!(matches!(err, ResolveError::NotFound(_)));
        assert_eq!(err.errno(), Errno::ENOENT);
    }

    #[test]
    fn descriptor_resolves_through_fd_table() {
        let (dir, ctx) = rootfs();
        let ctx = ctx.with_fd(7, dir.path().join("sub/b.txt"));
        let target = resolve(&Addressing::Fd(7), &ctx).expect("should resolve");
        assert_eq!(target.host_path, dir.path().join("sub/b.txt"));
    }

    #[test]
    fn unknown_descriptor_is_ebadf() {
        let (_dir, ctx) = rootfs();
        let err = resolve(&Addressing::Fd(42), &ctx).expect_err("unknown fd should fail");
        assert!(matches!(err, ResolveError::BadDescriptor(42)));
        assert_eq!(err.errno(), Errno::EBADF);
    }

    #[test]
    fn vanished_descriptor_target_is_not_found() {
        let (dir, ctx) = rootfs();
        let gone = dir.path().join("gone.txt");
        let ctx = ctx.with_fd(3, &gone);
        let err = resolve(&Addressing::Fd(3), &ctx).expect_err("vanished target should fail");
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn symlink_loop_is_eloop() {
        let dir = tempfile::tempdir().expect("should create tempdir");
        symlink("loop-b", dir.path().join("loop-a")).expect("should symlink");
        symlink("loop-a", dir.path().join("loop-b")).expect("should symlink");
        let ctx = ProcessContext::rooted(1, dir.path(), Credentials::container_root());
        let err = resolve(&Addressing::Path("/loop-a".into()), &ctx)
            .expect_err("loop should fail");
        assert!(matches!(err, ResolveError::LinkLoop(_)));
        assert_eq!(err.errno(), Errno::ELOOP);
    }
}
