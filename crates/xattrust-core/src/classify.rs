//! Call classification.
//!
//! Collapses the twelve intercepted xattr syscalls (path-based, descriptor-
//! based, and symlink-non-following variants of get/set/list/remove) into a
//! single normalized [`InterceptedCall`], so the rest of the pipeline is
//! addressing-mode-independent. Also performs the kernel's early argument
//! validation so later stages only see well-formed calls.

use std::path::PathBuf;

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use xattrust_common::constants::{
    XATTR_LIST_MAX, XATTR_NAME_MAX, XATTR_SECURITY_PREFIX, XATTR_SIZE_MAX, XATTR_SYSTEM_PREFIX,
    XATTR_TRUSTED_PREFIX, XATTR_USER_PREFIX,
};
use xattrust_common::types::Credentials;

/// Operation kind of an attribute syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XattrOp {
    /// Read one attribute value.
    Get,
    /// Write one attribute value.
    Set,
    /// Enumerate attribute names.
    List,
    /// Remove one attribute.
    Remove,
}

impl XattrOp {
    /// Whether this operation mutates filesystem state.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Set | Self::Remove)
    }
}

/// How the syscall addresses its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addressing {
    /// By path, following a final symlink.
    Path(PathBuf),
    /// By open file descriptor.
    Fd(i32),
    /// By path, addressing a final symlink itself.
    LinkNoFollow(PathBuf),
}

impl Addressing {
    /// Whether a final symlink should be followed when resolving.
    #[must_use]
    pub const fn follows_final_link(&self) -> bool {
        !matches!(self, Self::LinkNoFollow(_))
    }
}

/// The twelve intercepted syscalls. Classification is total over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyscallKind {
    /// `setxattr(2)`
    Setxattr,
    /// `lsetxattr(2)`
    Lsetxattr,
    /// `fsetxattr(2)`
    Fsetxattr,
    /// `getxattr(2)`
    Getxattr,
    /// `lgetxattr(2)`
    Lgetxattr,
    /// `fgetxattr(2)`
    Fgetxattr,
    /// `listxattr(2)`
    Listxattr,
    /// `llistxattr(2)`
    Llistxattr,
    /// `flistxattr(2)`
    Flistxattr,
    /// `removexattr(2)`
    Removexattr,
    /// `lremovexattr(2)`
    Lremovexattr,
    /// `fremovexattr(2)`
    Fremovexattr,
}

impl SyscallKind {
    /// Operation kind of this syscall.
    #[must_use]
    pub const fn op(self) -> XattrOp {
        match self {
            Self::Setxattr | Self::Lsetxattr | Self::Fsetxattr => XattrOp::Set,
            Self::Getxattr | Self::Lgetxattr | Self::Fgetxattr => XattrOp::Get,
            Self::Listxattr | Self::Llistxattr | Self::Flistxattr => XattrOp::List,
            Self::Removexattr | Self::Lremovexattr | Self::Fremovexattr => XattrOp::Remove,
        }
    }

    /// Whether this is a descriptor-based variant.
    #[must_use]
    pub const fn is_fd_based(self) -> bool {
        matches!(
            self,
            Self::Fsetxattr | Self::Fgetxattr | Self::Flistxattr | Self::Fremovexattr
        )
    }

    /// Whether this is a symlink-non-following (`l`-prefixed) variant.
    #[must_use]
    pub const fn is_no_follow(self) -> bool {
        matches!(
            self,
            Self::Lsetxattr | Self::Lgetxattr | Self::Llistxattr | Self::Lremovexattr
        )
    }

    /// Looks up a syscall by its kernel name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "setxattr" => Some(Self::Setxattr),
            "lsetxattr" => Some(Self::Lsetxattr),
            "fsetxattr" => Some(Self::Fsetxattr),
            "getxattr" => Some(Self::Getxattr),
            "lgetxattr" => Some(Self::Lgetxattr),
            "fgetxattr" => Some(Self::Fgetxattr),
            "listxattr" => Some(Self::Listxattr),
            "llistxattr" => Some(Self::Llistxattr),
            "flistxattr" => Some(Self::Flistxattr),
            "removexattr" => Some(Self::Removexattr),
            "lremovexattr" => Some(Self::Lremovexattr),
            "fremovexattr" => Some(Self::Fremovexattr),
            _ => None,
        }
    }
}

/// Extended-attribute namespaces with defined visibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XattrNamespace {
    /// `user.*` — unprivileged, subject to regular file permissions.
    User,
    /// `trusted.*` — gated on the administrative capability in the
    /// initial user namespace.
    Trusted,
    /// `security.*` — consumed by security modules.
    Security,
    /// `system.*` — consumed by the kernel (ACLs).
    System,
}

impl XattrNamespace {
    /// Parses the namespace from a qualified attribute name. Returns
    /// `None` for unprefixed or unknown namespaces.
    #[must_use]
    pub fn of(name: &str) -> Option<Self> {
        if name.starts_with(XATTR_USER_PREFIX) {
            Some(Self::User)
        } else if name.starts_with(XATTR_TRUSTED_PREFIX) {
            Some(Self::Trusted)
        } else if name.starts_with(XATTR_SECURITY_PREFIX) {
            Some(Self::Security)
        } else if name.starts_with(XATTR_SYSTEM_PREFIX) {
            Some(Self::System)
        } else {
            None
        }
    }

    /// The namespace's name prefix, including the trailing dot.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::User => XATTR_USER_PREFIX,
            Self::Trusted => XATTR_TRUSTED_PREFIX,
            Self::Security => XATTR_SECURITY_PREFIX,
            Self::System => XATTR_SYSTEM_PREFIX,
        }
    }
}

/// A namespace-qualified attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XattrName(String);

impl XattrName {
    /// Wraps a raw attribute name.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The full qualified name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parsed namespace, if recognized.
    #[must_use]
    pub fn namespace(&self) -> Option<XattrNamespace> {
        XattrNamespace::of(&self.0)
    }

    /// The name without its namespace prefix, if the namespace is
    /// recognized.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.namespace().map(|ns| &self.0[ns.prefix().len()..])
    }
}

impl std::fmt::Display for XattrName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creation semantics of a set operation, mapped from
/// `XATTR_CREATE`/`XATTR_REPLACE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetFlags {
    /// Create or replace, whichever applies.
    #[default]
    Any,
    /// Fail with `EEXIST` if the attribute already exists.
    CreateOnly,
    /// Fail with `ENODATA` if the attribute does not exist.
    ReplaceOnly,
}

impl SetFlags {
    /// Maps the raw syscall flags argument.
    ///
    /// # Errors
    ///
    /// `EINVAL` when both creation flags are set, as the kernel rejects
    /// that combination.
    pub fn from_bits(flags: u32) -> Result<Self, Errno> {
        let create = flags & libc::XATTR_CREATE as u32 != 0;
        let replace = flags & libc::XATTR_REPLACE as u32 != 0;
        match (create, replace) {
            (false, false) => Ok(Self::Any),
            (true, false) => Ok(Self::CreateOnly),
            (false, true) => Ok(Self::ReplaceOnly),
            (true, true) => Err(Errno::EINVAL),
        }
    }

    /// The raw flags value for the real syscall.
    #[must_use]
    pub const fn bits(self) -> i32 {
        match self {
            Self::Any => 0,
            Self::CreateOnly => libc::XATTR_CREATE,
            Self::ReplaceOnly => libc::XATTR_REPLACE,
        }
    }
}

/// Raw arguments of a captured attribute syscall, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCall {
    /// Which syscall was intercepted.
    pub syscall: SyscallKind,
    /// Path argument, for path-based and no-follow variants.
    pub path: Option<PathBuf>,
    /// Descriptor argument, for descriptor-based variants.
    pub fd: Option<i32>,
    /// Attribute name, absent for list operations.
    pub name: Option<String>,
    /// Attribute value, set operations only.
    pub value: Option<Vec<u8>>,
    /// Raw flags argument of a set operation.
    pub flags: u32,
    /// Caller-supplied buffer size for get/list operations.
    pub size: usize,
}

/// A normalized intercepted call. Immutable once produced; consumed
/// exactly once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedCall {
    /// Operation kind.
    pub op: XattrOp,
    /// Target addressing.
    pub addressing: Addressing,
    /// Attribute name; `None` only for list operations.
    pub name: Option<XattrName>,
    /// Attribute value; present only for set operations.
    pub value: Option<Vec<u8>>,
    /// Creation semantics of a set operation.
    pub flags: SetFlags,
    /// Caller-supplied buffer size for get/list operations, clamped to
    /// the kernel's maximum.
    pub size: usize,
    /// In-container identity of the caller.
    pub caller: Credentials,
}

impl InterceptedCall {
    /// The call's namespace, when a name is present and recognized.
    #[must_use]
    pub fn namespace(&self) -> Option<XattrNamespace> {
        self.name.as_ref().and_then(XattrName::namespace)
    }
}

/// Normalizes a raw captured syscall into an [`InterceptedCall`].
///
/// Classification is total: every syscall variant produces the same
/// outcome for logically equivalent operations, differing only in the
/// addressing mode.
///
/// # Errors
///
/// Kernel-style codes for malformed arguments: `EFAULT` for a missing
/// path argument, `EBADF` for a missing descriptor argument, `ERANGE`
/// for an over-long attribute name, `E2BIG` for an oversized set value,
/// and `EINVAL` for contradictory set flags.
pub fn classify(raw: RawCall) -> Result<InterceptedCall, Errno> {
    let op = raw.syscall.op();

    let addressing = if raw.syscall.is_fd_based() {
        Addressing::Fd(raw.fd.ok_or(Errno::EBADF)?)
    } else {
        let path = raw.path.ok_or(Errno::EFAULT)?;
        if raw.syscall.is_no_follow() {
            Addressing::LinkNoFollow(path)
        } else {
            Addressing::Path(path)
        }
    };

    let name = match op {
        XattrOp::List => None,
        XattrOp::Get | XattrOp::Set | XattrOp::Remove => {
            let raw_name = raw.name.ok_or(Errno::EFAULT)?;
            if raw_name.is_empty() || raw_name.len() > XATTR_NAME_MAX {
                return Err(Errno::ERANGE);
            }
            Some(XattrName::new(raw_name))
        }
    };

    let (value, flags) = if op == XattrOp::Set {
        let value = raw.value.ok_or(Errno::EFAULT)?;
        if value.len() > XATTR_SIZE_MAX {
            return Err(Errno::E2BIG);
        }
        (Some(value), SetFlags::from_bits(raw.flags)?)
    } else {
        (None, SetFlags::Any)
    };

    // The kernel clamps oversized get/list buffers instead of failing.
    let size = match op {
        XattrOp::Get => raw.size.min(XATTR_SIZE_MAX),
        XattrOp::List => raw.size.min(XATTR_LIST_MAX),
        XattrOp::Set | XattrOp::Remove => 0,
    };

    Ok(InterceptedCall {
        op,
        addressing,
        name,
        value,
        flags,
        size,
        caller: Credentials::unprivileged(0, 0),
    })
}

/// Normalizes a raw captured syscall and attaches the caller's identity.
///
/// # Errors
///
/// Same codes as [`classify`].
pub fn classify_for(raw: RawCall, caller: Credentials) -> Result<InterceptedCall, Errno> {
    let mut call = classify(raw)?;
    call.caller = caller;
    Ok(call)
}
