//! System-wide constants and default paths.

/// Default Unix socket the shim service listens on.
pub const DEFAULT_SOCKET: &str = "/run/xattrust/shim.sock";

/// Environment variable toggling `trusted.*` emulation (default enabled).
pub const ENV_TRUSTED_XATTR: &str = "XATTRUST_TRUSTED_XATTR";

/// Environment variable listing honored trusted attribute suffixes,
/// comma-separated.
pub const ENV_HONORED: &str = "XATTRUST_HONORED";

/// Environment variable carrying the uid mapping triple
/// (`<container> <host> <range>`, the `/proc/[pid]/uid_map` format).
pub const ENV_UID_MAP: &str = "XATTRUST_UID_MAP";

/// Environment variable carrying the gid mapping triple.
pub const ENV_GID_MAP: &str = "XATTRUST_GID_MAP";

/// Environment variable overriding the shim socket path.
pub const ENV_SOCKET: &str = "XATTRUST_SOCKET";

/// Prefix of the user extended-attribute namespace.
pub const XATTR_USER_PREFIX: &str = "user.";

/// Prefix of the trusted extended-attribute namespace.
pub const XATTR_TRUSTED_PREFIX: &str = "trusted.";

/// Prefix of the security extended-attribute namespace.
pub const XATTR_SECURITY_PREFIX: &str = "security.";

/// Prefix of the system extended-attribute namespace.
pub const XATTR_SYSTEM_PREFIX: &str = "system.";

/// Trusted attribute suffix marking an opaque overlay directory.
pub const OVERLAY_OPAQUE: &str = "overlay.opaque";

/// Value the overlay driver expects for the opaque directory marker.
pub const OVERLAY_OPAQUE_VALUE: &[u8] = b"y";

/// Maximum attribute name length accepted by the kernel.
pub const XATTR_NAME_MAX: usize = 255;

/// Maximum attribute value size accepted by the kernel (64 KiB).
pub const XATTR_SIZE_MAX: usize = 65536;

/// Maximum attribute name-list size accepted by the kernel (64 KiB).
pub const XATTR_LIST_MAX: usize = 65536;

/// Symlink traversal bound during path resolution, matching the kernel's
/// `MAXSYMLINKS`.
pub const MAX_SYMLINK_FOLLOWS: usize = 40;

/// Application name used in CLI output and logs.
pub const APP_NAME: &str = "xattrust";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "xat";
