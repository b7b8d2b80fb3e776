//! Response marshaling.
//!
//! Packs a result back in the shape the original syscall's calling
//! convention expects: the "query required buffer size" idiom when the
//! caller passed a zero-length buffer, truncation errors when the buffer
//! is non-zero but insufficient, and kernel error codes otherwise.

use nix::errno::Errno;
use serde::{Deserialize, Serialize};

/// A marshaled syscall result: the return value the caller sees, plus
/// the bytes to copy into its buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallReply {
    /// Return value; negative errno on failure, as on the syscall ABI.
    pub ret: i64,
    /// Bytes destined for the caller's buffer, when the call produced
    /// any.
    pub payload: Option<Vec<u8>>,
}

impl SyscallReply {
    /// A zero success with no payload (set/remove).
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            ret: 0,
            payload: None,
        }
    }

    /// A bare length result (size-query mode).
    #[must_use]
    pub const fn size(len: usize) -> Self {
        Self {
            ret: len as i64,
            payload: None,
        }
    }

    /// A payload result; the return value is the payload length.
    #[must_use]
    pub fn bytes(payload: Vec<u8>) -> Self {
        Self {
            ret: payload.len() as i64,
            payload: Some(payload),
        }
    }

    /// A failure carrying the kernel error code.
    #[must_use]
    pub const fn error(errno: Errno) -> Self {
        Self {
            ret: -(errno as i64),
            payload: None,
        }
    }

    /// The error code, when this reply is a failure.
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        if self.ret < 0 {
            i32::try_from(-self.ret).ok().map(Errno::from_raw)
        } else {
            None
        }
    }
}

/// Marshals a fetched attribute value per the `get` convention.
#[must_use]
pub fn marshal_value(value: &[u8], caller_size: usize) -> SyscallReply {
    if caller_size == 0 {
        SyscallReply::size(value.len())
    } else if value.len() > caller_size {
        SyscallReply::error(Errno::ERANGE)
    } else {
        SyscallReply::bytes(value.to_vec())
    }
}

/// Marshals a filtered name listing per the `list` convention: names are
/// NUL-terminated and concatenated.
#[must_use]
pub fn marshal_names(names: &[String], caller_size: usize) -> SyscallReply {
    let encoded = encode_names(names);
    if caller_size == 0 {
        SyscallReply::size(encoded.len())
    } else if encoded.len() > caller_size {
        SyscallReply::error(Errno::ERANGE)
    } else {
        SyscallReply::bytes(encoded)
    }
}

fn encode_names(names: &[String]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(names.iter().map(|n| n.len() + 1).sum());
    for name in names {
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
    }
    buf
}
