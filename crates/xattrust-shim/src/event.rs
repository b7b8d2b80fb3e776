//! Wire messages exchanged with the capture transport.
//!
//! One JSON object per line. The transport sends [`Request`] values; the
//! shim answers every call with exactly one [`CallResponse`] carrying the
//! verdict: let the original syscall continue, or suppress it and deliver
//! the marshaled result instead.

use serde::{Deserialize, Serialize};
use xattrust_core::classify::RawCall;
use xattrust_core::context::ProcessContext;
use xattrust_core::marshal::SyscallReply;
use xattrust_core::pipeline::Outcome;

/// A message from the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// A captured attribute syscall to adjudicate.
    Call(CallRequest),
    /// The calling process's syscall was cancelled (e.g. signal
    /// delivery); abort the matching in-flight call.
    Cancel {
        /// Identifier of the call to abort.
        id: u64,
    },
}

/// One captured syscall event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    /// Transport-assigned correlation identifier.
    pub id: u64,
    /// The raw syscall arguments.
    pub call: RawCall,
    /// The calling process's namespace view at call time.
    pub process: ProcessContext,
}

/// The verdict for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Let the original syscall proceed unmodified.
    Continue,
    /// Suppress the original syscall; deliver `ret`/`payload` instead.
    Reply,
}

/// The shim's answer to one [`CallRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResponse {
    /// Correlation identifier of the answered call.
    pub id: u64,
    /// What the transport should do with the original syscall.
    pub verdict: Verdict,
    /// Return value for the caller; meaningful only for `Reply`.
    pub ret: i64,
    /// Bytes for the caller's buffer, when the call produced any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl CallResponse {
    /// Wraps a pipeline outcome for the wire.
    #[must_use]
    pub fn from_outcome(id: u64, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Continue => Self {
                id,
                verdict: Verdict::Continue,
                ret: 0,
                payload: None,
            },
            Outcome::Reply(SyscallReply { ret, payload }) => Self {
                id,
                verdict: Verdict::Reply,
                ret,
                payload,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use xattrust_common::types::Credentials;
    use xattrust_core::classify::SyscallKind;

    fn request() -> Request {
        Request::Call(CallRequest {
            id: 7,
            call: RawCall {
                syscall: SyscallKind::Setxattr,
                path: Some(PathBuf::from("/data/file")),
                fd: None,
                name: Some("trusted.overlay.opaque".to_string()),
                value: Some(b"y".to_vec()),
                flags: 0,
                size: 0,
            },
            process: ProcessContext::rooted(42, "/var/lib/containers/c1", Credentials::container_root()),
        })
    }

    #[test]
    fn requests_round_trip_through_json() {
        let json = serde_json::to_string(&request()).expect("should serialize");
        let back: Request = serde_json::from_str(&json).expect("should deserialize");
        let Request::Call(call) = back else {
            unreachable!("round trip changed the variant");
        };
        assert_eq!(call.id, 7);
        assert_eq!(call.call.syscall, SyscallKind::Setxattr);
        assert_eq!(call.call.name.as_deref(), Some("trusted.overlay.opaque"));
    }

    #[test]
    fn cancel_messages_are_tagged() {
        let json = serde_json::to_string(&Request::Cancel { id: 9 }).expect("should serialize");
        assert!(json.contains("\"type\":\"cancel\""));
    }

    #[test]
    fn continue_verdict_omits_payload() {
        let response = CallResponse::from_outcome(3, Outcome::Continue);
        let json = serde_json::to_string(&response).expect("should serialize");
        assert!(!json.contains("payload"));
        assert!(json.contains("\"verdict\":\"continue\""));
    }

    #[test]
    fn reply_verdict_carries_return_and_payload() {
        let response =
            CallResponse::from_outcome(4, Outcome::Reply(SyscallReply::bytes(b"y".to_vec())));
        assert_eq!(response.verdict, Verdict::Reply);
        assert_eq!(response.ret, 1);
        assert_eq!(response.payload.as_deref(), Some(b"y".as_slice()));
    }
}
