//! The call-handling pipeline.
//!
//! Classifier → Resolver → Policy Engine → Privileged Proxy → Marshaler,
//! one pass per intercepted call. Each call is an independent unit of
//! work: the handler holds only shared references to the immutable policy
//! and the executor, so concurrent invocations need no locking beyond
//! what the underlying filesystem provides.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;

use crate::classify::{self, RawCall, XattrOp};
use crate::context::ProcessContext;
use crate::marshal::{self, SyscallReply};
use crate::policy::{Decision, Policy};
use crate::proxy::PrivilegedExecutor;
use crate::resolve;

/// What the transport should do with the intercepted syscall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Let the original syscall proceed unmodified.
    Continue,
    /// Suppress the original syscall and deliver this reply instead.
    Reply(SyscallReply),
}

impl Outcome {
    /// Shorthand for an error reply.
    #[must_use]
    pub const fn error(errno: Errno) -> Self {
        Self::Reply(SyscallReply::error(errno))
    }
}

/// Cooperative cancellation handle for one in-flight call.
///
/// Set when the calling process's own syscall is cancelled (e.g. signal
/// delivery). Checked at stage boundaries: a cancellation observed before
/// the proxy executes aborts the call without issuing the privileged
/// write.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the call as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handles intercepted calls for one container.
pub struct CallHandler {
    policy: Arc<Policy>,
    executor: Arc<dyn PrivilegedExecutor>,
}

impl CallHandler {
    /// Creates a handler over an immutable policy and a privileged
    /// executor.
    #[must_use]
    pub fn new(policy: Arc<Policy>, executor: Arc<dyn PrivilegedExecutor>) -> Self {
        Self { policy, executor }
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Handles one intercepted call to completion.
    #[must_use]
    pub fn handle(&self, raw: RawCall, ctx: &ProcessContext) -> Outcome {
        self.handle_cancellable(raw, ctx, &CancelToken::new())
    }

    /// Handles one intercepted call, honoring the caller's cancellation.
    ///
    /// Resolution is deferred past the policy decision for calls that
    /// pass through unmodified; the kernel re-resolves those itself when
    /// the original syscall runs.
    #[must_use]
    pub fn handle_cancellable(
        &self,
        raw: RawCall,
        ctx: &ProcessContext,
        cancel: &CancelToken,
    ) -> Outcome {
        let call = match classify::classify_for(raw, ctx.credentials) {
            Ok(call) => call,
            Err(errno) => return Outcome::error(errno),
        };

        match self.policy.decide(&call) {
            Decision::PassThrough => Outcome::Continue,
            Decision::Deny => Outcome::error(Errno::EPERM),
            Decision::Unsupported => Outcome::error(Errno::EOPNOTSUPP),
            Decision::Emulate => self.emulate(&call, ctx, cancel),
        }
    }

    /// Executes an emulated operation through the privileged proxy.
    fn emulate(
        &self,
        call: &classify::InterceptedCall,
        ctx: &ProcessContext,
        cancel: &CancelToken,
    ) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::error(Errno::EINTR);
        }

        // A caller whose identity is outside the container's mapping has
        // no host-side counterpart to act as.
        let Some(host_uid) = self.policy.host_uid(call.caller.uid) else {
            tracing::warn!(uid = call.caller.uid, "caller uid unmapped in user namespace");
            return Outcome::error(Errno::EPERM);
        };

        let target = match resolve::resolve(&call.addressing, ctx) {
            Ok(target) => target,
            Err(err) => {
                tracing::debug!(%err, "resolution failed");
                return Outcome::error(err.errno());
            }
        };
        let follow = call.addressing.follows_final_link();

        tracing::debug!(
            container = %self.policy.container,
            host = %target.host_path.display(),
            caller_host_uid = host_uid,
            op = ?call.op,
            "emulating via privileged proxy"
        );

        // Last check before touching the filesystem; past this point the
        // underlying call either completes or it does not.
        if cancel.is_cancelled() {
            return Outcome::error(Errno::EINTR);
        }

        let reply = match call.op {
            XattrOp::Get => {
                let name = call.name.as_ref().map_or("", |n| n.as_str());
                match self.executor.get(&target, name, follow) {
                    Ok(value) => marshal::marshal_value(&value, call.size),
                    Err(errno) => SyscallReply::error(errno),
                }
            }
            XattrOp::Set => {
                let name = call.name.as_ref().map_or("", |n| n.as_str());
                let value = call.value.as_deref().unwrap_or_default();
                match self.executor.set(&target, name, value, call.flags, follow) {
                    Ok(()) => SyscallReply::ok(),
                    Err(errno) => SyscallReply::error(errno),
                }
            }
            XattrOp::Remove => {
                let name = call.name.as_ref().map_or("", |n| n.as_str());
                match self.executor.remove(&target, name, follow) {
                    Ok(()) => SyscallReply::ok(),
                    Err(errno) => SyscallReply::error(errno),
                }
            }
            XattrOp::List => match self.executor.list(&target, follow) {
                Ok(names) => {
                    let visible = self.policy.filter_names(names, &call.caller);
                    marshal::marshal_names(&visible, call.size)
                }
                Err(errno) => SyscallReply::error(errno),
            },
        };

        Outcome::Reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_trips_once_set() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }
}
