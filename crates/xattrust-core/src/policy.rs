//! Per-container policy.
//!
//! One immutable [`Policy`] value is loaded when a container starts and
//! passed explicitly to every call-handling path; concurrent calls need no
//! synchronization on configuration. The decision is a pure function of
//! the classified call, the policy, and the caller's capability set.

use std::collections::BTreeSet;

use xattrust_common::config::ShimConfig;
use xattrust_common::types::{Capability, ContainerId, Credentials, IdMapping};

use crate::classify::{InterceptedCall, XattrName, XattrNamespace, XattrOp};

/// What to do with a classified call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the original syscall proceed unmodified.
    PassThrough,
    /// Perform the operation through the privileged proxy.
    Emulate,
    /// Refuse with "operation not permitted".
    Deny,
    /// Refuse with "operation not supported".
    Unsupported,
}

/// Immutable per-container policy.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Container this policy belongs to.
    pub container: ContainerId,
    /// Whether `trusted.*` emulation is active for writes.
    pub allow_trusted_xattr: bool,
    honored: BTreeSet<String>,
    /// uid mapping of the container's user namespace.
    pub uid_map: IdMapping,
    /// gid mapping of the container's user namespace.
    pub gid_map: IdMapping,
}

impl Policy {
    /// Builds a policy from explicit parts.
    #[must_use]
    pub fn new(
        container: ContainerId,
        allow_trusted_xattr: bool,
        honored: impl IntoIterator<Item = String>,
        uid_map: IdMapping,
        gid_map: IdMapping,
    ) -> Self {
        Self {
            container,
            allow_trusted_xattr,
            honored: honored.into_iter().collect(),
            uid_map,
            gid_map,
        }
    }

    /// Builds a policy from a loaded shim configuration.
    #[must_use]
    pub fn from_config(config: &ShimConfig) -> Self {
        Self::new(
            config.container.clone(),
            config.allow_trusted_xattr,
            config.honored.iter().cloned(),
            config.uid_map,
            config.gid_map,
        )
    }

    /// The honored trusted attribute suffixes.
    #[must_use]
    pub fn honored(&self) -> impl Iterator<Item = &str> {
        self.honored.iter().map(String::as_str)
    }

    /// Whether the name is a specially honored trusted attribute.
    #[must_use]
    pub fn is_honored(&self, name: &XattrName) -> bool {
        name.namespace() == Some(XattrNamespace::Trusted)
            && name.suffix().is_some_and(|s| self.honored.contains(s))
    }

    /// Whether the caller's effective privilege makes `trusted.*`
    /// attributes visible. Derived from the in-container capability set,
    /// not the host uid.
    #[must_use]
    pub fn caller_sees_trusted(creds: &Credentials) -> bool {
        creds.effective.contains(Capability::SysAdmin)
    }

    /// Decides what to do with a classified call.
    ///
    /// `get`/`list` by callers that cannot see `trusted.*` pass through:
    /// the kernel already answers "no such attribute" for hidden reads
    /// and omits hidden names from listings, so a hidden attribute is
    /// indistinguishable from an absent one.
    #[must_use]
    pub fn decide(&self, call: &InterceptedCall) -> Decision {
        let sees_trusted = Self::caller_sees_trusted(&call.caller);

        let decision = match call.op {
            XattrOp::List => {
                if sees_trusted {
                    Decision::Emulate
                } else {
                    Decision::PassThrough
                }
            }
            XattrOp::Get => match call.namespace() {
                Some(XattrNamespace::User | XattrNamespace::Security | XattrNamespace::System) => {
                    Decision::PassThrough
                }
                Some(XattrNamespace::Trusted) => {
                    if !sees_trusted {
                        Decision::PassThrough
                    } else if call.name.as_ref().is_some_and(|n| self.is_honored(n)) {
                        // Disabling the toggle blocks new writes; it does
                        // not retroactively hide persisted data.
                        Decision::Emulate
                    } else {
                        Decision::Unsupported
                    }
                }
                None => Decision::Unsupported,
            },
            XattrOp::Set | XattrOp::Remove => match call.namespace() {
                Some(XattrNamespace::User | XattrNamespace::Security | XattrNamespace::System) => {
                    Decision::PassThrough
                }
                Some(XattrNamespace::Trusted) => {
                    if !call.name.as_ref().is_some_and(|n| self.is_honored(n)) {
                        Decision::Unsupported
                    } else if !sees_trusted || !self.allow_trusted_xattr {
                        Decision::Deny
                    } else {
                        Decision::Emulate
                    }
                }
                None => Decision::Unsupported,
            },
        };

        tracing::debug!(
            container = %self.container,
            op = ?call.op,
            name = call.name.as_ref().map(XattrName::as_str),
            ?decision,
            "policy decision"
        );
        decision
    }

    /// Filters an emulated listing down to what the caller may see:
    /// `trusted.*` names reach only callers holding the administrative
    /// capability; `user.*` names are always listed.
    #[must_use]
    pub fn filter_names(&self, names: Vec<String>, creds: &Credentials) -> Vec<String> {
        if Self::caller_sees_trusted(creds) {
            return names;
        }
        names
            .into_iter()
            .filter(|n| XattrNamespace::of(n) != Some(XattrNamespace::Trusted))
            .collect()
    }

    /// Host uid behind a container uid, per the container's user-namespace
    /// mapping.
    #[must_use]
    pub fn host_uid(&self, container_uid: u32) -> Option<u32> {
        self.uid_map.to_host(container_uid)
    }

    /// Container uid a host-owned file appears as inside the container.
    #[must_use]
    pub fn container_uid(&self, host_uid: u32) -> Option<u32> {
        self.uid_map.to_container(host_uid)
    }

    /// Host gid behind a container gid.
    #[must_use]
    pub fn host_gid(&self, container_gid: u32) -> Option<u32> {
        self.gid_map.to_host(container_gid)
    }
}
