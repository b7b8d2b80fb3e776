//! Test support: an in-memory executor with kernel-exact attribute
//! semantics, plus a driver that models the transport loop (replies are
//! delivered; pass-through calls run with the caller's own privilege).

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use nix::errno::Errno;
use xattrust_core::classify::{self, RawCall, SetFlags, XattrNamespace, XattrOp};
use xattrust_core::context::ProcessContext;
use xattrust_core::marshal::{self, SyscallReply};
use xattrust_core::pipeline::{CallHandler, Outcome};
use xattrust_core::proxy::PrivilegedExecutor;
use xattrust_core::resolve::{self, ResolvedTarget};

/// Attribute store keyed by resolved host path, guarding kernel-style
/// create/replace and existence semantics. Files themselves live on a
/// real tempdir rootfs; only the attributes are virtual.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    attrs: Mutex<HashMap<PathBuf, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of a stored attribute, for assertions.
    pub fn stored(&self, host_path: &std::path::Path, name: &str) -> Option<Vec<u8>> {
        self.attrs
            .lock()
            .expect("attr store poisoned")
            .get(host_path)
            .and_then(|m| m.get(name))
            .cloned()
    }

    fn target_exists(target: &ResolvedTarget) -> Result<(), Errno> {
        std::fs::symlink_metadata(&target.host_path)
            .map(|_| ())
            .map_err(|_| Errno::ENOENT)
    }

    fn apply_set(
        &self,
        target: &ResolvedTarget,
        name: &str,
        value: &[u8],
        flags: SetFlags,
    ) -> Result<(), Errno> {
        Self::target_exists(target)?;
        let mut attrs = self.attrs.lock().expect("attr store poisoned");
        let file_attrs = attrs.entry(target.host_path.clone()).or_default();
        match flags {
            SetFlags::CreateOnly if file_attrs.contains_key(name) => return Err(Errno::EEXIST),
            SetFlags::ReplaceOnly if !file_attrs.contains_key(name) => {
                return Err(Errno::ENODATA);
            }
            _ => {}
        }
        let _ = file_attrs.insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn apply_get(&self, target: &ResolvedTarget, name: &str) -> Result<Vec<u8>, Errno> {
        Self::target_exists(target)?;
        self.attrs
            .lock()
            .expect("attr store poisoned")
            .get(&target.host_path)
            .and_then(|m| m.get(name))
            .cloned()
            .ok_or(Errno::ENODATA)
    }

    fn apply_list(&self, target: &ResolvedTarget) -> Result<Vec<String>, Errno> {
        Self::target_exists(target)?;
        Ok(self
            .attrs
            .lock()
            .expect("attr store poisoned")
            .get(&target.host_path)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn apply_remove(&self, target: &ResolvedTarget, name: &str) -> Result<(), Errno> {
        Self::target_exists(target)?;
        self.attrs
            .lock()
            .expect("attr store poisoned")
            .get_mut(&target.host_path)
            .and_then(|m| m.remove(name))
            .map(|_| ())
            .ok_or(Errno::ENODATA)
    }
}

impl PrivilegedExecutor for MemoryExecutor {
    fn get(&self, target: &ResolvedTarget, name: &str, _follow: bool) -> Result<Vec<u8>, Errno> {
        self.apply_get(target, name)
    }

    fn set(
        &self,
        target: &ResolvedTarget,
        name: &str,
        value: &[u8],
        flags: SetFlags,
        _follow: bool,
    ) -> Result<(), Errno> {
        self.apply_set(target, name, value, flags)
    }

    fn list(&self, target: &ResolvedTarget, _follow: bool) -> Result<Vec<String>, Errno> {
        self.apply_list(target)
    }

    fn remove(&self, target: &ResolvedTarget, name: &str, _follow: bool) -> Result<(), Errno> {
        self.apply_remove(target, name)
    }
}

/// Executes a passed-through syscall the way the host kernel would for a
/// caller that is unprivileged on the host: `trusted.*` writes fail with
/// `EPERM`, `trusted.*` reads answer as-if-absent, and listings omit
/// `trusted.*` names.
pub fn kernel_apply(executor: &MemoryExecutor, raw: RawCall, ctx: &ProcessContext) -> SyscallReply {
    let call = match classify::classify_for(raw, ctx.credentials) {
        Ok(call) => call,
        Err(errno) => return SyscallReply::error(errno),
    };
    let target = match resolve::resolve(&call.addressing, ctx) {
        Ok(target) => target,
        Err(err) => return SyscallReply::error(err.errno()),
    };

    match call.op {
        XattrOp::Set | XattrOp::Remove => {
            if call.namespace() == Some(XattrNamespace::Trusted) {
                return SyscallReply::error(Errno::EPERM);
            }
            let name = call.name.as_ref().map_or("", |n| n.as_str());
            let result = if call.op == XattrOp::Set {
                executor.apply_set(&target, name, call.value.as_deref().unwrap_or_default(), call.flags)
            } else {
                executor.apply_remove(&target, name)
            };
            match result {
                Ok(()) => SyscallReply::ok(),
                Err(errno) => SyscallReply::error(errno),
            }
        }
        XattrOp::Get => {
            if call.namespace() == Some(XattrNamespace::Trusted) {
                return SyscallReply::error(Errno::ENODATA);
            }
            let name = call.name.as_ref().map_or("", |n| n.as_str());
            match executor.apply_get(&target, name) {
                Ok(value) => marshal::marshal_value(&value, call.size),
                Err(errno) => SyscallReply::error(errno),
            }
        }
        XattrOp::List => match executor.apply_list(&target) {
            Ok(names) => {
                let visible: Vec<String> = names
                    .into_iter()
                    .filter(|n| XattrNamespace::of(n) != Some(XattrNamespace::Trusted))
                    .collect();
                marshal::marshal_names(&visible, call.size)
            }
            Err(errno) => SyscallReply::error(errno),
        },
    }
}

/// Models the full transport loop: replies are delivered as-is, and
/// pass-through outcomes run the original syscall with the caller's own
/// (host-unprivileged) identity.
pub fn run(
    handler: &CallHandler,
    executor: &MemoryExecutor,
    raw: RawCall,
    ctx: &ProcessContext,
) -> SyscallReply {
    match handler.handle(raw.clone(), ctx) {
        Outcome::Reply(reply) => reply,
        Outcome::Continue => kernel_apply(executor, raw, ctx),
    }
}
