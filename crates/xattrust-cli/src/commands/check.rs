//! `xat check` — Classify a hypothetical call and print the decision.
//!
//! Debugging aid: answers "what would the shim do with this syscall
//! under the current environment's policy" without touching any file.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use xattrust_common::config::ShimConfig;
use xattrust_common::types::{Capability, CapabilitySet, Credentials};
use xattrust_core::classify::{self, RawCall, SyscallKind, XattrOp};
use xattrust_core::policy::{Decision, Policy};

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Syscall name (e.g. setxattr, lgetxattr, flistxattr).
    #[arg(long)]
    pub syscall: String,

    /// Attribute name (omit for list syscalls).
    #[arg(long)]
    pub name: Option<String>,

    /// Caller uid inside the container.
    #[arg(long, default_value_t = 0)]
    pub uid: u32,

    /// Caller gid inside the container.
    #[arg(long, default_value_t = 0)]
    pub gid: u32,

    /// Whether the caller holds CAP_SYS_ADMIN inside the container.
    #[arg(long)]
    pub cap_sys_admin: bool,
}

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error for an unknown syscall name, unparsable
/// configuration, or arguments the classifier rejects.
pub fn execute(args: &CheckArgs) -> anyhow::Result<()> {
    let syscall = SyscallKind::from_name(&args.syscall)
        .with_context(|| format!("unknown attribute syscall: {}", args.syscall))?;

    let effective = if args.cap_sys_admin {
        CapabilitySet::empty().with(Capability::SysAdmin)
    } else {
        CapabilitySet::empty()
    };
    let caller = Credentials {
        uid: args.uid,
        gid: args.gid,
        effective,
    };

    let raw = RawCall {
        syscall,
        path: Some(PathBuf::from("/")),
        fd: Some(0),
        name: args.name.clone(),
        value: (syscall.op() == XattrOp::Set).then(Vec::new),
        flags: 0,
        size: 0,
    };
    let call = classify::classify_for(raw, caller)
        .map_err(|errno| anyhow::anyhow!("classifier rejected the call: {errno}"))?;

    let config = ShimConfig::from_env().context("loading shim configuration")?;
    let policy = Policy::from_config(&config);
    let decision = policy.decide(&call);

    println!("syscall:   {} ({:?})", args.syscall, call.op);
    println!(
        "namespace: {}",
        call.namespace()
            .map_or("unrecognized", |ns| ns.prefix().trim_end_matches('.'))
    );
    println!("decision:  {}", describe(decision));
    Ok(())
}

fn describe(decision: Decision) -> &'static str {
    match decision {
        Decision::PassThrough => "pass through (original syscall proceeds unmodified)",
        Decision::Emulate => "emulate (performed via the privileged proxy)",
        Decision::Deny => "deny (EPERM)",
        Decision::Unsupported => "unsupported (ENOTSUP)",
    }
}
