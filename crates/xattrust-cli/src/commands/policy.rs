//! `xat policy` — Print the effective per-container policy.

#![allow(clippy::print_stdout)]

use anyhow::Context;
use clap::Args;
use xattrust_common::config::ShimConfig;

/// Arguments for the `policy` command.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Read uid/gid mappings from a live container process.
    #[arg(long, value_name = "PID")]
    pub from_pid: Option<u32>,
}

/// Executes the `policy` command.
///
/// Resolves the configuration the same way `serve` would and prints it
/// as JSON.
///
/// # Errors
///
/// Returns an error if the environment holds unparsable values or the
/// proc mappings cannot be read.
pub fn execute(args: &PolicyArgs) -> anyhow::Result<()> {
    let mut config = ShimConfig::from_env().context("loading shim configuration")?;
    if let Some(pid) = args.from_pid {
        config = config
            .with_proc_mappings(pid)
            .with_context(|| format!("reading id mappings of pid {pid}"))?;
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
