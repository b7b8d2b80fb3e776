//! `xat serve` — Serve a container's attribute syscalls.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use xattrust_common::config::ShimConfig;
use xattrust_core::proxy::HostExecutor;
use xattrust_shim::ShimService;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Unix socket to listen on (overrides XATTRUST_SOCKET).
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Read uid/gid mappings from a live container process instead of
    /// the environment.
    #[arg(long, value_name = "PID")]
    pub from_pid: Option<u32>,
}

/// Executes the `serve` command.
///
/// Loads the per-container policy from the environment, verifies the
/// privileged executor is available, and serves until interrupted.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the capability
/// preflight fails, or the socket cannot be served.
pub fn execute(args: &ServeArgs) -> anyhow::Result<()> {
    let mut config = ShimConfig::from_env().context("loading shim configuration")?;
    if let Some(socket) = &args.socket {
        config.socket = socket.clone();
    }
    if let Some(pid) = args.from_pid {
        config = config
            .with_proc_mappings(pid)
            .with_context(|| format!("reading id mappings of pid {pid}"))?;
    }

    // A missing capability is fatal for the container, not per-call.
    let executor = HostExecutor::new().context("privileged executor preflight")?;
    let service = ShimService::new(&config, Arc::new(executor));
    tracing::info!(
        container = %config.container,
        trusted = config.allow_trusted_xattr,
        "shim configured"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(async move {
        tokio::select! {
            result = service.serve(&config.socket) => result.map_err(Into::into),
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for shutdown signal")?;
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
