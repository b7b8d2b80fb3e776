//! # xat — xattrust CLI
//!
//! Extended-attribute virtualization shim for rootless containers.
//! Single binary for serving a container's attribute syscalls and for
//! inspecting the policy that governs them.

mod commands;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
        )
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
