//! CLI command definitions and dispatch.

pub mod check;
pub mod policy;
pub mod serve;

use clap::{Parser, Subcommand};

/// xattrust — extended-attribute virtualization for rootless containers.
#[derive(Parser, Debug)]
#[command(name = "xat", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a container's attribute syscalls over the shim socket.
    Serve(serve::ServeArgs),
    /// Print the effective per-container policy.
    Policy(policy::PolicyArgs),
    /// Classify a hypothetical call and print the policy decision.
    Check(check::CheckArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => serve::execute(&args),
        Command::Policy(args) => policy::execute(&args),
        Command::Check(args) => check::execute(&args),
    }
}
