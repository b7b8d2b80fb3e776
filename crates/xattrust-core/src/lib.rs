//! # xattrust-core
//!
//! Extended-attribute interception and virtualization for rootless
//! containers.
//!
//! A containerized process that believes itself to be root still lacks the
//! administrative capability in the initial user namespace, so the kernel
//! denies its `trusted.*` attribute operations. This crate observes the
//! attribute syscalls captured by a transport, classifies them, applies a
//! per-container policy, and — when policy allows — performs the privileged
//! operation on the process's behalf against the real filesystem:
//!
//! - **[`classify`]**: collapses the twelve xattr syscall variants into one
//!   normalized call representation.
//! - **[`resolve`]**: turns the call's path/fd argument into a canonical
//!   host path scoped to the container's rootfs.
//! - **[`policy`]**: the per-container decision table and list-visibility
//!   filtering.
//! - **[`proxy`]**: the privileged execution seam and its host `libc`
//!   implementation.
//! - **[`marshal`]**: packs results back in the kernel's calling
//!   conventions (size queries, truncation, error codes).
//! - **[`pipeline`]**: wires the stages and honors caller cancellation.
//! - **[`overlay`]**: overlay mount helper honoring the opaque-marker
//!   contract.
//!
//! No component retains attribute values; the filesystem stays the single
//! source of truth.

pub mod classify;
pub mod context;
pub mod marshal;
pub mod overlay;
pub mod pipeline;
pub mod policy;
pub mod proxy;
pub mod resolve;
