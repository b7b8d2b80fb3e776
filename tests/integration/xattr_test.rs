//! Integration tests for the attribute-virtualization pipeline.
//!
//! These tests are implemented in:
//! `crates/xattrust-core/tests/pipeline_test.rs`
//!
//! Covered scenarios:
//! - `user_set_get_roundtrip_across_all_addressing_modes`: user.* values
//!   survive set/get through path, descriptor, and no-follow variants
//! - `privileged_opaque_set_succeeds_and_lists`: the opaque marker is
//!   persisted and listed for the privileged container user
//! - `opaque_set_denied_when_toggle_disabled`: EPERM with the toggle off
//! - `disabling_toggle_does_not_strip_persisted_marker`: persisted data
//!   survives a policy flip; only new writes are blocked
//! - `other_trusted_names_unsupported_independent_of_toggle`: ENOTSUP
//! - `unprivileged_caller_never_sees_trusted_names`: list filtering and
//!   as-if-absent reads
//! - `relative_and_absolute_paths_resolve_identically`: cwd-relative
//!   resolution equivalence
//! - `cancelled_call_aborts_before_the_privileged_write`: EINTR without
//!   a partial write
