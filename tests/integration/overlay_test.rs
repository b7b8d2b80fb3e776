//! Privileged integration tests for the overlay opaque-marker contract.
//!
//! These tests are implemented in:
//! `crates/xattrust-core/tests/overlay_test.rs`
//!
//! Covered scenarios:
//! - `opaque_marker_controls_lower_layer_visibility_under_real_mount`:
//!   an emulated `trusted.overlay.opaque` write hides the lower layer
//!   under a real overlay mount, and removing it restores visibility
//!   (requires CAP_SYS_ADMIN; skips otherwise)
