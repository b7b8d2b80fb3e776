//! Shim-level error types.

use thiserror::Error;
use xattrust_common::error::XattrustError;

/// Errors produced by the transport and dispatch layers.
#[derive(Debug, Error)]
pub enum ShimError {
    /// The underlying stream failed.
    #[error("transport I/O error: {source}")]
    Transport {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A wire message could not be encoded or decoded.
    #[error("malformed wire message: {source}")]
    Protocol {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// A workspace-level failure (configuration, capability preflight).
    #[error(transparent)]
    Common(#[from] XattrustError),
}

/// Convenience alias for shim results.
pub type Result<T> = std::result::Result<T, ShimError>;
