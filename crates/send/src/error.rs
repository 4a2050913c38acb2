//! Send error types.
//!
//! Only whole-batch aborts surface as errors; per-file and per-image
//! failures are reported in-band through
//! [`SendReport`](crate::types::SendReport).

use romhoard_transfer::TransferError;

/// Errors that abort a send batch before any file result exists.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("write test failed: {0}")]
    WriteTest(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}
