//! Shared utilities and error types used across all layers.

pub mod error;
pub mod result;

pub use error::{ExitCode, TransferError};
pub use result::Result;
