use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application.
///
/// `0` means the transfer ran to completion, `1` covers both configuration
/// rejection and run failure so CI wrappers only have to test for non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Transfer completed (failed records are reported in the summary).
    Success = 0,
    /// Validation failure or run failure.
    Failure = 1,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "Success (0)"),
            ExitCode::Failure => write!(f, "Failure (1)"),
        }
    }
}

/// Typed errors for the transfer pipeline.
///
/// Uses thiserror to derive Display and Error traits automatically. Per-record
/// errors (decode, conversion, upload) are logged and skipped by the pipeline;
/// only configuration, authentication and cancellation abort a run.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Authentication with {service} failed: {details}\n\n💡 Hint: check the token environment variable for this adapter")]
    Authentication { service: String, details: String },

    #[error("Network error talking to {endpoint}: {details}")]
    Network { endpoint: String, details: String },

    #[error("Rate limited by {service} after {attempts} attempts")]
    RateLimited { service: String, attempts: u32 },

    #[error("Failed to decode response from {origin}: {details}")]
    Decode { origin: String, details: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("SBOM conversion failed for {path}: {details}")]
    Conversion { path: String, details: String },

    #[error("Child process `{program}` failed: {details}")]
    ChildProcess { program: String, details: String },

    #[error("I/O error on {path}: {details}")]
    Io { path: PathBuf, details: String },

    #[error("Transfer cancelled")]
    Cancelled,
}

impl TransferError {
    pub fn config(message: impl Into<String>) -> Self {
        TransferError::Configuration {
            message: message.into(),
        }
    }
}
