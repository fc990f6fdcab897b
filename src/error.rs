//! Error type shared by the library and the `limits` binary.
//!
//! Every failure carries a kind (what went wrong) and a process exit code
//! (how the binary reports it). Numerical failures are never papered over with
//! placeholder values; they surface as [`ErrorKind::Computation`].

use thiserror::Error;

/// Broad failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input table or inconsistent model inputs.
    Format,
    /// Parameter outside its allowed range (scan range, confidence level, probability).
    Range,
    /// Numerical degeneracy: underflowed posterior, flat likelihood, failed root/optimizer.
    Computation,
    /// File system failure.
    Io,
}

impl ErrorKind {
    fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Format | ErrorKind::Io => 2,
            ErrorKind::Range => 3,
            ErrorKind::Computation => 4,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exit_code: kind.exit_code(),
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, message)
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Range, message)
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Computation, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
