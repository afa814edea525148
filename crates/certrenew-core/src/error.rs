//! Error types for the renewal daemon
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for renewal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the renewal daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid cron schedule (fatal at startup)
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// Certificate could not be read or parsed
    #[error("Inspection error: {0}")]
    Inspection(String),

    /// Restart target does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Container runtime failure other than a missing target
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a schedule error
    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule(msg.into())
    }

    /// Create an inspection error
    pub fn inspection(msg: impl Into<String>) -> Self {
        Self::Inspection(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Whether this error must abort the process
    ///
    /// Only startup conditions are fatal. Everything that can happen inside
    /// a renewal attempt is recoverable and becomes a logged outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Schedule(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_errors_are_fatal() {
        assert!(Error::config("EMAIL missing").is_fatal());
        assert!(Error::schedule("bad cron").is_fatal());

        assert!(!Error::inspection("unreadable").is_fatal());
        assert!(!Error::from(std::io::Error::other("pipe closed")).is_fatal());
        assert!(!Error::not_found("nginx_https").is_fatal());
        assert!(!Error::runtime("daemon down").is_fatal());
    }

    #[test]
    fn display_includes_category() {
        let err = Error::not_found("nginx_https");
        assert_eq!(err.to_string(), "Not found: nginx_https");
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "cert.pem"))?
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }
}
