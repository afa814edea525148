// # Renewal Executor Trait
//
// Defines the interface for invoking the external ACME client.
//
// ## Implementations
//
// - certbot subprocess: `certrenew-certbot` crate (`CertbotExecutor`)
//
// ## Contract
//
// - Issuance is unconditional once invoked (forced renewal).
// - Success is decided by the exit status alone: 0 succeeds, anything else fails.
// - Launch failures are outcomes, never panics or errors.

use async_trait::async_trait;
use std::fmt;

use crate::config::RenewalContext;

/// Why a renewal execution failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The tool ran and exited unsuccessfully (`None` when killed by a signal)
    ExitStatus(Option<i32>),
    /// The tool could not be started
    Launch(String),
    /// The tool exceeded the configured timeout and was killed
    TimedOut(u64),
    /// The executor itself faulted
    Panicked(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ExitStatus(Some(code)) => write!(f, "exit status {}", code),
            FailureCause::ExitStatus(None) => write!(f, "terminated by signal"),
            FailureCause::Launch(e) => write!(f, "launch failed: {}", e),
            FailureCause::TimedOut(secs) => write!(f, "timed out after {}s", secs),
            FailureCause::Panicked(e) => write!(f, "executor panicked: {}", e),
        }
    }
}

/// Result of one ACME client run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit status 0
    Succeeded {
        /// Captured standard output
        stdout: String,
    },
    /// Nonzero exit, launch failure or timeout
    Failed {
        /// Captured standard error (empty if the tool never ran)
        stderr: String,
        /// Failure classification
        cause: FailureCause,
    },
}

impl ExecutionOutcome {
    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded { .. })
    }
}

/// Result of one renewal attempt for one domain
///
/// Created fresh per attempt and only logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The certificate is still valid long enough
    Skipped {
        /// Why no renewal was needed
        reason: String,
    },
    /// The ACME client succeeded
    Succeeded {
        /// Captured standard output
        stdout: String,
    },
    /// The ACME client failed; no restart was attempted
    Failed {
        /// Captured standard error
        stderr: String,
        /// Failure classification
        cause: FailureCause,
    },
}

impl RenewalOutcome {
    /// Short label for logs and events
    pub fn label(&self) -> &'static str {
        match self {
            RenewalOutcome::Skipped { .. } => "skipped",
            RenewalOutcome::Succeeded { .. } => "succeeded",
            RenewalOutcome::Failed { .. } => "failed",
        }
    }
}

impl From<ExecutionOutcome> for RenewalOutcome {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Succeeded { stdout } => RenewalOutcome::Succeeded { stdout },
            ExecutionOutcome::Failed { stderr, cause } => RenewalOutcome::Failed { stderr, cause },
        }
    }
}

/// Trait for ACME client integrations
///
/// # Thread Safety
///
/// Implementations must be thread-safe. Attempts for different domains may
/// run concurrently; the engine guarantees that two runs for the same domain
/// never overlap.
///
/// # Responsibilities
///
/// - Run the tool once per call, with forced renewal semantics
/// - Capture output in full and classify the result
///
/// Retries, scheduling and restart decisions belong to the
/// [`RenewalEngine`](crate::engine::RenewalEngine).
#[async_trait]
pub trait RenewalExecutor: Send + Sync {
    /// Request a new certificate for `domain`
    async fn renew(&self, domain: &str, context: &RenewalContext) -> ExecutionOutcome;

    /// Tool name (for logging)
    fn tool_name(&self) -> &'static str;
}
