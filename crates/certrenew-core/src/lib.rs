// # certrenew-core
//
// Core library for the certificate renewal daemon.
//
// ## Architecture Overview
//
// This library owns the renewal decision-and-execution pipeline:
// - **CertificateProbe**: Trait for reading a domain's certificate expiry
// - **CertificateInspector**: Renewal policy (fail-open, expiry threshold)
// - **RenewalExecutor**: Trait for invoking the external ACME client
// - **ServiceRestarter**: Trait for restarting the dependent proxy service
// - **RenewalEngine**: Orchestrates inspect → renew → restart for one domain
// - **Scheduler**: One independent cron trigger per configured domain
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Policy lives here, subprocess plumbing lives in plugin crates
// 2. **Explicit Configuration**: One immutable `RenewConfig`, loaded once at startup
// 3. **Typed Outcomes**: Recoverable failures are values, only configuration errors are fatal
// 4. **Per-Domain Isolation**: One domain's failure never affects another's schedule

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod inspector;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::{CronSchedule, DomainConfig, EngineConfig, RenewConfig, RenewalContext};
pub use engine::{EngineEvent, RenewalEngine};
pub use error::{Error, Result};
pub use inspector::{CertificateInspector, RenewalDecision};
pub use scheduler::Scheduler;
pub use traits::{
    CertificateProbe, ExecutionOutcome, FailureCause, RenewalExecutor, RenewalOutcome,
    ServiceRestarter,
};
