//! Core traits for the renewal daemon
//!
//! This module defines the abstract interfaces for the external collaborators.
//!
//! - [`CertificateProbe`]: Read a domain's certificate expiry
//! - [`RenewalExecutor`]: Run the ACME client for one domain
//! - [`ServiceRestarter`]: Restart the dependent proxy service

pub mod certificate_probe;
pub mod renewal_executor;
pub mod service_restarter;

pub use certificate_probe::CertificateProbe;
pub use renewal_executor::{ExecutionOutcome, FailureCause, RenewalExecutor, RenewalOutcome};
pub use service_restarter::ServiceRestarter;
