// # Certificate Probe Trait
//
// Defines the interface for reading the expiry of a domain's current
// certificate.
//
// ## Implementations
//
// - openssl subprocess: `certrenew-certbot` crate (`OpensslProbe`)
//
// ## Usage
//
// ```rust,ignore
// use certrenew_core::CertificateProbe;
//
// let expiry = probe.expiry("example.com").await?;
// println!("certificate expires at {}", expiry);
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for certificate expiry probes
///
/// A probe only reads. It does not decide whether a renewal is needed; the
/// policy (threshold, fail-open) belongs to
/// [`CertificateInspector`](crate::inspector::CertificateInspector).
///
/// # Errors
///
/// Any failure to read or parse the certificate is reported as an error.
/// The inspector turns every error into a "renew" decision, so probes should
/// not try to recover on their own.
#[async_trait]
pub trait CertificateProbe: Send + Sync {
    /// Return the `notAfter` timestamp of the domain's current certificate
    async fn expiry(&self, domain: &str) -> Result<DateTime<Utc>, crate::Error>;
}
