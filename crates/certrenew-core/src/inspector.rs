//! Certificate renewal policy
//!
//! The inspector answers one question per domain: does its certificate need
//! renewal? It never fails. A certificate that cannot be read or parsed is
//! renewed (fail-open), and so is one that expires within the threshold.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::CertificateProbe;

/// Outcome of inspecting one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalDecision {
    /// Whether a renewal should be attempted
    pub needs_renewal: bool,
    /// Human-readable reason, recorded in logs and events
    pub reason: String,
    /// The certificate's expiry, when it could be read
    pub expiry: Option<DateTime<Utc>>,
}

impl RenewalDecision {
    fn renew(reason: String, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            needs_renewal: true,
            reason,
            expiry,
        }
    }

    fn keep(reason: String, expiry: DateTime<Utc>) -> Self {
        Self {
            needs_renewal: false,
            reason,
            expiry: Some(expiry),
        }
    }
}

/// Renewal policy on top of a [`CertificateProbe`]
pub struct CertificateInspector {
    probe: Arc<dyn CertificateProbe>,
    threshold: Duration,
}

impl CertificateInspector {
    /// Create an inspector that renews within `threshold_days` of expiry
    pub fn new(probe: Arc<dyn CertificateProbe>, threshold_days: u32) -> Self {
        Self {
            probe,
            threshold: Duration::days(i64::from(threshold_days)),
        }
    }

    /// The renewal window
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether `domain`'s certificate needs renewal
    pub async fn needs_renewal(&self, domain: &str) -> bool {
        self.inspect(domain).await.needs_renewal
    }

    /// Inspect `domain`'s certificate and return the full decision
    ///
    /// Nothing is cached: every call reads the certificate again.
    pub async fn inspect(&self, domain: &str) -> RenewalDecision {
        let probed = self.probe.expiry(domain).await;
        if let Err(ref e) = probed {
            warn!(domain = %domain, error = %e, "Certificate unreadable, treating as due for renewal");
        }

        let decision = self.evaluate(probed, Utc::now());
        debug!(
            domain = %domain,
            needs_renewal = decision.needs_renewal,
            reason = %decision.reason,
            "Certificate inspected"
        );
        decision
    }

    /// Apply the policy to a probe result at a given instant
    pub fn evaluate(&self, probed: Result<DateTime<Utc>>, now: DateTime<Utc>) -> RenewalDecision {
        let expiry = match probed {
            Ok(expiry) => expiry,
            Err(e) => return RenewalDecision::renew(format!("certificate unreadable: {}", e), None),
        };

        let remaining = expiry.signed_duration_since(now);
        if remaining < Duration::zero() {
            RenewalDecision::renew(
                format!("certificate expired {} day(s) ago", -remaining.num_days()),
                Some(expiry),
            )
        } else if remaining < self.threshold {
            RenewalDecision::renew(
                format!(
                    "certificate expires in {} day(s), threshold is {}",
                    remaining.num_days(),
                    self.threshold.num_days()
                ),
                Some(expiry),
            )
        } else {
            RenewalDecision::keep(
                format!("certificate valid for {} more day(s)", remaining.num_days()),
                expiry,
            )
        }
    }
}
