//! Test doubles and common utilities for renewal contract tests
//!
//! This module provides minimal call-counting doubles for the three external
//! collaborators, without running any real subprocess.

#![allow(dead_code)]

use async_trait::async_trait;
use certrenew_core::config::{EngineConfig, RenewalContext};
use certrenew_core::engine::{EngineEvent, RenewalEngine};
use certrenew_core::error::{Error, Result};
use certrenew_core::inspector::CertificateInspector;
use certrenew_core::traits::{
    CertificateProbe, ExecutionOutcome, FailureCause, RenewalExecutor, ServiceRestarter,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A probe returning a fixed expiry, or an error when none is set
pub struct MockProbe {
    expiry: Option<DateTime<Utc>>,
    call_count: AtomicUsize,
}

impl MockProbe {
    /// Certificate expiring `days` from now
    pub fn expiring_in(days: i64) -> Self {
        Self {
            expiry: Some(Utc::now() + Duration::days(days)),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Certificate file missing entirely
    pub fn missing() -> Self {
        Self {
            expiry: None,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateProbe for MockProbe {
    async fn expiry(&self, domain: &str) -> Result<DateTime<Utc>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.expiry.ok_or_else(|| {
            Error::inspection(format!(
                "/etc/letsencrypt/live/{}/cert.pem: No such file or directory",
                domain
            ))
        })
    }
}

/// An executor that records calls and returns a fixed outcome
pub struct MockExecutor {
    outcome: ExecutionOutcome,
    delay: std::time::Duration,
    domains: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExecutor {
    /// Tool that exits 0
    pub fn succeeding() -> Self {
        Self::with_outcome(ExecutionOutcome::Succeeded {
            stdout: "Successfully received certificate.".to_string(),
        })
    }

    /// Tool that exits with `code` and writes `stderr`
    pub fn failing(code: i32, stderr: &str) -> Self {
        Self::with_outcome(ExecutionOutcome::Failed {
            stderr: stderr.to_string(),
            cause: FailureCause::ExitStatus(Some(code)),
        })
    }

    pub fn with_outcome(outcome: ExecutionOutcome) -> Self {
        Self {
            outcome,
            delay: std::time::Duration::ZERO,
            domains: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make every run take `delay`
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.domains.lock().unwrap().len()
    }

    /// Domains passed to renew(), in call order
    pub fn domains(&self) -> Vec<String> {
        self.domains.lock().unwrap().clone()
    }

    /// Runs currently in progress
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of runs observed at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenewalExecutor for MockExecutor {
    async fn renew(&self, domain: &str, _context: &RenewalContext) -> ExecutionOutcome {
        self.domains.lock().unwrap().push(domain.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        // Released on drop so an aborted run is counted as finished too
        let _running = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.outcome.clone()
    }

    fn tool_name(&self) -> &'static str {
        "mock-acme"
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What the mock restarter should report
#[derive(Clone, Copy)]
pub enum RestartBehavior {
    Succeed,
    NotFound,
    RuntimeError,
}

/// A restarter that records calls
pub struct MockRestarter {
    behavior: RestartBehavior,
    call_count: AtomicUsize,
}

impl MockRestarter {
    pub fn new(behavior: RestartBehavior) -> Self {
        Self {
            behavior,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceRestarter for MockRestarter {
    async fn restart(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            RestartBehavior::Succeed => Ok(()),
            RestartBehavior::NotFound => Err(Error::not_found("No such container: nginx_https")),
            RestartBehavior::RuntimeError => {
                Err(Error::runtime("Cannot connect to the Docker daemon"))
            }
        }
    }

    fn target(&self) -> &str {
        "nginx_https"
    }
}

/// Build an engine around the given doubles
pub fn engine_with(
    probe: Arc<MockProbe>,
    executor: Arc<MockExecutor>,
    restarter: Arc<MockRestarter>,
) -> (RenewalEngine, mpsc::Receiver<EngineEvent>) {
    engine_with_config(probe, executor, restarter, EngineConfig::default())
}

/// Build an engine around the given doubles with custom engine settings
pub fn engine_with_config(
    probe: Arc<MockProbe>,
    executor: Arc<MockExecutor>,
    restarter: Arc<MockRestarter>,
    config: EngineConfig,
) -> (RenewalEngine, mpsc::Receiver<EngineEvent>) {
    let inspector = CertificateInspector::new(probe, config.renewal_threshold_days);
    RenewalEngine::new(
        inspector,
        executor,
        restarter,
        RenewalContext::new("ops@example.com"),
        config,
    )
    .expect("engine construction succeeds")
}

/// Collect every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
