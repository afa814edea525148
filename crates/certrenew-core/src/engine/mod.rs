//! Renewal engine
//!
//! The RenewalEngine runs one renewal attempt for one domain:
//! - Inspect the current certificate via CertificateInspector
//! - Run the ACME client via RenewalExecutor when renewal is due
//! - Restart the dependent service via ServiceRestarter after a success
//!
//! ## Attempt Flow
//!
//! ```text
//! START ──▶ CHECK ──[valid]──────▶ SKIPPED
//!             │
//!          [due]
//!             ▼
//!          EXECUTE ──[failure]───▶ FAILED   (no restart)
//!             │
//!         [success]
//!             ▼
//!          RESTART ──────────────▶ SUCCEEDED (restart result logged separately)
//! ```
//!
//! There is no retry inside an attempt; the next scheduled trigger is the
//! retry path. Every backend call runs in its own task so that a panicking
//! backend is contained at the attempt boundary. Dropping an attempt aborts
//! the backend task with it, so an aborted trigger never leaves a client
//! process running behind it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, RenewalContext};
use crate::error::{Error, Result};
use crate::inspector::{CertificateInspector, RenewalDecision};
use crate::traits::{
    ExecutionOutcome, FailureCause, RenewalExecutor, RenewalOutcome, ServiceRestarter,
};

/// Aborts the wrapped task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `future` on its own task, tied to the lifetime of the caller
///
/// A panic surfaces as a `JoinError`. If the caller is dropped first, the
/// task is aborted instead of being left detached.
async fn contained<F>(future: F) -> std::result::Result<F::Output, JoinError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(future));
    (&mut task.0).await
}

/// Events emitted by the RenewalEngine and Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Scheduler registered its triggers
    SchedulerStarted { domains_count: usize },

    /// A trigger fired and the attempt acquired its domain lock
    AttemptStarted { domain: String },

    /// Certificate still valid, nothing to do
    RenewalSkipped { domain: String, reason: String },

    /// Renewal is due and the ACME client is being started
    RenewalStarted { domain: String, reason: String },

    /// ACME client exited successfully
    RenewalSucceeded { domain: String },

    /// ACME client failed
    RenewalFailed { domain: String, cause: FailureCause },

    /// Dependent service restarted
    RestartSucceeded { domain: String, service: String },

    /// Dependent service does not exist
    RestartTargetNotFound {
        domain: String,
        service: String,
        error: String,
    },

    /// Dependent service restart failed for another reason
    RestartFailed {
        domain: String,
        service: String,
        error: String,
    },

    /// Scheduler stopped
    SchedulerStopped { reason: String },
}

/// Renewal orchestrator
///
/// ## Threading
///
/// The engine is shared behind an `Arc` by every scheduler task. Attempts
/// for different domains run concurrently; attempts for the same domain are
/// serialized by a per-domain lock held for the whole attempt.
pub struct RenewalEngine {
    /// Renewal policy
    inspector: Arc<CertificateInspector>,

    /// ACME client integration
    executor: Arc<dyn RenewalExecutor>,

    /// Container runtime integration
    restarter: Arc<dyn ServiceRestarter>,

    /// Shared read-only renewal context
    context: Arc<RenewalContext>,

    /// One lock per domain, created on first use
    domain_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,

    /// Engine settings
    config: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl RenewalEngine {
    /// Create a new renewal engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        inspector: CertificateInspector,
        executor: Arc<dyn RenewalExecutor>,
        restarter: Arc<dyn ServiceRestarter>,
        context: RenewalContext,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            inspector: Arc::new(inspector),
            executor,
            restarter,
            context: Arc::new(context),
            domain_locks: StdMutex::new(HashMap::new()),
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Shared renewal context
    pub fn context(&self) -> &RenewalContext {
        &self.context
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one renewal attempt for `domain`
    ///
    /// Never fails: every problem becomes part of the returned outcome or a
    /// logged event. If an attempt for the same domain is already running,
    /// this waits for it to finish first.
    pub async fn attempt(&self, domain: &str) -> RenewalOutcome {
        let lock = self.domain_lock(domain);
        let _guard = lock.lock().await;

        debug!(domain = %domain, "Renewal attempt started");
        self.emit_event(EngineEvent::AttemptStarted {
            domain: domain.to_string(),
        });

        let decision = self.check(domain).await;
        if !decision.needs_renewal {
            info!(domain = %domain, reason = %decision.reason, "Renewal skipped");
            self.emit_event(EngineEvent::RenewalSkipped {
                domain: domain.to_string(),
                reason: decision.reason.clone(),
            });
            return RenewalOutcome::Skipped {
                reason: decision.reason,
            };
        }

        info!(domain = %domain, reason = %decision.reason, "Renewal needed");
        self.emit_event(EngineEvent::RenewalStarted {
            domain: domain.to_string(),
            reason: decision.reason,
        });

        let outcome = self.execute(domain).await;
        match &outcome {
            ExecutionOutcome::Succeeded { stdout } => {
                info!(
                    domain = %domain,
                    tool = self.executor.tool_name(),
                    "Certificate renewal succeeded:\n{}",
                    stdout
                );
                self.emit_event(EngineEvent::RenewalSucceeded {
                    domain: domain.to_string(),
                });
                self.restart(domain).await;
            }
            ExecutionOutcome::Failed { stderr, cause } => {
                error!(
                    domain = %domain,
                    tool = self.executor.tool_name(),
                    cause = %cause,
                    "Certificate renewal failed:\n{}",
                    stderr
                );
                self.emit_event(EngineEvent::RenewalFailed {
                    domain: domain.to_string(),
                    cause: cause.clone(),
                });
            }
        }

        outcome.into()
    }

    /// Inspect the certificate, treating a faulted inspection as "renew"
    async fn check(&self, domain: &str) -> RenewalDecision {
        let inspector = Arc::clone(&self.inspector);
        let owned = domain.to_string();

        match contained(async move { inspector.inspect(&owned).await }).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(domain = %domain, error = %e, "Certificate inspection faulted");
                RenewalDecision {
                    needs_renewal: true,
                    reason: format!("inspection faulted: {}", e),
                    expiry: None,
                }
            }
        }
    }

    /// Run the ACME client, converting a faulted executor into a failure
    async fn execute(&self, domain: &str) -> ExecutionOutcome {
        let executor = Arc::clone(&self.executor);
        let context = Arc::clone(&self.context);
        let owned = domain.to_string();

        match contained(async move { executor.renew(&owned, &context).await }).await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::Failed {
                stderr: String::new(),
                cause: FailureCause::Panicked(e.to_string()),
            },
        }
    }

    /// Restart the dependent service; the result is logged, never returned
    async fn restart(&self, domain: &str) {
        let restarter = Arc::clone(&self.restarter);
        let service = self.restarter.target().to_string();

        let result = match contained(async move { restarter.restart().await }).await {
            Ok(result) => result,
            Err(e) => Err(Error::runtime(format!("restarter panicked: {}", e))),
        };

        match result {
            Ok(()) => {
                info!(domain = %domain, service = %service, "Service restarted successfully");
                self.emit_event(EngineEvent::RestartSucceeded {
                    domain: domain.to_string(),
                    service,
                });
            }
            Err(Error::NotFound(msg)) => {
                error!(domain = %domain, service = %service, error = %msg, "Restart target not found");
                self.emit_event(EngineEvent::RestartTargetNotFound {
                    domain: domain.to_string(),
                    service,
                    error: msg,
                });
            }
            Err(e) => {
                error!(domain = %domain, service = %service, error = %e, "Service restart failed");
                self.emit_event(EngineEvent::RestartFailed {
                    domain: domain.to_string(),
                    service,
                    error: e.to_string(),
                });
            }
        }
    }

    fn domain_lock(&self, domain: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .domain_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(domain.to_string()).or_default())
    }

    /// Emit an engine event
    ///
    /// Events are dropped with a warning when the channel is full. A closed
    /// channel means nobody is listening, which is fine.
    pub(crate) fn emit_event(&self, event: EngineEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
