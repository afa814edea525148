//! Per-domain renewal scheduler
//!
//! The Scheduler owns one independent cron trigger per configured domain and
//! dispatches [`RenewalEngine::attempt`] whenever a trigger fires. It blocks
//! until shutdown.
//!
//! ## Triggers
//!
//! Each domain gets its own task. The task owns a copy of its domain name and
//! its parsed schedule, taken at registration time, so a trigger can only
//! ever attempt the domain it was registered for.
//!
//! A task runs its attempt to completion before computing the next fire
//! time from the current clock. Fires that elapse while an attempt is still
//! running are coalesced into the next one rather than queued.
//!
//! ## Shutdown
//!
//! On SIGINT/SIGTERM (or the test shutdown channel), idle triggers stop
//! immediately. In-flight attempts are given `shutdown_grace_secs` to finish
//! before their tasks are aborted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::DomainConfig;
use crate::engine::{EngineEvent, RenewalEngine};
use crate::error::Result;

/// A domain bound to its parsed schedule
#[derive(Clone)]
struct Registration {
    domain: String,
    expression: String,
    schedule: cron::Schedule,
}

/// Cron scheduler for renewal attempts
pub struct Scheduler {
    engine: Arc<RenewalEngine>,
    registrations: Vec<Registration>,
}

impl Scheduler {
    /// Create a scheduler for the given domains
    ///
    /// Every schedule is parsed here, before anything runs. One invalid
    /// schedule fails construction, so no trigger is ever registered for a
    /// partially valid configuration.
    pub fn new(engine: Arc<RenewalEngine>, domains: Vec<DomainConfig>) -> Result<Self> {
        let registrations = domains
            .into_iter()
            .map(|d| {
                Ok(Registration {
                    expression: d.schedule.expression(),
                    schedule: d.schedule.parse()?,
                    domain: d.domain,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            engine,
            registrations,
        })
    }

    /// Domains with a registered trigger
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.domain.as_str())
    }

    /// Next fire time for `domain` strictly after `after`
    pub fn next_fire(&self, domain: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.registrations
            .iter()
            .find(|r| r.domain == domain)
            .and_then(|r| r.schedule.after(&after).next())
    }

    /// Run until SIGINT or SIGTERM
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until the given channel fires (or a signal arrives when `None`)
    ///
    /// Production code should use [`Scheduler::run`]; this exists so tests
    /// can stop the scheduler deterministically.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        self.engine.emit_event(EngineEvent::SchedulerStarted {
            domains_count: self.registrations.len(),
        });

        for registration in &self.registrations {
            info!(
                domain = %registration.domain,
                schedule = %registration.expression,
                next = ?registration.schedule.upcoming(Utc).next(),
                "Renewal trigger registered"
            );

            let trigger = Trigger {
                registration: registration.clone(),
                engine: Arc::clone(&self.engine),
                stop: stop_rx.clone(),
            };
            tasks.spawn(trigger.run());
        }

        info!(domains = self.registrations.len(), "Scheduler started");

        let reason = match shutdown_rx {
            Some(rx) => {
                let _ = rx.await;
                "Shutdown signal"
            }
            None => wait_for_signal().await?,
        };
        info!(reason = %reason, "Shutdown requested, stopping triggers");

        let _ = stop_tx.send(true);

        let grace = Duration::from_secs(self.engine.config().shutdown_grace_secs);
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    error!(error = %e, "Renewal trigger task panicked");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(grace_secs = grace.as_secs(), "In-flight attempts did not finish in time, aborting");
            tasks.shutdown().await;
        }

        self.engine.emit_event(EngineEvent::SchedulerStopped {
            reason: reason.to_string(),
        });
        info!("Scheduler stopped");

        Ok(())
    }
}

/// One domain's recurring trigger
struct Trigger {
    registration: Registration,
    engine: Arc<RenewalEngine>,
    stop: watch::Receiver<bool>,
}

impl Trigger {
    async fn run(self) {
        let Trigger {
            registration,
            engine,
            mut stop,
        } = self;
        let domain = registration.domain;
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let now = Utc::now();
            let from = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = registration.schedule.after(&from).next() else {
                warn!(domain = %domain, "Schedule has no upcoming fire times, trigger ends");
                break;
            };

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(domain = %domain, next = %next, "Next renewal attempt scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop.changed() => break,
            }
            if *stop.borrow() {
                break;
            }

            last_fire = Some(next);
            let outcome = engine.attempt(&domain).await;
            debug!(domain = %domain, outcome = outcome.label(), "Renewal attempt finished");
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("SIGINT")
}
