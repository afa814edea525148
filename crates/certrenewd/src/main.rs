// # certrenewd - Certificate Renewal Daemon
//
// This is a thin integration layer. Renewal policy, orchestration and
// scheduling live in certrenew-core; subprocess plumbing lives in the
// certbot and docker crates.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the openssl probe, certbot executor and docker restarter
// 4. Running the scheduler until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Required
// - `EMAIL`: ACME account contact
// - `DOMAINS`: Comma-separated list of domains
// - `<PREFIX>_RENEW_MINUTE`, `<PREFIX>_RENEW_HOUR`, `<PREFIX>_RENEW_DAY`,
//   `<PREFIX>_RENEW_MONTH`, `<PREFIX>_RENEW_DAY_OF_WEEK`: schedule per domain,
//   where `<PREFIX>` is the domain's first label upper-cased
//
// ### Optional
// - `<PREFIX>_RENEW_SECOND`: seconds field (default 0)
// - `WEBROOT_PATH`: webroot for HTTP-01 validation (default /var/www/certbot)
// - `CERT_PATH_TEMPLATE`: certificate location (default /etc/letsencrypt/live/{domain}/cert.pem)
// - `RESTART_CONTAINER`: container restarted after renewal (default nginx_https)
// - `RENEW_THRESHOLD_DAYS`: renewal window in days (default 30)
// - `RENEW_TIMEOUT_SECS`: kill certbot after this long (default: no limit)
// - `CERTBOT_BIN`, `OPENSSL_BIN`, `DOCKER_BIN`: tool overrides
// - `LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export EMAIL=ops@example.com
// export DOMAINS=example.com,shop.example.org
// export EXAMPLE_RENEW_MINUTE=0 EXAMPLE_RENEW_HOUR=3 EXAMPLE_RENEW_DAY='*' \
//        EXAMPLE_RENEW_MONTH='*' EXAMPLE_RENEW_DAY_OF_WEEK='*'
// export SHOP_RENEW_MINUTE=30 SHOP_RENEW_HOUR=4 SHOP_RENEW_DAY='*' \
//        SHOP_RENEW_MONTH='*' SHOP_RENEW_DAY_OF_WEEK='*'
//
// certrenewd
// ```

use anyhow::Result;
use certrenew_certbot::{CertbotExecutor, OpensslProbe};
use certrenew_core::{CertificateInspector, EngineEvent, RenewConfig, RenewalEngine, Scheduler};
use certrenew_docker::DockerRestarter;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum RenewdExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RenewdExitCode> for ExitCode {
    fn from(code: RenewdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Parse `LOG_LEVEL`, defaulting to info
fn parse_log_level(raw: Option<&str>) -> Result<Level> {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("info") => Ok(Level::INFO),
        Some("trace") => Ok(Level::TRACE),
        Some("debug") => Ok(Level::DEBUG),
        Some("warn") => Ok(Level::WARN),
        Some("error") => Ok(Level::ERROR),
        Some(other) => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            other
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match RenewConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RenewdExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RenewdExitCode::ConfigError.into();
    }

    let log_level = match parse_log_level(env::var("LOG_LEVEL").ok().as_deref()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return RenewdExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RenewdExitCode::ConfigError.into();
    }

    info!("Starting certrenewd daemon");
    info!("Configuration loaded: {} domain(s)", config.domains.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RenewdExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => RenewdExitCode::CleanShutdown,
            Err(e) if e.is_fatal() => {
                error!("Startup error: {}", e);
                RenewdExitCode::ConfigError
            }
            Err(e) => {
                error!("Daemon error: {}", e);
                RenewdExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Wire the components and run the scheduler until a shutdown signal
async fn run_daemon(config: RenewConfig) -> certrenew_core::Result<()> {
    let probe = OpensslProbe::from_config(&config.tools, config.context.clone());
    let inspector = CertificateInspector::new(Arc::new(probe), config.engine.renewal_threshold_days);
    let executor = CertbotExecutor::from_config(&config.tools);
    let restarter = DockerRestarter::from_config(&config.tools);

    info!(
        email = %config.context.email,
        webroot = %config.context.webroot_path.display(),
        restart_target = %config.tools.restart_target,
        threshold_days = config.engine.renewal_threshold_days,
        "Renewal pipeline configured"
    );

    let (engine, events) = RenewalEngine::new(
        inspector,
        Arc::new(executor),
        Arc::new(restarter),
        config.context.clone(),
        config.engine.clone(),
    )?;

    let scheduler = Scheduler::new(Arc::new(engine), config.domains)?;
    tokio::spawn(log_events(events));

    scheduler.run().await
}

/// Drain engine events so the channel never fills
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "Engine event");
    }
}
