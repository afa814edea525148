// # certbot Integration
//
// This crate provides the subprocess-backed collaborators of the renewal
// pipeline:
//
// - `CertbotExecutor`: runs `certbot certonly` with webroot validation
// - `OpensslProbe`: reads a certificate's `notAfter` with `openssl x509`
//
// ## Contract
//
// - One subprocess per call, output captured in full on completion
// - Exit status 0 is success, anything else is failure
// - A binary that cannot be started is a failure outcome, never a panic
//
// Retry, scheduling and restart decisions belong to `RenewalEngine`.

mod openssl;

pub use openssl::{OpensslProbe, parse_not_after};

use async_trait::async_trait;
use certrenew_core::config::{RenewalContext, ToolConfig};
use certrenew_core::traits::{ExecutionOutcome, FailureCause, RenewalExecutor};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// certbot-backed renewal executor
#[derive(Debug, Clone)]
pub struct CertbotExecutor {
    binary: String,
    timeout: Option<Duration>,
}

impl CertbotExecutor {
    /// Create an executor that runs `binary`
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Kill the tool if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create an executor from the tool configuration
    pub fn from_config(tools: &ToolConfig) -> Self {
        let executor = Self::new(tools.certbot_bin.clone());
        match tools.renew_timeout_secs {
            Some(secs) => executor.with_timeout(Duration::from_secs(secs)),
            None => executor,
        }
    }

    /// Arguments for a forced, non-interactive webroot issuance
    pub fn command_args(domain: &str, context: &RenewalContext) -> Vec<String> {
        vec![
            "certonly".to_string(),
            "--reinstall".to_string(),
            "--webroot".to_string(),
            format!("--webroot-path={}", context.webroot_path.display()),
            "--email".to_string(),
            context.email.clone(),
            "--agree-tos".to_string(),
            "--no-eff-email".to_string(),
            "--non-interactive".to_string(),
            "-d".to_string(),
            domain.to_string(),
            "--force-renewal".to_string(),
            "-v".to_string(),
        ]
    }
}

#[async_trait]
impl RenewalExecutor for CertbotExecutor {
    async fn renew(&self, domain: &str, context: &RenewalContext) -> ExecutionOutcome {
        let args = Self::command_args(domain, context);
        info!(domain = %domain, "Starting SSL certificate renewal");
        debug!("Running command: {} {:?}", self.binary, args);

        let mut command = Command::new(&self.binary);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return ExecutionOutcome::Failed {
                        stderr: String::new(),
                        cause: FailureCause::TimedOut(limit.as_secs()),
                    };
                }
            },
            None => command.output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return ExecutionOutcome::Failed {
                    stderr: String::new(),
                    cause: FailureCause::Launch(format!("{}: {}", self.binary, e)),
                };
            }
        };

        debug!(
            domain = %domain,
            "Command finished with exit code: {:?}",
            output.status.code()
        );

        if output.status.success() {
            ExecutionOutcome::Succeeded {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            }
        } else {
            ExecutionOutcome::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                cause: FailureCause::ExitStatus(output.status.code()),
            }
        }
    }

    fn tool_name(&self) -> &'static str {
        "certbot"
    }
}
