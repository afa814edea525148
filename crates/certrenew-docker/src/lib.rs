// # Docker Service Restarter
//
// Restarts the reverse-proxy container after a certificate has been renewed,
// through the `docker` CLI so that the daemon talks to whatever engine the
// CLI is configured for (`DOCKER_HOST`, contexts).
//
// ## Failure Classification
//
// - `Error::NotFound`: the daemon reports "No such container"
// - `Error::Runtime`: CLI missing, daemon unreachable, any other nonzero exit
//
// Neither is fatal; the engine logs them as distinct events.

use async_trait::async_trait;
use certrenew_core::config::ToolConfig;
use certrenew_core::error::{Error, Result};
use certrenew_core::traits::ServiceRestarter;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Marker the docker daemon uses for a missing container
const NOT_FOUND_MARKER: &str = "No such container";

/// Restarts one named container with `docker restart`
#[derive(Debug, Clone)]
pub struct DockerRestarter {
    binary: String,
    container: String,
}

impl DockerRestarter {
    /// Create a restarter for `container` using the `binary` CLI
    pub fn new(binary: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            container: container.into(),
        }
    }

    /// Create a restarter from the tool configuration
    pub fn from_config(tools: &ToolConfig) -> Self {
        Self::new(tools.docker_bin.clone(), tools.restart_target.clone())
    }
}

#[async_trait]
impl ServiceRestarter for DockerRestarter {
    async fn restart(&self) -> Result<()> {
        debug!(container = %self.container, "Restarting container");

        let output = Command::new(&self.binary)
            .args(["restart", self.container.as_str()])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::runtime(format!("failed to run {}: {}", self.binary, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains(NOT_FOUND_MARKER) {
            Err(Error::not_found(stderr))
        } else {
            Err(Error::runtime(format!(
                "{} restart {} exited with {:?}: {}",
                self.binary,
                self.container,
                output.status.code(),
                stderr
            )))
        }
    }

    fn target(&self) -> &str {
        &self.container
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_comes_from_config() {
        let restarter = DockerRestarter::from_config(&ToolConfig::default());
        assert_eq!(restarter.target(), "nginx_https");
    }

    #[tokio::test]
    async fn missing_cli_is_a_runtime_error() {
        let restarter = DockerRestarter::new("/nonexistent/docker", "nginx_https");
        assert!(matches!(restarter.restart().await, Err(Error::Runtime(_))));
    }

    #[cfg(unix)]
    mod fake_cli {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        // Knows exactly one container, like a daemon with nginx_https running
        const FAKE_DOCKER: &str = r#"#!/bin/sh
if [ "$1" != "restart" ]; then echo "unexpected command $1" >&2; exit 125; fi
case "$2" in
  nginx_https) echo "$2" ;;
  broken) echo "Cannot connect to the Docker daemon at unix:///var/run/docker.sock" >&2; exit 1 ;;
  *) echo "Error response from daemon: No such container: $2" >&2; exit 1 ;;
esac
"#;

        fn restarter(dir: &tempfile::TempDir, container: &str) -> DockerRestarter {
            let bin = dir.path().join("docker");
            std::fs::write(&bin, FAKE_DOCKER).unwrap();
            std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
            DockerRestarter::new(bin.to_string_lossy().into_owned(), container)
        }

        #[tokio::test]
        async fn existing_container_restarts() {
            let dir = tempfile::tempdir().unwrap();
            assert!(restarter(&dir, "nginx_https").restart().await.is_ok());
        }

        #[tokio::test]
        async fn unknown_container_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let err = restarter(&dir, "nginx_missing").restart().await.unwrap_err();
            assert!(matches!(err, Error::NotFound(ref msg) if msg.contains("nginx_missing")));
        }

        #[tokio::test]
        async fn daemon_failure_is_a_runtime_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = restarter(&dir, "broken").restart().await.unwrap_err();
            assert!(matches!(err, Error::Runtime(_)));
        }
    }
}
