//! Certificate expiry probe backed by `openssl x509`

use async_trait::async_trait;
use certrenew_core::config::{RenewalContext, ToolConfig};
use certrenew_core::error::{Error, Result};
use certrenew_core::traits::CertificateProbe;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Date format of the `notAfter=` line, after whitespace normalization
const NOT_AFTER_FORMAT: &str = "%b %d %H:%M:%S %Y GMT";

/// Reads certificate expiry with `openssl x509 -enddate -noout -in <path>`
#[derive(Debug, Clone)]
pub struct OpensslProbe {
    binary: String,
    context: RenewalContext,
}

impl OpensslProbe {
    /// Create a probe resolving certificate paths through `context`
    pub fn new(binary: impl Into<String>, context: RenewalContext) -> Self {
        Self {
            binary: binary.into(),
            context,
        }
    }

    /// Create a probe from the tool configuration
    pub fn from_config(tools: &ToolConfig, context: RenewalContext) -> Self {
        Self::new(tools.openssl_bin.clone(), context)
    }
}

#[async_trait]
impl CertificateProbe for OpensslProbe {
    async fn expiry(&self, domain: &str) -> Result<DateTime<Utc>> {
        let path = self.context.cert_path(domain);
        debug!(domain = %domain, path = %path.display(), "Reading certificate expiry");

        let output = Command::new(&self.binary)
            .args(["x509", "-enddate", "-noout", "-in"])
            .arg(&path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::inspection(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(Error::inspection(format!(
                "{} could not read {} ({:?}): {}",
                self.binary,
                path.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_not_after(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the expiry from `openssl x509 -enddate` output
///
/// Expects a line like `notAfter=Jan  1 00:00:00 2030 GMT`.
pub fn parse_not_after(output: &str) -> Result<DateTime<Utc>> {
    let value = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("notAfter="))
        .ok_or_else(|| Error::inspection("no notAfter= line in openssl output"))?;

    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, NOT_AFTER_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::inspection(format!("unparseable expiry '{}': {}", value.trim(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_space_padded_day() {
        let expiry = parse_not_after("notAfter=Jan  1 00:00:00 2030 GMT\n").unwrap();
        assert_eq!(expiry, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_two_digit_day() {
        let expiry = parse_not_after("notAfter=Nov 15 12:34:56 2026 GMT").unwrap();
        assert_eq!(expiry, Utc.with_ymd_and_hms(2026, 11, 15, 12, 34, 56).unwrap());
    }

    #[test]
    fn missing_line_is_an_inspection_error() {
        let err = parse_not_after("subject=CN = example.com\n").unwrap_err();
        assert!(matches!(err, Error::Inspection(_)));
    }

    #[test]
    fn garbage_date_is_an_inspection_error() {
        assert!(parse_not_after("notAfter=sometime next year").is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_an_inspection_error() {
        let probe = OpensslProbe::new("/nonexistent/openssl", RenewalContext::new("ops@example.com"));
        assert!(matches!(
            probe.expiry("example.com").await,
            Err(Error::Inspection(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_expiry_from_fake_openssl() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("openssl");
        // Only answers for the path derived from the domain
        let body = format!(
            "#!/bin/sh\nif [ \"$5\" = \"{}/example.com.pem\" ]; then echo 'notAfter=Mar  9 08:00:00 2031 GMT'; else echo 'Could not open file' >&2; exit 1; fi\n",
            dir.path().display()
        );
        std::fs::write(&bin, body).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let context = RenewalContext::new("ops@example.com")
            .with_cert_path_template(format!("{}/{{domain}}.pem", dir.path().display()));
        let probe = OpensslProbe::new(bin.to_string_lossy().into_owned(), context);

        assert_eq!(
            probe.expiry("example.com").await.unwrap(),
            Utc.with_ymd_and_hms(2031, 3, 9, 8, 0, 0).unwrap()
        );
        assert!(matches!(probe.expiry("other.com").await, Err(Error::Inspection(_))));
    }
}
