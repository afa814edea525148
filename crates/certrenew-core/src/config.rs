//! Configuration types for the renewal daemon
//!
//! This module defines all configuration structures used throughout the crate.
//! A [`RenewConfig`] is built once at startup (see [`crate::env`]) and is
//! immutable afterwards; components receive the parts they need by value or
//! behind an `Arc`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder substituted with the domain name in certificate path templates
pub const DOMAIN_PLACEHOLDER: &str = "{domain}";

/// Main renewal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewConfig {
    /// Process-wide renewal context (contact, paths)
    pub context: RenewalContext,

    /// Domains to manage, one schedule each
    pub domains: Vec<DomainConfig>,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl RenewConfig {
    /// Validate the configuration
    ///
    /// Every failure here is fatal: the daemon must refuse to start rather
    /// than run with a partial set of schedules.
    pub fn validate(&self) -> Result<()> {
        self.context.validate()?;

        if self.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        let mut seen_domains = HashSet::new();
        let mut seen_prefixes = HashSet::new();
        for domain in &self.domains {
            validate_domain_name(&domain.domain)?;

            if !seen_domains.insert(domain.domain.as_str()) {
                return Err(Error::config(format!(
                    "Domain '{}' is configured more than once",
                    domain.domain
                )));
            }

            let prefix = env_prefix(&domain.domain);
            if prefix.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(Error::config(format!(
                    "Domain '{}' starts with a digit, so '{}_RENEW_*' is not a valid \
                    environment variable name",
                    domain.domain, prefix
                )));
            }
            if !seen_prefixes.insert(prefix.clone()) {
                return Err(Error::config(format!(
                    "Domain '{}' shares the schedule prefix '{}' with another domain",
                    domain.domain, prefix
                )));
            }

            domain.schedule.parse()?;
        }

        self.tools.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Process-wide context shared read-only by every renewal attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalContext {
    /// ACME account contact email
    pub email: String,

    /// Directory served by the proxy for HTTP-01 webroot validation
    #[serde(default = "default_webroot_path")]
    pub webroot_path: PathBuf,

    /// Certificate path template, `{domain}` is replaced by the domain name
    #[serde(default = "default_cert_path_template")]
    pub cert_path_template: String,
}

impl RenewalContext {
    /// Create a context with default paths
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            webroot_path: default_webroot_path(),
            cert_path_template: default_cert_path_template(),
        }
    }

    /// Set the webroot path
    pub fn with_webroot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.webroot_path = path.into();
        self
    }

    /// Set the certificate path template
    pub fn with_cert_path_template(mut self, template: impl Into<String>) -> Self {
        self.cert_path_template = template.into();
        self
    }

    /// Resolve the certificate path for a domain
    pub fn cert_path(&self, domain: &str) -> PathBuf {
        PathBuf::from(self.cert_path_template.replace(DOMAIN_PLACEHOLDER, domain))
    }

    fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(Error::config("Contact email cannot be empty"));
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(Error::config(format!(
                "Contact email '{}' is not a valid address",
                self.email
            )));
        }
        if self.webroot_path.as_os_str().is_empty() {
            return Err(Error::config("Webroot path cannot be empty"));
        }
        if !self.cert_path_template.contains(DOMAIN_PLACEHOLDER) {
            return Err(Error::config(format!(
                "Certificate path template '{}' must contain {}",
                self.cert_path_template, DOMAIN_PLACEHOLDER
            )));
        }
        Ok(())
    }
}

/// Per-domain configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Fully qualified domain name; also the join key for paths and logs
    pub domain: String,

    /// When to run renewal attempts for this domain
    pub schedule: CronSchedule,
}

impl DomainConfig {
    /// Create a new domain configuration
    pub fn new(domain: impl Into<String>, schedule: CronSchedule) -> Self {
        Self {
            domain: domain.into(),
            schedule,
        }
    }
}

/// Cron-style schedule for one domain
///
/// The five standard fields are required. The seconds field is optional and
/// defaults to `0`, so a schedule fires at the top of the matching minute.
/// All schedules are evaluated in UTC.
///
/// Numeric day-of-week values run `0` (Monday) to `6` (Sunday). Day names
/// such as `Mon` are passed to the cron parser unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    /// Seconds field
    #[serde(default = "default_second")]
    pub second: String,
    /// Minute field
    pub minute: String,
    /// Hour field
    pub hour: String,
    /// Day-of-month field
    pub day_of_month: String,
    /// Month field
    pub month: String,
    /// Day-of-week field
    pub day_of_week: String,
}

impl CronSchedule {
    /// Create a schedule from the five standard fields
    pub fn new(
        minute: impl Into<String>,
        hour: impl Into<String>,
        day_of_month: impl Into<String>,
        month: impl Into<String>,
        day_of_week: impl Into<String>,
    ) -> Self {
        Self {
            second: default_second(),
            minute: minute.into(),
            hour: hour.into(),
            day_of_month: day_of_month.into(),
            month: month.into(),
            day_of_week: day_of_week.into(),
        }
    }

    /// Set the seconds field
    pub fn with_second(mut self, second: impl Into<String>) -> Self {
        self.second = second.into();
        self
    }

    /// The six-field expression handed to the cron parser
    pub fn expression(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.second, self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }

    /// Parse into an evaluable schedule
    pub fn parse(&self) -> Result<cron::Schedule> {
        let fields = [
            ("second", &self.second),
            ("minute", &self.minute),
            ("hour", &self.hour),
            ("day", &self.day_of_month),
            ("month", &self.month),
            ("day_of_week", &self.day_of_week),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::schedule(format!("Cron field '{}' is empty", name)));
            }
            if value.trim().contains(char::is_whitespace) {
                return Err(Error::schedule(format!(
                    "Cron field '{}' contains whitespace: '{}'",
                    name, value
                )));
            }
        }

        let expression = format!(
            "{} {} {} {} {} {}",
            self.second,
            self.minute,
            self.hour,
            self.day_of_month,
            self.month,
            translate_day_of_week(&self.day_of_week)?
        );
        cron::Schedule::from_str(&expression).map_err(|e| {
            Error::schedule(format!("Invalid cron expression '{}': {}", self.expression(), e))
        })
    }
}

/// Rewrite numeric day-of-week tokens into the cron parser's numbering
///
/// Input numbers are `0` = Monday through `6` = Sunday; the parser counts
/// `1` = Sunday through `7` = Saturday. Ranges and steps are expanded to an
/// explicit list so a range ending on Sunday cannot wrap.
fn translate_day_of_week(field: &str) -> Result<String> {
    let field = field.trim();
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut passthrough = Vec::new();
    let mut days = BTreeSet::new();
    for element in field.split(',') {
        if element.chars().any(|c| c.is_ascii_alphabetic()) {
            passthrough.push(element.to_string());
            continue;
        }

        let (base, step) = match element.split_once('/') {
            Some((base, step)) => (base, parse_day_of_week_number(step, field)?),
            None => (element, 1),
        };
        if step == 0 {
            return Err(Error::schedule(format!(
                "Day-of-week step cannot be zero: '{}'",
                field
            )));
        }

        let (start, end) = match base {
            "*" => (0, 6),
            _ => match base.split_once('-') {
                Some((start, end)) => (
                    parse_day_of_week_number(start, field)?,
                    parse_day_of_week_number(end, field)?,
                ),
                None => {
                    let day = parse_day_of_week_number(base, field)?;
                    // `n/step` runs from n to the end of the week
                    (day, if element.contains('/') { 6 } else { day })
                }
            },
        };
        if start > 6 || end > 6 {
            return Err(Error::schedule(format!(
                "Day-of-week must be between 0 (Monday) and 6 (Sunday): '{}'",
                field
            )));
        }
        if start > end {
            return Err(Error::schedule(format!(
                "Day-of-week range runs backwards: '{}'",
                field
            )));
        }

        days.extend((start..=end).step_by(step as usize).map(|day| (day + 1) % 7 + 1));
    }

    passthrough.extend(days.into_iter().map(|day| day.to_string()));
    Ok(passthrough.join(","))
}

fn parse_day_of_week_number(token: &str, field: &str) -> Result<u32> {
    token.parse().map_err(|_| {
        Error::schedule(format!("Invalid day-of-week '{}' in '{}'", token, field))
    })
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// ACME client binary
    #[serde(default = "default_certbot_bin")]
    pub certbot_bin: String,

    /// Certificate inspection binary
    #[serde(default = "default_openssl_bin")]
    pub openssl_bin: String,

    /// Container runtime CLI
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    /// Logical name of the dependent proxy service
    #[serde(default = "default_restart_target")]
    pub restart_target: String,

    /// Upper bound on one ACME client run, unbounded when unset
    #[serde(default)]
    pub renew_timeout_secs: Option<u64>,
}

impl ToolConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("certbot binary", &self.certbot_bin),
            ("openssl binary", &self.openssl_bin),
            ("docker binary", &self.docker_bin),
            ("restart target", &self.restart_target),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("The {} cannot be empty", name)));
            }
        }

        if let Some(timeout) = self.renew_timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            return Err(Error::config(format!(
                "Renewal timeout must be between 1 and 3600 seconds. Got: {}",
                timeout
            )));
        }

        Ok(())
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            certbot_bin: default_certbot_bin(),
            openssl_bin: default_openssl_bin(),
            docker_bin: default_docker_bin(),
            restart_target: default_restart_target(),
            renew_timeout_secs: None,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Renew when fewer than this many days of validity remain
    #[serde(default = "default_renewal_threshold_days")]
    pub renewal_threshold_days: u32,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// How long shutdown waits for in-flight attempts (in seconds)
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<()> {
        // Let's Encrypt certificates are valid for 90 days.
        if !(1..=89).contains(&self.renewal_threshold_days) {
            return Err(Error::config(format!(
                "Renewal threshold must be between 1 and 89 days. Got: {}",
                self.renewal_threshold_days
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            renewal_threshold_days: default_renewal_threshold_days(),
            event_channel_capacity: default_event_channel_capacity(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Environment key prefix for a domain's schedule fields
///
/// The leading label, upper-cased, with `-` mapped to `_`:
/// `a.com` → `A`, `my-site.org` → `MY_SITE`. Domains whose leading label
/// starts with a digit are rejected by [`RenewConfig::validate`] since the
/// prefix would not be a valid shell identifier.
pub fn env_prefix(domain: &str) -> String {
    domain
        .split('.')
        .next()
        .unwrap_or_default()
        .to_uppercase()
        .replace('-', "_")
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common mistakes rather than every edge case.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_second() -> String {
    "0".to_string()
}

fn default_webroot_path() -> PathBuf {
    PathBuf::from("/var/www/certbot")
}

fn default_cert_path_template() -> String {
    "/etc/letsencrypt/live/{domain}/cert.pem".to_string()
}

fn default_certbot_bin() -> String {
    "certbot".to_string()
}

fn default_openssl_bin() -> String {
    "openssl".to_string()
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_restart_target() -> String {
    "nginx_https".to_string()
}

fn default_renewal_threshold_days() -> u32 {
    30
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Utc, Weekday};

    fn config_for(domains: &[&str]) -> RenewConfig {
        RenewConfig {
            context: RenewalContext::new("ops@example.com"),
            domains: domains
                .iter()
                .map(|d| DomainConfig::new(*d, CronSchedule::new("0", "3", "*", "*", "*")))
                .collect(),
            tools: ToolConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn env_prefix_uses_leading_label() {
        assert_eq!(env_prefix("a.com"), "A");
        assert_eq!(env_prefix("example.com"), "EXAMPLE");
        assert_eq!(env_prefix("my-site.example.org"), "MY_SITE");
    }

    #[test]
    fn cert_path_substitutes_domain() {
        let ctx = RenewalContext::new("ops@example.com");
        assert_eq!(
            ctx.cert_path("example.com"),
            PathBuf::from("/etc/letsencrypt/live/example.com/cert.pem")
        );
    }

    #[test]
    fn schedule_expression_defaults_seconds_to_zero() {
        let schedule = CronSchedule::new("30", "2", "*", "*", "*");
        assert_eq!(schedule.expression(), "0 30 2 * * *");
        assert!(schedule.parse().is_ok());
    }

    #[test]
    fn schedule_rejects_empty_and_garbage_fields() {
        let empty = CronSchedule::new("0", "", "*", "*", "*");
        assert!(matches!(empty.parse(), Err(Error::Schedule(_))));

        let garbage = CronSchedule::new("0", "25", "*", "*", "*");
        assert!(matches!(garbage.parse(), Err(Error::Schedule(_))));

        let spaced = CronSchedule::new("0", "1 2", "*", "*", "*");
        assert!(matches!(spaced.parse(), Err(Error::Schedule(_))));
    }

    fn next_weekday(day_of_week: &str) -> Weekday {
        // 2025-06-01 is a Sunday
        let sunday = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        CronSchedule::new("0", "3", "*", "*", day_of_week)
            .parse()
            .unwrap()
            .after(&sunday)
            .next()
            .unwrap()
            .weekday()
    }

    #[test]
    fn day_of_week_counts_from_monday() {
        assert_eq!(next_weekday("0"), Weekday::Mon);
        assert_eq!(next_weekday("6"), Weekday::Sun);
        assert_eq!(next_weekday("1-5"), Weekday::Tue);
        assert_eq!(next_weekday("4,5"), Weekday::Fri);
    }

    #[test]
    fn weekday_range_excludes_weekend() {
        let sunday = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let fires: Vec<Weekday> = CronSchedule::new("0", "3", "*", "*", "0-4")
            .parse()
            .unwrap()
            .after(&sunday)
            .take(7)
            .map(|fire| fire.weekday())
            .collect();
        assert_eq!(
            fires,
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Mon,
                Weekday::Tue
            ]
        );
    }

    #[test]
    fn day_of_week_translation() {
        assert_eq!(translate_day_of_week("*").unwrap(), "*");
        assert_eq!(translate_day_of_week("5-6").unwrap(), "1,7");
        assert_eq!(translate_day_of_week("*/2").unwrap(), "1,2,4,6");
        assert_eq!(translate_day_of_week("Mon-Fri").unwrap(), "Mon-Fri");
        assert!(translate_day_of_week("7").is_err());
        assert!(translate_day_of_week("4-1").is_err());
        assert!(translate_day_of_week("1/0").is_err());
    }

    #[test]
    fn leading_digit_domain_is_rejected() {
        let err = config_for(&["1site.example.com"]).validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("1SITE_RENEW_*"));
        assert!(config_for(&["www1.example.com"]).validate().is_ok());
    }

    #[test]
    fn valid_config_passes() {
        assert!(config_for(&["a.com", "b.com"]).validate().is_ok());
    }

    #[test]
    fn empty_domain_list_is_rejected() {
        let err = config_for(&[]).validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn prefix_collision_is_rejected() {
        let err = config_for(&["www.a.com", "www.b.com"]).validate().unwrap_err();
        assert!(err.to_string().contains("prefix 'WWW'"));
    }

    #[test]
    fn duplicate_domain_is_rejected() {
        assert!(config_for(&["a.com", "a.com"]).validate().is_err());
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let mut config = config_for(&["a.com"]);
        config.context.cert_path_template = "/etc/cert.pem".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let mut config = config_for(&["a.com"]);
        config.engine.renewal_threshold_days = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn domain_name_validation() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("sub-1.example.com").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("a..com").is_err());
        assert!(validate_domain_name("-a.com").is_err());
        assert!(validate_domain_name("a_b.com").is_err());
    }
}
