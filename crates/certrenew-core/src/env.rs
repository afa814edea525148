//! Environment-based configuration loading
//!
//! All configuration is read once, at startup, through a lookup function.
//! The daemon passes `std::env::var`; tests pass a map so they never touch
//! the process environment.
//!
//! ## Keys
//!
//! - `EMAIL`: ACME account contact (required)
//! - `DOMAINS` (or `DOMAIN`): comma-separated domain list (required)
//! - `<PREFIX>_RENEW_MINUTE`, `_RENEW_HOUR`, `_RENEW_DAY`, `_RENEW_MONTH`,
//!   `_RENEW_DAY_OF_WEEK`: per-domain schedule (required)
//! - `<PREFIX>_RENEW_SECOND`: per-domain seconds field (optional, default `0`)
//! - `WEBROOT_PATH`, `CERT_PATH_TEMPLATE`, `CERTBOT_BIN`, `OPENSSL_BIN`,
//!   `DOCKER_BIN`, `RESTART_CONTAINER`, `RENEW_THRESHOLD_DAYS`,
//!   `RENEW_TIMEOUT_SECS`: optional overrides
//!
//! `<PREFIX>` is derived by [`env_prefix`].

use crate::config::{
    CronSchedule, DomainConfig, EngineConfig, RenewConfig, RenewalContext, ToolConfig, env_prefix,
};
use crate::error::{Error, Result};

/// Suffixes of the five required schedule keys, in cron field order
const SCHEDULE_SUFFIXES: [&str; 5] = [
    "RENEW_MINUTE",
    "RENEW_HOUR",
    "RENEW_DAY",
    "RENEW_MONTH",
    "RENEW_DAY_OF_WEEK",
];

impl RenewConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Empty values are treated as missing. This only assembles the
    /// configuration; call [`RenewConfig::validate`] before using it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                Error::config(format!(
                    "{} is required. Set it via: export {}=...",
                    key, key
                ))
            })
        };

        let email = require("EMAIL")?;

        let domain_list = get("DOMAINS").or_else(|| get("DOMAIN")).ok_or_else(|| {
            Error::config(
                "DOMAINS is required. Set it via: export DOMAINS=example.com,www.example.com",
            )
        })?;

        let names: Vec<String> = domain_list
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if names.is_empty() {
            return Err(Error::config("DOMAINS must contain at least one domain"));
        }

        let mut domains = Vec::with_capacity(names.len());
        for name in names {
            let prefix = env_prefix(&name);
            let mut fields = Vec::with_capacity(SCHEDULE_SUFFIXES.len());
            for suffix in SCHEDULE_SUFFIXES {
                fields.push(require(&format!("{}_{}", prefix, suffix))?);
            }

            let [minute, hour, day, month, day_of_week]: [String; 5] = fields
                .try_into()
                .map_err(|_| Error::config("Schedule field count mismatch"))?;

            let mut schedule = CronSchedule::new(minute, hour, day, month, day_of_week);
            if let Some(second) = get(&format!("{}_RENEW_SECOND", prefix)) {
                schedule = schedule.with_second(second);
            }

            domains.push(DomainConfig::new(name, schedule));
        }

        let mut context = RenewalContext::new(email);
        if let Some(webroot) = get("WEBROOT_PATH") {
            context = context.with_webroot_path(webroot);
        }
        if let Some(template) = get("CERT_PATH_TEMPLATE") {
            context = context.with_cert_path_template(template);
        }

        let mut tools = ToolConfig::default();
        if let Some(bin) = get("CERTBOT_BIN") {
            tools.certbot_bin = bin;
        }
        if let Some(bin) = get("OPENSSL_BIN") {
            tools.openssl_bin = bin;
        }
        if let Some(bin) = get("DOCKER_BIN") {
            tools.docker_bin = bin;
        }
        if let Some(target) = get("RESTART_CONTAINER") {
            tools.restart_target = target;
        }
        tools.renew_timeout_secs = parse_number(&get, "RENEW_TIMEOUT_SECS")?;

        let mut engine = EngineConfig::default();
        if let Some(days) = parse_number(&get, "RENEW_THRESHOLD_DAYS")? {
            engine.renewal_threshold_days = days;
        }

        Ok(Self {
            context,
            domains,
            tools,
            engine,
        })
    }
}

fn parse_number<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            Error::config(format!("{} must be a non-negative integer. Got: {}", key, raw))
        }),
    }
}
