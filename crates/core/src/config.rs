//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the hop
//! services behind an `Arc`. Request handling never reads environment variables.

use crate::constants::{
    DEFAULT_FRONT_DESK_ADDR, DEFAULT_PATIENT_CAPACITY, DEFAULT_PRACTITIONER_ADDR,
    DEFAULT_PRACTITIONER_URL, DEFAULT_REGISTRY_ADDR, DEFAULT_REGISTRY_URL,
    DEFAULT_RELAY_BACKOFF_MS, DEFAULT_RELAY_MAX_ATTEMPTS, DEFAULT_RELAY_TIMEOUT_MS,
};
use crate::error::{CoreError, CoreResult};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Listen addresses for the three hops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenAddrs {
    pub front_desk: SocketAddr,
    pub registry: SocketAddr,
    pub practitioner: SocketAddr,
}

/// Bounded retry with exponential backoff for relayed calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RELAY_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_RELAY_BACKOFF_MS),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    listen: ListenAddrs,
    registry_url: String,
    practitioner_url: String,
    patient_capacity: usize,
    relay_timeout: Duration,
    retry: RetryPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// Trailing slashes on the URLs are dropped so route paths can be appended.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if:
    /// - a URL is not `http://` or `https://`,
    /// - `patient_capacity` is zero,
    /// - `relay_timeout` is zero,
    /// - `retry.max_attempts` is zero.
    pub fn new(
        listen: ListenAddrs,
        registry_url: String,
        practitioner_url: String,
        patient_capacity: usize,
        relay_timeout: Duration,
        retry: RetryPolicy,
    ) -> CoreResult<Self> {
        let registry_url = validate_url("REGISTRY_URL", registry_url)?;
        let practitioner_url = validate_url("PRACTITIONER_URL", practitioner_url)?;

        if patient_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "PATIENT_CAPACITY must be at least 1".into(),
            ));
        }
        if relay_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "RELAY_TIMEOUT_MS must be greater than 0".into(),
            ));
        }
        if retry.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "RELAY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        Ok(Self {
            listen,
            registry_url,
            practitioner_url,
            patient_capacity,
            relay_timeout,
            retry,
        })
    }

    /// Resolve configuration from process environment variables.
    ///
    /// Unset variables fall back to their defaults. Call this once from `main`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if a variable is set but cannot be parsed,
    /// or if the resolved values fail [`CoreConfig::new`] validation.
    pub fn from_env() -> CoreResult<Self> {
        let listen = ListenAddrs {
            front_desk: env_or("FRONT_DESK_ADDR", DEFAULT_FRONT_DESK_ADDR)?,
            registry: env_or("REGISTRY_ADDR", DEFAULT_REGISTRY_ADDR)?,
            practitioner: env_or("PRACTITIONER_ADDR", DEFAULT_PRACTITIONER_ADDR)?,
        };
        let retry = RetryPolicy {
            max_attempts: env_or("RELAY_MAX_ATTEMPTS", &DEFAULT_RELAY_MAX_ATTEMPTS.to_string())?,
            initial_backoff: Duration::from_millis(env_or(
                "RELAY_BACKOFF_MS",
                &DEFAULT_RELAY_BACKOFF_MS.to_string(),
            )?),
        };

        Self::new(
            listen,
            env_or("REGISTRY_URL", DEFAULT_REGISTRY_URL)?,
            env_or("PRACTITIONER_URL", DEFAULT_PRACTITIONER_URL)?,
            env_or("PATIENT_CAPACITY", &DEFAULT_PATIENT_CAPACITY.to_string())?,
            Duration::from_millis(env_or(
                "RELAY_TIMEOUT_MS",
                &DEFAULT_RELAY_TIMEOUT_MS.to_string(),
            )?),
            retry,
        )
    }

    pub fn listen(&self) -> &ListenAddrs {
        &self.listen
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    pub fn practitioner_url(&self) -> &str {
        &self.practitioner_url
    }

    pub fn patient_capacity(&self) -> usize {
        self.patient_capacity
    }

    pub fn relay_timeout(&self) -> Duration {
        self.relay_timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Override the registry base URL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the URL is not `http://` or `https://`.
    pub fn with_registry_url(mut self, url: impl Into<String>) -> CoreResult<Self> {
        self.registry_url = validate_url("REGISTRY_URL", url.into())?;
        Ok(self)
    }

    /// Override the practitioner base URL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the URL is not `http://` or `https://`.
    pub fn with_practitioner_url(mut self, url: impl Into<String>) -> CoreResult<Self> {
        self.practitioner_url = validate_url("PRACTITIONER_URL", url.into())?;
        Ok(self)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            listen: ListenAddrs {
                front_desk: SocketAddr::from(([0, 0, 0, 0], 8080)),
                registry: SocketAddr::from(([0, 0, 0, 0], 8081)),
                practitioner: SocketAddr::from(([0, 0, 0, 0], 8082)),
            },
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            practitioner_url: DEFAULT_PRACTITIONER_URL.to_string(),
            patient_capacity: DEFAULT_PATIENT_CAPACITY,
            relay_timeout: Duration::from_millis(DEFAULT_RELAY_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

fn validate_url(name: &str, url: String) -> CoreResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(CoreError::InvalidConfig(format!(
            "{name} must be an http(s) URL, got '{url}'"
        )));
    }
    Ok(trimmed.to_string())
}

/// Read `name` from the environment, falling back to `default` when unset or blank.
fn env_or<T>(name: &str, default: &str) -> CoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string());

    raw.trim().parse().map_err(|err| {
        CoreError::InvalidConfig(format!("{name}='{raw}' could not be parsed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listen() -> ListenAddrs {
        CoreConfig::default().listen
    }

    #[test]
    fn test_new_trims_trailing_slashes() {
        let cfg = CoreConfig::new(
            listen(),
            "http://registry:8081/".into(),
            "https://doctor.example".into(),
            10,
            Duration::from_secs(5),
            RetryPolicy::none(),
        )
        .expect("valid config");

        assert_eq!(cfg.registry_url(), "http://registry:8081");
        assert_eq!(cfg.practitioner_url(), "https://doctor.example");
    }

    #[test]
    fn test_new_rejects_zero_capacity() {
        let err = CoreConfig::new(
            listen(),
            DEFAULT_REGISTRY_URL.into(),
            DEFAULT_PRACTITIONER_URL.into(),
            0,
            Duration::from_secs(5),
            RetryPolicy::none(),
        )
        .expect_err("capacity 0");
        assert!(matches!(err, CoreError::InvalidConfig(msg) if msg.contains("PATIENT_CAPACITY")));
    }

    #[test]
    fn test_new_rejects_zero_timeout_and_attempts() {
        assert!(CoreConfig::new(
            listen(),
            DEFAULT_REGISTRY_URL.into(),
            DEFAULT_PRACTITIONER_URL.into(),
            10,
            Duration::ZERO,
            RetryPolicy::none(),
        )
        .is_err());

        let no_attempts = RetryPolicy {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
        };
        assert!(CoreConfig::new(
            listen(),
            DEFAULT_REGISTRY_URL.into(),
            DEFAULT_PRACTITIONER_URL.into(),
            10,
            Duration::from_secs(1),
            no_attempts,
        )
        .is_err());
    }

    #[test]
    fn test_new_rejects_non_http_urls() {
        let err = CoreConfig::default()
            .with_practitioner_url("ftp://doctor")
            .expect_err("ftp url");
        assert!(matches!(err, CoreError::InvalidConfig(msg) if msg.contains("PRACTITIONER_URL")));
    }

    #[test]
    fn test_defaults_match_constants() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.patient_capacity(), 10);
        assert_eq!(cfg.relay_timeout(), Duration::from_millis(5_000));
        assert_eq!(cfg.retry().max_attempts, 1);
        assert_eq!(cfg.listen().registry.port(), 8081);
    }
}
