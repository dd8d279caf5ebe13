//! Service settings
//!
//! Sources, later ones overriding earlier ones:
//! 1. `/etc/tenantq/service.yaml` (optional)
//! 2. `config/service.yaml` (optional)
//! 3. the file named by `TENANTQ_CONFIG_FILE` (required when set)
//! 4. environment variables `TENANTQ__<FIELD>`, e.g. `TENANTQ__POLL_INTERVAL_MS=500`

use serde::Deserialize;
use std::time::Duration;
use tenantq_core::application::constants::{
    DEFAULT_HEALTH_CHECK_TIMEOUT, DEFAULT_ORID_PROVIDER, DEFAULT_POLL_INTERVAL,
    DEFAULT_QUEUE_LOCK_TTL,
};
use tenantq_core::domain::{Orid, QUEUE_SERVICE};
use tenantq_core::error::{AppError, Result};
use tracing::info;

const ENV_PREFIX: &str = "TENANTQ";
const CONFIG_FILE_VAR: &str = "TENANTQ_CONFIG_FILE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub database_url: String,
    /// Provider segment of every identifier this service creates
    pub orid_provider_key: String,
    pub poll_interval_ms: u64,
    pub health_check_timeout_ms: u64,
    /// Delay before the storage pool is closed on shutdown
    pub shutdown_grace_ms: u64,
    pub function_service_url: Option<String>,
    pub state_machine_service_url: Option<String>,
    pub invoke_timeout_ms: u64,
    pub queue_lock_enabled: bool,
    pub queue_lock_ttl_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tenantq.db".to_string(),
            orid_provider_key: DEFAULT_ORID_PROVIDER.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            health_check_timeout_ms: DEFAULT_HEALTH_CHECK_TIMEOUT.as_millis() as u64,
            shutdown_grace_ms: 200,
            function_service_url: None,
            state_machine_service_url: None,
            invoke_timeout_ms: 30_000,
            queue_lock_enabled: false,
            queue_lock_ttl_secs: DEFAULT_QUEUE_LOCK_TTL.as_secs(),
        }
    }
}

impl ServiceSettings {
    /// Load from the standard file locations and the environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("/etc/tenantq/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::with_name("config/service")
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Ok(explicit_path) = std::env::var(CONFIG_FILE_VAR) {
            if !explicit_path.is_empty() {
                info!(path = %explicit_path, "Loading configuration from explicit path");
                builder = builder.add_source(
                    config::File::with_name(&explicit_path)
                        .required(true)
                        .format(config::FileFormat::Yaml),
                );
            }
        }

        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    /// Deserialize and validate whatever `builder` has collected
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("database_url must not be empty".to_string()));
        }
        // The provider must be usable as an identifier segment
        if Orid::generate(self.orid_provider_key.as_str(), QUEUE_SERVICE, "validate", "", None).is_err() {
            return Err(AppError::Config(format!(
                "orid_provider_key is not a valid identifier segment: {:?}",
                self.orid_provider_key
            )));
        }
        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("health_check_timeout_ms", self.health_check_timeout_ms),
            ("invoke_timeout_ms", self.invoke_timeout_ms),
            ("queue_lock_ttl_secs", self.queue_lock_ttl_secs),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_millis(self.invoke_timeout_ms)
    }

    pub fn queue_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.queue_lock_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn from_yaml(yaml: &str) -> Result<ServiceSettings> {
        ServiceSettings::from_builder(
            config::Config::builder()
                .add_source(config::File::from_str(yaml, config::FileFormat::Yaml)),
        )
    }

    #[test]
    fn test_defaults() {
        let settings = assert_ok!(from_yaml("{}"));
        assert_eq!(settings, ServiceSettings::default());
        assert_eq!(settings.poll_interval(), Duration::from_millis(1000));
        assert_eq!(settings.shutdown_grace(), Duration::from_millis(200));
        assert_eq!(settings.queue_lock_ttl(), Duration::from_secs(30));
        assert!(!settings.queue_lock_enabled);
    }

    #[test]
    fn test_yaml_overrides() {
        let settings = from_yaml(
            r#"
database_url: "sqlite::memory:"
orid_provider_key: acme
poll_interval_ms: 250
function_service_url: "http://functions:8080"
queue_lock_enabled: true
"#,
        )
        .unwrap();

        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.orid_provider_key, "acme");
        assert_eq!(settings.poll_interval(), Duration::from_millis(250));
        assert_eq!(
            settings.function_service_url.as_deref(),
            Some("http://functions:8080")
        );
        assert!(settings.state_machine_service_url.is_none());
        assert!(settings.queue_lock_enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = from_yaml("poll_interval_ms: 0").unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("poll_interval_ms")));

        let err = from_yaml("orid_provider_key: \"bad:key\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        assert_err!(from_yaml("poll_interval_ms: soon"));
    }
}
