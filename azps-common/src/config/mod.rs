//! Configuration for the credential.
//!
//! Every setting is read from the environment with source tracking, so
//! `azps config` can show where each value came from.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::credential::CredentialOptions;
use std::time::Duration;
use thiserror::Error;

/// Per-invocation timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Upper bound accepted from AZPS_TIMEOUT_SECS.
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// One or more environment variables were invalid.
#[derive(Debug, Error)]
#[error("{} invalid environment variable(s): {}", .errors.len(), join_errors(.errors))]
pub struct ConfigError {
    pub errors: Vec<EnvError>,
}

fn join_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Credential settings with their sources.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub timeout_secs: Sourced<u64>,
    pub allow_multitenant: Sourced<bool>,
    pub tenant_id: Sourced<Option<String>>,
    pub disable_multitenant: Sourced<bool>,
}

impl CredentialConfig {
    /// Read AZPS_* settings plus AZURE_IDENTITY_DISABLE_MULTITENANTAUTH.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut parser = EnvParser::new();
        let timeout_secs =
            parser.get_u64_range("TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS, 1, MAX_TIMEOUT_SECS);
        let allow_multitenant = parser.get_bool("ALLOW_MULTITENANT", false);
        let tenant_id = parser.get_optional_string("TENANT_ID");

        let mut azure = EnvParser::with_prefix("AZURE_");
        let disable_multitenant = azure.get_bool("IDENTITY_DISABLE_MULTITENANTAUTH", false);

        let mut errors = parser.take_errors();
        errors.extend(azure.take_errors());
        if !errors.is_empty() {
            return Err(ConfigError { errors });
        }

        Ok(Self {
            timeout_secs,
            allow_multitenant,
            tenant_id,
            disable_multitenant,
        })
    }

    /// Override the timeout from a command-line flag.
    pub fn with_timeout_override(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.timeout_secs = Sourced::from_command_line(secs.clamp(1, MAX_TIMEOUT_SECS));
        }
        self
    }

    pub fn options(&self) -> CredentialOptions {
        CredentialOptions {
            timeout: Duration::from_secs(self.timeout_secs.value),
            allow_multitenant: self.allow_multitenant.value,
            tenant_id: self.tenant_id.value.clone(),
            disable_multitenant: self.disable_multitenant.value,
        }
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    const VARS: [&str; 4] = [
        "AZPS_TIMEOUT_SECS",
        "AZPS_ALLOW_MULTITENANT",
        "AZPS_TENANT_ID",
        "AZURE_IDENTITY_DISABLE_MULTITENANTAUTH",
    ];

    fn cleanup_env() {
        for var in VARS {
            // SAFETY: env mutation is serialized by env_test_lock
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env mutation is serialized by env_test_lock
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    fn test_defaults() {
        let _guard = env_test_lock();
        cleanup_env();

        let config = CredentialConfig::from_env().unwrap();
        assert_eq!(config.timeout_secs.value, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.timeout_secs.source, ConfigSource::Default);
        assert!(!config.allow_multitenant.value);
        assert_eq!(config.tenant_id.value, None);

        let options = config.options();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert!(!options.disable_multitenant);
    }

    #[test]
    fn test_reads_environment() {
        let _guard = env_test_lock();
        cleanup_env();
        set_env("AZPS_TIMEOUT_SECS", "30");
        set_env("AZPS_ALLOW_MULTITENANT", "yes");
        set_env("AZPS_TENANT_ID", "contoso.onmicrosoft.com");
        set_env("AZURE_IDENTITY_DISABLE_MULTITENANTAUTH", "1");

        let config = CredentialConfig::from_env().unwrap();
        let options = config.options();
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(options.allow_multitenant);
        assert_eq!(options.tenant_id.as_deref(), Some("contoso.onmicrosoft.com"));
        assert!(options.disable_multitenant);
        assert_eq!(
            config.disable_multitenant.env_var.as_deref(),
            Some("AZURE_IDENTITY_DISABLE_MULTITENANTAUTH")
        );

        cleanup_env();
    }

    #[test]
    fn test_collects_all_errors() {
        let _guard = env_test_lock();
        cleanup_env();
        set_env("AZPS_TIMEOUT_SECS", "0");
        set_env("AZURE_IDENTITY_DISABLE_MULTITENANTAUTH", "sometimes");

        let err = CredentialConfig::from_env().unwrap_err();
        assert_eq!(err.errors.len(), 2);
        let message = err.to_string();
        assert!(message.starts_with("2 invalid environment variable(s)"));
        assert!(message.contains("AZPS_TIMEOUT_SECS"));

        cleanup_env();
    }

    #[test]
    fn test_timeout_override() {
        let _guard = env_test_lock();
        cleanup_env();

        let config = CredentialConfig::from_env()
            .unwrap()
            .with_timeout_override(Some(45));
        assert_eq!(config.timeout_secs.value, 45);
        assert_eq!(config.timeout_secs.source, ConfigSource::CommandLine);

        let config = config.with_timeout_override(Some(10_000));
        assert_eq!(config.timeout_secs.value, MAX_TIMEOUT_SECS);
    }
}
