//! Configuration management for the OTP service.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `OTP__*`
//! environment variables (e.g. `OTP__OTP__MAX_RETRIES=3`), CLI flags.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use otp_common::constants::{
    CONFIRMATION_TIMEOUT_SECS, DEFAULT_CONFIRMATION_URL, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_RESENDS,
    DEFAULT_MAX_RETRIES, DEFAULT_OTP_TTL_SECS, DEFAULT_PUBLIC_BASE_URL, DEFAULT_REDIS_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STORE_TIMEOUT_MS, RESEND_WINDOW_SECS,
};

use crate::otp::OtpPolicy;

/// Backend holding OTP state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL used in issued verification links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Where OTP state lives
    #[serde(default)]
    pub store: StoreBackend,

    /// Deadline for each store call in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Deadline for a whole HTTP request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// OTP lifecycle limits
    #[serde(default)]
    pub otp: OtpConfig,

    /// Transaction confirmation service
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

/// OTP lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Code validity in seconds
    #[serde(default = "default_otp_ttl")]
    pub ttl_secs: u64,

    /// Wrong submissions before a code is burned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Resends allowed per resend window
    #[serde(default = "default_max_resends")]
    pub max_resends: u32,

    /// Resend counter window in seconds
    #[serde(default = "default_resend_window")]
    pub resend_window_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_otp_ttl(),
            max_retries: default_max_retries(),
            max_resends: default_max_resends(),
            resend_window_secs: default_resend_window(),
        }
    }
}

impl OtpConfig {
    pub fn policy(&self) -> OtpPolicy {
        OtpPolicy {
            ttl: Duration::from_secs(self.ttl_secs),
            max_retries: self.max_retries,
            max_resends: self.max_resends,
            resend_window: Duration::from_secs(self.resend_window_secs),
        }
    }
}

/// Confirmation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    /// Base URL of the confirmation service
    #[serde(default = "default_confirmation_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_confirmation_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            base_url: default_confirmation_url(),
            timeout_secs: default_confirmation_timeout(),
        }
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_public_base_url() -> String { DEFAULT_PUBLIC_BASE_URL.to_string() }
fn default_store_timeout_ms() -> u64 { DEFAULT_STORE_TIMEOUT_MS }
fn default_request_timeout() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_otp_ttl() -> u64 { DEFAULT_OTP_TTL_SECS }
fn default_max_retries() -> u32 { DEFAULT_MAX_RETRIES }
fn default_max_resends() -> u32 { DEFAULT_MAX_RESENDS }
fn default_resend_window() -> u64 { RESEND_WINDOW_SECS }
fn default_confirmation_url() -> String { DEFAULT_CONFIRMATION_URL.to_string() }
fn default_confirmation_timeout() -> u64 { CONFIRMATION_TIMEOUT_SECS }

impl AppConfig {
    /// Load configuration from file and environment, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();

        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("OTP").separator("__"))
            .build()
            .context("Failed to load configuration")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref url) = args.confirmation_url {
            config.confirmation.base_url = url.clone();
        }
        if let Some(store) = args.store {
            config.store = store;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject limits the lifecycle cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.otp.ttl_secs == 0 {
            bail!("otp.ttl_secs must be at least 1");
        }
        if self.otp.max_retries == 0 {
            bail!("otp.max_retries must be at least 1");
        }
        if self.otp.resend_window_secs == 0 {
            bail!("otp.resend_window_secs must be at least 1");
        }
        if self.public_base_url.trim().is_empty() {
            bail!("public_base_url must not be empty");
        }
        if self.store_timeout_ms == 0 {
            bail!("store_timeout_ms must be at least 1");
        }
        if self.request_timeout_secs <= self.confirmation.timeout_secs {
            tracing::warn!(
                request_timeout_secs = self.request_timeout_secs,
                confirmation_timeout_secs = self.confirmation.timeout_secs,
                "Request timeout does not exceed the confirmation timeout"
            );
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation.timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            public_base_url: default_public_base_url(),
            store: StoreBackend::default(),
            store_timeout_ms: default_store_timeout_ms(),
            request_timeout_secs: default_request_timeout(),
            otp: OtpConfig::default(),
            confirmation: ConfirmationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.otp.ttl_secs, 60);
        assert_eq!(config.otp.max_retries, 5);
        assert_eq!(config.otp.max_resends, 3);
        assert_eq!(config.otp.resend_window_secs, 60);
        assert_eq!(config.confirmation.timeout_secs, 30);
        assert_eq!(config.store, StoreBackend::Redis);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_from_config() {
        let otp = OtpConfig {
            ttl_secs: 120,
            max_retries: 3,
            max_resends: 1,
            resend_window_secs: 60,
        };
        let policy = otp.policy();
        assert_eq!(policy.ttl, Duration::from_secs(120));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_resends, 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                "store = \"memory\"\n[otp]\nmax_retries = 3\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.otp.max_retries, 3);
        assert_eq!(config.otp.max_resends, 3);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = AppConfig::default();
        config.otp.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.public_base_url = " ".to_string();
        assert!(config.validate().is_err());
    }
}
