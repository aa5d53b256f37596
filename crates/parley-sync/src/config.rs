//! # Client Configuration
//!
//! Configuration management for the comments session.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PARLEY_BASE_URL=https://comments.example.com/api                   │
//! │     PARLEY_API_KEY=pk_live_...                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/parley/parley.toml (Linux)                               │
//! │     ~/Library/Application Support/dev.parley.parley/parley.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     30s expiry skew, 60s binding cooldown, 30 comments per page        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [service]
//! base_url = "https://comments.example.com/api"
//! request_timeout_secs = 15
//!
//! [credential]
//! api_key = "pk_live_..."
//! platform = "linux"
//! package_id = "com.example.reader"
//! app_version = "1.4.0"
//! # android_cert_sha256 = "..."
//! # ios_team_id = "..."
//!
//! [auth]
//! expiry_skew_secs = 30
//! binding_cooldown_secs = 60
//!
//! [feed]
//! page_size = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use parley_core::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Service Settings
// =============================================================================

/// Where the comments service lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Base URL every endpoint is resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout enforced by the HTTP client (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Credential Settings
// =============================================================================

/// Install credential and static client metadata.
///
/// Binding proofs are produced by platform probes outside this crate and
/// only passed through.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialSettings {
    /// Long-lived install credential.
    #[serde(default)]
    pub api_key: String,

    /// Platform identifier sent with every request.
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Package / bundle identifier of the host application.
    #[serde(default)]
    pub package_id: String,

    /// Host application version.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Android signing certificate SHA-256.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_cert_sha256: Option<String>,

    /// iOS team identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_team_id: Option<String>,
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for CredentialSettings {
    fn default() -> Self {
        CredentialSettings {
            api_key: String::new(),
            platform: default_platform(),
            package_id: String::new(),
            app_version: default_app_version(),
            android_cert_sha256: None,
            ios_team_id: None,
        }
    }
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSettings")
            .field("api_key", &"<redacted>")
            .field("platform", &self.platform)
            .field("package_id", &self.package_id)
            .field("app_version", &self.app_version)
            .field("android_cert_sha256", &self.android_cert_sha256.is_some())
            .field("ios_team_id", &self.ios_team_id.is_some())
            .finish()
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

/// Token lifetime and cooldown tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// A token counts as expired this many seconds before the server says so.
    #[serde(default = "default_expiry_skew")]
    pub expiry_skew_secs: u64,

    /// How long negotiation stays suspended after a binding rejection.
    #[serde(default = "default_binding_cooldown")]
    pub binding_cooldown_secs: u64,
}

fn default_expiry_skew() -> u64 {
    30
}

fn default_binding_cooldown() -> u64 {
    60
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            expiry_skew_secs: default_expiry_skew(),
            binding_cooldown_secs: default_binding_cooldown(),
        }
    }
}

impl AuthSettings {
    /// Expiry skew as a duration.
    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_secs)
    }

    /// Binding cooldown as a duration.
    pub fn binding_cooldown(&self) -> Duration {
        Duration::from_secs(self.binding_cooldown_secs)
    }
}

// =============================================================================
// Feed Settings
// =============================================================================

/// Thread feed behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Comments requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            page_size: default_page_size(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Service location.
    #[serde(default)]
    pub service: ServiceSettings,

    /// Install credential and client metadata.
    #[serde(default)]
    pub credential: CredentialSettings,

    /// Token tuning.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Feed tuning.
    #[serde(default)]
    pub feed: FeedSettings,
}

impl ParleyConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (parley.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading parley config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load parley config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Parley config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.service.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Service URL must use http:// or https://, got: {}",
                self.service.base_url
            )));
        }

        if self.credential.api_key.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "credential.api_key must be set".into(),
            ));
        }

        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.feed.page_size) {
            return Err(SyncError::InvalidConfig(format!(
                "feed.page_size must be between {} and {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }

        if self.service.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "service.request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PARLEY_BASE_URL") {
            debug!(url = %url, "Overriding service URL from environment");
            self.service.base_url = url;
        }

        // Never log the value.
        if let Ok(key) = std::env::var("PARLEY_API_KEY") {
            debug!("Overriding API key from environment");
            self.credential.api_key = key;
        }

        if let Ok(platform) = std::env::var("PARLEY_PLATFORM") {
            self.credential.platform = platform;
        }

        if let Ok(package) = std::env::var("PARLEY_PACKAGE_ID") {
            self.credential.package_id = package;
        }

        if let Ok(version) = std::env::var("PARLEY_APP_VERSION") {
            self.credential.app_version = version;
        }

        if let Ok(size) = std::env::var("PARLEY_PAGE_SIZE") {
            match size.parse::<u32>() {
                Ok(n) => self.feed.page_size = n,
                Err(_) => warn!(value = %size, "Ignoring non-numeric PARLEY_PAGE_SIZE"),
            }
        }

        if let Ok(timeout) = std::env::var("PARLEY_REQUEST_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(n) => self.service.request_timeout_secs = n,
                Err(_) => {
                    warn!(value = %timeout, "Ignoring non-numeric PARLEY_REQUEST_TIMEOUT_SECS")
                }
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "parley", "parley")
            .map(|dirs| dirs.config_dir().join("parley.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ParleyConfig {
        let mut config = ParleyConfig::default();
        config.credential.api_key = "pk_test_123".into();
        config
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.auth.expiry_skew_secs, 30);
        assert_eq!(config.auth.binding_cooldown_secs, 60);
        assert_eq!(config.feed.page_size, 30);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.credential.api_key = "  ".into();
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = valid_config();
        config.service.base_url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.service.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        let mut config = valid_config();
        config.feed.page_size = 0;
        assert!(config.validate().is_err());
        config.feed.page_size = 101;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.service.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ParleyConfig = toml::from_str(
            r#"
            [credential]
            api_key = "pk_test_123"
            package_id = "com.example.reader"

            [feed]
            page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.credential.package_id, "com.example.reader");
        assert_eq!(config.feed.page_size, 50);
        assert_eq!(config.auth.binding_cooldown_secs, 60);
        assert_eq!(config.service.base_url, default_base_url());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = valid_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[service]"));
        assert!(toml_str.contains("[auth]"));
        assert!(!toml_str.contains("android_cert_sha256"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = valid_config();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("pk_test_123"));
        assert!(debug.contains("<redacted>"));
    }
}
