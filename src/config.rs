//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.toml` (if present),
//! then environment variables (a `.env` file is loaded first). The merged
//! result is validated once at start-up.

use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

use crate::flow::Section;
use crate::paths;

// ==================== Fixed limits ====================

/// Maximum number of photos or documents held per session
pub const MAX_UPLOADS: usize = 6;

/// Largest bounding box of a generated photo thumbnail, in pixels
pub const THUMBNAIL_SIZE: u32 = 400;

/// Photos wider or taller than this are refused before decoding
pub const MAX_PHOTO_DIMENSION: u32 = 8_000;

/// Decoder allocation ceiling for a single photo
pub const MAX_PHOTO_ALLOC_BYTES: u64 = 256 * 1024 * 1024;

/// Probability threshold for expired session cleanup (0-255, lower = less frequent)
/// Value of 25 means ~10% chance (25/256) on each store write
pub const SESSION_CLEANUP_THRESHOLD: u8 = 25;

/// Address search results above this count ask the user to enter the address
pub const MAX_ADDRESS_CHOICES: usize = 50;

/// Longest allowed session lifetime (one year)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Timeout for calls to external services
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

// ==================== Errors ====================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {var} has invalid value '{value}'")]
    Env { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ==================== Sections ====================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub upload: UploadConfig,
    pub payment: PaymentConfig,
    pub address_lookup: AddressLookupConfig,
    pub notify: NotifyConfig,
    pub antimalware: AntimalwareConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL, used to build the payment return URL
    pub service_url: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Sqlite,
}

impl FromStr for SessionBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub path: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_size_mb: usize,
    pub timeout_ms: u64,
}

impl UploadConfig {
    pub fn max_file_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Request body limit for upload routes (file plus multipart framing)
    pub fn body_limit(&self) -> usize {
        self.max_file_bytes() + 1024 * 1024
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub api_url: String,
    pub api_key: String,
    /// Fee for a section 2 certificate application, in pence
    pub section_2_amount: u32,
    /// Fee for a section 10 registration, in pence
    pub section_10_amount: u32,
}

impl PaymentConfig {
    /// Fee in pence for the section an item falls under
    pub fn amount_for(&self, section: Section) -> u32 {
        match section {
            Section::Two => self.section_2_amount,
            Section::Ten => self.section_10_amount,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AddressLookupConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifyTemplates {
    pub applicant_section_2: String,
    pub applicant_section_10: String,
    pub owner_section_2: String,
    pub owner_section_10: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub api_url: String,
    pub api_key: String,
    pub templates: NotifyTemplates,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AntimalwareConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub measurement_id: String,
    pub api_secret: String,
}

impl AnalyticsConfig {
    pub fn is_enabled(&self) -> bool {
        !self.measurement_id.is_empty() && !self.api_secret.is_empty()
    }
}

// ==================== Defaults ====================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            service_url: "http://localhost:3000".to_string(),
            cookie_secure: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Sqlite,
            path: paths::session_db_path(),
            ttl_hours: 24,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            timeout_ms: 30_000,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_url: "https://publicapi.payments.service.gov.uk".to_string(),
            api_key: String::new(),
            section_2_amount: 25_000,
            section_10_amount: 2_000,
        }
    }
}

impl Default for AddressLookupConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9002/address/postcodes".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.notifications.service.gov.uk".to_string(),
            api_key: String::new(),
            templates: NotifyTemplates::default(),
        }
    }
}

impl Default for AntimalwareConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 3310,
        }
    }
}

// ==================== Loading ====================

impl AppConfig {
    /// Load configuration with priority: environment > config.toml > defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut config = match std::fs::read_to_string(paths::CONFIG_FILE) {
            Ok(contents) => {
                tracing::info!("Using configuration from {}", paths::CONFIG_FILE);
                Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
                    path: paths::CONFIG_FILE.to_string(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: paths::CONFIG_FILE.to_string(),
                    source,
                });
            }
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_override("HOST", &mut self.server.host)?;
        env_override("PORT", &mut self.server.port)?;
        env_override("SERVICE_URL", &mut self.server.service_url)?;
        env_override("COOKIE_SECURE", &mut self.server.cookie_secure)?;

        env_override("SESSION_BACKEND", &mut self.session.backend)?;
        env_override("SESSION_DB_PATH", &mut self.session.path)?;
        env_override("SESSION_TTL_HOURS", &mut self.session.ttl_hours)?;

        env_override("MAX_FILE_SIZE_MB", &mut self.upload.max_file_size_mb)?;
        env_override("UPLOAD_TIMEOUT_MS", &mut self.upload.timeout_ms)?;

        env_override("PAYMENT_API_URL", &mut self.payment.api_url)?;
        env_override("PAYMENT_API_KEY", &mut self.payment.api_key)?;
        env_override("PAYMENT_AMOUNT_SECTION_2", &mut self.payment.section_2_amount)?;
        env_override("PAYMENT_AMOUNT_SECTION_10", &mut self.payment.section_10_amount)?;

        env_override("ADDRESS_LOOKUP_URL", &mut self.address_lookup.url)?;
        env_override("ADDRESS_LOOKUP_KEY", &mut self.address_lookup.api_key)?;

        env_override("NOTIFY_API_URL", &mut self.notify.api_url)?;
        env_override("NOTIFY_API_KEY", &mut self.notify.api_key)?;
        let templates = &mut self.notify.templates;
        env_override("NOTIFY_TEMPLATE_APPLICANT_SECTION_2", &mut templates.applicant_section_2)?;
        env_override("NOTIFY_TEMPLATE_APPLICANT_SECTION_10", &mut templates.applicant_section_10)?;
        env_override("NOTIFY_TEMPLATE_OWNER_SECTION_2", &mut templates.owner_section_2)?;
        env_override("NOTIFY_TEMPLATE_OWNER_SECTION_10", &mut templates.owner_section_10)?;

        env_override("ANTIMALWARE_ENABLED", &mut self.antimalware.enabled)?;
        env_override("CLAMD_HOST", &mut self.antimalware.host)?;
        env_override("CLAMD_PORT", &mut self.antimalware.port)?;

        env_override("GA_MEASUREMENT_ID", &mut self.analytics.measurement_id)?;
        env_override("GA_API_SECRET", &mut self.analytics.api_secret)?;
        Ok(())
    }

    /// Reject structurally invalid settings; warn about missing credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        for (name, url) in [
            ("server.service_url", &self.server.service_url),
            ("payment.api_url", &self.payment.api_url),
            ("address_lookup.url", &self.address_lookup.url),
            ("notify.api_url", &self.notify.api_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!("{} must be an http(s) URL", name)));
            }
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session.ttl_hours) {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_hours must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            )));
        }
        if !(1..=50).contains(&self.upload.max_file_size_mb) {
            return Err(ConfigError::Invalid(
                "upload.max_file_size_mb must be between 1 and 50".into(),
            ));
        }
        if self.upload.timeout_ms == 0 {
            return Err(ConfigError::Invalid("upload.timeout_ms must be positive".into()));
        }
        if self.payment.section_2_amount == 0 || self.payment.section_10_amount == 0 {
            return Err(ConfigError::Invalid("payment amounts must be positive".into()));
        }
        if !self.notify.api_key.is_empty()
            && crate::services::notify::parse_api_key(&self.notify.api_key).is_err()
        {
            return Err(ConfigError::Invalid("notify.api_key is malformed".into()));
        }
        if self.antimalware.enabled && self.antimalware.host.is_empty() {
            return Err(ConfigError::Invalid("antimalware.host is required when enabled".into()));
        }

        if self.payment.api_key.is_empty() {
            tracing::warn!("PAYMENT_API_KEY is not set - payments will fail");
        }
        if self.notify.api_key.is_empty() {
            tracing::warn!("NOTIFY_API_KEY is not set - confirmation emails will not be sent");
        }
        if !self.antimalware.enabled {
            tracing::warn!("Anti-malware scanning is disabled");
        }
        Ok(())
    }

    /// Full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Payment provider return URL
    pub fn payment_return_url(&self) -> String {
        format!("{}/service-complete", self.server.service_url.trim_end_matches('/'))
    }
}

fn env_override<T: FromStr>(var: &'static str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(var) {
        *target = value
            .parse()
            .map_err(|_| ConfigError::Env { var, value: value.clone() })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_amount_by_section() {
        let payment = PaymentConfig::default();
        assert_eq!(payment.amount_for(Section::Two), 25_000);
        assert_eq!(payment.amount_for(Section::Ten), 2_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 8080

            [payment]
            section_2_amount = 30000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.payment.section_2_amount, 30_000);
        assert_eq!(config.payment.section_10_amount, 2_000);
        assert_eq!(config.upload.max_file_size_mb, 10);
    }

    #[test]
    fn test_session_backend_parsing() {
        let config = AppConfig::from_toml("[session]\nbackend = \"memory\"").unwrap();
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!("SQLite".parse::<SessionBackend>(), Ok(SessionBackend::Sqlite));
        assert!("redis".parse::<SessionBackend>().is_err());
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_out_of_range_session_ttl() {
        let mut config = AppConfig::default();
        config.session.ttl_hours = 0;
        assert!(config.validate().is_err());
        config.session.ttl_hours = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.session.ttl_hours = MAX_SESSION_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_upload_size() {
        let mut config = AppConfig::default();
        config.upload.max_file_size_mb = 0;
        assert!(config.validate().is_err());
        config.upload.max_file_size_mb = 51;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_urls_and_amounts() {
        let mut config = AppConfig::default();
        config.server.service_url = "localhost:3000".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.payment.section_10_amount = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_notify_key() {
        let mut config = AppConfig::default();
        config.notify.api_key = "too-short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_derived_values() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.payment_return_url(), "http://localhost:3000/service-complete");
        assert_eq!(config.upload.max_file_bytes(), 10 * 1024 * 1024);
        assert!(config.upload.body_limit() > config.upload.max_file_bytes());
    }
}
