//! Storefront configuration.
//!
//! Read once at startup from a TOML file (`config/default.toml` unless
//! `FLIPNSTRIP_CONFIG` points elsewhere), then patched with environment
//! overrides so credentials can stay out of the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::constants::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Only enable behind HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// eBay Trading API credentials used by the inventory sync job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EbayConfig {
    pub app_id: String,
    pub dev_id: String,
    pub cert_id: String,
    pub auth_token: String,
    pub site_id: i64,
    pub sandbox: bool,
    pub sync_log_path: PathBuf,
}

impl Default for EbayConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            dev_id: String::new(),
            cert_id: String::new(),
            auth_token: String::new(),
            site_id: 0,
            sandbox: true,
            sync_log_path: PathBuf::from(DEFAULT_SYNC_LOG_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// `sandbox` or `live`.
    pub mode: String,
    pub currency: String,
}

impl Default for PaypalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            mode: PAYPAL_MODE_SANDBOX.to_string(),
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EasyshipConfig {
    pub api_key: String,
    pub sandbox: bool,
}

impl Default for EasyshipConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            sandbox: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub tagline: String,
    pub url: String,
    pub email: String,
    pub phone: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Flip and Strip".to_string(),
            tagline: "Motorcycle, ATV and boat parts".to_string(),
            url: "http://localhost:3000".to_string(),
            email: String::new(),
            phone: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Signs the session cookie. Must be at least 64 bytes.
    pub session_secret: String,
    pub session_expiry_days: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            session_expiry_days: SESSION_EXPIRY_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ebay: EbayConfig,
    pub paypal: PaypalConfig,
    pub easyship: EasyshipConfig,
    pub site: SiteConfig,
    pub security: SecurityConfig,
}

impl Config {
    /// Load `.env`, read the config file and apply environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = std::env::var("FLIPNSTRIP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file without validating it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Patch values from an environment-like lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                reason: format!("'{}' is not a valid port", port),
            })?;
        }
        if let Some(production) = lookup("PRODUCTION") {
            self.server.secure_cookies = production.eq_ignore_ascii_case("true");
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(secret) = lookup("SESSION_SECRET") {
            self.security.session_secret = secret;
        }
        if let Some(token) = lookup("EBAY_AUTH_TOKEN") {
            self.ebay.auth_token = token;
        }
        if let Some(secret) = lookup("PAYPAL_CLIENT_SECRET") {
            self.paypal.client_secret = secret;
        }
        if let Some(key) = lookup("EASYSHIP_API_KEY") {
            self.easyship.api_key = key;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.session_secret.len() < MIN_SESSION_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                key: "security.session_secret",
                reason: format!("must be at least {} characters", MIN_SESSION_SECRET_LENGTH),
            });
        }
        if self.security.session_expiry_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "security.session_expiry_days",
                reason: "must be positive".to_string(),
            });
        }
        if self.security.session_expiry_days > MAX_SESSION_EXPIRY_DAYS {
            return Err(ConfigError::Invalid {
                key: "security.session_expiry_days",
                reason: format!("must be at most {}", MAX_SESSION_EXPIRY_DAYS),
            });
        }
        if self.paypal.mode != PAYPAL_MODE_SANDBOX && self.paypal.mode != PAYPAL_MODE_LIVE {
            return Err(ConfigError::Invalid {
                key: "paypal.mode",
                reason: format!(
                    "expected '{}' or '{}', got '{}'",
                    PAYPAL_MODE_SANDBOX, PAYPAL_MODE_LIVE, self.paypal.mode
                ),
            });
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "database.path",
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
