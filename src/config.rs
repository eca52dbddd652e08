//! Configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Base URL of the financial gateway (CRM), no trailing slash.
    pub gateway_base_url: String,
    /// API key sent on unauthenticated gateway calls (signup, login).
    pub gateway_api_key: SecretString,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Directory where KYC document attachments are stored.
    pub media_dir: PathBuf,
    /// Webhook bind address, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// Bound timeout for attachment downloads.
    pub media_timeout: Duration,
}

impl BotConfig {
    /// Load configuration from the environment.
    ///
    /// `FIN_ASSIST_GATEWAY_URL` and `FIN_ASSIST_GATEWAY_KEY` are required;
    /// everything else has a sensible default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_base_url = require("FIN_ASSIST_GATEWAY_URL")?
            .trim_end_matches('/')
            .to_string();
        let gateway_api_key = SecretString::from(require("FIN_ASSIST_GATEWAY_KEY")?);

        let db_path = std::env::var("FIN_ASSIST_DB_PATH")
            .unwrap_or_else(|_| "./data/fin-assist.db".to_string())
            .into();
        let media_dir = std::env::var("FIN_ASSIST_MEDIA_DIR")
            .unwrap_or_else(|_| "./data/media".to_string())
            .into();
        let bind_addr =
            std::env::var("FIN_ASSIST_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let media_timeout_secs: u64 = std::env::var("FIN_ASSIST_MEDIA_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "FIN_ASSIST_MEDIA_TIMEOUT_SECS".to_string(),
                message: "must be an integer number of seconds".to_string(),
            })?;

        Ok(Self {
            gateway_base_url,
            gateway_api_key,
            db_path,
            media_dir,
            bind_addr,
            media_timeout: Duration::from_secs(media_timeout_secs),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}
