//! Client configuration.
//!
//! Values are layered, later layers winning:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. `PASSAGE_*` environment variables (e.g. `PASSAGE_API_BASE_URL`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Prefix of the environment variables read by [`ClientConfig::load`].
pub const ENV_PREFIX: &str = "PASSAGE";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The API base URL is unusable.
    #[error("invalid api_base_url '{url}': {reason}")]
    InvalidUrl {
        /// The configured value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A field has an out-of-range value.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings for talking to the auth API and persisting the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL that endpoint paths are appended to.
    pub api_base_url: String,
    /// Per-request transport timeout.
    pub request_timeout_secs: u64,
    /// Bound on the best-effort backend logout.
    pub logout_timeout_secs: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Directory holding the persisted session.
    pub storage_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            request_timeout_secs: 30,
            logout_timeout_secs: 5,
            user_agent: concat!("passage/", env!("CARGO_PKG_VERSION")).to_string(),
            storage_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("passage"),
        }
    }
}

impl ClientConfig {
    /// Load configuration from defaults, an optional file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the result is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(file, config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Same as [`ClientConfig::load`] with an explicit environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the result is invalid.
    pub fn load_with_env(
        file: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("api_base_url", defaults.api_base_url)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("logout_timeout_secs", defaults.logout_timeout_secs)?
            .set_default("user_agent", defaults.user_agent)?
            .set_default(
                "storage_dir",
                defaults.storage_dir.to_string_lossy().to_string(),
            )?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder.add_source(env.try_parsing(true)).build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the loaded values.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.api_base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.api_base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.logout_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "logout_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Transport timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Logout timeout as a duration.
    #[must_use]
    pub const fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_secs)
    }
}
