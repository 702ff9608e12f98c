//! Client configuration loading.
//!
//! Sources, later ones winning:
//! 1. Built-in defaults (`ClientSettings::default`)
//! 2. `mystic.toml` in the platform config directory, if present
//! 3. `MYSTIC_*` environment variables (`MYSTIC_BASE_URL`, `MYSTIC_TIMEOUT_MS`,
//!    `MYSTIC_USER_AGENT`, `MYSTIC_STORAGE_DIR`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use mystic_domain::{ClientSettings, DomainError};
use tracing::debug;

/// Name of the optional configuration file.
pub const CONFIG_FILE_NAME: &str = "mystic.toml";

/// Prefix of the environment variables read.
pub const ENV_PREFIX: &str = "MYSTIC";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or a value has the wrong type.
    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),

    /// The resulting settings are unusable.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] DomainError),

    /// A zero timeout would fail every request.
    #[error("invalid configuration: timeout_ms must be greater than zero")]
    ZeroTimeout,
}

/// Path of the configuration file in the platform config directory.
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mystic").join(CONFIG_FILE_NAME))
}

/// Loads settings from the default file and the process environment.
///
/// # Errors
///
/// Returns an error if a source is malformed or the base URL is invalid.
pub fn load_settings() -> Result<ClientSettings, ConfigError> {
    let mut loader = SettingsLoader::new();
    if let Some(file) = default_config_file() {
        loader = loader.file(file);
    }
    loader.load()
}

/// Builder over the configuration sources.
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl SettingsLoader {
    /// Loader reading only defaults and the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads this TOML file if it exists.
    #[must_use]
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads variables from this map instead of the process environment.
    #[must_use]
    pub fn env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    /// Merges the sources and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or the settings are unusable.
    pub fn load(self) -> Result<ClientSettings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = &self.file {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(self.env),
        );

        let settings: ClientSettings = builder.build()?.try_deserialize()?;
        settings.parsed_base_url()?;
        if settings.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        debug!(
            base_url = %settings.base_url,
            timeout_ms = settings.timeout_ms,
            "settings loaded"
        );
        Ok(settings)
    }
}
