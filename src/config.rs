use crate::constants::{DEFAULT_CATALOG_PATH, DEFAULT_CONFIRM_TIMEOUT_MS};
use crate::error::{RegistrationError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registration: RegistrationConfig,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationConfig {
    /// Upper bound on the external confirm call; elapsing is retryable.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    /// Base URL of the fest backend used by the HTTP registration service.
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Event catalog file consumed by the CLI and the in-memory catalog.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
}

fn default_confirm_timeout_ms() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT_MS
}

fn default_service_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_catalog_path() -> String {
    DEFAULT_CATALOG_PATH.to_string()
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_ms: default_confirm_timeout_ms(),
            service_url: default_service_url(),
            catalog_path: default_catalog_path(),
        }
    }
}

impl RegistrationConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

impl Config {
    /// Load `config.toml` from the working directory. A missing file means
    /// defaults; a malformed file is an error.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistrationError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from("/definitely/not/config.toml").unwrap();
        assert_eq!(config.registration.confirm_timeout_ms, DEFAULT_CONFIRM_TIMEOUT_MS);
        assert_eq!(config.registration.service_url, "http://localhost:5000");
        assert_eq!(config.registration.catalog_path, DEFAULT_CATALOG_PATH);
    }

    #[test]
    fn partial_file_keeps_unset_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[registration]
confirm_timeout_ms = 2500
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.registration.confirm_timeout_ms, 2500);
        assert_eq!(config.registration.confirm_timeout(), Duration::from_millis(2500));
        assert_eq!(config.registration.service_url, "http://localhost:5000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "registration = 12").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(RegistrationError::Toml(_))
        ));
    }
}
