//! Client configuration, read from TOML.
//!
//! Resolution order for the API URL is flag, then `PAPERSCOPE_API_URL`, then
//! the config file, then [`DEFAULT_API_URL`]. Binaries apply the first two
//! through [`Config::override_api_url`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sandbox::HeightPolicy;
use crate::verification::VerificationLimits;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "PAPERSCOPE_API_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub sandbox: HeightPolicy,
    pub verification: VerificationLimits,
    /// Drop a paper's cached extractions when it is removed.
    pub prune_cache_on_remove: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            sandbox: HeightPolicy::default(),
            verification: VerificationLimits::default(),
            prune_cache_on_remove: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if given and present; otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => {
                log::debug!("loading config from {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Replace the API URL when `url` is set and non-blank.
    pub fn override_api_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| ConfigError::Invalid(format!("api_url {:?}: {e}", self.api_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api_url must be http or https, got {}",
                url.scheme()
            )));
        }
        self.sandbox.validate().map_err(ConfigError::Invalid)?;
        if self.verification.papers == 0 || self.verification.items == 0 {
            return Err(ConfigError::Invalid(
                "verification limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(config.prune_cache_on_remove);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            api_url = "https://papers.example.org"

            [sandbox]
            ceiling = 2000

            [verification]
            items = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "https://papers.example.org");
        assert_eq!(config.sandbox.ceiling, 2000);
        assert_eq!(config.sandbox.min, 700);
        assert_eq!(config.verification.items, 2);
        assert_eq!(config.verification.papers, 3);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str(r#"api_url = "not a url""#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[sandbox]\nceiling = 10"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[verification]\npapers = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml_str("api_url = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn override_ignores_blank() {
        let mut config = Config::default();
        config.override_api_url(Some("   ".into()));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        config.override_api_url(Some(" http://10.0.0.2:9000 ".into()));
        assert_eq!(config.api_url, "http://10.0.0.2:9000");
        config.override_api_url(None);
        assert_eq!(config.api_url, "http://10.0.0.2:9000");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prune_cache_on_remove = false").unwrap();
        let config = Config::load_or_default(Some(file.path())).unwrap();
        assert!(!config.prune_cache_on_remove);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.toml");
        assert_eq!(Config::load_or_default(Some(&missing)).unwrap(), Config::default());
    }
}
