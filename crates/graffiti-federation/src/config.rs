use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use graffiti_protocol::normalize_origin;
use graffiti_types::{LOCAL_SCHEME, REMOTE_SCHEME};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which origins a federation knows about.
///
/// ```toml
/// default_origin = "remote:pod.example"
/// registry = ["remote:pod.example", "remote:http://127.0.0.1:3000"]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Origins queried by federation-wide discovery, in order.
    #[serde(default)]
    pub registry: Vec<String>,
    /// Where objects without a url are created. Always part of the registry.
    pub default_origin: String,
    /// Url prefix of objects kept in the local store.
    #[serde(default = "default_local_prefix")]
    pub local_prefix: String,
}

fn default_local_prefix() -> String {
    LOCAL_SCHEME.to_string()
}

impl FederationConfig {
    pub fn new(default_origin: impl Into<String>) -> Self {
        Self {
            registry: Vec::new(),
            default_origin: default_origin.into(),
            local_prefix: default_local_prefix(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.registry.push(origin.into());
        self
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for origin in self.registry.iter().chain(std::iter::once(&self.default_origin)) {
            normalize_origin(origin).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if self.local_prefix.is_empty() || self.local_prefix.starts_with(REMOTE_SCHEME) {
            return Err(ConfigError::Invalid(format!(
                "local_prefix must be non-empty and distinct from remote urls: {:?}",
                self.local_prefix
            )));
        }
        Ok(())
    }

    /// The registry with the default origin included, normalized, duplicates
    /// removed, order preserved.
    pub fn origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        for origin in self.registry.iter().chain(std::iter::once(&self.default_origin)) {
            let origin = normalize_origin(origin)
                .unwrap_or_else(|_| origin.trim_end_matches('/').to_string());
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal() {
        let c = FederationConfig::from_toml_str("default_origin = \"remote:pod.example\"").unwrap();
        assert!(c.registry.is_empty());
        assert_eq!(c.local_prefix, "local:");
        assert_eq!(c.origins(), vec!["remote:pod.example"]);
    }

    #[test]
    fn default_origin_is_required() {
        assert!(matches!(
            FederationConfig::from_toml_str("registry = [\"remote:a.example\"]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_bad_origins() {
        let c = FederationConfig::new("remote:a.example").with_origin("https://b.example");
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
        let c = FederationConfig::new("remote:a.example/objects");
        assert!(c.validate().is_err());
    }

    #[test]
    fn origins_deduplicate() {
        let c = FederationConfig::new("remote:b.example")
            .with_origin("remote:a.example")
            .with_origin("remote:b.example/")
            .with_origin("remote:https://B.example:443");
        assert_eq!(c.origins(), vec!["remote:a.example", "remote:b.example"]);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "default_origin = \"remote:http://127.0.0.1:3000\"\nregistry = [\"remote:pod.example\"]\nlocal_prefix = \"mine:\""
        )
        .unwrap();
        let c = FederationConfig::load(file.path()).unwrap();
        assert_eq!(c.local_prefix, "mine:");
        assert_eq!(c.origins(), vec!["remote:pod.example", "remote:http://127.0.0.1:3000"]);
    }
}
