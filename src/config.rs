//! Config file handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ReflectError;
use crate::grpc::schema::DEFAULT_MAX_DEPTH;

/// Default per-request timeout for reflection calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Reflection client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// Timeout applied to every reflection request
    pub timeout: Duration,
    /// Depth budget for schema resolution
    pub max_depth: usize,
    pub user_agent: String,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            user_agent: default_user_agent(),
        }
    }
}

impl ReflectionConfig {
    /// Load configuration from a TOML file, falling back to defaults if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, ReflectError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ReflectError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse the `[reflection]` table of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ReflectError> {
        let toml_value: toml::Value = toml::from_str(content)
            .map_err(|e| ReflectError::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();
        let Some(section) = toml_value.get("reflection") else {
            return Ok(config);
        };

        if let Some(value) = section.get("timeout_ms") {
            let ms = value
                .as_integer()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ReflectError::Config("timeout_ms must be a positive integer".to_string()))?;
            config.timeout = Duration::from_millis(ms as u64);
        }

        if let Some(value) = section.get("max_depth") {
            let depth = value
                .as_integer()
                .filter(|d| *d >= 0)
                .ok_or_else(|| ReflectError::Config("max_depth must be a non-negative integer".to_string()))?;
            config.max_depth = depth as usize;
        }

        if let Some(agent) = section.get("user_agent").and_then(|v| v.as_str()) {
            config.user_agent = agent.to_string();
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("quicpulse"))
        .unwrap_or_else(|| PathBuf::from(".quicpulse"))
        .join("reflection.toml")
}

fn default_user_agent() -> String {
    format!("quicpulse-reflect/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReflectionConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_depth, 6);
        assert!(config.user_agent.starts_with("quicpulse-reflect/"));
    }

    #[test]
    fn test_parse_overrides() {
        let config = ReflectionConfig::from_toml_str(
            r#"
            [reflection]
            timeout_ms = 1500
            max_depth = 3
            user_agent = "grpc-inspector/1.0"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.user_agent, "grpc-inspector/1.0");
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = ReflectionConfig::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, ReflectionConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ReflectionConfig::from_toml_str("[reflection]\ntimeout_ms = -5\n"),
            Err(ReflectError::Config(_))
        ));
        assert!(matches!(
            ReflectionConfig::from_toml_str("[reflection]\nmax_depth = \"deep\"\n"),
            Err(ReflectError::Config(_))
        ));
        assert!(matches!(
            ReflectionConfig::from_toml_str("not toml ["),
            Err(ReflectError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReflectionConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ReflectionConfig::default());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflection.toml");
        std::fs::write(&path, "[reflection]\nmax_depth = 2\n").unwrap();

        assert_eq!(ReflectionConfig::load(&path).unwrap().max_depth, 2);
    }

    #[test]
    fn test_default_path() {
        assert!(default_config_path().ends_with("quicpulse/reflection.toml"));
    }
}
