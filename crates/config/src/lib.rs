//! Configuration loading and validation for newsloom.
//!
//! Loads configuration from `newsloom.toml` in the working directory (or
//! `~/.newsloom/config.toml`) with environment variable overrides, and
//! validates everything before any pipeline is built. There is no global
//! config instance: callers construct a [`DigestConfig`], validate it, and
//! pass it into the orchestrator explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The placeholder value shipped in setup instructions. A key left at this
/// value is treated the same as no key at all.
pub const PLACEHOLDER_API_KEY: &str = "paste_your_actual_key_here";

/// Configuration for the digest pipeline.
///
/// Maps directly to `newsloom.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// API key for the model service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// The model used by generation stages (scrape, summarize, draft, refine)
    #[serde(default = "default_worker_model")]
    pub worker_model: String,

    /// The model used for quality assessment
    #[serde(default = "default_critic_model")]
    pub critic_model: String,

    /// How many articles to process
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,

    /// How many refinement passes before the loop gives up
    #[serde(default = "default_max_quality_iterations")]
    pub max_quality_iterations: usize,

    /// Target digest length, in minutes of reading
    #[serde(default = "default_target_reading_time")]
    pub target_reading_time: u32,

    /// Number of parallel article processors (reserved; the pipeline
    /// currently runs processors sequentially)
    #[serde(default = "default_num_parallel_processors")]
    pub num_parallel_processors: usize,

    /// Minimum critic score (0–100) that counts as approved
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,
}

fn default_worker_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_critic_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_max_articles() -> usize {
    5
}
fn default_max_quality_iterations() -> usize {
    3
}
fn default_target_reading_time() -> u32 {
    3
}
fn default_num_parallel_processors() -> usize {
    3
}
fn default_quality_threshold() -> u8 {
    85
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestConfig")
            .field("api_key", &redact(&self.api_key))
            .field("worker_model", &self.worker_model)
            .field("critic_model", &self.critic_model)
            .field("max_articles", &self.max_articles)
            .field("max_quality_iterations", &self.max_quality_iterations)
            .field("target_reading_time", &self.target_reading_time)
            .field("num_parallel_processors", &self.num_parallel_processors)
            .field("quality_threshold", &self.quality_threshold)
            .finish()
    }
}

impl DigestConfig {
    /// Load configuration from the default locations.
    ///
    /// Search order: `./newsloom.toml`, then `~/.newsloom/config.toml`,
    /// then built-in defaults. Environment variables override the file:
    /// - `GOOGLE_API_KEY` / `NEWSLOOM_API_KEY`: the credential
    /// - `NEWSLOOM_WORKER_MODEL`, `NEWSLOOM_CRITIC_MODEL`
    /// - `NEWSLOOM_MAX_ARTICLES`, `NEWSLOOM_MAX_QUALITY_ITERATIONS`,
    ///   `NEWSLOOM_TARGET_READING_TIME`, `NEWSLOOM_QUALITY_THRESHOLD`
    pub fn load() -> Result<Self, ConfigError> {
        let local = PathBuf::from("newsloom.toml");
        let path = if local.exists() {
            local
        } else {
            Self::config_dir().join("config.toml")
        };
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path, with environment
    /// overrides applied. This is what an explicit `--config` flag uses.
    pub fn load_from_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".newsloom")
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable source. The process environment is
    /// one such source; tests supply their own. An unparsable numeric value
    /// is ignored and the existing setting stands.
    fn apply_overrides_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(key) = get("GOOGLE_API_KEY") {
            self.api_key = Some(key);
        } else if let Some(key) = get("NEWSLOOM_API_KEY") {
            self.api_key = Some(key);
        }

        if let Some(model) = get("NEWSLOOM_WORKER_MODEL") {
            self.worker_model = model;
        }
        if let Some(model) = get("NEWSLOOM_CRITIC_MODEL") {
            self.critic_model = model;
        }
        if let Some(n) = get("NEWSLOOM_MAX_ARTICLES").and_then(|v| v.parse().ok()) {
            self.max_articles = n;
        }
        if let Some(n) = get("NEWSLOOM_MAX_QUALITY_ITERATIONS").and_then(|v| v.parse().ok()) {
            self.max_quality_iterations = n;
        }
        if let Some(n) = get("NEWSLOOM_TARGET_READING_TIME").and_then(|v| v.parse().ok()) {
            self.target_reading_time = n;
        }
        if let Some(n) = get("NEWSLOOM_QUALITY_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.quality_threshold = n;
        }
    }

    /// Validate the configuration. The orchestrator refuses to build from a
    /// config that fails this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.api_key.as_deref() {
            None | Some("") => return Err(ConfigError::MissingApiKey),
            Some(PLACEHOLDER_API_KEY) => return Err(ConfigError::MissingApiKey),
            Some(_) => {}
        }

        if self.max_articles == 0 {
            return Err(ConfigError::ValidationError(
                "max_articles must be at least 1".into(),
            ));
        }
        if self.max_quality_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_quality_iterations must be at least 1".into(),
            ));
        }
        if self.target_reading_time == 0 {
            return Err(ConfigError::ValidationError(
                "target_reading_time must be at least 1 minute".into(),
            ));
        }
        if self.quality_threshold == 0 || self.quality_threshold > 100 {
            return Err(ConfigError::ValidationError(
                "quality_threshold must be between 1 and 100".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        matches!(self.api_key.as_deref(), Some(k) if !k.is_empty() && k != PLACEHOLDER_API_KEY)
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            worker_model: default_worker_model(),
            critic_model: default_critic_model(),
            max_articles: default_max_articles(),
            max_quality_iterations: default_max_quality_iterations(),
            target_reading_time: default_target_reading_time(),
            num_parallel_processors: default_num_parallel_processors(),
            quality_threshold: default_quality_threshold(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("API key is missing or still set to the placeholder value")]
    MissingApiKey,

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key(config: DigestConfig) -> DigestConfig {
        DigestConfig {
            api_key: Some("test-key-123".into()),
            ..config
        }
    }

    #[test]
    fn default_config_has_reference_knobs() {
        let config = DigestConfig::default();
        assert_eq!(config.worker_model, "gemini-1.5-flash");
        assert_eq!(config.max_articles, 5);
        assert_eq!(config.max_quality_iterations, 3);
        assert_eq!(config.target_reading_time, 3);
        assert_eq!(config.quality_threshold, 85);
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let config = DigestConfig::default();
        assert!(!config.has_api_key());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn placeholder_api_key_fails_validation() {
        let config = DigestConfig {
            api_key: Some(PLACEHOLDER_API_KEY.into()),
            ..DigestConfig::default()
        };
        assert!(!config.has_api_key());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn valid_config_passes_validation() {
        let config = with_key(DigestConfig::default());
        assert!(config.has_api_key());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = with_key(DigestConfig {
            max_quality_iterations: 0,
            ..DigestConfig::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_quality_iterations"));
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        for threshold in [0u8, 101] {
            let config = with_key(DigestConfig {
                quality_threshold: threshold,
                ..DigestConfig::default()
            });
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = with_key(DigestConfig::default());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: DigestConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.worker_model, config.worker_model);
        assert_eq!(parsed.quality_threshold, config.quality_threshold);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = DigestConfig::load_from(Path::new("/nonexistent/newsloom.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.max_articles, 5);
    }

    #[test]
    fn partial_config_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsloom.toml");
        std::fs::write(&path, "max_quality_iterations = 5\n").unwrap();

        let config = DigestConfig::load_from(&path).unwrap();
        assert_eq!(config.max_quality_iterations, 5);
        assert_eq!(config.max_articles, 5);
        assert_eq!(config.worker_model, "gemini-1.5-flash");
    }

    #[test]
    fn malformed_config_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsloom.toml");
        std::fs::write(&path, "max_articles = \"lots\"\n").unwrap();

        let err = DigestConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    fn fake_env(vars: &[(&str, &str)], name: &str) -> Option<String> {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| (*value).to_string())
    }

    #[test]
    fn google_key_takes_precedence_over_newsloom_key() {
        let vars = [
            ("GOOGLE_API_KEY", "google-key"),
            ("NEWSLOOM_API_KEY", "newsloom-key"),
        ];
        let mut config = DigestConfig::default();
        config.apply_overrides_from(|name| fake_env(&vars, name));
        assert_eq!(config.api_key.as_deref(), Some("google-key"));
    }

    #[test]
    fn newsloom_key_applies_when_google_key_is_unset() {
        let vars = [("NEWSLOOM_API_KEY", "newsloom-key")];
        let mut config = DigestConfig {
            api_key: Some("from-file".into()),
            ..DigestConfig::default()
        };
        config.apply_overrides_from(|name| fake_env(&vars, name));
        assert_eq!(config.api_key.as_deref(), Some("newsloom-key"));
    }

    #[test]
    fn overrides_reach_every_knob() {
        let vars = [
            ("NEWSLOOM_WORKER_MODEL", "gemini-1.5-pro"),
            ("NEWSLOOM_CRITIC_MODEL", "gemini-1.0-pro"),
            ("NEWSLOOM_MAX_ARTICLES", "8"),
            ("NEWSLOOM_MAX_QUALITY_ITERATIONS", "6"),
            ("NEWSLOOM_TARGET_READING_TIME", "5"),
            ("NEWSLOOM_QUALITY_THRESHOLD", "90"),
        ];
        let mut config = DigestConfig::default();
        config.apply_overrides_from(|name| fake_env(&vars, name));
        assert_eq!(config.worker_model, "gemini-1.5-pro");
        assert_eq!(config.critic_model, "gemini-1.0-pro");
        assert_eq!(config.max_articles, 8);
        assert_eq!(config.max_quality_iterations, 6);
        assert_eq!(config.target_reading_time, 5);
        assert_eq!(config.quality_threshold, 90);
    }

    #[test]
    fn unparsable_numeric_override_is_ignored() {
        let vars = [("NEWSLOOM_MAX_ARTICLES", "abc")];
        let mut config = DigestConfig::default();
        config.apply_overrides_from(|name| fake_env(&vars, name));
        assert_eq!(config.max_articles, 5);
    }

    #[test]
    fn absent_variables_leave_file_values_alone() {
        let mut config = DigestConfig {
            api_key: Some("from-file".into()),
            worker_model: "gemini-custom".into(),
            ..DigestConfig::default()
        };
        config.apply_overrides_from(|name| fake_env(&[], name));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.worker_model, "gemini-custom");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = with_key(DigestConfig::default());
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-key-123"));
    }
}
