#![deny(unsafe_code)]

//! Configuration loading and validation for ctxroute.
//!
//! Loads TOML configuration files and validates them against expected ranges.
//! Provides the [`AppConfig`] type as the central configuration structure
//! consumed by the retrieval pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target model and prompt overheads.
    #[serde(default)]
    pub model: ModelConfig,

    /// Retrieval fan-out, timeouts and escalation.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Recency cache for delivered bundles.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Sensitive-content filtering.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target model configuration.
///
/// The context window is resolved from `name` unless `context_window` is set
/// explicitly.
///
/// ## TOML Example
///
/// ```toml
/// [model]
/// name = "claude-sonnet-4"
/// response_target = 2000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier used to look up the context window size.
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Explicit context window size in tokens. Overrides the name lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,

    /// Minimum number of tokens reserved for the model's response.
    #[serde(default = "default_response_target")]
    pub response_target: usize,

    /// System prompt whose size is charged against the window.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            context_window: None,
            response_target: default_response_target(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_model_name() -> String {
    "qwen2.5-coder:7b".to_string()
}

fn default_response_target() -> usize {
    1000
}

fn default_system_prompt() -> String {
    "You are a coding assistant working inside the user's repository.\n\
     You are given retrieved code excerpts, call relationships, recent history \
     and optional web results.\n\
     Answer precisely, ground every claim in the provided context, and suggest \
     tests when appropriate."
        .to_string()
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of semantic results per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Upper bound for a single collaborator call, in milliseconds.
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,

    /// Upper bound for the whole retrieval fan-out of one query, in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Whether call-graph lookups may be issued.
    #[serde(default = "default_true")]
    pub enable_call_graph: bool,

    /// Whether history lookups may be issued.
    #[serde(default = "default_true")]
    pub enable_history: bool,

    /// Whether web lookups may be issued.
    #[serde(default = "default_true")]
    pub enable_web_search: bool,

    /// Re-run retrieval with a wider strategy when quality is low.
    #[serde(default)]
    pub adaptive: bool,

    /// Maximum number of escalations per query in adaptive mode.
    #[serde(default = "default_max_escalations")]
    pub max_escalations: usize,

    /// Path substrings excluded at every complexity level.
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            enable_call_graph: true,
            enable_history: true,
            enable_web_search: true,
            adaptive: false,
            max_escalations: default_max_escalations(),
            exclude_paths: Vec::new(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

fn default_collaborator_timeout_ms() -> u64 {
    3_000
}

fn default_query_timeout_ms() -> u64 {
    10_000
}

fn default_max_escalations() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Recency cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether delivered bundles are cached by query.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of cached bundles.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    128
}

/// Sensitive-content filtering configuration.
///
/// ## TOML Example
///
/// ```toml
/// [security]
/// enabled = true
/// extra_path_patterns = ["deploy/keys", "terraform.tfstate"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Whether sensitive items are removed before packing.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Additional case-insensitive path substrings treated as sensitive.
    #[serde(default)]
    pub extra_path_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_path_patterns: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "model.name must not be empty".to_string(),
            ));
        }
        if self.model.context_window == Some(0) {
            return Err(ConfigError::Validation(
                "model.context_window must be non-zero when set".to_string(),
            ));
        }
        if let Some(window) = self.model.context_window
            && self.model.response_target >= window
        {
            return Err(ConfigError::Validation(format!(
                "model.response_target ({}) must be smaller than model.context_window ({window})",
                self.model.response_target
            )));
        }

        if self.retrieval.max_results == 0 {
            return Err(ConfigError::Validation(
                "retrieval.max_results must be at least 1".to_string(),
            ));
        }
        if self.retrieval.collaborator_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "retrieval.collaborator_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.retrieval.query_timeout_ms < self.retrieval.collaborator_timeout_ms {
            return Err(ConfigError::Validation(format!(
                "retrieval.query_timeout_ms ({}) must be at least retrieval.collaborator_timeout_ms ({})",
                self.retrieval.query_timeout_ms, self.retrieval.collaborator_timeout_ms
            )));
        }
        if self.retrieval.max_escalations > 4 {
            return Err(ConfigError::Validation(format!(
                "retrieval.max_escalations must be at most 4, got {}",
                self.retrieval.max_escalations
            )));
        }
        for (i, path) in self.retrieval.exclude_paths.iter().enumerate() {
            if path.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "retrieval.exclude_paths[{i}] must not be empty"
                )));
            }
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(ConfigError::Validation(
                "cache.capacity must be at least 1 when the cache is enabled".to_string(),
            ));
        }

        for (i, pattern) in self.security.extra_path_patterns.iter().enumerate() {
            if pattern.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "security.extra_path_patterns[{i}] must not be empty"
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.name, "qwen2.5-coder:7b");
        assert_eq!(config.model.context_window, None);
        assert_eq!(config.model.response_target, 1000);
        assert_eq!(config.retrieval.max_results, 5);
        assert!(config.cache.enabled);
        assert!(config.security.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.retrieval.collaborator_timeout_ms, 3_000);
        assert_eq!(config.cache.capacity, 128);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [model]
            name = "claude-sonnet-4"
            context_window = 200000
            response_target = 4000

            [retrieval]
            max_results = 8
            collaborator_timeout_ms = 500
            query_timeout_ms = 2000
            enable_web_search = false
            adaptive = true
            max_escalations = 3
            exclude_paths = ["generated/"]

            [cache]
            capacity = 16

            [security]
            extra_path_patterns = ["deploy/keys"]

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.model.name, "claude-sonnet-4");
        assert_eq!(config.model.context_window, Some(200_000));
        assert_eq!(config.model.response_target, 4000);
        assert_eq!(config.retrieval.max_results, 8);
        assert!(!config.retrieval.enable_web_search);
        assert!(config.retrieval.enable_call_graph);
        assert!(config.retrieval.adaptive);
        assert_eq!(config.retrieval.max_escalations, 3);
        assert_eq!(config.retrieval.exclude_paths, vec!["generated/".to_string()]);
        assert_eq!(config.cache.capacity, 16);
        assert_eq!(
            config.security.extra_path_patterns,
            vec!["deploy/keys".to_string()]
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_empty_model_name() {
        let toml = r#"
            [model]
            name = "  "
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let toml = r#"
            [model]
            context_window = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_response_larger_than_window() {
        let toml = r#"
            [model]
            context_window = 1000
            response_target = 1000
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_max_results() {
        let toml = r#"
            [retrieval]
            max_results = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_query_timeout_below_call_timeout() {
        let toml = r#"
            [retrieval]
            collaborator_timeout_ms = 5000
            query_timeout_ms = 1000
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_too_many_escalations() {
        let toml = r#"
            [retrieval]
            max_escalations = 5
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_exclude_path() {
        let toml = r#"
            [retrieval]
            exclude_paths = ["vendor/", ""]
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_cache_capacity() {
        let toml = r#"
            [cache]
            capacity = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());

        let disabled = r#"
            [cache]
            enabled = false
            capacity = 0
        "#;
        assert!(AppConfig::parse(disabled).is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "verbose"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ctxroute.toml");
        tokio::fs::write(&path, b"[model]\nname = \"gpt-4o\"\ncontext_window = 128000\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.model.context_window, Some(128_000));
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // ── Error display ─────────────────────────────────────────────────

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = AppConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::parse(&rendered).unwrap();
        assert_eq!(parsed.model.system_prompt, config.model.system_prompt);
        assert_eq!(parsed.cache.capacity, config.cache.capacity);
    }
}
