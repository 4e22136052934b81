//! Configuration builders and temporary config files for tests.

use std::path::PathBuf;

use ctxroute_config::AppConfig;
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .model("claude-sonnet-4")
///     .collaborator_timeout_ms(50)
///     .adaptive(true)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn model(mut self, name: &str) -> Self {
        self.config.model.name = name.to_string();
        self
    }

    pub fn context_window(mut self, window: usize) -> Self {
        self.config.model.context_window = Some(window);
        self
    }

    pub fn response_target(mut self, tokens: usize) -> Self {
        self.config.model.response_target = tokens;
        self
    }

    pub fn max_results(mut self, n: usize) -> Self {
        self.config.retrieval.max_results = n;
        self
    }

    pub fn collaborator_timeout_ms(mut self, ms: u64) -> Self {
        self.config.retrieval.collaborator_timeout_ms = ms;
        self
    }

    pub fn query_timeout_ms(mut self, ms: u64) -> Self {
        self.config.retrieval.query_timeout_ms = ms;
        self
    }

    pub fn call_graph(mut self, enabled: bool) -> Self {
        self.config.retrieval.enable_call_graph = enabled;
        self
    }

    pub fn history(mut self, enabled: bool) -> Self {
        self.config.retrieval.enable_history = enabled;
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.config.retrieval.enable_web_search = enabled;
        self
    }

    pub fn adaptive(mut self, enabled: bool) -> Self {
        self.config.retrieval.adaptive = enabled;
        self
    }

    pub fn max_escalations(mut self, n: usize) -> Self {
        self.config.retrieval.max_escalations = n;
        self
    }

    pub fn exclude_path(mut self, pattern: &str) -> Self {
        self.config.retrieval.exclude_paths.push(pattern.to_string());
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache.enabled = capacity > 0;
        self.config.cache.capacity = capacity;
        self
    }

    pub fn security_enabled(mut self, enabled: bool) -> Self {
        self.config.security.enabled = enabled;
        self
    }

    pub fn sensitive_path(mut self, pattern: &str) -> Self {
        self.config.security.extra_path_patterns.push(pattern.to_string());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A config file in a temporary directory, removed on drop.
pub struct TestConfigFile {
    pub config: AppConfig,
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl TestConfigFile {
    /// Write `toml_content` to a temp file and load it.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("ctxroute.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");

        let config = AppConfig::load(&path)
            .await
            .expect("failed to parse test config");

        Self {
            config,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// An empty file, i.e. all defaults.
    pub async fn default_config() -> Self {
        Self::with_toml("").await
    }

    /// Overwrite the file and reload it.
    pub async fn rewrite(&mut self, toml_content: &str) {
        tokio::fs::write(&self.path, toml_content)
            .await
            .expect("failed to write updated config");
        self.config = AppConfig::load(&self.path)
            .await
            .expect("failed to parse updated config");
    }
}
