//! Configuration module for MicroAudit.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for MicroAudit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
}

/// Autosave and reload settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Milliseconds of inactivity before an edited record is written.
    pub debounce_ms: u64,
    /// Maximum number of rows fetched per reload.
    pub reload_limit: usize,
    /// Emit a low-priority notification after every successful save.
    pub notify_on_save: bool,
}

/// Remote backend endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.example.co`.
    pub url: String,
    /// Public (anonymous) API key sent as the `apikey` header.
    pub anon_key: Option<String>,
}

/// How fetched rows are merged into records with pending local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Strategy used when no rule matches: `prefer_local` or `prefer_remote`.
    pub default_strategy: String,
    /// Per-field overrides, evaluated in order; the first match wins.
    pub rules: Vec<ReconcileRule>,
}

/// One `{pattern, strategy}` override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRule {
    /// Glob matched against `"{table}.{field}"`, e.g. `"notes.pinned"` or `"tasks.*"`.
    pub pattern: String,
    /// `prefer_local` or `prefer_remote`.
    pub strategy: String,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/microaudit/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("microaudit")
            .join("config.yaml")
    }
}

impl SyncConfig {
    /// The debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default debounce window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Default reload row limit.
pub const DEFAULT_RELOAD_LIMIT: usize = 500;

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            reload_limit: DEFAULT_RELOAD_LIMIT,
            notify_on_save: false,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            default_strategy: "prefer_local".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.debounce_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `reconcile.default_strategy` and rule strategies.
pub const VALID_RECONCILE_STRATEGIES: &[&str] = &["prefer_local", "prefer_remote"];

impl Config {
    /// Validate the configuration, returning every problem found.
    ///
    /// An empty `Vec` means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.debounce_ms == 0 {
            errors.push(ValidationError {
                field: "sync.debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.reload_limit == 0 {
            errors.push(ValidationError {
                field: "sync.reload_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- remote ---
        let url = self.remote.url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "remote.url".into(),
                message: format!("must start with http:// or https://, got '{url}'"),
            });
        }
        if let Some(key) = &self.remote.anon_key {
            if key.trim().is_empty() {
                errors.push(ValidationError {
                    field: "remote.anon_key".into(),
                    message: "must not be blank when set".into(),
                });
            }
        }

        // --- reconcile ---
        if !VALID_RECONCILE_STRATEGIES.contains(&self.reconcile.default_strategy.as_str()) {
            errors.push(ValidationError {
                field: "reconcile.default_strategy".into(),
                message: format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.reconcile.default_strategy,
                    VALID_RECONCILE_STRATEGIES.join(", ")
                ),
            });
        }
        for (i, rule) in self.reconcile.rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("reconcile.rules[{i}].pattern"),
                    message: "must not be empty".into(),
                });
            }
            if !VALID_RECONCILE_STRATEGIES.contains(&rule.strategy.as_str()) {
                errors.push(ValidationError {
                    field: format!("reconcile.rules[{i}].strategy"),
                    message: format!(
                        "invalid strategy '{}'; valid options: {}",
                        rule.strategy,
                        VALID_RECONCILE_STRATEGIES.join(", ")
                    ),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }

    /// Returns true if a remote endpoint is configured.
    pub fn has_remote(&self) -> bool {
        !self.remote.url.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use microaudit_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_debounce_ms(250)
///     .remote_url("https://example.supabase.co")
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.sync.debounce_ms, 250);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_debounce_ms(mut self, ms: u64) -> Self {
        self.config.sync.debounce_ms = ms;
        self
    }

    pub fn sync_reload_limit(mut self, limit: usize) -> Self {
        self.config.sync.reload_limit = limit;
        self
    }

    pub fn sync_notify_on_save(mut self, enabled: bool) -> Self {
        self.config.sync.notify_on_save = enabled;
        self
    }

    // --- remote ---

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = url.into();
        self
    }

    pub fn remote_anon_key(mut self, key: impl Into<String>) -> Self {
        self.config.remote.anon_key = Some(key.into());
        self
    }

    // --- reconcile ---

    pub fn reconcile_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.reconcile.default_strategy = strategy.into();
        self
    }

    pub fn reconcile_rule(mut self, pattern: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.config.reconcile.rules.push(ReconcileRule {
            pattern: pattern.into(),
            strategy: strategy.into(),
        });
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.debounce_ms, 1000);
        assert_eq!(cfg.sync.debounce(), Duration::from_secs(1));
        assert_eq!(cfg.sync.reload_limit, 500);
        assert!(!cfg.sync.notify_on_save);
        assert!(cfg.remote.url.is_empty());
        assert!(cfg.remote.anon_key.is_none());
        assert_eq!(cfg.reconcile.default_strategy, "prefer_local");
        assert!(cfg.reconcile.rules.is_empty());
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  debounce_ms: 250
  reload_limit: 100
  notify_on_save: true
remote:
  url: https://abc.supabase.co
  anon_key: public-anon-key
reconcile:
  default_strategy: prefer_remote
  rules:
    - pattern: "notes.content"
      strategy: prefer_local
    - pattern: "tasks.*"
      strategy: prefer_remote
logging:
  level: debug
  json: true
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.debounce_ms, 250);
        assert_eq!(cfg.sync.reload_limit, 100);
        assert!(cfg.sync.notify_on_save);
        assert_eq!(cfg.remote.url, "https://abc.supabase.co");
        assert_eq!(cfg.remote.anon_key.as_deref(), Some("public-anon-key"));
        assert_eq!(cfg.reconcile.default_strategy, "prefer_remote");
        assert_eq!(cfg.reconcile.rules.len(), 2);
        assert_eq!(cfg.reconcile.rules[0].pattern, "notes.content");
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_sections() {
        let yaml = "sync:\n  debounce_ms: 400\n";
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.debounce_ms, 400);
        assert_eq!(cfg.sync.reload_limit, 500);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"sync: [not, a, map]").unwrap();
        tmp.flush().unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_debounce() {
        let mut cfg = Config::default();
        cfg.sync.debounce_ms = 0;
        assert!(cfg.validate().iter().any(|e| e.field == "sync.debounce_ms"));
    }

    #[test]
    fn validate_catches_zero_reload_limit() {
        let mut cfg = Config::default();
        cfg.sync.reload_limit = 0;
        assert!(cfg.validate().iter().any(|e| e.field == "sync.reload_limit"));
    }

    #[test]
    fn validate_catches_bad_remote_url() {
        let cfg = ConfigBuilder::new().remote_url("ftp://example").build();
        assert!(cfg.validate().iter().any(|e| e.field == "remote.url"));
    }

    #[test]
    fn validate_catches_blank_anon_key() {
        let cfg = ConfigBuilder::new().remote_anon_key("  ").build();
        assert!(cfg.validate().iter().any(|e| e.field == "remote.anon_key"));
    }

    #[test]
    fn validate_catches_bad_strategies() {
        let cfg = ConfigBuilder::new()
            .reconcile_default_strategy("manual")
            .reconcile_rule("", "prefer_local")
            .reconcile_rule("notes.*", "keep_both")
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"reconcile.default_strategy".to_string()));
        assert!(fields.contains(&"reconcile.rules[0].pattern".to_string()));
        assert!(fields.contains(&"reconcile.rules[1].strategy".to_string()));
    }

    #[test]
    fn validate_catches_bad_log_level() {
        let cfg = ConfigBuilder::new().logging_level("verbose").build();
        assert!(cfg.validate().iter().any(|e| e.field == "logging.level"));
    }

    // -- Builder --

    #[test]
    fn builder_build_validated() {
        let cfg = ConfigBuilder::new()
            .sync_debounce_ms(300)
            .sync_notify_on_save(true)
            .remote_url("http://localhost:54321")
            .logging_json(true)
            .build_validated()
            .expect("valid config");
        assert!(cfg.has_remote());
        assert_eq!(cfg.sync.debounce(), Duration::from_millis(300));

        let errors = ConfigBuilder::new()
            .sync_reload_limit(0)
            .build_validated()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    // -- default_path --

    #[test]
    fn default_path_ends_with_config_yaml() {
        let p = Config::default_path();
        assert!(p.ends_with("microaudit/config.yaml"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "sync.debounce_ms".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "sync.debounce_ms: must be greater than 0");
    }
}
