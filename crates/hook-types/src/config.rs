//! Configuration loading for the hook runtime.
//!
//! Layered config: defaults -> user config file -> project config file ->
//! CLI-specified file -> `HOOK_RUNTIME_*` environment variables.
//!
//! Settings are loaded once per invocation and passed down by reference.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::HookError;

/// Name of the project-level config file (extension picked by `config`).
pub const PROJECT_CONFIG_STEM: &str = "hook-runtime";

/// Fire-and-forget spawner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerSettings {
    /// When false, background jobs run inline in the dispatching process.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Worker executable (defaults to the current executable).
    #[serde(default)]
    pub program: Option<String>,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            program: None,
        }
    }
}

/// Dangerous command guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Whether the guard denies anything at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Extra substrings that deny a command when present
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_patterns: Vec::new(),
        }
    }
}

/// Health classification policy.
///
/// Every threshold only ever moves a tier towards `degraded`, so the
/// classification stays monotonic in corruption, depth and staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Corrupt-line ratio above which a tier is degraded (0.0-1.0)
    #[serde(default = "default_max_corrupt_ratio")]
    pub max_corrupt_ratio: f64,

    /// Pending queue entries above which the queue tier is degraded
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: u64,

    /// Age of the oldest pending entry after which the queue counts as stale
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_corrupt_ratio() -> f64 {
    0.05
}

fn default_max_queue_depth() -> u64 {
    5000
}

fn default_stale_after_hours() -> u64 {
    24
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            max_corrupt_ratio: default_max_corrupt_ratio(),
            max_queue_depth: default_max_queue_depth(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

impl HealthSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.max_corrupt_ratio) {
            return Err(format!(
                "max_corrupt_ratio must be 0.0-1.0, got {}",
                self.max_corrupt_ratio
            ));
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be > 0".to_string());
        }
        if self.stale_after_hours == 0 {
            return Err("stale_after_hours must be > 0".to_string());
        }
        Ok(())
    }
}

/// Main runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level for stderr diagnostics (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name of the per-project state directory
    #[serde(default = "default_state_dir_name")]
    pub state_dir_name: String,

    /// Built-in handlers to leave out of the registry, by name
    #[serde(default)]
    pub disabled_handlers: Vec<String>,

    /// Spawner configuration
    #[serde(default)]
    pub spawner: SpawnerSettings,

    /// Dangerous command guard configuration
    #[serde(default)]
    pub guard: GuardSettings,

    /// Health policy
    #[serde(default)]
    pub health: HealthSettings,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_state_dir_name() -> String {
    ".claude".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            state_dir_name: default_state_dir_name(),
            disabled_handlers: Vec::new(),
            spawner: SpawnerSettings::default(),
            guard: GuardSettings::default(),
            health: HealthSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. User config file (`<config dir>/hook-runtime/config.*`)
    /// 3. Project config file (`<project>/.claude/hook-runtime.*`)
    /// 4. CLI-specified config file (optional, must exist)
    /// 5. Environment variables (`HOOK_RUNTIME_*`, `__` for nesting)
    pub fn load(project_dir: Option<&Path>, cli_config_path: Option<&str>) -> Result<Self, HookError> {
        let user_config_path = ProjectDirs::from("", "", "hook-runtime")
            .map(|p| p.config_dir().join("config"))
            .unwrap_or_else(|| PathBuf::from("hook-runtime-config"));

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| HookError::Config(e.to_string()))?
            .set_default("state_dir_name", default_state_dir_name())
            .map_err(|e| HookError::Config(e.to_string()))?
            .add_source(File::with_name(&user_config_path.to_string_lossy()).required(false));

        if let Some(dir) = project_dir {
            let project_config = dir.join(default_state_dir_name()).join(PROJECT_CONFIG_STEM);
            builder = builder
                .add_source(File::with_name(&project_config.to_string_lossy()).required(false));
        }

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: HOOK_RUNTIME_LOG_LEVEL, HOOK_RUNTIME_HEALTH__MAX_QUEUE_DEPTH, ...
        builder = builder.add_source(
            Environment::with_prefix("HOOK_RUNTIME")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("disabled_handlers")
                .with_list_parse_key("guard.extra_patterns")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| HookError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| HookError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults on any error.
    ///
    /// The error is handed back instead of logged: callers configure
    /// logging from the returned settings and report it afterwards.
    pub fn load_or_default(
        project_dir: Option<&Path>,
        cli_config_path: Option<&str>,
    ) -> (Self, Option<HookError>) {
        match Self::load(project_dir, cli_config_path) {
            Ok(settings) => (settings, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), HookError> {
        if self.state_dir_name.trim().is_empty() {
            return Err(HookError::Config("state_dir_name must not be empty".into()));
        }
        self.health.validate().map_err(HookError::Config)
    }

    /// Whether a built-in handler is enabled.
    pub fn handler_enabled(&self, name: &str) -> bool {
        !self.disabled_handlers.iter().any(|d| d == name)
    }
}
