//! Configuration management for Recast

pub mod logging;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use recast_foundation::{RecastError, RecastResult, TopLevelNodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Configuration files probed in order; the first one found is used
const CONFIG_FILES: [&str; 2] = ["recast.toml", ".recast/config.toml"];

/// Prefix of environment variable overrides, e.g. `RECAST__LOGGING__LEVEL=debug`
const ENV_PREFIX: &str = "RECAST__";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Ordering policy for top-level node relocation
    pub move_top_level_node: MoveTopLevelNodeConfig,
    /// Job review and persistence
    pub jobs: JobsConfig,
    /// External analysis engine
    pub engine: EngineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines
    Json,
    /// Human-readable output
    Pretty,
}

/// Ordering policy used by the solution search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MoveTopLevelNodeConfig {
    /// Preferred order of declaration kinds, first kind first in the file
    pub kind_order: Vec<TopLevelNodeKind>,
    /// Score added per ordering violation; must dominate raw displacement
    pub violation_weight: u32,
}

impl Default for MoveTopLevelNodeConfig {
    fn default() -> Self {
        Self {
            kind_order: TopLevelNodeKind::default_order(),
            violation_weight: 1000,
        }
    }
}

/// Job review and persistence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    /// Save documents after an accepted job has been applied to them
    pub save_document_on_accept: bool,
    /// Location of the persisted registry state
    pub state_file: PathBuf,
    /// Quiet period after the last registry change before state is flushed
    pub persist_debounce_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            save_document_on_accept: true,
            state_file: PathBuf::from(".recast/localState.json"),
            persist_debounce_ms: 1000,
        }
    }
}

/// External analysis engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable; required to start executions
    pub executable: Option<PathBuf>,
    /// Maximum number of files the engine is asked to process
    pub file_limit: u32,
    /// Directory the engine writes rewritten files into
    pub output_directory: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: None,
            file_limit: 1000,
            output_directory: PathBuf::from(".recast/engine-output"),
        }
    }
}

impl AppConfig {
    /// Load configuration from the current directory and environment
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables (`RECAST__*`, sections separated by `__`)
    /// 2. `recast.toml` or `.recast/config.toml`
    /// 3. Default values
    pub fn load() -> RecastResult<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration, probing config files relative to `dir`
    pub fn load_from(dir: &Path) -> RecastResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        for candidate in CONFIG_FILES {
            let path = dir.join(candidate);
            if path.exists() {
                tracing::info!(path = %path.display(), "Loading TOML configuration");
                figment = figment.merge(Toml::file(path));
                break;
            }
        }

        let figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .map(|k| k.as_str().to_lowercase().into()),
        );

        let config: AppConfig = figment
            .extract()
            .map_err(|e| RecastError::config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;

        tracing::debug!(
            kind_order = ?config.move_top_level_node.kind_order,
            state_file = %config.jobs.state_file.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Reject configurations the engine cannot work with
    pub fn validate(&self) -> RecastResult<()> {
        let policy = &self.move_top_level_node;

        let mut seen = HashSet::new();
        if let Some(duplicate) = policy.kind_order.iter().find(|kind| !seen.insert(**kind)) {
            return Err(RecastError::config(format!(
                "move_top_level_node.kind_order lists '{}' more than once",
                duplicate
            )));
        }

        if policy.violation_weight == 0 {
            return Err(RecastError::config(
                "move_top_level_node.violation_weight must be greater than zero",
            ));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(RecastError::config(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}
