//! Configuration management for the gpulens agent

use crate::{AgentError, Result};
use lens_analysis::AnalysisConfig;
use lens_ingest::IngestConfig;
use lens_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration for the gpulens agent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    /// Agent-specific configuration
    pub agent: AgentSpecificConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Ingest validation and queueing
    pub ingest: IngestConfig,

    /// Summary store limits and cleanup
    pub store: StoreConfig,

    /// Analysis thresholds
    pub analysis: AnalysisConfig,

    /// Analysis trigger handling
    pub trigger: TriggerConfig,

    /// Result sink configuration
    pub sink: SinkConfig,
}

/// Agent-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpecificConfig {
    /// Agent name/identifier
    pub name: String,

    /// Data directory for the agent (results file lives here by default)
    pub data_dir: PathBuf,

    /// Graceful shutdown timeout (seconds)
    pub shutdown_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format ("pretty" or "json")
    pub format: String,

    /// Include the log target in output
    pub show_target: bool,
}

/// Analysis trigger handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Capacity of the bounded trigger channel
    pub queue_capacity: usize,

    /// How long to wait for all expected node summaries before analyzing
    /// with whatever arrived (seconds)
    pub grace_timeout_seconds: u64,

    /// Poll interval while waiting for summaries (milliseconds)
    pub poll_interval_millis: u64,

    /// Bounded timeout for emitting one result (seconds)
    pub emit_timeout_seconds: u64,
}

/// Result sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Results file path; defaults to `<data_dir>/results.jsonl`
    pub results_file: Option<PathBuf>,
}

impl Default for AgentSpecificConfig {
    fn default() -> Self {
        Self {
            name: "lens-agent".to_string(),
            data_dir: PathBuf::from("/var/lib/gpulens"),
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            show_target: true,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            grace_timeout_seconds: 30,
            poll_interval_millis: 500,
            emit_timeout_seconds: 5,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { results_file: None }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        if self.agent.name.is_empty() {
            return Err(AgentError::Config("agent name must not be empty".to_string()));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AgentError::Config(format!(
                "unknown log format: {}",
                self.logging.format
            )));
        }

        self.ingest.validate().map_err(AgentError::Config)?;
        self.store.validate().map_err(AgentError::Config)?;
        self.analysis.validate().map_err(AgentError::Config)?;

        if self.trigger.queue_capacity == 0 {
            return Err(AgentError::Config(
                "trigger queue_capacity must be greater than zero".to_string(),
            ));
        }

        if self.trigger.poll_interval_millis == 0 {
            return Err(AgentError::Config(
                "trigger poll_interval_millis must be greater than zero".to_string(),
            ));
        }

        if self.trigger.emit_timeout_seconds == 0 {
            return Err(AgentError::Config(
                "trigger emit_timeout_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Ensure the data directory exists
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.agent.data_dir)?;
        Ok(())
    }

    /// Resolved path of the results file
    pub fn results_file_path(&self) -> PathBuf {
        self.sink
            .results_file
            .clone()
            .unwrap_or_else(|| self.agent.data_dir.join("results.jsonl"))
    }
}
