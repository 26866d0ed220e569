//! # lens-agent
//!
//! Analysis agent (lensd daemon) for gpulens.
//!
//! This crate wires the ingest queue, validator, summary store, and
//! analysis pipeline into a long-running agent. Sidecar payloads enter
//! through a bounded queue; analysis triggers from the scheduler epilogue
//! enter through a second bounded channel; finished results leave through
//! a pluggable sink. Nothing on either path may block the producers.

pub mod agent;
pub mod config;
pub mod metrics;
pub mod services;
pub mod sink;

// Re-export commonly used types
pub use agent::{Agent, AgentBuilder};
pub use config::AgentConfig;
pub use metrics::EngineMetrics;
pub use services::AnalysisRequest;
pub use sink::{ChannelSink, JsonlSink, ResultSink};

// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] serde_yaml::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Core error: {0}")]
    Core(#[from] lens_core::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Initialize the agent with logging configured
pub async fn init_agent(config: &AgentConfig) -> Result<Agent> {
    init_logging(&config.logging)?;

    tracing::info!(agent = %config.agent.name, "initializing gpulens agent");

    let agent = AgentBuilder::new().with_config(config.clone()).build()?;

    Ok(agent)
}

/// Initialize logging and tracing
fn init_logging(logging_config: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging_config.show_target);

    match logging_config.format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_creation() {
        let config = AgentConfig::default();
        assert!(!config.agent.name.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agent_build() {
        let config = AgentConfig::default();
        let agent = AgentBuilder::new().with_config(config).build().unwrap();
        assert_eq!(agent.config().agent.name, "lens-agent");
    }
}
