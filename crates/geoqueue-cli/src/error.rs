use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] geoqueue_core::ConfigError),

    #[error(transparent)]
    Orchestrator(#[from] geoqueue_core::OrchestratorError),

    #[error("command error: {0}")]
    Command(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::Orchestrator(_) => 6,
            Self::Store(_) => 7,
            Self::Io(_) => 10,
        }
    }
}
