//! Error types for the Geweke harness

use thiserror::Error;

/// NextStat error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fatal run configuration error (aborts before any sampling)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An inference engine call failed
    #[error("Engine error: {0}")]
    Engine(String),

    /// A fan-out partition failed; observed at the barrier
    #[error("worker partition {partition} failed: {source}")]
    Worker {
        /// Index of the failed partition (chain or forward worker).
        partition: usize,
        /// The originating error.
        #[source]
        source: Box<Error>,
    },

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Wrap an error raised inside fan-out partition `partition`.
    pub fn worker(partition: usize, source: Error) -> Self {
        Error::Worker { partition, source: Box::new(source) }
    }

    /// True for errors that must abort a run before sampling begins.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Configuration(_) => true,
            Error::Worker { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
