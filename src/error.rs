//! Error types for the robot drive session

use thiserror::Error;

/// Failures talking to the control agent process
#[derive(Error, Debug)]
pub enum AgentError {
    /// The agent binary could not be started
    #[error("failed to start control agent `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A standard stream was not captured at spawn time
    #[error("control agent {0} was not piped")]
    MissingPipe(&'static str),

    /// Writing a command line failed
    #[error("failed to send `{line}` to control agent: {source}")]
    Write {
        line: String,
        #[source]
        source: std::io::Error,
    },

    /// The agent's input has already been shut down
    #[error("control agent session is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum RobotError {
    #[error("no robot advertising service {service_uuid} found within {secs}s")]
    DiscoveryTimedOut { service_uuid: String, secs: u64 },

    #[error("characteristic {char_uuid} not announced within {secs}s")]
    AttributeNotFound { char_uuid: String, secs: u64 },

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("operator output failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RobotError>;
