use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Failed to start advisor `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Advisor I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Advisor process exited before answering")]
    ProcessExited,

    #[error("Advisor did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Malformed advisor response `{line}`: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode advisor request: {0}")]
    Encode(serde_json::Error),

    #[error("Advisor reported an error: {0}")]
    Remote(String),

    #[error("Unexpected advisor response: {0}")]
    UnexpectedResponse(String),

    #[error("Observation has {got} features, advisor expects {expected}")]
    InvalidObservation { expected: usize, got: usize },
}
