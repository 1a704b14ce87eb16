use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed sweep record: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode sweep record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No successful runs to summarize")]
    NoRunsFound,

    #[error("An internal calculation error occurred: {0}")]
    Calculation(String),
}
