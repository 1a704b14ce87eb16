use core_types::{EventKey, EventKind};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("{kind} stream is not sorted: {previous:?} is followed by {next:?}")]
    Unsorted {
        kind: EventKind,
        previous: EventKey,
        next: EventKey,
    },

    #[error("{kind} stream has timestamps going backwards at {key:?}")]
    TimestampOrder { kind: EventKind, key: EventKey },

    #[error("Failed to read event file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed event at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
