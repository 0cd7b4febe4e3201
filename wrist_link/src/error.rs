//! Transport errors.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// The local endpoint could not be opened.  Fatal at startup.
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr:   String,
        #[source]
        source: io::Error,
    },

    #[error("session is not activated")]
    NotActivated,

    #[error("peer is not reachable")]
    Unreachable,

    /// The other end went away for good.
    #[error("session closed")]
    Closed,

    #[error("malformed payload: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transport i/o: {0}")]
    Io(#[from] io::Error),
}
