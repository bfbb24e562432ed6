use std::io;
use std::path::PathBuf;

use dlv_buffer::BufferError;
use dlv_sink::SinkError;

/// Errors produced by delivery streams and stream sets.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The accumulator could not grow to hold the record.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// The sink rejected the flush (directory creation, write, or naming).
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// A stream set must contain at least one stream.
    #[error("stream set has no streams")]
    EmptyStreamSet,

    /// Explicit partition index outside the stream set.
    #[error("partition {index} out of range for {len} streams")]
    PartitionOutOfRange { index: usize, len: usize },

    /// Key-hash routing was requested without a key.
    #[error("key-hash partitioning requires a partition key")]
    MissingPartitionKey,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Convenience alias used throughout the stream crate.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
