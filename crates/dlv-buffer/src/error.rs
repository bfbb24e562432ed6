use std::collections::TryReserveError;

/// Errors from accumulator operations.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// Growing the buffer failed (allocation failure or capacity overflow).
    #[error("cannot grow buffer of {len} bytes by {requested} bytes: {source}")]
    ResourceExhausted {
        requested: usize,
        len: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Result alias for accumulator operations.
pub type BufferResult<T> = Result<T, BufferError>;
