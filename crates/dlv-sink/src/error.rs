use std::io;
use std::path::PathBuf;

/// Errors from sink operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The artifact name cannot be used as a relative sink path.
    #[error("invalid artifact name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Materializing the artifact's parent directories failed.
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDirectories {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Opening or writing the artifact failed.
    #[error("cannot write artifact {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An artifact with this name exists and the sink refuses to overwrite it.
    #[error("artifact already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },
}

/// Result alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
