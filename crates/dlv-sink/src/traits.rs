use crate::error::SinkResult;
use crate::name::ArtifactName;

/// Durable destination for flushed artifacts.
///
/// All implementations must satisfy these invariants:
/// - `write_artifact` materializes any missing parent directories itself;
///   callers never need to call `create_directories` first.
/// - A successful `write_artifact` has stored every byte it was given and
///   returns that count.
/// - Failures are returned, never retried or swallowed.
/// - Name collisions follow the sink's own policy (overwrite or error).
pub trait Sink: Send + Sync {
    /// Create the directory `path` and every missing ancestor.
    ///
    /// `path` uses the same `/`-separated relative form as artifact names.
    /// Creating a directory that already exists succeeds.
    fn create_directories(&self, path: &str) -> SinkResult<()>;

    /// Store `data` under `name`. Returns the number of bytes written.
    fn write_artifact(&self, name: &ArtifactName, data: &[u8]) -> SinkResult<usize>;

    /// Human-readable description of the destination, for logging.
    fn describe(&self) -> String;
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn create_directories(&self, path: &str) -> SinkResult<()> {
        (**self).create_directories(path)
    }

    fn write_artifact(&self, name: &ArtifactName, data: &[u8]) -> SinkResult<usize> {
        (**self).write_artifact(name, data)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
