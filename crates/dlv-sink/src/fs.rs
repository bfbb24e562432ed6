use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SinkError, SinkResult};
use crate::name::ArtifactName;
use crate::traits::Sink;

/// Durability strategy for artifact writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
    /// `fsync` each artifact before reporting success.
    EveryWrite,
}

/// What to do when an artifact with the same name already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Truncate and replace the existing file.
    #[default]
    Overwrite,
    /// Fail with [`SinkError::AlreadyExists`].
    Fail,
}

/// Configuration for [`FsSink`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FsSinkConfig {
    pub sync: SyncMode,
    pub collision: CollisionPolicy,
}

/// Filesystem-backed sink: artifacts are files under `root`.
///
/// Missing directories (including `root` itself) are created on write.
#[derive(Clone, Debug)]
pub struct FsSink {
    root: PathBuf,
    config: FsSinkConfig,
}

impl FsSink {
    /// Sink rooted at `root` with default config.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, FsSinkConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: FsSinkConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &FsSinkConfig {
        &self.config
    }

    /// Absolute location an artifact name resolves to.
    pub fn path_of(&self, name: &ArtifactName) -> PathBuf {
        name.to_path(&self.root)
    }

    fn open(&self, path: &Path) -> SinkResult<fs::File> {
        let mut opts = OpenOptions::new();
        opts.write(true);
        match self.config.collision {
            CollisionPolicy::Overwrite => {
                opts.create(true).truncate(true);
            }
            CollisionPolicy::Fail => {
                opts.create_new(true);
            }
        }

        opts.open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                SinkError::AlreadyExists {
                    path: path.to_path_buf(),
                }
            } else {
                SinkError::Write {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

impl Sink for FsSink {
    fn create_directories(&self, path: &str) -> SinkResult<()> {
        let dir = if path.is_empty() {
            self.root.clone()
        } else {
            ArtifactName::new(path)?.to_path(&self.root)
        };
        fs::create_dir_all(&dir)
            .map_err(|source| SinkError::CreateDirectories { path: dir, source })
    }

    fn write_artifact(&self, name: &ArtifactName, data: &[u8]) -> SinkResult<usize> {
        self.create_directories(name.parent().unwrap_or(""))?;

        let path = self.path_of(name);
        let mut file = self.open(&path)?;
        let write_err = |source| SinkError::Write {
            path: path.clone(),
            source,
        };

        file.write_all(data).map_err(write_err)?;
        if self.config.sync == SyncMode::EveryWrite {
            file.sync_all().map_err(write_err)?;
        }

        debug!(path = %path.display(), bytes = data.len(), "artifact written");
        Ok(data.len())
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ArtifactName {
        ArtifactName::new(s).unwrap()
    }

    #[test]
    fn write_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dest");
        assert!(!root.exists());

        let sink = FsSink::new(&root);
        let n = sink.write_artifact(&name("topic1/42"), b"payload").unwrap();

        assert_eq!(n, 7);
        assert!(root.join("topic1").is_dir());
        assert_eq!(fs::read(root.join("topic1").join("42")).unwrap(), b"payload");
    }

    #[test]
    fn flat_name_lands_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path().join("flat"));
        sink.write_artifact(&name("prefix-1"), b"x").unwrap();
        assert_eq!(fs::read(dir.path().join("flat").join("prefix-1")).unwrap(), b"x");
    }

    #[test]
    fn empty_artifact_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        assert_eq!(sink.write_artifact(&name("empty"), b"").unwrap(), 0);
        assert_eq!(fs::metadata(dir.path().join("empty")).unwrap().len(), 0);
    }

    #[test]
    fn overwrite_truncates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        sink.write_artifact(&name("a"), b"a much longer first write").unwrap();
        sink.write_artifact(&name("a"), b"short").unwrap();
        assert_eq!(fs::read(dir.path().join("a")).unwrap(), b"short");
    }

    #[test]
    fn fail_policy_rejects_collision() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::with_config(
            dir.path(),
            FsSinkConfig {
                collision: CollisionPolicy::Fail,
                ..FsSinkConfig::default()
            },
        );
        sink.write_artifact(&name("t/1"), b"first").unwrap();
        let err = sink.write_artifact(&name("t/1"), b"second").unwrap_err();
        assert!(matches!(err, SinkError::AlreadyExists { .. }));
        assert_eq!(fs::read(dir.path().join("t").join("1")).unwrap(), b"first");
    }

    #[test]
    fn sync_every_write_mode() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::with_config(
            dir.path(),
            FsSinkConfig {
                sync: SyncMode::EveryWrite,
                ..FsSinkConfig::default()
            },
        );
        assert_eq!(sink.write_artifact(&name("s"), b"durable").unwrap(), 7);
        assert_eq!(fs::read(dir.path().join("s")).unwrap(), b"durable");
    }

    #[test]
    fn root_that_is_a_file_fails_directory_creation() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();

        let sink = FsSink::new(&blocker);
        let err = sink.write_artifact(&name("t/1"), b"x").unwrap_err();
        match err {
            SinkError::CreateDirectories { path, .. } => assert!(path.starts_with(&blocker)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_in_the_way_fails_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("occupied")).unwrap();

        let sink = FsSink::new(dir.path());
        let err = sink.write_artifact(&name("occupied"), b"x").unwrap_err();
        assert!(matches!(err, SinkError::Write { .. }), "{err}");
    }

    #[test]
    fn create_directories_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        sink.create_directories("a/b").unwrap();
        sink.create_directories("a/b").unwrap();
        sink.create_directories("").unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
    }

    #[test]
    fn create_directories_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        assert!(matches!(
            sink.create_directories("../outside"),
            Err(SinkError::InvalidName { .. })
        ));
    }

    #[test]
    fn describe_names_root() {
        let sink = FsSink::new("/data/out");
        assert_eq!(sink.describe(), "fs:/data/out");
    }
}
