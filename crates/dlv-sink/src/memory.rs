use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use bytes::Bytes;

use crate::error::{SinkError, SinkResult};
use crate::name::ArtifactName;
use crate::traits::Sink;

/// In-memory sink.
///
/// Intended for tests and embedding. Artifacts are held in a `BTreeMap`
/// behind a `RwLock`; writing an existing name replaces it. Directories are
/// tracked only so callers can observe what was materialized.
pub struct InMemorySink {
    artifacts: RwLock<BTreeMap<ArtifactName, Bytes>>,
    directories: RwLock<BTreeSet<String>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            artifacts: RwLock::new(BTreeMap::new()),
            directories: RwLock::new(BTreeSet::new()),
        }
    }

    /// Read back an artifact by name.
    pub fn get(&self, name: &str) -> Option<Bytes> {
        let name = ArtifactName::new(name).ok()?;
        self.artifacts
            .read()
            .expect("lock poisoned")
            .get(&name)
            .cloned()
    }

    /// All artifacts in name order.
    pub fn artifacts(&self) -> Vec<(ArtifactName, Bytes)> {
        self.artifacts
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Sorted artifact names.
    pub fn names(&self) -> Vec<ArtifactName> {
        self.artifacts
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if directory `path` was materialized.
    pub fn has_directory(&self, path: &str) -> bool {
        self.directories
            .read()
            .expect("lock poisoned")
            .contains(path)
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for InMemorySink {
    fn create_directories(&self, path: &str) -> SinkResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        ArtifactName::new(path)?;

        let mut dirs = self.directories.write().expect("lock poisoned");
        let mut end = 0;
        for component in path.split('/') {
            end += component.len();
            dirs.insert(path[..end].to_string());
            end += 1;
        }
        Ok(())
    }

    fn write_artifact(&self, name: &ArtifactName, data: &[u8]) -> SinkResult<usize> {
        if let Some(parent) = name.parent() {
            self.create_directories(parent)?;
        }
        if self.has_directory(name.as_str()) {
            return Err(SinkError::InvalidName {
                name: name.to_string(),
                reason: "a directory exists at this name".into(),
            });
        }
        let mut map = self.artifacts.write().expect("lock poisoned");
        map.insert(name.clone(), Bytes::copy_from_slice(data));
        Ok(data.len())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl std::fmt::Debug for InMemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySink")
            .field("artifact_count", &self.len())
            .finish()
    }
}
