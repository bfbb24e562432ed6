//! Artifact name validation.
//!
//! Artifact names are `/`-separated relative paths (the stream prefix may
//! carry sub-directories, e.g. `topic7/`). Valid names:
//! - Must be non-empty
//! - Must not start or end with `/`
//! - Must not contain `\` or NUL
//! - Must not contain empty components (`//`)
//! - Must not contain `.` or `..` components

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{SinkError, SinkResult};

const FORBIDDEN_CHARS: &[char] = &['\\', '\0'];

/// A validated, relative artifact name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Validate `name` and wrap it.
    ///
    /// ```
    /// use dlv_sink::ArtifactName;
    ///
    /// assert!(ArtifactName::new("topic0/1700000000000000000").is_ok());
    /// assert!(ArtifactName::new("../escape").is_err());
    /// assert!(ArtifactName::new("/abs").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> SinkResult<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The directory part of the name, if any (`"a/b/c"` → `Some("a/b")`).
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// The final component (`"a/b/c"` → `"c"`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, file)| file)
    }

    /// Resolve the name under `root`, one path component per segment.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.0.split('/'));
        path
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ArtifactName {
    type Err = SinkError;

    fn from_str(s: &str) -> SinkResult<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = SinkError;

    fn try_from(s: String) -> SinkResult<Self> {
        Self::new(s)
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> SinkError {
    SinkError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate(name: &str) -> SinkResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }

    if name.starts_with('/') {
        return Err(invalid(name, "must be relative"));
    }

    if name.ends_with('/') {
        return Err(invalid(name, "must not end with '/'"));
    }

    for component in name.split('/') {
        match component {
            "" => return Err(invalid(name, "path components must not be empty")),
            "." | ".." => {
                return Err(invalid(
                    name,
                    format!("component must not be {component:?}"),
                ))
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_nested_names() {
        assert!(ArtifactName::new("testPutFlush-1700000000123456789").is_ok());
        assert!(ArtifactName::new("topic3/1700000000123456789").is_ok());
        assert!(ArtifactName::new("a/b/c/d").is_ok());
        assert!(ArtifactName::new("t/.hidden").is_ok());
        assert!(ArtifactName::new("with..dots").is_ok());
    }

    #[test]
    fn rejects_escaping_names() {
        for bad in ["", "/abs", "dir/", "a//b", "../up", "a/../b", "./x", "a/.", "a\\b", "nul\0"] {
            let err = ArtifactName::new(bad).unwrap_err();
            assert!(matches!(err, SinkError::InvalidName { .. }), "{bad:?} accepted");
        }
    }

    #[test]
    fn parent_and_file_name() {
        let nested = ArtifactName::new("topic1/sub/42").unwrap();
        assert_eq!(nested.parent(), Some("topic1/sub"));
        assert_eq!(nested.file_name(), "42");

        let flat = ArtifactName::new("42").unwrap();
        assert_eq!(flat.parent(), None);
        assert_eq!(flat.file_name(), "42");
    }

    #[test]
    fn to_path_joins_components() {
        let name = ArtifactName::new("t/99").unwrap();
        let path = name.to_path(Path::new("/var/dest"));
        assert_eq!(path, Path::new("/var/dest").join("t").join("99"));
    }

    #[test]
    fn parses_from_str() {
        let name: ArtifactName = "p/1".parse().unwrap();
        assert_eq!(name.to_string(), "p/1");
        assert!("p/".parse::<ArtifactName>().is_err());
    }
}
