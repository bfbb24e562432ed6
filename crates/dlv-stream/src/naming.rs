use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dlv_sink::ArtifactName;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StreamResult;

/// How a flush derives its artifact name from the stream prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// `prefix + unix_nanos`. Two flushes within one clock tick collide.
    #[default]
    UnixNanos,
    /// `prefix + unix_nanos + "-" + sequence`. Unique within a stream.
    UnixNanosWithSequence,
    /// `prefix + UUIDv7`. Unique across streams and processes, time-sortable.
    Uuid,
}

/// Per-stream artifact name generator.
#[derive(Debug)]
pub struct ArtifactNamer {
    strategy: NamingStrategy,
    sequence: AtomicU64,
}

impl ArtifactNamer {
    pub fn new(strategy: NamingStrategy) -> Self {
        Self {
            strategy,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> NamingStrategy {
        self.strategy
    }

    /// Generate the next artifact name under `prefix`.
    pub fn next_name(&self, prefix: &str) -> StreamResult<ArtifactName> {
        let suffix = match self.strategy {
            NamingStrategy::UnixNanos => unix_nanos().to_string(),
            NamingStrategy::UnixNanosWithSequence => {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                format!("{}-{seq:06}", unix_nanos())
            }
            NamingStrategy::Uuid => Uuid::now_v7().to_string(),
        };
        Ok(ArtifactName::new(format!("{prefix}{suffix}"))?)
    }
}

/// Wall-clock nanoseconds since the UNIX epoch.
pub fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unix_nanos_appends_timestamp() {
        let before = unix_nanos();
        let name = ArtifactNamer::new(NamingStrategy::UnixNanos)
            .next_name("topic0/")
            .unwrap();
        let after = unix_nanos();

        let ts: u128 = name.file_name().parse().unwrap();
        assert_eq!(name.parent(), Some("topic0"));
        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn flat_prefix_is_concatenated() {
        let name = ArtifactNamer::new(NamingStrategy::UnixNanos)
            .next_name("testPutFlush-")
            .unwrap();
        let digits = name.as_str().strip_prefix("testPutFlush-").unwrap();
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn sequence_names_are_unique() {
        let namer = ArtifactNamer::new(NamingStrategy::UnixNanosWithSequence);
        let names: HashSet<String> = (0..1000)
            .map(|_| namer.next_name("t/").unwrap().into_string())
            .collect();
        assert_eq!(names.len(), 1000);

        let first = namer.next_name("t/").unwrap();
        assert!(first.file_name().ends_with("-001000"));
    }

    #[test]
    fn uuid_names_are_v7() {
        let name = ArtifactNamer::new(NamingStrategy::Uuid)
            .next_name("p/")
            .unwrap();
        let id = Uuid::parse_str(name.file_name()).unwrap();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn escaping_prefix_is_rejected() {
        let namer = ArtifactNamer::new(NamingStrategy::UnixNanos);
        assert!(namer.next_name("../").is_err());
        assert!(namer.next_name("/abs/").is_err());
    }
}
