use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dlv_buffer::{AccumulatorConfig, DEFAULT_INITIAL_CAPACITY, MAX_INITIAL_CAPACITY};
use dlv_sink::{ArtifactName, CollisionPolicy, FsSinkConfig, SyncMode};
use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::naming::NamingStrategy;
use crate::router::Partitioner;
use crate::stream::{FlushRetention, StreamConfig};

/// Placeholder replaced by the partition index in `prefix_template`.
pub const PARTITION_PLACEHOLDER: &str = "{partition}";

/// File-level description of a partitioned filesystem stream set.
///
/// ```toml
/// dest_dir = "dest"
/// prefix_template = "topic{partition}/"
/// partitions = 10
/// partitioner = "key_hash"
/// naming = "unix_nanos_with_sequence"
/// retention = "discard_flushed"
/// flush_interval_ms = 500
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Directory artifacts are written under. Created on first flush.
    pub dest_dir: PathBuf,
    /// Per-partition prefix; `{partition}` expands to the partition index.
    pub prefix_template: String,
    pub partitions: usize,
    pub partitioner: Partitioner,
    pub naming: NamingStrategy,
    pub retention: FlushRetention,
    pub skip_empty: bool,
    /// Bytes reserved per stream buffer up front, at most 1 GiB.
    pub initial_capacity: usize,
    pub sync: SyncMode,
    pub collision: CollisionPolicy,
    /// Interval for callers that flush on a timer. The streams themselves
    /// never flush on their own.
    pub flush_interval_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from("dest"),
            prefix_template: format!("topic{PARTITION_PLACEHOLDER}/"),
            partitions: 1,
            partitioner: Partitioner::default(),
            naming: NamingStrategy::default(),
            retention: FlushRetention::default(),
            skip_empty: false,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            sync: SyncMode::default(),
            collision: CollisionPolicy::default(),
            flush_interval_ms: 1000,
        }
    }
}

impl DeliveryConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> StreamResult<Self> {
        Self::from_toml_str_over(s, &Self::default())
    }

    /// Parse and validate a TOML document layered over `base`: keys present
    /// in the document win, missing keys keep `base`'s values.
    pub fn from_toml_str_over(s: &str, base: &Self) -> StreamResult<Self> {
        let overrides: toml::Table = s.parse().map_err(config_err)?;
        let toml::Value::Table(mut merged) = toml::Value::try_from(base).map_err(config_err)?
        else {
            return Err(StreamError::Config("config did not serialize to a table".into()));
        };
        merged.extend(overrides);

        let config: Self = toml::Value::Table(merged).try_into().map_err(config_err)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> StreamResult<Self> {
        Self::load_over(path, &Self::default())
    }

    /// Read a TOML file layered over `base`; see [`Self::from_toml_str_over`].
    pub fn load_over(path: &Path, base: &Self) -> StreamResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| StreamError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str_over(&text, base)
    }

    pub fn to_toml_string(&self) -> StreamResult<String> {
        toml::to_string_pretty(self).map_err(config_err)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> StreamResult<()> {
        if self.partitions == 0 {
            return Err(StreamError::Config("partitions must be at least 1".into()));
        }
        if self.partitions > 1 && !self.prefix_template.contains(PARTITION_PLACEHOLDER) {
            return Err(StreamError::Config(format!(
                "prefix_template {:?} must contain {PARTITION_PLACEHOLDER} when partitions > 1",
                self.prefix_template
            )));
        }
        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(StreamError::Config(format!(
                "initial_capacity {} exceeds the {MAX_INITIAL_CAPACITY}-byte limit",
                self.initial_capacity
            )));
        }
        if self.flush_interval_ms == 0 {
            return Err(StreamError::Config("flush_interval_ms must be positive".into()));
        }
        let sample = format!("{}0", self.prefix_for(0));
        ArtifactName::new(sample).map_err(|e| {
            StreamError::Config(format!("unusable prefix_template {:?}: {e}", self.prefix_template))
        })?;
        Ok(())
    }

    /// Expanded prefix for `partition`.
    pub fn prefix_for(&self, partition: usize) -> String {
        self.prefix_template
            .replace(PARTITION_PLACEHOLDER, &partition.to_string())
    }

    /// Stream settings for `partition`.
    pub fn stream_config(&self, partition: usize) -> StreamConfig {
        StreamConfig {
            prefix: self.prefix_for(partition),
            naming: self.naming,
            retention: self.retention,
            skip_empty: self.skip_empty,
            buffer: AccumulatorConfig::with_initial_capacity(self.initial_capacity),
        }
    }

    pub fn sink_config(&self) -> FsSinkConfig {
        FsSinkConfig {
            sync: self.sync,
            collision: self.collision,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn config_err(e: impl std::fmt::Display) -> StreamError {
    StreamError::Config(e.to_string())
}
