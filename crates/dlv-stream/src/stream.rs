use std::path::PathBuf;
use std::sync::Arc;

use dlv_buffer::{Accumulator, AccumulatorConfig};
use dlv_sink::{ArtifactName, FsSink, FsSinkConfig, Sink};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::naming::{ArtifactNamer, NamingStrategy};
use crate::stats::{StreamCounters, StreamStats};

/// A buffered, flushable record stream.
///
/// Both operations are safe to call from any number of threads at once.
pub trait DeliveryStream: Send + Sync {
    /// Append one record. Returns the number of bytes accepted. No I/O.
    fn put(&self, record: &[u8]) -> StreamResult<usize>;

    /// Persist the current buffer snapshot. Returns the bytes written to
    /// the sink.
    fn flush(&self) -> StreamResult<usize>;
}

impl<D: DeliveryStream + ?Sized> DeliveryStream for Box<D> {
    fn put(&self, record: &[u8]) -> StreamResult<usize> {
        (**self).put(record)
    }

    fn flush(&self) -> StreamResult<usize> {
        (**self).flush()
    }
}

impl<D: DeliveryStream + ?Sized> DeliveryStream for Arc<D> {
    fn put(&self, record: &[u8]) -> StreamResult<usize> {
        (**self).put(record)
    }

    fn flush(&self) -> StreamResult<usize> {
        (**self).flush()
    }
}

/// What happens to flushed bytes after a successful sink write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushRetention {
    /// Keep everything: every flush redelivers the full history.
    #[default]
    KeepAll,
    /// Discard exactly the flushed range once the sink accepts it. Records
    /// appended while the write was in flight stay for the next flush.
    DiscardFlushed,
}

/// Construction-time settings for a [`BufferedStream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Prepended to every artifact name. May contain `/` to place artifacts
    /// in sub-directories (e.g. `topic3/`).
    pub prefix: String,
    pub naming: NamingStrategy,
    pub retention: FlushRetention,
    /// When `true`, flushing an empty buffer writes nothing and returns 0.
    pub skip_empty: bool,
    pub buffer: AccumulatorConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            naming: NamingStrategy::default(),
            retention: FlushRetention::default(),
            skip_empty: false,
            buffer: AccumulatorConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Default config with the given prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }
}

/// Outcome of one successful flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushReceipt {
    /// Name the artifact was written under.
    pub name: ArtifactName,
    /// Bytes written to the sink.
    pub bytes: usize,
    /// Absolute buffer offset of the artifact's first byte.
    pub start_offset: u64,
}

impl FlushReceipt {
    /// Absolute buffer offset one past the artifact's last byte.
    pub fn end_offset(&self) -> u64 {
        self.start_offset + self.bytes as u64
    }
}

/// A delivery stream backed by an [`Accumulator`] and a [`Sink`].
///
/// # Flush protocol
///
/// 1. Snapshot the accumulator (the only step that takes its lock).
/// 2. Generate a fresh artifact name from the prefix.
/// 3. Write the snapshot to the sink. Concurrent `put`s proceed meanwhile
///    and are not part of this artifact.
/// 4. On success with [`FlushRetention::DiscardFlushed`], checkpoint the
///    accumulator through the snapshot's end offset.
///
/// A failed write leaves the accumulator untouched, so calling `flush`
/// again retries the same bytes (plus anything appended since).
pub struct BufferedStream<S> {
    sink: S,
    config: StreamConfig,
    buffer: Accumulator,
    namer: ArtifactNamer,
    counters: StreamCounters,
}

/// A delivery stream that writes artifacts as files under a directory.
pub type FsDeliveryStream = BufferedStream<FsSink>;

impl<S: Sink> BufferedStream<S> {
    /// Create an empty stream over `sink`.
    pub fn new(sink: S, config: StreamConfig) -> StreamResult<Self> {
        Self::with_seed(sink, config, Vec::new())
    }

    /// Create a stream whose buffer starts with `seed`.
    ///
    /// Fails if `config.prefix` cannot form a valid artifact name, or if
    /// the buffer's initial reservation cannot be allocated.
    pub fn with_seed(sink: S, config: StreamConfig, seed: Vec<u8>) -> StreamResult<Self> {
        ArtifactName::new(format!("{}0", config.prefix)).map_err(|e| {
            StreamError::Config(format!("unusable prefix {:?}: {e}", config.prefix))
        })?;

        let buffer = Accumulator::with_seed(seed, config.buffer.clone())?;
        let namer = ArtifactNamer::new(config.naming);
        debug!(sink = %sink.describe(), prefix = %config.prefix, "delivery stream created");
        Ok(Self {
            sink,
            config,
            buffer,
            namer,
            counters: StreamCounters::default(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Bytes currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> StreamStats {
        self.counters.snapshot(self.buffer.len())
    }

    /// Flush and report where the artifact went.
    ///
    /// Returns `Ok(None)` only when `skip_empty` is set and the buffer was
    /// empty at snapshot time.
    pub fn flush_artifact(&self) -> StreamResult<Option<FlushReceipt>> {
        let snapshot = self.buffer.snapshot();
        if snapshot.is_empty() && self.config.skip_empty {
            debug!(prefix = %self.config.prefix, "flush skipped; buffer empty");
            return Ok(None);
        }

        let name = match self.namer.next_name(&self.config.prefix) {
            Ok(name) => name,
            Err(e) => return Err(self.flush_failed(None, snapshot.len(), e)),
        };
        let written = match self.sink.write_artifact(&name, &snapshot.bytes) {
            Ok(written) => written,
            Err(e) => return Err(self.flush_failed(Some(&name), snapshot.len(), e.into())),
        };

        if self.config.retention == FlushRetention::DiscardFlushed {
            self.buffer.checkpoint(snapshot.end());
        }
        self.counters.record_flush(written);

        debug!(
            artifact = %name,
            bytes = written,
            start_offset = snapshot.start,
            "flush complete"
        );
        Ok(Some(FlushReceipt {
            name,
            bytes: written,
            start_offset: snapshot.start,
        }))
    }
}

impl<S> BufferedStream<S> {
    fn flush_failed(
        &self,
        name: Option<&ArtifactName>,
        buffered: usize,
        e: StreamError,
    ) -> StreamError {
        self.counters.record_flush_failure();
        warn!(
            artifact = name.map(ArtifactName::as_str),
            buffered,
            error = %e,
            "flush failed; buffer retained"
        );
        e
    }
}

impl BufferedStream<FsSink> {
    /// Filesystem stream writing `dest_dir/<prefix><unix_nanos>` artifacts.
    pub fn open(dest_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> StreamResult<Self> {
        Self::new(FsSink::new(dest_dir), StreamConfig::with_prefix(prefix))
    }

    /// Filesystem stream with explicit sink and stream settings.
    pub fn open_with(
        dest_dir: impl Into<PathBuf>,
        sink_config: FsSinkConfig,
        config: StreamConfig,
    ) -> StreamResult<Self> {
        Self::new(FsSink::with_config(dest_dir, sink_config), config)
    }
}

impl<S: Sink> DeliveryStream for BufferedStream<S> {
    fn put(&self, record: &[u8]) -> StreamResult<usize> {
        let n = self.buffer.append(record)?;
        self.counters.record_put(n);
        Ok(n)
    }

    fn flush(&self) -> StreamResult<usize> {
        Ok(self.flush_artifact()?.map_or(0, |receipt| receipt.bytes))
    }
}

impl<S: Sink> std::fmt::Debug for BufferedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedStream")
            .field("sink", &self.sink.describe())
            .field("prefix", &self.config.prefix)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
