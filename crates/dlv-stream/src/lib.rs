//! Delivery streams for the dlv pipeline.
//!
//! A [`BufferedStream`] pairs one [`Accumulator`](dlv_buffer::Accumulator)
//! with a [`Sink`](dlv_sink::Sink) binding. `put` appends to the buffer and
//! never performs I/O; `flush` snapshots the buffer, releases the lock, and
//! writes the snapshot to the sink under a freshly generated name.
//!
//! A [`StreamSet`] fans records out over N independent streams by a
//! [`Partitioner`]. Streams share no state, so routing takes no lock and
//! contention stays inside a single partition.
//!
//! There is no internal timer: flushing is always caller-driven.

pub mod config;
pub mod error;
pub mod naming;
pub mod router;
pub mod stats;
pub mod stream;

pub use config::DeliveryConfig;
pub use error::{StreamError, StreamResult};
pub use naming::{ArtifactNamer, NamingStrategy};
pub use router::{partition_for_key, Partitioner, StreamSet};
pub use stats::StreamStats;
pub use stream::{
    BufferedStream, DeliveryStream, FlushReceipt, FlushRetention, FsDeliveryStream, StreamConfig,
};
