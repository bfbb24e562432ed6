//! Durable destinations for flushed delivery-stream artifacts.
//!
//! A sink receives whole artifacts: a validated relative [`ArtifactName`]
//! and the bytes to store under it. The sink owns directory materialization,
//! so a name like `topic3/1700000000000000000` works even when `topic3/`
//! does not exist yet.
//!
//! # Backends
//!
//! All backends implement the [`Sink`] trait:
//!
//! - [`FsSink`] -- files under a root directory
//! - [`InMemorySink`] -- `BTreeMap`-based sink for tests and embedding

pub mod error;
pub mod fs;
pub mod memory;
pub mod name;
pub mod traits;

pub use error::{SinkError, SinkResult};
pub use fs::{CollisionPolicy, FsSink, FsSinkConfig, SyncMode};
pub use memory::InMemorySink;
pub use name::ArtifactName;
pub use traits::Sink;
