//! Concurrent byte accumulator for the dlv delivery pipeline.
//!
//! An [`Accumulator`] collects opaque records appended by any number of
//! producer threads and hands out point-in-time [`BufferSnapshot`]s to a
//! flushing thread. Every read and every mutation goes through a single
//! exclusive lock, so an append's bytes are never interleaved with another
//! append's bytes and a snapshot observes exactly the appends that acquired
//! the lock before it.
//!
//! # Offsets
//!
//! The accumulator keeps a running absolute offset. Bytes discarded by
//! [`Accumulator::checkpoint`] advance the base offset, so a snapshot's
//! `start..end` range stays meaningful across checkpoints and a stale
//! checkpoint (from a flush that raced another) is a no-op.
//!
//! # Design Rules
//!
//! 1. `content` is touched only while the lock is held.
//! 2. Content only grows between checkpoints, in lock-acquisition order.
//! 3. The initial reservation and all later growth are fallible and reported,
//!    never aborted.
//! 4. No I/O ever happens under the lock.

pub mod accumulator;
pub mod error;

pub use accumulator::{
    Accumulator, AccumulatorConfig, BufferSnapshot, DEFAULT_INITIAL_CAPACITY, MAX_INITIAL_CAPACITY,
};
pub use error::{BufferError, BufferResult};
