use std::fmt;
use std::io;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::debug;

use crate::error::{BufferError, BufferResult};

/// Capacity reserved up front when no other hint is given (1 MiB).
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024 * 1024;

/// Largest up-front reservation a config may ask for (1 GiB).
pub const MAX_INITIAL_CAPACITY: usize = 1024 * 1024 * 1024;

/// Construction-time settings for an [`Accumulator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccumulatorConfig {
    /// Bytes reserved before the first append. Growth past this point uses
    /// the standard amortized doubling of `Vec`.
    pub initial_capacity: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl AccumulatorConfig {
    /// Config with an explicit initial capacity.
    pub fn with_initial_capacity(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }
}

/// Point-in-time copy of an accumulator's content.
///
/// `start` is the absolute offset of the first byte; `start..end()` is the
/// range a later [`Accumulator::checkpoint`] can discard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferSnapshot {
    /// Absolute offset of `bytes[0]`.
    pub start: u64,
    /// The copied content.
    pub bytes: Bytes,
}

impl BufferSnapshot {
    /// Absolute offset one past the last byte of the snapshot.
    pub fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lock-protected state.
struct BufferState {
    content: Vec<u8>,
    /// Absolute offset of `content[0]` (total bytes checkpointed away).
    base: u64,
}

/// Thread-safe growable byte buffer.
///
/// A single [`Mutex`] totally orders appends, snapshots and checkpoints.
/// There is no reader/writer split: a snapshot competes for the same lock as
/// an append, and copies the content out before releasing it.
pub struct Accumulator {
    state: Mutex<BufferState>,
}

impl Accumulator {
    /// Create an empty accumulator with the default 1 MiB reservation.
    pub fn new() -> Self {
        Self::from_content(Vec::with_capacity(DEFAULT_INITIAL_CAPACITY))
    }

    /// Create an empty accumulator with the given config.
    pub fn with_config(config: AccumulatorConfig) -> BufferResult<Self> {
        Self::with_seed(Vec::new(), config)
    }

    /// Create an accumulator whose content starts with `seed`.
    ///
    /// `config.initial_capacity` is reserved on top of the seed. A
    /// reservation the allocator cannot satisfy is reported as
    /// [`BufferError::ResourceExhausted`].
    pub fn with_seed(seed: Vec<u8>, config: AccumulatorConfig) -> BufferResult<Self> {
        let mut content = seed;
        let len = content.len();
        content
            .try_reserve(config.initial_capacity)
            .map_err(|source| BufferError::ResourceExhausted {
                requested: config.initial_capacity,
                len,
                source,
            })?;
        Ok(Self::from_content(content))
    }

    fn from_content(content: Vec<u8>) -> Self {
        debug!(
            seeded = content.len(),
            capacity = content.capacity(),
            "accumulator created"
        );
        Self {
            state: Mutex::new(BufferState { content, base: 0 }),
        }
    }

    /// Append `data` to the end of the buffer. Returns the number of bytes
    /// appended, which is always `data.len()` on success.
    ///
    /// The bytes land contiguously: no other append can interleave with them.
    pub fn append(&self, data: &[u8]) -> BufferResult<usize> {
        let mut state = self.lock();
        let len = state.content.len();
        state
            .content
            .try_reserve(data.len())
            .map_err(|source| BufferError::ResourceExhausted {
                requested: data.len(),
                len,
                source,
            })?;
        state.content.extend_from_slice(data);
        Ok(data.len())
    }

    /// Copy out the current content.
    ///
    /// The snapshot includes every append that acquired the lock before it
    /// and none that acquired it after.
    pub fn snapshot(&self) -> BufferSnapshot {
        let state = self.lock();
        BufferSnapshot {
            start: state.base,
            bytes: Bytes::copy_from_slice(&state.content),
        }
    }

    /// Discard content up to absolute offset `through`. Returns the number
    /// of bytes discarded.
    ///
    /// Offsets at or below the current base are a no-op, and offsets past
    /// the end are clamped, so checkpointing with a snapshot's `end()` never
    /// drops bytes appended after that snapshot.
    pub fn checkpoint(&self, through: u64) -> usize {
        let mut state = self.lock();
        if through <= state.base {
            return 0;
        }
        let end = state.base + state.content.len() as u64;
        let through = through.min(end);
        let discard = (through - state.base) as usize;
        state.content.drain(..discard);
        state.base = through;

        debug!(
            through,
            discarded = discard,
            remaining = state.content.len(),
            "accumulator checkpoint"
        );
        discard
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.lock().content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().content.is_empty()
    }

    /// Bytes the buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.lock().content.capacity()
    }

    /// Absolute offset of the first held byte.
    pub fn base_offset(&self) -> u64 {
        self.lock().base
    }

    /// Absolute offset one past the last held byte.
    pub fn end_offset(&self) -> u64 {
        let state = self.lock();
        state.base + state.content.len() as u64
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().expect("accumulator mutex poisoned")
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer adapter so encoders can target a shared accumulator directly.
impl io::Write for &Accumulator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Accumulator")
            .field("len", &state.content.len())
            .field("capacity", &state.content.capacity())
            .field("base", &state.base)
            .finish()
    }
}
