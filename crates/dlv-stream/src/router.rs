use std::sync::atomic::{AtomicUsize, Ordering};

use dlv_sink::FsSink;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DeliveryConfig;
use crate::error::{StreamError, StreamResult};
use crate::stream::{BufferedStream, DeliveryStream, FsDeliveryStream};

/// Selects the stream a record goes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioner {
    /// Uniformly random partition per record; keys are ignored.
    #[default]
    Random,
    /// BLAKE3 hash of the record key, stable across runs. A key is required.
    KeyHash,
    /// Cycle through partitions in order; keys are ignored.
    RoundRobin,
}

/// Map `key` onto one of `partitions` buckets.
///
/// Uses the first 8 bytes of the key's BLAKE3 digest, so the mapping is
/// stable across processes and platforms.
///
/// # Panics
///
/// Panics if `partitions` is zero. [`StreamSet`] never passes zero, since
/// construction rejects empty sets.
pub fn partition_for_key(key: &[u8], partitions: usize) -> usize {
    let digest = blake3::hash(key);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(head) % partitions as u64) as usize
}

/// N independent delivery streams behind a partition function.
///
/// The set holds no lock of its own: routing reads only immutable state
/// (plus an atomic cursor for round robin), so producers on different
/// partitions never contend.
pub struct StreamSet<D> {
    streams: Vec<D>,
    partitioner: Partitioner,
    cursor: AtomicUsize,
}

impl<D: DeliveryStream> StreamSet<D> {
    /// Build a set from already-created streams.
    pub fn new(streams: Vec<D>, partitioner: Partitioner) -> StreamResult<Self> {
        if streams.is_empty() {
            return Err(StreamError::EmptyStreamSet);
        }
        Ok(Self {
            streams,
            partitioner,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Always `false`: construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    pub fn streams(&self) -> &[D] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&D> {
        self.streams.get(index)
    }

    /// Pick the partition for a record with optional `key`.
    pub fn route(&self, key: Option<&[u8]>) -> StreamResult<usize> {
        let n = self.streams.len();
        match self.partitioner {
            Partitioner::Random => Ok(rand::thread_rng().gen_range(0..n)),
            Partitioner::KeyHash => key
                .map(|k| partition_for_key(k, n))
                .ok_or(StreamError::MissingPartitionKey),
            Partitioner::RoundRobin => Ok(self.cursor.fetch_add(1, Ordering::Relaxed) % n),
        }
    }

    /// Route and append one record. Returns `(partition, bytes_accepted)`.
    pub fn put(&self, key: Option<&[u8]>, record: &[u8]) -> StreamResult<(usize, usize)> {
        let index = self.route(key)?;
        let n = self.streams[index].put(record)?;
        Ok((index, n))
    }

    /// Append one record to an explicit partition.
    pub fn put_to(&self, index: usize, record: &[u8]) -> StreamResult<usize> {
        let stream = self
            .streams
            .get(index)
            .ok_or(StreamError::PartitionOutOfRange {
                index,
                len: self.streams.len(),
            })?;
        stream.put(record)
    }

    /// Flush every stream independently, in partition order.
    ///
    /// One partition's failure does not stop the others; the result for
    /// partition `i` is at index `i`.
    pub fn flush_all(&self) -> Vec<StreamResult<usize>> {
        self.streams
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let result = s.flush();
                if let Err(ref e) = result {
                    warn!(partition = i, error = %e, "partition flush failed");
                }
                result
            })
            .collect()
    }
}

impl StreamSet<FsDeliveryStream> {
    /// Build `config.partitions` filesystem streams under `config.dest_dir`,
    /// one prefix per partition from `config.prefix_template`.
    pub fn filesystem(config: &DeliveryConfig) -> StreamResult<Self> {
        config.validate()?;
        let streams = (0..config.partitions)
            .map(|i| {
                BufferedStream::new(
                    FsSink::with_config(&config.dest_dir, config.sink_config()),
                    config.stream_config(i),
                )
            })
            .collect::<StreamResult<Vec<_>>>()?;

        debug!(
            dest = %config.dest_dir.display(),
            partitions = streams.len(),
            partitioner = ?config.partitioner,
            "stream set created"
        );
        Self::new(streams, config.partitioner)
    }
}

impl<D> std::fmt::Debug for StreamSet<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSet")
            .field("partitions", &self.streams.len())
            .field("partitioner", &self.partitioner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;

    use dlv_sink::InMemorySink;
    use proptest::prelude::*;

    use crate::stream::{FlushRetention, StreamConfig};

    fn memory_set(n: usize, partitioner: Partitioner) -> StreamSet<BufferedStream<InMemorySink>> {
        let streams = (0..n)
            .map(|i| {
                BufferedStream::new(
                    InMemorySink::new(),
                    StreamConfig::with_prefix(format!("topic{i}/")),
                )
                .unwrap()
            })
            .collect();
        StreamSet::new(streams, partitioner).unwrap()
    }

    #[test]
    fn empty_set_is_rejected() {
        let streams: Vec<BufferedStream<InMemorySink>> = Vec::new();
        assert!(matches!(
            StreamSet::new(streams, Partitioner::Random),
            Err(StreamError::EmptyStreamSet)
        ));
    }

    #[test]
    fn round_robin_cycles() {
        let set = memory_set(3, Partitioner::RoundRobin);
        let picks: Vec<usize> = (0..7).map(|_| set.route(None).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn key_hash_is_stable_and_requires_key() {
        let set = memory_set(8, Partitioner::KeyHash);
        let a = set.route(Some(b"user-123")).unwrap();
        for _ in 0..10 {
            assert_eq!(set.route(Some(b"user-123")).unwrap(), a);
        }
        assert_eq!(a, partition_for_key(b"user-123", 8));
        assert!(matches!(set.route(None), Err(StreamError::MissingPartitionKey)));
    }

    #[test]
    fn key_hash_spreads_keys() {
        let mut seen = [false; 4];
        for i in 0..200 {
            seen[partition_for_key(format!("key-{i}").as_bytes(), 4)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    #[should_panic]
    fn partition_for_key_panics_on_zero_partitions() {
        partition_for_key(b"k", 0);
    }

    #[test]
    fn random_routing_stays_in_range() {
        let set = memory_set(5, Partitioner::Random);
        for _ in 0..500 {
            assert!(set.route(None).unwrap() < 5);
        }
    }

    #[test]
    fn put_to_checks_range() {
        let set = memory_set(2, Partitioner::Random);
        assert_eq!(set.put_to(1, b"abc").unwrap(), 3);
        assert!(matches!(
            set.put_to(2, b"abc"),
            Err(StreamError::PartitionOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(set.stream(1).unwrap().buffered_len(), 3);
        assert_eq!(set.stream(0).unwrap().buffered_len(), 0);
    }

    #[test]
    fn concurrent_fan_out_preserves_every_record() {
        const RECORDS: usize = 10_000;
        let set = memory_set(10, Partitioner::Random);

        thread::scope(|s| {
            for t in 0..8 {
                let set = &set;
                s.spawn(move || {
                    for i in (t..RECORDS).step_by(8) {
                        let record = format!("{i:08}\n");
                        set.put(None, record.as_bytes()).unwrap();
                    }
                });
            }
        });

        let results = set.flush_all();
        assert_eq!(results.len(), 10);
        let total: usize = results.into_iter().map(|r| r.unwrap()).sum();
        assert_eq!(total, RECORDS * 9);

        let mut ids: Vec<usize> = set
            .streams()
            .iter()
            .flat_map(|s| s.sink().artifacts())
            .flat_map(|(_, bytes)| {
                String::from_utf8(bytes.to_vec())
                    .unwrap()
                    .lines()
                    .map(|l| l.parse::<usize>().unwrap())
                    .collect::<Vec<_>>()
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..RECORDS).collect::<Vec<_>>());
    }

    #[test]
    fn key_routing_keeps_partition_order() {
        let set = memory_set(4, Partitioner::KeyHash);
        for i in 0..100u32 {
            let key = format!("k{}", i % 7);
            let record = format!("{key}:{i:03};");
            set.put(Some(key.as_bytes()), record.as_bytes()).unwrap();
        }
        set.flush_all();

        for stream in set.streams() {
            for (_, bytes) in stream.sink().artifacts() {
                let text = String::from_utf8(bytes.to_vec()).unwrap();
                let mut last: std::collections::HashMap<&str, u32> = Default::default();
                for rec in text.split_terminator(';') {
                    let (key, seq) = rec.split_once(':').unwrap();
                    let seq: u32 = seq.parse().unwrap();
                    if let Some(prev) = last.insert(key, seq) {
                        assert!(seq > prev);
                    }
                    assert_eq!(
                        partition_for_key(key.as_bytes(), 4),
                        set.route(Some(key.as_bytes())).unwrap()
                    );
                }
            }
        }
    }

    #[test]
    fn flush_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"").unwrap();

        let streams = vec![
            FsDeliveryStream::open(dir.path().join("ok"), "a/").unwrap(),
            FsDeliveryStream::open(&blocked, "b/").unwrap(),
        ];
        let set = StreamSet::new(streams, Partitioner::RoundRobin).unwrap();
        set.put(None, b"first").unwrap();
        set.put(None, b"second").unwrap();

        let results = set.flush_all();
        assert_eq!(*results[0].as_ref().unwrap(), 5);
        assert!(results[1].is_err());
        assert_eq!(set.stream(1).unwrap().buffered_len(), 6);
    }

    #[test]
    fn filesystem_set_uses_partition_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeliveryConfig {
            dest_dir: dir.path().join("dest"),
            partitions: 3,
            partitioner: Partitioner::RoundRobin,
            retention: FlushRetention::DiscardFlushed,
            ..DeliveryConfig::default()
        };
        let set = StreamSet::filesystem(&config).unwrap();
        for i in 0..6 {
            set.put(None, format!("r{i}").as_bytes()).unwrap();
        }
        for r in set.flush_all() {
            assert_eq!(r.unwrap(), 4);
        }

        for i in 0..3 {
            let topic = dir.path().join("dest").join(format!("topic{i}"));
            let entries: Vec<_> = fs::read_dir(&topic).unwrap().collect();
            assert_eq!(entries.len(), 1);
            assert_eq!(set.stream(i).unwrap().buffered_len(), 0);
        }
    }

    proptest! {
        #[test]
        fn partition_for_key_in_range(
            key in prop::collection::vec(any::<u8>(), 0..64),
            n in 1usize..64,
        ) {
            let p = partition_for_key(&key, n);
            prop_assert!(p < n);
            prop_assert_eq!(p, partition_for_key(&key, n));
        }
    }
}
