use crate::counters::CounterVec;
use crate::error::Result;
use crate::filter::CountingBloomFilter;
use crate::hash::{HashFunction, optimal_counter_vec_size, optimal_num_hashes};
use bincode::{Decode, Encode};

/// One fixed-capacity, fixed-error-rate counting Bloom filter inside a
/// scaling filter.
pub struct BloomGeneration {
    counters: CounterVec,
    capacity: usize,
    error_rate: f64,
    num_hashes: usize,
    fill_count: usize,
    hash_function: HashFunction,
}

/// Serializable image of one generation, as stored in the filter file.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct GenerationSnapshot {
    pub capacity: u64,
    pub error_rate: f64,
    pub num_hashes: u32,
    pub fill_count: u64,
    pub counters: Vec<u8>,
}

impl BloomGeneration {
    pub fn new(
        capacity: usize,
        error_rate: f64,
        hash_function: HashFunction,
    ) -> Self {
        let table_size = optimal_counter_vec_size(capacity, error_rate);
        let num_hashes = optimal_num_hashes(capacity, table_size);

        Self {
            counters: CounterVec::new(table_size),
            capacity,
            error_rate,
            num_hashes,
            fill_count: 0,
            hash_function,
        }
    }

    fn indices(&self, item: &[u8]) -> Vec<u32> {
        (self.hash_function)(item, self.num_hashes, self.counters.len())
    }

    /// Fill count reaching capacity is a soft target: exceeding it only
    /// degrades the realized false-positive rate, never correctness.
    pub fn is_full(&self) -> bool {
        self.fill_count >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn fill_count(&self) -> usize {
        self.fill_count
    }

    pub fn table_size(&self) -> usize {
        self.counters.len()
    }

    pub(crate) fn snapshot(&self) -> GenerationSnapshot {
        GenerationSnapshot {
            capacity: self.capacity as u64,
            error_rate: self.error_rate,
            num_hashes: self.num_hashes as u32,
            fill_count: self.fill_count as u64,
            counters: self.counters.as_bytes().to_vec(),
        }
    }

    /// Rebuilds a generation from its stored image, re-deriving the
    /// sizing parameters and cross-checking them against the snapshot.
    /// Returns the reason on mismatch so the caller can classify the
    /// file as corrupt.
    pub(crate) fn from_snapshot(
        snapshot: GenerationSnapshot,
        hash_function: HashFunction,
    ) -> std::result::Result<Self, String> {
        let capacity = snapshot.capacity as usize;
        let error_rate = snapshot.error_rate;
        if capacity == 0 || error_rate <= 0.0 || error_rate >= 1.0 {
            return Err(format!(
                "invalid generation parameters: capacity={capacity}, error_rate={error_rate}"
            ));
        }

        let table_size = optimal_counter_vec_size(capacity, error_rate);
        let num_hashes = optimal_num_hashes(capacity, table_size);
        if snapshot.num_hashes as usize != num_hashes {
            return Err(format!(
                "hash count mismatch: stored {}, derived {num_hashes}",
                snapshot.num_hashes
            ));
        }
        if snapshot.counters.len() != table_size {
            return Err(format!(
                "counter vector length mismatch: stored {}, derived {table_size}",
                snapshot.counters.len()
            ));
        }

        let counters = CounterVec::from_bytes(table_size, snapshot.counters)
            .map_err(|e| e.to_string())?;

        Ok(Self {
            counters,
            capacity,
            error_rate,
            num_hashes,
            fill_count: snapshot.fill_count as usize,
            hash_function,
        })
    }
}

impl CountingBloomFilter for BloomGeneration {
    fn add(&mut self, item: &[u8]) -> Result<()> {
        for index in self.indices(item) {
            self.counters.increment(index as usize)?;
        }
        self.fill_count += 1;
        Ok(())
    }

    fn check(&self, item: &[u8]) -> Result<bool> {
        for index in self.indices(item) {
            if !self.counters.test(index as usize)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn delete(&mut self, item: &[u8]) -> Result<()> {
        for index in self.indices(item) {
            self.counters.decrement(index as usize)?;
        }
        self.fill_count = self.fill_count.saturating_sub(1);
        Ok(())
    }
}

impl std::fmt::Debug for BloomGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BloomGeneration {{ capacity: {}, error_rate: {}, num_hashes: {}, table_size: {}, fill_count: {} }}",
            self.capacity,
            self.error_rate,
            self.num_hashes,
            self.counters.len(),
            self.fill_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::default_hash_function;

    fn generation(capacity: usize, error_rate: f64) -> BloomGeneration {
        BloomGeneration::new(capacity, error_rate, default_hash_function)
    }

    #[test]
    fn test_add_then_check() {
        let mut generation = generation(1000, 0.01);
        generation.add(b"some data").unwrap();
        generation.add(b"another data").unwrap();
        assert!(generation.check(b"some data").unwrap());
        assert!(generation.check(b"another data").unwrap());
        assert!(!generation.check(b"some").unwrap());
        assert_eq!(generation.fill_count(), 2);
    }

    #[test]
    fn test_delete_removes_membership() {
        let mut generation = generation(1000, 0.01);
        generation.add(b"block-a").unwrap();
        assert!(generation.check(b"block-a").unwrap());
        generation.delete(b"block-a").unwrap();
        assert!(!generation.check(b"block-a").unwrap());
        assert_eq!(generation.fill_count(), 0);
    }

    #[test]
    fn test_delete_keeps_remaining_count() {
        let mut generation = generation(1000, 0.01);
        // Added twice, deleted once: still present.
        generation.add(b"dup").unwrap();
        generation.add(b"dup").unwrap();
        generation.delete(b"dup").unwrap();
        assert!(generation.check(b"dup").unwrap());
        generation.delete(b"dup").unwrap();
        assert!(!generation.check(b"dup").unwrap());
    }

    #[test]
    fn test_is_full() {
        let mut generation = generation(3, 0.1);
        assert!(!generation.is_full());
        for i in 0..3u8 {
            generation.add(&[i]).unwrap();
        }
        assert!(generation.is_full());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut generation = generation(100, 0.05);
        generation.add(b"persisted").unwrap();
        let snapshot = generation.snapshot();
        let restored =
            BloomGeneration::from_snapshot(snapshot, default_hash_function)
                .unwrap();
        assert!(restored.check(b"persisted").unwrap());
        assert_eq!(restored.fill_count(), 1);
        assert_eq!(restored.table_size(), generation.table_size());
    }

    #[test]
    fn test_snapshot_rejects_tampered_layout() {
        let generation = generation(100, 0.05);
        let mut snapshot = generation.snapshot();
        snapshot.counters.truncate(10);
        assert!(
            BloomGeneration::from_snapshot(snapshot, default_hash_function)
                .is_err()
        );
    }
}
