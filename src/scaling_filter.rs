use crate::common::bytes2hr;
use crate::error::{FilterError, Result};
use crate::filter::{CountingBloomFilter, FilterConfig};
use crate::generation::{BloomGeneration, GenerationSnapshot};
use crate::hash::default_hash_function;
use bincode::{Decode, Encode};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAGIC: [u8; 4] = *b"SBLF";
const FORMAT_VERSION: u32 = 1;

/// Growth factor for each appended generation's capacity.
const CAPACITY_GROWTH: usize = 2;
/// Each appended generation tightens its error rate by this ratio so
/// the cumulative false-positive probability converges to at most
/// twice the configured base rate.
const ERROR_TIGHTENING: f64 = 0.5;

/// Complete on-disk image of a scaling filter.
#[derive(Debug, Clone, Encode, Decode)]
struct FilterSnapshot {
    magic: [u8; 4],
    version: u32,
    capacity: u64,
    error_rate: f64,
    generations: Vec<GenerationSnapshot>,
}

/// Dablooms-style scaling counting Bloom filter.
///
/// Holds an ordered sequence of [`BloomGeneration`]s, newest last.
/// `check` queries every generation, `add` targets the newest one and
/// appends a fresh generation when it fills up. Generations are never
/// merged or removed. The whole structure persists to a single backing
/// file and loads back byte-for-byte.
pub struct ScalingBloomFilter {
    generations: Vec<BloomGeneration>,
    config: FilterConfig,
    path: PathBuf,
}

impl ScalingBloomFilter {
    /// Allocates a new filter with one empty generation and persists it
    /// to `path` immediately, so an unwritable path fails here rather
    /// than at the end of a stream.
    pub fn create(
        config: FilterConfig,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        config.validate()?;
        let generation = BloomGeneration::new(
            config.capacity,
            config.error_rate,
            config.hash_function,
        );
        let filter = Self {
            generations: vec![generation],
            config,
            path: path.into(),
        };
        filter.persist()?;
        info!(
            path = %filter.path.display(),
            capacity = filter.config.capacity,
            error_rate = filter.config.error_rate,
            "created scaling bloom filter"
        );
        Ok(filter)
    }

    /// Reconstructs a filter from an existing file.
    ///
    /// Any structural problem (unreadable layout, bad magic or version,
    /// trailing bytes, parameters inconsistent with the stored counter
    /// vectors) is a [`FilterError::CorruptFile`]; the file is never
    /// silently treated as empty. Filters persisted with a custom hash
    /// function cannot be reopened through this path since only the
    /// default hash function round-trips.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = fs::read(&path)?;

        let (snapshot, consumed): (FilterSnapshot, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| FilterError::CorruptFile {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;

        let corrupt = |reason: String| FilterError::CorruptFile {
            path: path.clone(),
            reason,
        };

        if snapshot.magic != MAGIC {
            return Err(corrupt(format!(
                "bad magic {:02x?}",
                snapshot.magic
            )));
        }
        if snapshot.version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                snapshot.version
            )));
        }
        if consumed != bytes.len() {
            return Err(corrupt(format!(
                "{} trailing bytes after snapshot",
                bytes.len() - consumed
            )));
        }
        if snapshot.generations.is_empty() {
            return Err(corrupt("no generations in snapshot".into()));
        }

        let generations = snapshot
            .generations
            .into_iter()
            .map(|s| {
                BloomGeneration::from_snapshot(s, default_hash_function)
                    .map_err(&corrupt)
            })
            .collect::<Result<Vec<_>>>()?;

        let config = FilterConfig {
            capacity: snapshot.capacity as usize,
            error_rate: snapshot.error_rate,
            hash_function: default_hash_function,
        };
        config.validate().map_err(|e| corrupt(e.to_string()))?;

        let filter = Self {
            generations,
            config,
            path,
        };
        info!(
            path = %filter.path.display(),
            generations = filter.generation_count(),
            items = filter.item_count(),
            size = %bytes2hr(filter.counter_bytes()),
            "loaded scaling bloom filter"
        );
        Ok(filter)
    }

    /// Writes all generations and their parameters back to the backing
    /// file. Written to a sibling temp file first and renamed into
    /// place, so an interrupted persist leaves the previous snapshot
    /// intact rather than a truncated file.
    pub fn persist(&self) -> Result<()> {
        let snapshot = FilterSnapshot {
            magic: MAGIC,
            version: FORMAT_VERSION,
            capacity: self.config.capacity as u64,
            error_rate: self.config.error_rate,
            generations: self
                .generations
                .iter()
                .map(BloomGeneration::snapshot)
                .collect(),
        };
        let bytes =
            bincode::encode_to_vec(&snapshot, bincode::config::standard())
                .map_err(|e| {
                    FilterError::SerializationError(e.to_string())
                })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            path = %self.path.display(),
            generations = self.generation_count(),
            size = %bytes2hr(bytes.len()),
            "persisted scaling bloom filter"
        );
        Ok(())
    }

    fn grow(&mut self) {
        let (capacity, error_rate) = match self.generations.last() {
            Some(newest) => (
                newest.capacity() * CAPACITY_GROWTH,
                newest.error_rate() * ERROR_TIGHTENING,
            ),
            None => (self.config.capacity, self.config.error_rate),
        };
        debug!(
            generation = self.generations.len(),
            capacity, error_rate, "appending filter generation"
        );
        self.generations.push(BloomGeneration::new(
            capacity,
            error_rate,
            self.config.hash_function,
        ));
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn generation_count(&self) -> usize {
        self.generations.len()
    }

    /// Sum of all generations' fill counts.
    pub fn item_count(&self) -> usize {
        self.generations.iter().map(BloomGeneration::fill_count).sum()
    }

    fn counter_bytes(&self) -> usize {
        self.generations.iter().map(BloomGeneration::table_size).sum()
    }
}

impl CountingBloomFilter for ScalingBloomFilter {
    fn add(&mut self, item: &[u8]) -> Result<()> {
        if self.generations.last().is_none_or(BloomGeneration::is_full) {
            self.grow();
        }
        if let Some(newest) = self.generations.last_mut() {
            newest.add(item)?;
        }
        Ok(())
    }

    fn check(&self, item: &[u8]) -> Result<bool> {
        for generation in &self.generations {
            if generation.check(item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Decrements the item in every generation that reports it present.
    /// A false positive in an older generation can absorb one of the
    /// decrements, which is within the accuracy contract of a counting
    /// filter; membership of genuinely added items is never lost.
    fn delete(&mut self, item: &[u8]) -> Result<()> {
        for generation in &mut self.generations {
            if generation.check(item)? {
                generation.delete(item)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ScalingBloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ScalingBloomFilter {{ path: {}, generations: {}, items: {} }}",
            self.path.display(),
            self.generations.len(),
            self.item_count()
        )
    }
}
