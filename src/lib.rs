//! Scaling counting Bloom filter with file persistence, plus a
//! fixed-size-block stream deduplicator built on top of it.
//!
//! HowTo:
//!    * Generations: the filter is an ordered sequence of counting
//!      Bloom filters BF_1, BF_2, ..., BF_N, newest last.
//!    * Growth: when the newest generation's fill count reaches its
//!      capacity, a fresh generation is appended with twice the
//!      capacity and half the error rate, so the cumulative
//!      false-positive probability stays bounded. No rebuild, no
//!      rehashing of prior generations.
//!
//! Insertion:
//!     * Hash the item with double hashing (Murmur3 + FNV) and
//!       increment the k derived counters of the newest generation.
//! Query:
//!     * Check every generation; the item is present if any generation
//!       has all k counters nonzero. No false negatives for items
//!       genuinely added.
//! Deletion:
//!     * Counters (not plain bits) make delete possible: decrement the
//!       k counters in each generation reporting the item present.
//!       Callers check before deleting.
//! Persistence:
//!     * The whole structure round-trips through a single backing file;
//!       loading a corrupt or truncated file is an error, never an
//!       empty filter.
//!
//! Obvious problems:
//!     * Counters saturate at 255; heavily repeated items pin their
//!       counters and can no longer be fully deleted.
//!     * Delete on a multi-generation filter may decrement a false
//!       positive in an older generation; accuracy degrades, membership
//!       of genuinely added items does not.

pub mod common;
mod counters;
mod dedup;
mod error;
mod filter;
mod generation;
mod hash;
mod scaling_filter;

pub use counters::CounterVec;
pub use dedup::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY, DEFAULT_ERROR_RATE, DedupStats,
    Deduplicator, EphemeralFilter, OffsetLog, OutputSink, RunMode,
};
pub use error::{FilterError, Result};
pub use filter::{
    CountingBloomFilter, FilterConfig, FilterConfigBuilder,
    FilterConfigBuilderError,
};
pub use generation::BloomGeneration;
pub use hash::{
    HashFunction, default_hash_function, optimal_counter_vec_size,
    optimal_num_hashes,
};
pub use scaling_filter::ScalingBloomFilter;
