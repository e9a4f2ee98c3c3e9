use crate::error::{FilterError, Result};
use crate::hash::{HashFunction, default_hash_function};
use derive_builder::Builder;

/// Configuration shared by all filter generations.
#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct FilterConfig {
    /// Maximum number of elements the first generation can hold before
    /// a new one is appended
    #[builder(default = "1_000_000")]
    pub capacity: usize,

    /// Desired false positive rate (between 0 and 1)
    #[builder(default = "0.001")]
    pub error_rate: f64,

    /// Hash function used for all filter operations
    #[builder(default = "default_hash_function")]
    pub hash_function: HashFunction,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(FilterError::InvalidConfig(
                "Capacity must be > 0".into(),
            ));
        }
        if self.error_rate <= 0.0 || self.error_rate >= 1.0 {
            return Err(FilterError::InvalidConfig(
                "Error rate must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

pub trait CountingBloomFilter {
    /// Records an item. Never fails under normal operation; counters
    /// clamp at their maximum rather than wrapping.
    fn add(&mut self, item: &[u8]) -> Result<()>;

    /// Returns true if the item may be present. False positives are
    /// bounded by the configured error rate, false negatives never
    /// occur for items genuinely added.
    fn check(&self, item: &[u8]) -> Result<bool>;

    /// Removes one occurrence of an item. Callers must `check` first;
    /// deleting an item that was never added corrupts accuracy.
    fn delete(&mut self, item: &[u8]) -> Result<()>;
}
