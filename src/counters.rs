use crate::error::{FilterError, Result};

/// Fixed-length vector of 8-bit counters backing one filter generation.
///
/// Counters saturate at `u8::MAX` instead of wrapping. A saturated
/// counter is never decremented again since its true count is unknown;
/// it stays pinned so delete can never drive a shared counter to zero
/// prematurely.
pub struct CounterVec {
    counters: Vec<u8>,
}

impl CounterVec {
    pub fn new(len: usize) -> Self {
        Self {
            counters: vec![0; len],
        }
    }

    /// Restores a vector from a byte snapshot. The snapshot length must
    /// match the expected table size exactly.
    pub fn from_bytes(len: usize, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != len {
            return Err(FilterError::SerializationError(format!(
                "counter snapshot length mismatch: expected {len}, got {}",
                bytes.len()
            )));
        }
        Ok(Self { counters: bytes })
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.counters
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.counters.len() {
            return Err(FilterError::IndexOutOfBounds {
                index,
                capacity: self.counters.len(),
            });
        }
        Ok(())
    }

    pub fn test(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.counters[index] > 0)
    }

    /// Increments the counter at `index`, clamping at `u8::MAX`.
    /// Returns the new count.
    pub fn increment(&mut self, index: usize) -> Result<u8> {
        self.check_index(index)?;
        let counter = &mut self.counters[index];
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }

    /// Decrements the counter at `index`. Zero and saturated counters
    /// are left untouched. Returns the new count.
    pub fn decrement(&mut self, index: usize) -> Result<u8> {
        self.check_index(index)?;
        let counter = &mut self.counters[index];
        if *counter > 0 && *counter < u8::MAX {
            *counter -= 1;
        }
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_decrement() {
        let mut counters = CounterVec::new(16);
        assert!(!counters.test(3).unwrap());
        assert_eq!(counters.increment(3).unwrap(), 1);
        assert_eq!(counters.increment(3).unwrap(), 2);
        assert!(counters.test(3).unwrap());
        assert_eq!(counters.decrement(3).unwrap(), 1);
        assert_eq!(counters.decrement(3).unwrap(), 0);
        assert!(!counters.test(3).unwrap());
    }

    #[test]
    fn test_decrement_at_zero_is_noop() {
        let mut counters = CounterVec::new(4);
        assert_eq!(counters.decrement(0).unwrap(), 0);
    }

    #[test]
    fn test_saturation_clamps() {
        let mut counters = CounterVec::new(4);
        for _ in 0..300 {
            counters.increment(1).unwrap();
        }
        assert_eq!(counters.increment(1).unwrap(), u8::MAX);
        // Saturated counters are pinned, not decremented.
        assert_eq!(counters.decrement(1).unwrap(), u8::MAX);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut counters = CounterVec::new(8);
        assert!(matches!(
            counters.increment(8),
            Err(FilterError::IndexOutOfBounds { index: 8, capacity: 8 })
        ));
        assert!(counters.test(100).is_err());
    }

    #[test]
    fn test_byte_round_trip() {
        let mut counters = CounterVec::new(8);
        counters.increment(0).unwrap();
        counters.increment(5).unwrap();
        counters.increment(5).unwrap();
        let bytes = counters.as_bytes().to_vec();
        let restored = CounterVec::from_bytes(8, bytes).unwrap();
        assert_eq!(restored.as_bytes(), counters.as_bytes());
    }

    #[test]
    fn test_from_bytes_length_mismatch() {
        assert!(CounterVec::from_bytes(8, vec![0; 7]).is_err());
    }
}
