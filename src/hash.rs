use fnv::FnvHasher;
use murmur3::murmur3_32;
use std::hash::Hasher;
use std::io::Cursor;

/// A type alias for the hash function used in the Bloom filter.
///
/// Takes an input item and computes multiple counter-vector indices
/// via double hashing.
///
/// **Parameters:**
///
/// - `item: &[u8]`
///   - A byte slice representing the item to be hashed.
/// - `num_hashes: usize`
///   - The number of hash values to compute for the item.
/// - `table_size: usize`
///   - The length of the counter vector. This ensures that the
///     generated indices are within valid bounds.
///
/// **Returns:**
///
/// - `Vec<u32>`
///   - A vector of indices corresponding to positions in the counter
///     vector, each in the range `[0, table_size)`.
///
/// The same item with the same parameters always yields the same
/// indices. Check and delete rely on that symmetry with prior adds.
pub type HashFunction = fn(&[u8], usize, usize) -> Vec<u32>;

pub(crate) fn hash_murmur32(key: &[u8]) -> u32 {
    let mut cursor = Cursor::new(key);
    murmur3_32(&mut cursor, 0).expect("Failed to compute Murmur3 hash")
}

pub(crate) fn hash_fnv32(key: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(key);
    hasher.finish() as u32
}

/// Double hashing: `h_i = h1 + i * h2 mod table_size`, with Murmur3 and
/// FNV as the two base hashes.
pub fn default_hash_function(
    item: &[u8],
    num_hashes: usize,
    table_size: usize,
) -> Vec<u32> {
    let h1 = hash_murmur32(item);
    let h2 = hash_fnv32(item);
    (0..num_hashes)
        .map(|i| {
            h1.wrapping_add((i as u32).wrapping_mul(h2)) % table_size as u32
        })
        .collect()
}

pub fn optimal_counter_vec_size(n: usize, fpr: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as usize
}

pub fn optimal_num_hashes(n: usize, m: usize) -> usize {
    (((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize).max(1)
}
