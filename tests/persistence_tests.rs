mod common;

use common::test_utils::TestDir;
use scalable_bloom_rs::{
    CountingBloomFilter, FilterConfigBuilder, FilterError, ScalingBloomFilter,
};
use std::fs;

fn new_filter(dir: &TestDir, name: &str, capacity: usize) -> ScalingBloomFilter {
    let config = FilterConfigBuilder::default()
        .capacity(capacity)
        .error_rate(0.01)
        .build()
        .expect("Failed to build test config");
    ScalingBloomFilter::create(config, dir.file(name))
        .expect("Failed to create test filter")
}

#[test]
fn test_persist_load_round_trip() {
    let dir = TestDir::new();
    let mut filter = new_filter(&dir, "roundtrip.bin", 1000);

    let items: Vec<Vec<u8>> = (0..200)
        .map(|i| format!("record_{:04}", i).into_bytes())
        .collect();
    for item in &items {
        filter.add(item).unwrap();
    }
    filter.persist().unwrap();

    let loaded = ScalingBloomFilter::load(dir.file("roundtrip.bin")).unwrap();
    assert_eq!(loaded.generation_count(), filter.generation_count());
    assert_eq!(loaded.item_count(), filter.item_count());
    for item in &items {
        assert!(
            loaded.check(item).unwrap(),
            "check must match after reload for {:?}",
            String::from_utf8_lossy(item)
        );
    }
}

#[test]
fn test_round_trip_preserves_generations() {
    let dir = TestDir::new();
    let mut filter = new_filter(&dir, "grown.bin", 50);

    let items: Vec<Vec<u8>> = (0..130)
        .map(|i| format!("grow_{:04}", i).into_bytes())
        .collect();
    for item in &items {
        filter.add(item).unwrap();
    }
    assert!(filter.generation_count() > 1);
    filter.persist().unwrap();

    let loaded = ScalingBloomFilter::load(dir.file("grown.bin")).unwrap();
    assert_eq!(loaded.generation_count(), filter.generation_count());
    for item in &items {
        assert!(loaded.check(item).unwrap());
    }
}

#[test]
fn test_load_after_delete_matches() {
    let dir = TestDir::new();
    let mut filter = new_filter(&dir, "deleted.bin", 1000);

    filter.add(b"keep").unwrap();
    filter.add(b"drop").unwrap();
    filter.delete(b"drop").unwrap();
    filter.persist().unwrap();

    let loaded = ScalingBloomFilter::load(dir.file("deleted.bin")).unwrap();
    assert!(loaded.check(b"keep").unwrap());
    assert!(!loaded.check(b"drop").unwrap());
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = TestDir::new();
    let result = ScalingBloomFilter::load(dir.file("nope.bin"));
    assert!(matches!(result, Err(FilterError::Io(_))));
}

#[test]
fn test_load_truncated_file_is_corrupt() {
    let dir = TestDir::new();
    let mut filter = new_filter(&dir, "trunc.bin", 1000);
    filter.add(b"something").unwrap();
    filter.persist().unwrap();

    let path = dir.file("trunc.bin");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let result = ScalingBloomFilter::load(&path);
    assert!(matches!(result, Err(FilterError::CorruptFile { .. })));
}

#[test]
fn test_load_bad_magic_is_corrupt() {
    let dir = TestDir::new();
    let _filter = new_filter(&dir, "magic.bin", 1000);

    let path = dir.file("magic.bin");
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let result = ScalingBloomFilter::load(&path);
    assert!(matches!(result, Err(FilterError::CorruptFile { .. })));
}

#[test]
fn test_load_garbage_is_corrupt_not_empty() {
    let dir = TestDir::new();
    let path = dir.file("garbage.bin");
    fs::write(&path, b"this is not a filter file at all").unwrap();

    // A broken file must never be silently treated as an empty filter.
    let result = ScalingBloomFilter::load(&path);
    assert!(matches!(result, Err(FilterError::CorruptFile { .. })));
}

#[test]
fn test_load_trailing_bytes_is_corrupt() {
    let dir = TestDir::new();
    let _filter = new_filter(&dir, "trailing.bin", 1000);

    let path = dir.file("trailing.bin");
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(b"junk");
    fs::write(&path, &bytes).unwrap();

    let result = ScalingBloomFilter::load(&path);
    assert!(matches!(result, Err(FilterError::CorruptFile { .. })));
}

#[test]
fn test_create_writes_loadable_empty_filter() {
    let dir = TestDir::new();
    let _filter = new_filter(&dir, "fresh.bin", 1000);

    // create() persists immediately; the file is loadable before any add.
    let loaded = ScalingBloomFilter::load(dir.file("fresh.bin")).unwrap();
    assert_eq!(loaded.generation_count(), 1);
    assert_eq!(loaded.item_count(), 0);
    assert!(!loaded.check(b"anything").unwrap());
}
