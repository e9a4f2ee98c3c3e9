use std::path::PathBuf;
use tempfile::TempDir;

/// Temp directory holding filter files for one test, removed on drop.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Path for a file inside the test directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Builds a fixed-size block filled with one repeating byte, the same
/// shape of input the dedup driver consumes.
#[allow(dead_code)]
pub fn block(fill: u8, size: usize) -> Vec<u8> {
    vec![fill; size]
}

/// Concatenates blocks into one input stream.
#[allow(dead_code)]
pub fn stream_of(blocks: &[&[u8]]) -> Vec<u8> {
    blocks.concat()
}
