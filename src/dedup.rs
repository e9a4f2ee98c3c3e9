use crate::error::Result;
use crate::filter::{CountingBloomFilter, FilterConfig};
use crate::scaling_filter::ScalingBloomFilter;
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, warn};

/// Blocks are position-delimited, not content-delimited: two logical
/// records may span a read boundary. That is the accepted contract of
/// the block stream, not a defect to repair here.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;
pub const DEFAULT_CAPACITY: usize = 1_000_000;
pub const DEFAULT_ERROR_RATE: f64 = 0.001;

/// How a run uses the filters, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Default: suppress duplicates within this run using an ephemeral
    /// filter, consulting an optional named filter read-only.
    Filter,
    /// Check and add against the named persistent filter.
    FilterWithAdd,
    /// Remove present blocks from the named filter; no output.
    Delete,
}

/// Counts reported by a completed run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DedupStats {
    pub blocks_read: u64,
    pub blocks_written: u64,
    pub blocks_deleted: u64,
}

/// Scaling filter allocated in a uniquely-named temp directory.
///
/// The directory is removed when the value drops, on every exit path
/// including unwinding, so interrupted runs never leave temp filters
/// behind.
pub struct EphemeralFilter {
    filter: ScalingBloomFilter,
    _dir: TempDir,
}

impl EphemeralFilter {
    pub fn new(config: FilterConfig) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("blfdedup-").tempdir()?;
        let path = dir.path().join("bloom_tmp.bin");
        let filter = ScalingBloomFilter::create(config, &path)?;
        info!(dir = %dir.path().display(), "created ephemeral filter");
        Ok(Self { filter, _dir: dir })
    }
}

impl std::ops::Deref for EphemeralFilter {
    type Target = ScalingBloomFilter;

    fn deref(&self) -> &Self::Target {
        &self.filter
    }
}

impl std::ops::DerefMut for EphemeralFilter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.filter
    }
}

/// Output destination for non-duplicate blocks. File sinks can answer
/// position queries for the offset log; opaque streams (stdout, pipes)
/// cannot.
pub enum OutputSink {
    File(File),
    Stream(Box<dyn Write>),
}

impl OutputSink {
    fn position(&mut self) -> Option<u64> {
        match self {
            OutputSink::File(file) => file.stream_position().ok(),
            OutputSink::Stream(_) => None,
        }
    }

    fn supports_position(&mut self) -> bool {
        self.position().is_some()
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::File(file) => file.write(buf),
            OutputSink::Stream(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::File(file) => file.flush(),
            OutputSink::Stream(stream) => stream.flush(),
        }
    }
}

/// Text side-channel correlating input and output byte positions of
/// every written block, one `<input_offset>,<output_offset>` line per
/// block after a header naming the streams.
pub struct OffsetLog {
    writer: BufWriter<File>,
}

impl OffsetLog {
    pub fn create(
        path: impl AsRef<Path>,
        input_name: &str,
        output_name: &str,
        bloom_path: Option<&Path>,
    ) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        match bloom_path {
            Some(bloom) => writeln!(
                writer,
                "# input={input_name} output={output_name} bloom={}",
                bloom.display()
            )?,
            None => {
                writeln!(writer, "# input={input_name} output={output_name}")?
            }
        }
        Ok(Self { writer })
    }

    fn record(&mut self, input_offset: u64, output_offset: u64) -> Result<()> {
        writeln!(self.writer, "{input_offset},{output_offset}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Single-pass, blocking block deduplicator.
///
/// Reads fixed-size blocks from the input, consults the filter(s) and
/// writes every block not already seen to the output, verbatim and in
/// order. The last block may be short and is processed like any other.
pub struct Deduplicator<R: Read> {
    input: R,
    output: OutputSink,
    block_size: usize,
    offset_log: Option<OffsetLog>,
    input_offset: u64,
}

impl<R: Read> Deduplicator<R> {
    pub fn new(input: R, output: OutputSink, block_size: usize) -> Self {
        Self {
            input,
            output,
            block_size,
            offset_log: None,
            input_offset: 0,
        }
    }

    /// Attaches an offset log. When the output sink cannot answer
    /// position queries the log is dropped with a warning and the run
    /// continues without it.
    pub fn with_offset_log(mut self, log: OffsetLog) -> Self {
        if self.output.supports_position() {
            self.offset_log = Some(log);
        } else {
            warn!(
                "output stream does not support position queries, \
                 disabling offset log"
            );
        }
        self
    }

    /// Default mode: a block passes if absent from both the ephemeral
    /// `seen` filter and the optional read-only `baseline` filter, and
    /// is then recorded in `seen` only.
    pub fn filter(
        &mut self,
        seen: &mut ScalingBloomFilter,
        baseline: Option<&ScalingBloomFilter>,
    ) -> Result<DedupStats> {
        let mut stats = DedupStats::default();
        let mut buf = vec![0u8; self.block_size];

        loop {
            let len = read_block(&mut self.input, &mut buf)?;
            if len == 0 {
                break;
            }
            self.input_offset += len as u64;
            stats.blocks_read += 1;

            let block = &buf[..len];
            let duplicate = seen.check(block)?
                || match baseline {
                    Some(filter) => filter.check(block)?,
                    None => false,
                };
            if !duplicate {
                self.emit(block)?;
                seen.add(block)?;
                stats.blocks_written += 1;
            }
        }

        self.finish()?;
        Ok(stats)
    }

    /// Add mode: check and add against one persistent filter, so
    /// duplicates are suppressed across runs.
    pub fn filter_with_add(
        &mut self,
        filter: &mut ScalingBloomFilter,
    ) -> Result<DedupStats> {
        let mut stats = DedupStats::default();
        let mut buf = vec![0u8; self.block_size];

        loop {
            let len = read_block(&mut self.input, &mut buf)?;
            if len == 0 {
                break;
            }
            self.input_offset += len as u64;
            stats.blocks_read += 1;

            let block = &buf[..len];
            if !filter.check(block)? {
                self.emit(block)?;
                filter.add(block)?;
                stats.blocks_written += 1;
            }
        }

        self.finish()?;
        Ok(stats)
    }

    /// Delete mode: remove every present input block from the filter.
    /// Checks before deleting, so never-added blocks are untouched.
    /// Produces no output.
    pub fn remove(
        &mut self,
        filter: &mut ScalingBloomFilter,
    ) -> Result<DedupStats> {
        let mut stats = DedupStats::default();
        let mut buf = vec![0u8; self.block_size];

        loop {
            let len = read_block(&mut self.input, &mut buf)?;
            if len == 0 {
                break;
            }
            self.input_offset += len as u64;
            stats.blocks_read += 1;

            let block = &buf[..len];
            if filter.check(block)? {
                filter.delete(block)?;
                stats.blocks_deleted += 1;
            }
        }

        self.finish()?;
        Ok(stats)
    }

    /// Writes one passing block, recording its offsets first: input
    /// position after the read, output position before the write.
    fn emit(&mut self, block: &[u8]) -> Result<()> {
        if let Some(log) = &mut self.offset_log {
            if let Some(output_offset) = self.output.position() {
                log.record(self.input_offset, output_offset)?;
            }
        }
        self.output.write_all(block)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.output.flush()?;
        if let Some(log) = &mut self.offset_log {
            log.finish()?;
        }
        Ok(())
    }
}

/// Reads until `buf` is full or the stream ends. A short return is the
/// final partial block; zero means end of stream.
fn read_block(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_block_full_and_partial() {
        let data = vec![7u8; 10];
        let mut reader = &data[..];
        let mut buf = [0u8; 4];
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 4);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 4);
        // Final partial block, then end of stream.
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 2);
        assert_eq!(read_block(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_ephemeral_filter_cleanup() {
        use crate::filter::FilterConfigBuilder;

        let config = FilterConfigBuilder::default()
            .capacity(100)
            .error_rate(0.01)
            .build()
            .expect("Unable to build FilterConfig");
        let ephemeral = EphemeralFilter::new(config)
            .expect("Failed to create ephemeral filter");
        let path = ephemeral.path().to_path_buf();
        assert!(path.exists());
        drop(ephemeral);
        assert!(!path.exists());
    }
}
