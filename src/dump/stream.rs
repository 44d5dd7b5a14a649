// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// 1 MiB read-ahead per stream
const BLOCK_SIZE: usize = 1 << 20;

/// Read-only byte stream over `[begin, end)` of a file.
///
/// Each stream owns its file handle, so any number of streams over disjoint
/// ranges of the same file can be driven concurrently. Reads past `end`
/// report end-of-stream.
#[derive(Debug)]
pub struct RangedByteStream {
    file: File,
    remaining: u64,
}

impl RangedByteStream {
    /// Opens `path` positioned at `begin`, limited to `end` (exclusive).
    pub fn open<P: AsRef<Path>>(path: P, begin: u64, end: u64) -> std::io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(begin))?;
        Ok(Self {
            file,
            remaining: end.saturating_sub(begin),
        })
    }

    /// Opens the range wrapped in a block-sized [`BufReader`].
    pub fn open_buffered<P: AsRef<Path>>(
        path: P,
        begin: u64,
        end: u64,
    ) -> std::io::Result<BufReader<Self>> {
        Ok(BufReader::with_capacity(
            BLOCK_SIZE,
            Self::open(path, begin, end)?,
        ))
    }

    /// Bytes left before the range end.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Read for RangedByteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }

        let want = usize::try_from(self.remaining)
            .map_or(buf.len(), |rem| buf.len().min(rem));

        // want never exceeds buf.len()
        let slice = buf.get_mut(..want).unwrap_or_default();
        let n = self.file.read(slice)?;
        self.remaining -= n as u64;

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::RangedByteStream;
    use std::io::{Read, Write};

    fn fixture(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        f.write_all(content).expect("write fixture");
        f.flush().expect("flush fixture");
        f
    }

    #[test]
    fn reads_only_the_range() {
        let f = fixture(b"0123456789");

        let mut stream = RangedByteStream::open(f.path(), 2, 7).expect("open");
        let mut out = String::new();
        stream.read_to_string(&mut out).expect("read");

        assert_eq!(out, "23456");
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn range_past_eof_is_clamped_by_file_size() {
        let f = fixture(b"abc");

        let mut stream = RangedByteStream::open(f.path(), 1, 100).expect("open");
        let mut out = Vec::new();
        stream.read_to_end(&mut out).expect("read");

        assert_eq!(out, b"bc");
    }

    #[test]
    fn empty_range_reads_nothing() {
        let f = fixture(b"abc");

        let mut stream = RangedByteStream::open(f.path(), 2, 2).expect("open");
        let mut out = Vec::new();
        stream.read_to_end(&mut out).expect("read");

        assert!(out.is_empty());
    }

    #[test]
    fn disjoint_ranges_are_independent() {
        let f = fixture(b"aaaabbbbcccc");

        let mut first = RangedByteStream::open(f.path(), 0, 4).expect("open");
        let mut second = RangedByteStream::open(f.path(), 4, 8).expect("open");

        // interleave reads to prove the cursors do not interfere
        let mut buf1 = [0u8; 2];
        let mut buf2 = [0u8; 2];
        first.read_exact(&mut buf1).expect("read");
        second.read_exact(&mut buf2).expect("read");
        assert_eq!(&buf1, b"aa");
        assert_eq!(&buf2, b"bb");

        first.read_exact(&mut buf1).expect("read");
        second.read_exact(&mut buf2).expect("read");
        assert_eq!(&buf1, b"aa");
        assert_eq!(&buf2, b"bb");
    }
}
