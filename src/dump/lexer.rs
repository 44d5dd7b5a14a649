// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{dump::stream::RangedByteStream, ring::BoundedRing, Error, Result};
use std::{io::Read, path::Path};

/// The statement header preceding every run of rows in a dump.
#[must_use]
pub fn insert_statement_header(table_name: &str) -> Vec<u8> {
    format!("INSERT INTO `{table_name}` VALUES ").into_bytes()
}

/// Lazy, non-restartable lexer over the rows of one table of an SQL dump.
///
/// Emits one `Vec<String>` per `(...)` values clause. The stream is expected
/// to be positioned either at a row start (the byte after an
/// `INSERT INTO ... VALUES ` header) or somewhere before a header, in which
/// case [`DumpLexer::skip_header`] must be called first, since a full dump
/// file starts with schema statements whose parentheses would otherwise be
/// misread as rows.
pub struct DumpLexer<R: Read> {
    reader: R,
    header: Vec<u8>,
    pushback: Vec<u8>,
    offset: u64,
    stop_at: Option<u64>,
}

impl<R: Read> DumpLexer<R> {
    /// Creates a lexer for the rows of `table_name`.
    pub fn new(reader: R, table_name: &str) -> Self {
        Self {
            reader,
            header: insert_statement_header(table_name),
            pushback: Vec::new(),
            offset: 0,
            stop_at: None,
        }
    }

    /// Sets an exclusive stream offset at which [`DumpLexer::next_row`]
    /// starts reporting end-of-input even if more bytes are available.
    #[must_use]
    pub fn with_stop_at(mut self, offset: u64) -> Self {
        self.stop_at = Some(offset);
        self
    }

    /// Bytes consumed from the stream so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Advances the stream until the table's `INSERT INTO ... VALUES `
    /// header has just been consumed. Returns `false` if the stream ended
    /// first.
    pub fn skip_header(&mut self) -> Result<bool> {
        let mut ring = BoundedRing::new(self.header.len())?;
        while let Some(byte) = self.read_byte()? {
            ring.push(byte);
            if ring.equals(&self.header) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Parses the next row.
    ///
    /// Returns `Ok(None)` at clean end-of-stream, when the configured stop
    /// offset has been reached, or when the input is truncated mid-row
    /// (dumps cut at a byte range end in the middle of a statement are
    /// tolerated, not errors).
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        if let Some(stop) = self.stop_at {
            if self.offset >= stop {
                return Ok(None);
            }
        }

        if !self.seek_row_start()? {
            return Ok(None);
        }

        let mut columns = Vec::new();
        loop {
            let Some(byte) = self.read_byte()? else {
                // truncated mid-row
                return Ok(None);
            };
            match byte {
                b'\'' => {
                    let Some(value) = self.read_string_literal()? else {
                        return Ok(None);
                    };
                    columns.push(value);
                }
                b'0'..=b'9' | b'.' => {
                    self.unread(byte);
                    columns.push(self.read_number()?);
                }
                b'N' => {
                    if self.try_literal(b"ULL")? {
                        columns.push("NULL".to_owned());
                    }
                }
                b')' => break,
                _ => {}
            }
        }

        for column in &mut columns {
            if column.contains('\n') {
                column.retain(|c| c != '\n');
            }
        }

        Ok(Some(columns))
    }

    /// Scans forward to the `(` opening the next row, crossing statement
    /// boundaries (`;` followed by the next header) as needed.
    fn seek_row_start(&mut self) -> Result<bool> {
        loop {
            let Some(byte) = self.read_byte()? else {
                return Ok(false);
            };
            match byte {
                b'(' => return Ok(true),
                b';' => {
                    if !self.skip_header()? {
                        return Ok(false);
                    }
                }
                _ => {}
            }
        }
    }

    /// Reads a `'...'` literal body, the opening quote already consumed.
    ///
    /// A backslash appends the following byte verbatim (so `\'` does not
    /// terminate the literal); non-printable bytes are dropped. Returns
    /// `None` if the stream ends inside the literal.
    fn read_string_literal(&mut self) -> Result<Option<String>> {
        let mut out = Vec::new();
        loop {
            let Some(byte) = self.read_byte()? else {
                return Ok(None);
            };
            match byte {
                b'\\' => {
                    let Some(escaped) = self.read_byte()? else {
                        return Ok(None);
                    };
                    out.push(escaped);
                }
                b'\'' => break,
                _ => {
                    if !byte.is_ascii_control() {
                        out.push(byte);
                    }
                }
            }
        }
        Ok(Some(String::from_utf8_lossy(&out).into_owned()))
    }

    /// Reads a run of `[0-9.]`, ignoring embedded newlines.
    fn read_number(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(byte) = self.read_byte()? {
            match byte {
                b'0'..=b'9' | b'.' => out.push(char::from(byte)),
                b'\n' => {}
                _ => {
                    self.unread(byte);
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Attempts to consume `rest` exactly; un-reads everything consumed on
    /// a partial match.
    fn try_literal(&mut self, rest: &[u8]) -> Result<bool> {
        let mut consumed = Vec::with_capacity(rest.len());
        for expected in rest {
            match self.read_byte()? {
                Some(byte) if byte == *expected => consumed.push(byte),
                Some(byte) => {
                    self.unread(byte);
                    while let Some(b) = consumed.pop() {
                        self.unread(b);
                    }
                    return Ok(false);
                }
                None => {
                    while let Some(b) = consumed.pop() {
                        self.unread(b);
                    }
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if let Some(byte) = self.pushback.pop() {
            self.offset += 1;
            return Ok(Some(byte));
        }

        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn unread(&mut self, byte: u8) {
        self.pushback.push(byte);
        self.offset -= 1;
    }
}

/// Splits a dump file into up to `n_partitions` contiguous byte ranges, each
/// beginning at a row boundary.
///
/// The first range begins immediately after the file's first
/// `INSERT INTO ... VALUES ` header (at the `(` of the first row); every
/// internal boundary is the start of a header found by scanning forward from
/// a `file_size / n_partitions` stride; the last range ends at the file
/// size. Files too small to carve that many headers out of yield fewer
/// ranges.
pub fn split_offsets<P: AsRef<Path>>(
    dump_path: P,
    table_name: &str,
    n_partitions: usize,
) -> Result<Vec<(u64, u64)>> {
    if n_partitions == 0 {
        return Err(Error::InvalidArgument(
            "n_partitions must be non-zero".into(),
        ));
    }

    let dump_path = dump_path.as_ref();
    let file_size = std::fs::metadata(dump_path)?.len();
    let header = insert_statement_header(table_name);

    let mut reader = RangedByteStream::open_buffered(dump_path, 0, file_size)?;
    let Some(consumed) = scan_for(&mut reader, &header)? else {
        return Err(Error::MalformedRow(format!(
            "no `INSERT INTO \"{table_name}\"` statement found in {}",
            dump_path.display(),
        )));
    };
    let first_begin = consumed;

    let stride = (file_size / n_partitions as u64).max(1);
    let mut begins = vec![first_begin];

    for i in 1..n_partitions as u64 {
        let target = i * stride;
        let prev = *begins.last().unwrap_or(&first_begin);
        if target >= file_size {
            break;
        }

        let mut reader = RangedByteStream::open_buffered(dump_path, target, file_size)?;
        let Some(consumed) = scan_for(&mut reader, &header)? else {
            break;
        };
        let header_start = target + consumed - header.len() as u64;
        if header_start > prev {
            begins.push(header_start);
        }
    }

    let mut partitions = Vec::with_capacity(begins.len());
    for (i, begin) in begins.iter().enumerate() {
        let end = begins.get(i + 1).copied().unwrap_or(file_size);
        partitions.push((*begin, end));
    }

    Ok(partitions)
}

/// Scans `reader` until `target` has just been consumed; returns the number
/// of bytes consumed, or `None` at end-of-stream.
fn scan_for<R: Read>(reader: &mut R, target: &[u8]) -> Result<Option<u64>> {
    let mut ring = BoundedRing::new(target.len())?;
    let mut consumed = 0u64;
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                consumed += 1;
                ring.push(buf[0]);
                if ring.equals(target) {
                    return Ok(Some(consumed));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}
