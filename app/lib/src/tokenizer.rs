//! Streaming line tokenizer.
//!
//! Splits a byte stream into rows of delimiter-separated columns using one
//! fixed-size buffer. A row borrows the tokenizer, so its column slices are
//! only reachable until the next row is requested.

use std::io::{ErrorKind, Read};

use crate::error::{DnslzError, Result};

/// Upper bound on the columns of one row.
pub const MAX_COLUMNS: usize = 4096;

/// Bytes requested from the source per refill.
pub const REFILL_BLOCK: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct ColumnSpan {
    start: usize,
    len: usize,
}

/// One line split into columns.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    buf: &'a [u8],
    cols: &'a [ColumnSpan],
    line: u64,
}

impl<'a> Row<'a> {
    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Column `index`, if present.
    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.cols
            .get(index)
            .map(|span| &self.buf[span.start..span.start + span.len])
    }

    /// All columns in order.
    pub fn columns(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.cols.len()).filter_map(move |i| self.get(i))
    }

    /// 1-based number of the line this row came from.
    pub fn line_number(&self) -> u64 {
        self.line
    }

    /// Check whether the row is a single column equal to `text`.
    pub fn is_single(&self, text: &[u8]) -> bool {
        self.len() == 1 && self.get(0) == Some(text)
    }
}

/// Pull tokenizer over any [`Read`] source.
pub struct Tokenizer<R> {
    source: R,
    buf: Box<[u8]>,
    pos: usize,
    last: usize,
    delimiter: u8,
    cols: Vec<ColumnSpan>,
    line: u64,
    bytes_read: u64,
    eof: bool,
}

impl<R: Read> Tokenizer<R> {
    /// Create a tokenizer splitting columns at `delimiter`, with lines bounded
    /// by `buffer_size` bytes.
    pub fn new(source: R, delimiter: u8, buffer_size: usize) -> Self {
        Self {
            source,
            buf: vec![0u8; buffer_size].into_boxed_slice(),
            pos: 0,
            last: 0,
            delimiter,
            cols: Vec::with_capacity(64),
            line: 0,
            bytes_read: 0,
            eof: false,
        }
    }

    /// Total bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Produce the next row.
    ///
    /// Returns `Ok(None)` at end of stream once no partial line is pending; a
    /// final line without a newline is still returned as a row.
    pub fn next_row(&mut self) -> Result<Option<Row<'_>>> {
        self.cols.clear();
        let mut start = self.pos;

        loop {
            if self.pos == self.last {
                if self.eof {
                    if start == self.pos && self.cols.is_empty() {
                        return Ok(None);
                    }
                    self.push_column(start, self.pos)?;
                    self.line += 1;
                    return Ok(Some(self.row()));
                }
                start = self.refill(start)?;
                continue;
            }

            let window = &self.buf[self.pos..self.last];
            let delimiter = self.delimiter;
            match window.iter().position(|&c| c == delimiter || c == b'\n') {
                None => self.pos = self.last,
                Some(offset) => {
                    let end = self.pos + offset;
                    let byte = self.buf[end];
                    self.pos = end + 1;
                    self.push_column(start, end)?;
                    start = self.pos;
                    if byte == b'\n' {
                        self.line += 1;
                        return Ok(Some(self.row()));
                    }
                }
            }
        }
    }

    fn row(&self) -> Row<'_> {
        Row {
            buf: &self.buf,
            cols: &self.cols,
            line: self.line,
        }
    }

    fn push_column(&mut self, start: usize, end: usize) -> Result<()> {
        if self.cols.len() == MAX_COLUMNS {
            return Err(DnslzError::TooManyColumns {
                line: self.line + 1,
                limit: MAX_COLUMNS,
            });
        }
        self.cols.push(ColumnSpan {
            start,
            len: end - start,
        });
        Ok(())
    }

    /// Move the pending line to the buffer start and read more bytes.
    ///
    /// Returns the translated start of the current column.
    fn refill(&mut self, start: usize) -> Result<usize> {
        let line_start = self.cols.first().map_or(start, |c| c.start);
        if line_start > 0 {
            self.buf.copy_within(line_start..self.last, 0);
            for col in &mut self.cols {
                col.start -= line_start;
            }
            self.pos -= line_start;
            self.last -= line_start;
        }
        let start = start - line_start;

        let room = self.buf.len() - self.last;
        if room == 0 {
            return Err(DnslzError::BufferOverflow {
                capacity: self.buf.len(),
            });
        }
        let want = room.min(REFILL_BLOCK);
        let n = loop {
            match self.source.read(&mut self.buf[self.last..self.last + want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            self.eof = true;
        } else {
            self.last += n;
            self.bytes_read += n as u64;
        }
        Ok(start)
    }
}
