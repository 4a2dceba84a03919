//! Bounded line framing for the read loop.

use std::io::{self, BufRead, BufReader, Read};

/// One unit produced by [`FrameReader`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A complete line, delimiter included.
    Line(Vec<u8>),
    /// A line longer than the limit; its bytes were skipped.
    Oversize(usize),
}

/// Splits a byte stream into newline-terminated frames without ever
/// buffering more than `limit` bytes of a single frame.
pub(crate) struct FrameReader<R> {
    inner: BufReader<R>,
    limit: usize,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(reader: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            limit,
        }
    }

    /// Reads the next frame, or `None` at end of stream.
    ///
    /// A trailing line without a delimiter is still yielded at end of stream.
    pub(crate) fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut line = Vec::new();
        let mut size = 0_usize;
        let mut oversize = false;
        loop {
            let available = match self.inner.fill_buf() {
                Ok(available) => available,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            };
            if available.is_empty() {
                return Ok(finish_at_end(line, size, oversize));
            }

            let newline = available.iter().position(|byte| *byte == b'\n');
            let (chunk, complete) = match newline {
                Some(position) => (available.split_at(position + 1).0, true),
                None => (available, false),
            };
            let taken = chunk.len();
            size += taken;
            if size > self.limit && !oversize {
                oversize = true;
                line = Vec::new();
            }
            if !oversize {
                line.extend_from_slice(chunk);
            }
            self.inner.consume(taken);

            if complete {
                return Ok(Some(if oversize {
                    Frame::Oversize(size)
                } else {
                    Frame::Line(line)
                }));
            }
        }
    }
}

fn finish_at_end(line: Vec<u8>, size: usize, oversize: bool) -> Option<Frame> {
    if oversize {
        return Some(Frame::Oversize(size));
    }
    (!line.is_empty()).then_some(Frame::Line(line))
}
