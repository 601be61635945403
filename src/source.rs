//! The byte source (C1): a seekable, buffered reader over the input.
//!
//! Matroska parsing seeks constantly — every skipped Cluster, every
//! SeekHead redirect, every tail scan chunk is a jump to an arbitrary
//! absolute offset — so a large read-ahead buffer would mostly be wasted
//! work. [`std::io::BufReader`] already throws its buffer away on seek and
//! defaults to a modest capacity; we just pin that capacity down small and
//! add the absolute-offset bookkeeping the rest of the crate wants.

use std::io::{self, BufReader, Read, Seek, SeekFrom};

use crate::error::Result;

/// Read-ahead capacity for [`Source`]. Kept small (§4.1) because seeks are
/// frequent and a large buffer would be discarded more often than used.
const READ_AHEAD: usize = 64;

/// A seekable byte source addressed by absolute stream offsets.
pub struct Source<R> {
    inner: BufReader<R>,
    len: u64,
}

impl<R: Read + Seek> Source<R> {
    /// Wrap a reader, recording its total length up front.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner: BufReader::with_capacity(READ_AHEAD, inner), len })
    }

    /// Total length of the underlying stream, in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current absolute read position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to an absolute offset.
    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Skip forward by `n` bytes without retaining the data.
    pub fn advance(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.inner.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.inner.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Release the underlying reader, e.g. to hand it back to the caller
    /// for attachment extraction (`keep_stream_open`).
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}
