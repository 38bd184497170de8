use std::io::{self, Read};
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::constants::READER_WINDOW;

/// One-byte-lookahead source consumed by the format solvers.
///
/// Readers do not own the caller's source unless documented otherwise; the
/// parser calls [`Reader::close`] once a decode ends, whatever the outcome.
pub trait Reader {
    fn peek(&mut self) -> io::Result<Option<u8>>;

    fn advance(&mut self) -> io::Result<Option<u8>>;

    /// Next byte, failing with `UnexpectedEof` past the end.
    fn next(&mut self) -> io::Result<u8> {
        match self.advance()? {
            Some(byte) => Ok(byte),
            None => Err(eof()),
        }
    }

    fn also(&mut self) -> io::Result<bool> {
        Ok(self.peek()?.is_some())
    }

    fn close(&mut self) {}
}

impl<R: Reader + ?Sized> Reader for &mut R {
    fn peek(&mut self) -> io::Result<Option<u8>> {
        (**self).peek()
    }

    fn advance(&mut self) -> io::Result<Option<u8>> {
        (**self).advance()
    }

    fn next(&mut self) -> io::Result<u8> {
        (**self).next()
    }

    fn also(&mut self) -> io::Result<bool> {
        (**self).also()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

pub(crate) fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "no more readable bytes")
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "reader is closed")
}

/// Reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    index: usize,
    closed: bool,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            index: 0,
            closed: false,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Reader for SliceReader<'_> {
    #[inline]
    fn peek(&mut self) -> io::Result<Option<u8>> {
        if self.closed {
            return Err(closed());
        }
        Ok(self.data.get(self.index).copied())
    }

    #[inline]
    fn advance(&mut self) -> io::Result<Option<u8>> {
        if self.closed {
            return Err(closed());
        }
        match self.data.get(self.index) {
            Some(&byte) => {
                self.index += 1;
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Buffered reader over any [`Read`].
///
/// This adapter owns both the wrapped source and its window: `close` drops
/// the source and, when the window came from a [`Bucket`], hands it back.
pub struct StreamReader<R> {
    inner: Option<R>,
    window: Vec<u8>,
    index: usize,
    end: usize,
    bucket: Option<Arc<Bucket>>,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self::from_window(inner, Vec::with_capacity(READER_WINDOW), None)
    }

    pub fn with_bucket(inner: R, bucket: Arc<Bucket>) -> Self {
        let window = bucket.take(READER_WINDOW);
        Self::from_window(inner, window, Some(bucket))
    }

    fn from_window(inner: R, mut window: Vec<u8>, bucket: Option<Arc<Bucket>>) -> Self {
        let size = window.capacity().max(1);
        window.clear();
        window.resize(size, 0);
        Self {
            inner: Some(inner),
            window,
            index: 0,
            end: 0,
            bucket,
        }
    }

    fn fill(&mut self) -> io::Result<bool> {
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        loop {
            match inner.read(&mut self.window) {
                Ok(0) => return Ok(false),
                Ok(count) => {
                    self.index = 0;
                    self.end = count;
                    return Ok(true);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: Read> Reader for StreamReader<R> {
    #[inline]
    fn peek(&mut self) -> io::Result<Option<u8>> {
        if self.index < self.end {
            return Ok(Some(self.window[self.index]));
        }
        if self.fill()? {
            Ok(Some(self.window[self.index]))
        } else {
            Ok(None)
        }
    }

    #[inline]
    fn advance(&mut self) -> io::Result<Option<u8>> {
        if self.index >= self.end && !self.fill()? {
            return Ok(None);
        }
        let byte = self.window[self.index];
        self.index += 1;
        Ok(Some(byte))
    }

    fn close(&mut self) {
        self.inner = None;
        self.index = 0;
        self.end = 0;
        let window = std::mem::take(&mut self.window);
        if let Some(bucket) = self.bucket.take() {
            bucket.store(window);
        }
    }
}
