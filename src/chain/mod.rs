use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};

use memchr::memchr;

use crate::constants::CHAIN_INITIAL;
use crate::{Error, Result};

pub struct Chain {
    buf: Vec<u8>,
    limit: Option<usize>,
    hash: Cell<u64>,
}

impl Chain {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_vec(Vec::with_capacity(capacity))
    }

    pub fn from_vec(mut buf: Vec<u8>) -> Self {
        buf.clear();
        Self {
            buf,
            limit: None,
            hash: Cell::new(0),
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn into_inner(mut self) -> Vec<u8> {
        self.buf.clear();
        self.buf
    }

    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.buf.len() == self.buf.capacity() || self.limit.is_some() {
            self.grow(1)?;
        }
        self.buf.push(byte);
        self.hash.set(0);
        Ok(())
    }

    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.grow(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        self.hash.set(0);
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8], offset: usize, length: usize) -> Result<()> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| {
                Error::state(format!(
                    "range {offset}+{length} is outside a slice of {} bytes",
                    bytes.len()
                ))
            })?;
        self.extend(&bytes[offset..end])
    }

    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
        self.hash.set(0);
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.hash.set(0);
        self.buf.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.buf).ok()
    }

    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    #[inline]
    pub fn is(&self, bytes: &[u8]) -> bool {
        self.buf == bytes
    }

    pub fn starts_with(&self, bytes: &[u8]) -> bool {
        self.buf.starts_with(bytes)
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.buf.get(index).copied()
    }

    pub fn last(&self) -> Option<u8> {
        self.buf.last().copied()
    }

    pub fn find(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.buf)
    }

    pub fn hash_code(&self) -> u64 {
        let cached = self.hash.get();
        if cached != 0 || self.buf.is_empty() {
            return cached;
        }
        let mut h: u64 = 0;
        for &byte in &self.buf {
            h = h.wrapping_mul(31).wrapping_add(u64::from(byte));
        }
        self.hash.set(h);
        h
    }

    fn grow(&mut self, additional: usize) -> Result<()> {
        let need = self
            .buf
            .len()
            .checked_add(additional)
            .ok_or_else(|| Error::allocation("chain length overflows usize"))?;
        if let Some(limit) = self.limit {
            if need > limit {
                return Err(Error::allocation(format!(
                    "chain exceeds its limit of {limit} bytes"
                )));
            }
        }
        let capacity = self.buf.capacity();
        if need <= capacity {
            return Ok(());
        }
        let mut target = capacity.max(CHAIN_INITIAL);
        while target < need {
            target = target
                .checked_mul(2)
                .ok_or_else(|| Error::allocation("chain capacity overflows usize"))?;
        }
        self.buf
            .try_reserve_exact(target - self.buf.len())
            .map_err(|err| Error::allocation(err.to_string()))
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Chain {
    fn clone(&self) -> Self {
        Self {
            buf: self.buf.clone(),
            limit: self.limit,
            hash: Cell::new(self.hash.get()),
        }
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.hash.get(), other.hash.get());
        if a != 0 && b != 0 && a != b {
            return false;
        }
        self.buf == other.buf
    }
}

impl Eq for Chain {}

impl PartialEq<[u8]> for Chain {
    fn eq(&self, other: &[u8]) -> bool {
        self.buf == other
    }
}

impl PartialEq<&[u8]> for Chain {
    fn eq(&self, other: &&[u8]) -> bool {
        self.buf == *other
    }
}

impl PartialEq<str> for Chain {
    fn eq(&self, other: &str) -> bool {
        self.buf == other.as_bytes()
    }
}

impl PartialEq<&str> for Chain {
    fn eq(&self, other: &&str) -> bool {
        self.buf == other.as_bytes()
    }
}

impl Hash for Chain {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.buf.hash(state);
    }
}

impl AsRef<[u8]> for Chain {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chain({:?})", self.to_str_lossy())
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}
