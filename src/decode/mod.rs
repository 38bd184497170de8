pub mod escape;
pub mod json;
pub mod kat;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use crate::chain::Chain;
use crate::options::{DecodeOptions, ScratchSizing};
use crate::pipe::Pipe;
use crate::reader::Reader;
use crate::{Error, Result};

pub use json::Mage;
pub use kat::Radar;
pub use xml::Docx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Kat,
    Json,
    Xml,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Kat => "kat",
            Format::Json => "json",
            Format::Xml => "xml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kat" => Ok(Format::Kat),
            "json" => Ok(Format::Json),
            "xml" | "doc" => Ok(Format::Xml),
            other => Err(Error::state(format!("unknown format `{other}`"))),
        }
    }
}

#[derive(Debug, Default)]
pub struct Scratch {
    pub tag: Chain,
    pub key: Chain,
    pub value: Chain,
}

impl Scratch {
    pub fn new(sizing: ScratchSizing) -> Self {
        Self {
            tag: Chain::with_capacity(sizing.tag),
            key: Chain::with_capacity(sizing.key),
            value: Chain::with_capacity(sizing.value),
        }
    }

    pub fn from_parts(tag: Chain, key: Chain, value: Chain) -> Self {
        Self { tag, key, value }
    }

    pub fn apply(&mut self, options: &DecodeOptions) {
        self.tag.set_limit(options.tag_limit);
        self.key.set_limit(options.key_limit);
        self.value.set_limit(options.value_limit);
    }

    pub fn clear(&mut self) {
        self.tag.clear();
        self.key.clear();
        self.value.clear();
    }

    pub fn is_clear(&self) -> bool {
        self.tag.is_empty() && self.key.is_empty() && self.value.is_empty()
    }
}

pub trait Solver {
    fn format(&self) -> Format;

    fn solve<R, P>(&mut self, scratch: &mut Scratch, reader: &mut R, pipe: &mut P) -> Result<()>
    where
        R: Reader + ?Sized,
        P: Pipe + ?Sized;

    fn clear(&mut self) {}
}

#[inline]
pub(crate) fn need<R: Reader + ?Sized>(reader: &mut R) -> Result<u8> {
    match reader.advance()? {
        Some(byte) => Ok(byte),
        None => Err(Error::structural("unexpected end of input")),
    }
}

#[inline]
pub(crate) fn stamp(chain: &mut Chain, bytes: &[u8]) -> Result<()> {
    chain.clear();
    chain.extend(bytes)
}

pub(crate) fn unclosed(depth: usize) -> Error {
    Error::structural(format!(
        "unexpected end of input with {depth} node(s) still open"
    ))
}
