use log::debug;

use crate::chain::Chain;
use crate::constants::is_whitespace;
use crate::decode::{escape, need, unclosed, Format, Scratch, Solver};
use crate::pipe::Pipe;
use crate::reader::Reader;
use crate::{Error, Result};

pub const ESCAPE: u8 = b'^';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Tag,
    Key,
    Value,
}

#[derive(Debug, Default)]
pub struct Radar;

impl Radar {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for Radar {
    fn format(&self) -> Format {
        Format::Kat
    }

    fn solve<R, P>(&mut self, scratch: &mut Scratch, reader: &mut R, pipe: &mut P) -> Result<()>
    where
        R: Reader + ?Sized,
        P: Pipe + ?Sized,
    {
        let Scratch { tag, key, value } = scratch;
        let mut event = Event::Tag;

        loop {
            match event {
                Event::Tag => loop {
                    let Some(byte) = reader.advance()? else {
                        if !tag.is_empty() {
                            return Err(Error::structural(format!(
                                "unexpected end of input after tag `{tag}`"
                            )));
                        }
                        if pipe.depth() != 0 {
                            return Err(unclosed(pipe.depth()));
                        }
                        return Ok(());
                    };
                    match byte {
                        b'{' => open(tag, key, reader, pipe)?,
                        b'(' => {
                            event = Event::Value;
                            break;
                        }
                        b':' => {
                            if tag.is_empty() {
                                return Err(Error::structural("`:` without a preceding tag"));
                            }
                            event = Event::Key;
                            break;
                        }
                        b'}' => {
                            if !tag.is_empty() {
                                return Err(Error::unexpected(byte, "tag"));
                            }
                            if pipe.depth() == 0 {
                                return Err(Error::structural("`}` without an open container"));
                            }
                            pipe.close(true)?;
                        }
                        b'#' if tag.is_empty() => comment(reader)?,
                        0..=0x20 => {
                            if !(tag.is_empty() && is_whitespace(byte)) {
                                return Err(Error::unexpected(byte, "tag"));
                            }
                        }
                        b'#' | b')' | ESCAPE => return Err(Error::unexpected(byte, "tag")),
                        _ => tag.push(byte)?,
                    }
                },
                Event::Key => loop {
                    let byte = need(reader)?;
                    match byte {
                        b'{' => {
                            open(tag, key, reader, pipe)?;
                            event = Event::Tag;
                            break;
                        }
                        b'(' => {
                            event = Event::Value;
                            break;
                        }
                        ESCAPE => unescape(key, reader)?,
                        b':' => return Err(Error::structural("repeated `:` in one entry")),
                        0..=0x20 | b'#' | b')' | b'}' => {
                            return Err(Error::unexpected(byte, "key"))
                        }
                        _ => key.push(byte)?,
                    }
                },
                Event::Value => loop {
                    let byte = need(reader)?;
                    match byte {
                        b')' => {
                            pipe.emit(tag, key, value)?;
                            tag.clear();
                            key.clear();
                            value.clear();
                            event = Event::Tag;
                            break;
                        }
                        ESCAPE => unescape(value, reader)?,
                        b'(' => return Err(Error::unexpected(byte, "payload")),
                        _ => value.push(byte)?,
                    }
                },
            }
        }
    }
}

fn open<R, P>(tag: &mut Chain, key: &mut Chain, reader: &mut R, pipe: &mut P) -> Result<()>
where
    R: Reader + ?Sized,
    P: Pipe + ?Sized,
{
    let accepted = pipe.open(tag, key)?;
    if !accepted {
        debug!("kat: skipping declined container `{tag}:{key}`");
    }
    tag.clear();
    key.clear();
    if accepted {
        Ok(())
    } else {
        skip(reader)
    }
}

pub fn simple(byte: u8) -> u8 {
    match byte {
        b's' => b' ',
        b't' => b'\t',
        b'r' => b'\r',
        b'n' => b'\n',
        other => other,
    }
}

fn unescape<R: Reader + ?Sized>(chain: &mut Chain, reader: &mut R) -> Result<()> {
    match need(reader)? {
        b'u' => escape::rotate(chain, reader, ESCAPE, simple),
        byte => chain.push(simple(byte)),
    }
}

fn comment<R: Reader + ?Sized>(reader: &mut R) -> Result<()> {
    while let Some(byte) = reader.advance()? {
        if matches!(byte, b'#' | b'\r' | b'\n') {
            return Ok(());
        }
    }
    Ok(())
}

pub(crate) fn skip<R: Reader + ?Sized>(reader: &mut R) -> Result<()> {
    let mut depth = 1usize;
    let mut fresh = true;
    while depth != 0 {
        let byte = need(reader)?;
        match byte {
            b'{' => {
                depth += 1;
                fresh = true;
            }
            b'}' => {
                depth -= 1;
                fresh = true;
            }
            b'(' => {
                payload(reader)?;
                fresh = true;
            }
            b'#' if fresh => comment(reader)?,
            b')' => return Err(Error::unexpected(byte, "skipped container")),
            ESCAPE => {
                need(reader)?;
                fresh = false;
            }
            _ => fresh = is_whitespace(byte),
        }
    }
    Ok(())
}

fn payload<R: Reader + ?Sized>(reader: &mut R) -> Result<()> {
    loop {
        match need(reader)? {
            b')' => return Ok(()),
            ESCAPE => {
                need(reader)?;
            }
            b'(' => return Err(Error::unexpected(b'(', "payload")),
            _ => {}
        }
    }
}
