use log::debug;
use smallvec::SmallVec;

use crate::chain::Chain;
use crate::constants::{is_whitespace, LOSSY, TAG_LIST, TAG_MAP, TAG_RAW, TAG_STRING};
use crate::decode::{escape, need, stamp, unclosed, Format, Scratch, Solver};
use crate::pipe::Pipe;
use crate::reader::Reader;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Root,
    Key,
    Colon,
    Value,
    Next,
    Done,
}

type Brackets = SmallVec<[u8; 64]>;

#[derive(Debug, Default)]
pub struct Mage {
    brackets: Brackets,
}

impl Mage {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_object(&self) -> bool {
        self.brackets.last() == Some(&b'}')
    }

    fn after_value(&self) -> Step {
        if self.brackets.is_empty() {
            Step::Done
        } else {
            Step::Next
        }
    }

    fn open<R, P>(&mut self, byte: u8, scratch: &mut Scratch, reader: &mut R, pipe: &mut P) -> Result<Step>
    where
        R: Reader + ?Sized,
        P: Pipe + ?Sized,
    {
        let (tag, closer) = if byte == b'{' {
            (TAG_MAP, b'}')
        } else {
            (TAG_LIST, b']')
        };
        stamp(&mut scratch.tag, tag)?;
        let accepted = pipe.open(&scratch.tag, &scratch.key)?;
        if !accepted {
            debug!("json: skipping declined value at key `{}`", scratch.key);
        }
        scratch.tag.clear();
        scratch.key.clear();

        if accepted {
            self.brackets.push(closer);
            return Ok(if closer == b'}' { Step::Key } else { Step::Value });
        }
        skip(reader, closer)?;
        Ok(self.after_value())
    }

    fn close<P: Pipe + ?Sized>(&mut self, byte: u8, pipe: &mut P) -> Result<Step> {
        match self.brackets.pop() {
            Some(closer) if closer == byte => {
                pipe.close(true)?;
                Ok(self.after_value())
            }
            Some(closer) => Err(Error::structural(format!(
                "`{}` closes a container expecting `{}`",
                byte as char, closer as char
            ))),
            None => Err(Error::structural(format!(
                "`{}` without an open container",
                byte as char
            ))),
        }
    }

    fn emit<P: Pipe + ?Sized>(&self, tag: &[u8], scratch: &mut Scratch, pipe: &mut P) -> Result<Step> {
        stamp(&mut scratch.tag, tag)?;
        pipe.emit(&scratch.tag, &scratch.key, &scratch.value)?;
        scratch.clear();
        Ok(self.after_value())
    }
}

impl Solver for Mage {
    fn format(&self) -> Format {
        Format::Json
    }

    fn solve<R, P>(&mut self, scratch: &mut Scratch, reader: &mut R, pipe: &mut P) -> Result<()>
    where
        R: Reader + ?Sized,
        P: Pipe + ?Sized,
    {
        let mut step = Step::Root;
        loop {
            let Some(byte) = reader.advance()? else {
                return match step {
                    Step::Root | Step::Done => Ok(()),
                    _ => Err(unclosed(self.brackets.len())),
                };
            };
            if byte <= 0x20 {
                if is_whitespace(byte) {
                    continue;
                }
                return Err(Error::unexpected(byte, "json"));
            }

            step = match step {
                Step::Root => match byte {
                    b'{' | b'[' => self.open(byte, scratch, reader, pipe)?,
                    _ => return Err(Error::unexpected(byte, "json, expected `{` or `[`")),
                },
                Step::Done => {
                    return Err(Error::structural(format!(
                        "trailing `{}` after the root value",
                        byte as char
                    )))
                }
                Step::Key => match byte {
                    b'"' | b'\'' => {
                        string(&mut scratch.key, reader, byte)?;
                        Step::Colon
                    }
                    b'}' => self.close(byte, pipe)?,
                    b',' => Step::Key,
                    _ => return Err(Error::unexpected(byte, "object, expected a quoted key")),
                },
                Step::Colon => match byte {
                    b':' => Step::Value,
                    _ => return Err(Error::unexpected(byte, "object, expected `:`")),
                },
                Step::Value => match byte {
                    b'{' | b'[' => self.open(byte, scratch, reader, pipe)?,
                    b'"' | b'\'' => {
                        string(&mut scratch.value, reader, byte)?;
                        self.emit(TAG_STRING, scratch, pipe)?
                    }
                    b',' if !self.in_object() => Step::Value,
                    b']' if !self.in_object() => self.close(byte, pipe)?,
                    b':' => return Err(Error::structural("`:` where a value is expected")),
                    b',' | b'}' | b']' => {
                        return Err(Error::unexpected(byte, "object, missing value"))
                    }
                    _ => {
                        literal(&mut scratch.value, reader, byte)?;
                        self.emit(TAG_RAW, scratch, pipe)?
                    }
                },
                Step::Next => match byte {
                    b',' => {
                        if self.in_object() {
                            Step::Key
                        } else {
                            Step::Value
                        }
                    }
                    b'}' | b']' => self.close(byte, pipe)?,
                    _ => return Err(Error::unexpected(byte, "json, expected `,` or a closer")),
                },
            };
        }
    }

    fn clear(&mut self) {
        self.brackets.clear();
    }
}

pub fn simple(byte: u8) -> u8 {
    match byte {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'b' => 0x08,
        b'f' => 0x0C,
        other => other,
    }
}

fn string<R: Reader + ?Sized>(chain: &mut Chain, reader: &mut R, quote: u8) -> Result<()> {
    loop {
        let byte = need(reader)?;
        match byte {
            b'\\' => match need(reader)? {
                b'u' => escape::rotate(chain, reader, b'\\', simple)?,
                other => chain.push(simple(other))?,
            },
            _ if byte == quote => return Ok(()),
            0..=0x1F => chain.push(LOSSY)?,
            _ => chain.push(byte)?,
        }
    }
}

fn delimits(byte: u8) -> bool {
    matches!(byte, b',' | b'}' | b']' | b':') || is_whitespace(byte)
}

fn literal<R: Reader + ?Sized>(chain: &mut Chain, reader: &mut R, first: u8) -> Result<()> {
    chain.push(first)?;
    while let Some(byte) = reader.peek()? {
        if delimits(byte) {
            break;
        }
        if byte < 0x20 || matches!(byte, b'{' | b'[' | b'"' | b'\'') {
            return Err(Error::unexpected(byte, "literal"));
        }
        reader.advance()?;
        chain.push(byte)?;
    }
    if matches!(first, b'n' | b'N') {
        if !chain.as_bytes().eq_ignore_ascii_case(b"null") {
            return Err(Error::structural(format!("`{chain}` is not a literal")));
        }
        chain.clear();
    }
    Ok(())
}

pub(crate) fn skip<R: Reader + ?Sized>(reader: &mut R, closer: u8) -> Result<()> {
    let mut brackets: Brackets = SmallVec::new();
    brackets.push(closer);
    while let Some(&expected) = brackets.last() {
        let byte = need(reader)?;
        match byte {
            b'{' => brackets.push(b'}'),
            b'[' => brackets.push(b']'),
            b'}' | b']' => {
                if byte != expected {
                    return Err(Error::structural(format!(
                        "`{}` closes a skipped container expecting `{}`",
                        byte as char, expected as char
                    )));
                }
                brackets.pop();
            }
            b'"' | b'\'' => loop {
                match need(reader)? {
                    b'\\' => {
                        need(reader)?;
                    }
                    quote if quote == byte => break,
                    _ => {}
                }
            },
            _ => {}
        }
    }
    Ok(())
}
