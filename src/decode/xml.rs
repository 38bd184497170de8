use log::debug;
use smallvec::SmallVec;

use crate::chain::Chain;
use crate::constants::{is_whitespace, LOSSY, TAG_MAP, TAG_STRING};
use crate::decode::{escape, need, stamp, unclosed, Format, Scratch, Solver};
use crate::pipe::Pipe;
use crate::reader::Reader;
use crate::{Error, Result};

const ENTITY_LIMIT: usize = 10;

// An element stays pending (its name in the key chain) until a child element
// opens it as `$M` or its close tag emits it as `$s`.
#[derive(Debug, Default)]
pub struct Docx {
    names: Vec<u8>,
    starts: SmallVec<[usize; 16]>,
}

impl Docx {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_name(&mut self, name: &[u8]) {
        self.starts.push(self.names.len());
        self.names.extend_from_slice(name);
    }

    fn top_name(&self) -> Option<&[u8]> {
        self.starts.last().map(|&start| &self.names[start..])
    }

    fn pop_name(&mut self) {
        if let Some(start) = self.starts.pop() {
            self.names.truncate(start);
        }
    }

    fn attach<P: Pipe + ?Sized>(&mut self, tag: &mut Chain, key: &mut Chain, pipe: &mut P) -> Result<bool> {
        stamp(tag, TAG_MAP)?;
        let accepted = pipe.open(tag, key)?;
        if accepted {
            self.push_name(key.as_bytes());
        } else {
            debug!("xml: skipping declined element `{key}`");
        }
        tag.clear();
        key.clear();
        Ok(accepted)
    }

    fn start<R, P>(&mut self, first: u8, scratch: &mut Scratch, reader: &mut R, pipe: &mut P) -> Result<()>
    where
        R: Reader + ?Sized,
        P: Pipe + ?Sized,
    {
        let Scratch { tag, key, value } = scratch;
        if !is_name_byte(first) {
            return Err(Error::unexpected(first, "element name"));
        }
        key.push(first)?;
        let byte = loop {
            let byte = need(reader)?;
            if is_whitespace(byte) {
                break skip_whitespace(reader)?;
            }
            match byte {
                b'>' | b'/' => break byte,
                _ if is_name_byte(byte) => key.push(byte)?,
                _ => return Err(Error::unexpected(byte, "element name")),
            }
        };

        match byte {
            b'>' => return Ok(()),
            b'/' => {
                expect(reader, b">")?;
                stamp(tag, TAG_STRING)?;
                pipe.emit(tag, key, value)?;
                tag.clear();
                key.clear();
                return Ok(());
            }
            _ => {}
        }

        if !self.attach(tag, key, pipe)? {
            return skip(reader, 0, true);
        }
        if collect_attributes(byte, tag, key, value, reader, pipe)? {
            self.pop_name();
            pipe.close(true)?;
        }
        Ok(())
    }
}

impl Solver for Docx {
    fn format(&self) -> Format {
        Format::Xml
    }

    fn solve<R, P>(&mut self, scratch: &mut Scratch, reader: &mut R, pipe: &mut P) -> Result<()>
    where
        R: Reader + ?Sized,
        P: Pipe + ?Sized,
    {
        loop {
            let Some(byte) = reader.advance()? else {
                if !scratch.key.is_empty() {
                    return Err(Error::structural(format!(
                        "element `{}` is not closed",
                        scratch.key
                    )));
                }
                if pipe.depth() != 0 {
                    return Err(unclosed(pipe.depth()));
                }
                return Ok(());
            };

            let pending = !scratch.key.is_empty();
            match byte {
                b'<' => {}
                _ if !pending => continue,
                b'&' => {
                    entity(&mut scratch.value, reader)?;
                    continue;
                }
                _ => {
                    scratch.value.push(byte)?;
                    continue;
                }
            }

            match need(reader)? {
                b'?' => instruction(reader)?,
                b'!' => markup(reader, pending.then_some(&mut scratch.value))?,
                b'/' if pending => {
                    let Scratch { tag, key, value } = &mut *scratch;
                    expect_close(reader, key.as_bytes())?;
                    stamp(tag, TAG_STRING)?;
                    pipe.emit(tag, key, value)?;
                    scratch.clear();
                }
                b'/' => {
                    let name = self
                        .top_name()
                        .ok_or_else(|| Error::structural("closing tag without an open element"))?;
                    expect_close(reader, name)?;
                    self.pop_name();
                    pipe.close(true)?;
                }
                first => {
                    scratch.value.clear();
                    if pending && !self.attach(&mut scratch.tag, &mut scratch.key, pipe)? {
                        skip(reader, 1, true)?;
                        continue;
                    }
                    self.start(first, scratch, reader, pipe)?;
                }
            }
        }
    }

    fn clear(&mut self) {
        self.names.clear();
        self.starts.clear();
    }
}

fn is_name_byte(byte: u8) -> bool {
    !is_whitespace(byte)
        && byte >= 0x20
        && !matches!(byte, b'<' | b'>' | b'/' | b'&' | b'"' | b'\'' | b'=' | b'!' | b'?')
}

fn skip_whitespace<R: Reader + ?Sized>(reader: &mut R) -> Result<u8> {
    loop {
        let byte = need(reader)?;
        if !is_whitespace(byte) {
            return Ok(byte);
        }
    }
}

fn expect<R: Reader + ?Sized>(reader: &mut R, bytes: &[u8]) -> Result<()> {
    for &want in bytes {
        let byte = need(reader)?;
        if byte != want {
            return Err(Error::unexpected(byte, "markup"));
        }
    }
    Ok(())
}

fn expect_close<R: Reader + ?Sized>(reader: &mut R, name: &[u8]) -> Result<()> {
    let mut index = 0;
    loop {
        let mut byte = need(reader)?;
        if is_whitespace(byte) {
            byte = skip_whitespace(reader)?;
            if byte != b'>' {
                return Err(Error::unexpected(byte, "closing tag"));
            }
        }
        if byte == b'>' {
            break;
        }
        if name.get(index) != Some(&byte) {
            return Err(mismatch(name));
        }
        index += 1;
    }
    if index == name.len() {
        Ok(())
    } else {
        Err(mismatch(name))
    }
}

fn mismatch(name: &[u8]) -> Error {
    Error::structural(format!(
        "closing tag does not match `<{}>`",
        String::from_utf8_lossy(name)
    ))
}

/// Gathers `name="value"` pairs of a start tag, emitting each as a scalar.
/// `first` is the first byte after the element name. Returns whether the
/// tag self-closed.
fn collect_attributes<R, P>(
    first: u8,
    tag: &mut Chain,
    key: &mut Chain,
    value: &mut Chain,
    reader: &mut R,
    pipe: &mut P,
) -> Result<bool>
where
    R: Reader + ?Sized,
    P: Pipe + ?Sized,
{
    let mut byte = first;
    loop {
        match byte {
            b'>' => return Ok(false),
            b'/' => {
                expect(reader, b">")?;
                return Ok(true);
            }
            _ => {}
        }

        loop {
            if byte == b'=' {
                break;
            }
            if is_whitespace(byte) {
                byte = skip_whitespace(reader)?;
                if byte != b'=' {
                    return Err(Error::structural(format!("attribute `{key}` has no value")));
                }
                break;
            }
            if !is_name_byte(byte) {
                return Err(Error::unexpected(byte, "attribute name"));
            }
            key.push(byte)?;
            byte = need(reader)?;
        }
        if key.is_empty() {
            return Err(Error::structural("attribute without a name"));
        }

        let quote = skip_whitespace(reader)?;
        if quote != b'"' && quote != b'\'' {
            return Err(Error::unexpected(quote, "attribute value"));
        }
        loop {
            match need(reader)? {
                byte if byte == quote => break,
                b'&' => entity(value, reader)?,
                b'<' => return Err(Error::unexpected(b'<', "attribute value")),
                byte => value.push(byte)?,
            }
        }

        stamp(tag, TAG_STRING)?;
        pipe.emit(tag, key, value)?;
        tag.clear();
        key.clear();
        value.clear();
        byte = skip_whitespace(reader)?;
    }
}

fn entity<R: Reader + ?Sized>(chain: &mut Chain, reader: &mut R) -> Result<()> {
    let mut body: SmallVec<[u8; ENTITY_LIMIT]> = SmallVec::new();
    loop {
        let byte = need(reader)?;
        if byte == b';' {
            break;
        }
        if body.len() == ENTITY_LIMIT || is_whitespace(byte) || matches!(byte, b'<' | b'&') {
            return Err(Error::structural("unterminated entity reference"));
        }
        body.push(byte);
    }
    match body.as_slice() {
        b"lt" => chain.push(b'<'),
        b"gt" => chain.push(b'>'),
        b"amp" => chain.push(b'&'),
        b"quot" => chain.push(b'"'),
        b"apos" => chain.push(b'\''),
        [b'#', ..] => match escape::reference(&body) {
            Some(code) => escape::scalar(chain, code),
            None => chain.push(LOSSY),
        },
        _ => Err(Error::structural(format!(
            "unknown entity `&{};`",
            String::from_utf8_lossy(&body)
        ))),
    }
}

fn instruction<R: Reader + ?Sized>(reader: &mut R) -> Result<()> {
    let mut last = 0u8;
    loop {
        let byte = need(reader)?;
        if byte == b'>' && last == b'?' {
            return Ok(());
        }
        last = byte;
    }
}

fn markup<R: Reader + ?Sized>(reader: &mut R, text: Option<&mut Chain>) -> Result<()> {
    match need(reader)? {
        b'-' => {
            expect(reader, b"-")?;
            let mut run = 0usize;
            loop {
                match need(reader)? {
                    b'-' => run += 1,
                    b'>' if run >= 2 => return Ok(()),
                    _ => run = 0,
                }
            }
        }
        b'[' => {
            expect(reader, b"CDATA[")?;
            let mut sink = text;
            let mut keep = |byte: u8| match sink.as_deref_mut() {
                Some(chain) => chain.push(byte),
                None => Ok(()),
            };
            let mut run = 0usize;
            loop {
                match need(reader)? {
                    b']' => run += 1,
                    b'>' if run >= 2 => {
                        for _ in 2..run {
                            keep(b']')?;
                        }
                        return Ok(());
                    }
                    byte => {
                        for _ in 0..run {
                            keep(b']')?;
                        }
                        run = 0;
                        keep(byte)?;
                    }
                }
            }
        }
        _ => {
            let mut depth = 0usize;
            loop {
                match need(reader)? {
                    b'[' => depth += 1,
                    b']' => depth = depth.saturating_sub(1),
                    b'>' if depth == 0 => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}

pub(crate) fn skip<R: Reader + ?Sized>(reader: &mut R, mut depth: usize, in_tag: bool) -> Result<()> {
    if in_tag && !skip_start(reader)? {
        depth += 1;
    }
    while depth != 0 {
        if need(reader)? != b'<' {
            continue;
        }
        match need(reader)? {
            b'?' => instruction(reader)?,
            b'!' => markup(reader, None)?,
            b'/' => {
                while need(reader)? != b'>' {}
                depth -= 1;
            }
            _ => {
                if !skip_start(reader)? {
                    depth += 1;
                }
            }
        }
    }
    Ok(())
}

fn skip_start<R: Reader + ?Sized>(reader: &mut R) -> Result<bool> {
    let mut last = 0u8;
    loop {
        let byte = need(reader)?;
        match byte {
            b'>' => return Ok(last == b'/'),
            b'"' | b'\'' => while need(reader)? != byte {},
            _ => {}
        }
        last = byte;
    }
}
