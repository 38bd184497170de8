use crate::chain::Chain;
use crate::constants::LOSSY;
use crate::decode::need;
use crate::reader::Reader;
use crate::{Error, Result};

const HIGH: std::ops::RangeInclusive<u32> = 0xD800..=0xDBFF;
const LOW: std::ops::RangeInclusive<u32> = 0xDC00..=0xDFFF;

pub fn rotate<R: Reader + ?Sized>(
    chain: &mut Chain,
    reader: &mut R,
    marker: u8,
    simple: fn(u8) -> u8,
) -> Result<()> {
    let unit = quad(reader)?;
    if LOW.contains(&unit) {
        return chain.push(LOSSY);
    }
    if !HIGH.contains(&unit) {
        return scalar(chain, unit);
    }

    if reader.peek()? != Some(marker) {
        return chain.push(LOSSY);
    }
    reader.advance()?;
    let code = need(reader)?;
    if code != b'u' {
        chain.push(LOSSY)?;
        return chain.push(simple(code));
    }

    let low = quad(reader)?;
    if LOW.contains(&low) {
        let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
        return scalar(chain, combined);
    }
    chain.push(LOSSY)?;
    if HIGH.contains(&low) {
        return chain.push(LOSSY);
    }
    scalar(chain, low)
}

pub fn scalar(chain: &mut Chain, code: u32) -> Result<()> {
    match char::from_u32(code) {
        Some(ch) => {
            let mut buf = [0u8; 4];
            chain.extend(ch.encode_utf8(&mut buf).as_bytes())
        }
        None => chain.push(LOSSY),
    }
}

pub fn hex(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some(u32::from(byte - b'0')),
        b'a'..=b'f' => Some(u32::from(byte - b'a' + 10)),
        b'A'..=b'F' => Some(u32::from(byte - b'A' + 10)),
        _ => None,
    }
}

fn quad<R: Reader + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut unit = 0u32;
    for _ in 0..4 {
        let byte = need(reader)?;
        let digit = hex(byte).ok_or_else(|| Error::unexpected(byte, "unicode escape"))?;
        unit = (unit << 4) | digit;
    }
    Ok(unit)
}

pub fn reference(body: &[u8]) -> Option<u32> {
    let digits = body.strip_prefix(b"#")?;
    let (radix, digits) = match digits.first() {
        Some(b'x') | Some(b'X') => (16, &digits[1..]),
        _ => (10, digits),
    };
    if digits.is_empty() {
        return None;
    }
    let mut code = 0u32;
    for &byte in digits {
        let digit = if radix == 16 {
            hex(byte)?
        } else if byte.is_ascii_digit() {
            u32::from(byte - b'0')
        } else {
            return None;
        };
        code = code.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(code)
}
