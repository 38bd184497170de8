use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 64;

pub const TAG_CAPACITY: usize = 256;
pub const KEY_CAPACITY: usize = 512;
pub const VALUE_CAPACITY: usize = 8192;

pub const CHAIN_INITIAL: usize = 0x80;

pub const POOL_CAPACITY: usize = 16;
pub const POOL_WAIT_SLICE: Duration = Duration::from_millis(1000);
pub const POOL_TIMEOUT: Duration = Duration::from_secs(30);

pub const BUCKET_DEPTH: usize = 16;
pub const READER_WINDOW: usize = 4096;

pub const LOSSY: u8 = b'?';

pub const TAG_MAP: &[u8] = b"$M";
pub const TAG_LIST: &[u8] = b"$L";
pub const TAG_STRING: &[u8] = b"$s";
pub const TAG_RAW: &[u8] = b"$";

#[inline]
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
