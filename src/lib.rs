pub mod bucket;
pub mod chain;
pub mod constants;
pub mod decode;
pub mod error;
pub mod options;
pub mod parser;
pub mod pipe;
pub mod reader;

use std::any::Any;
use std::io::Read;
use std::sync::Arc;

use serde_json::Value;

pub use crate::chain::Chain;
pub use crate::decode::Format;
pub use crate::error::{Error, ErrorKind};
pub use crate::options::{DecodeOptions, PoolOptions, ScratchSizing};
pub use crate::parser::{Cluster, Lease, Parser};
pub use crate::pipe::{Builder, Built, Record, RecordBuilder, Registry, Spider, ValueBuilder};
pub use crate::reader::{Reader, SliceReader, StreamReader};

pub type Result<T> = std::result::Result<T, Error>;

pub fn from_slice<T: Any + Send + Sync>(
    format: Format,
    input: &[u8],
    registry: &Arc<Registry>,
) -> Result<T> {
    from_slice_with_options(format, input, registry, &DecodeOptions::default())
}

pub fn from_slice_with_options<T: Any + Send + Sync>(
    format: Format,
    input: &[u8],
    registry: &Arc<Registry>,
    options: &DecodeOptions,
) -> Result<T> {
    let mut reader = SliceReader::new(input);
    Cluster::global()
        .lease()?
        .decode(format, &mut reader, registry, options)
}

pub fn from_str<T: Any + Send + Sync>(
    format: Format,
    input: &str,
    registry: &Arc<Registry>,
) -> Result<T> {
    from_slice(format, input.as_bytes(), registry)
}

pub fn from_reader<T: Any + Send + Sync, R: Read>(
    format: Format,
    reader: R,
    registry: &Arc<Registry>,
) -> Result<T> {
    from_reader_with_options(format, reader, registry, &DecodeOptions::default())
}

pub fn from_reader_with_options<T: Any + Send + Sync, R: Read>(
    format: Format,
    reader: R,
    registry: &Arc<Registry>,
    options: &DecodeOptions,
) -> Result<T> {
    let cluster = Cluster::global();
    let mut reader = StreamReader::with_bucket(reader, Arc::clone(&cluster.buckets().window));
    cluster
        .lease()?
        .decode(format, &mut reader, registry, options)
}

pub fn to_value(format: Format, input: &[u8]) -> Result<Value> {
    to_value_with_options(format, input, &DecodeOptions::default())
}

pub fn to_value_with_options(format: Format, input: &[u8], options: &DecodeOptions) -> Result<Value> {
    from_slice_with_options(format, input, Registry::global(), options)
}
