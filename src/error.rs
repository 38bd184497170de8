use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    DepthExceeded,
    Io,
    Allocation,
    State,
    PoolExhausted,
    Empty,
    Mismatch,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("structural error: {0}")]
    Structural(String),
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("allocation error: {0}")]
    Allocation(String),
    #[error("illegal builder state: {0}")]
    State(String),
    #[error("no parser became idle within {waited_ms} ms")]
    PoolExhausted { waited_ms: u128 },
    #[error("decode produced no value")]
    Empty,
    #[error("built value is not a `{0}`")]
    Mismatch(&'static str),
}

impl Error {
    pub fn structural(message: impl Into<String>) -> Self {
        Error::Structural(message.into())
    }

    pub fn allocation(message: impl Into<String>) -> Self {
        Error::Allocation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Error::State(message.into())
    }

    pub(crate) fn unexpected(byte: u8, area: &str) -> Self {
        if byte.is_ascii_graphic() {
            Error::Structural(format!("unexpected byte `{}` in {area}", byte as char))
        } else {
            Error::Structural(format!("unexpected byte 0x{byte:02X} in {area}"))
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Structural(_) => ErrorKind::Structural,
            Error::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Error::Io(_) => ErrorKind::Io,
            Error::Allocation(_) => ErrorKind::Allocation,
            Error::State(_) => ErrorKind::State,
            Error::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            Error::Empty => ErrorKind::Empty,
            Error::Mismatch(_) => ErrorKind::Mismatch,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }
}
