use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_MAX_DEPTH, KEY_CAPACITY, POOL_CAPACITY, POOL_TIMEOUT, POOL_WAIT_SLICE, TAG_CAPACITY,
    VALUE_CAPACITY,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub max_depth: usize,
    pub tag_limit: Option<usize>,
    pub key_limit: Option<usize>,
    pub value_limit: Option<usize>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_tag_limit(mut self, limit: Option<usize>) -> Self {
        self.tag_limit = limit;
        self
    }

    pub fn with_key_limit(mut self, limit: Option<usize>) -> Self {
        self.key_limit = limit;
        self
    }

    pub fn with_value_limit(mut self, limit: Option<usize>) -> Self {
        self.value_limit = limit;
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            tag_limit: Some(TAG_CAPACITY),
            key_limit: None,
            value_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub capacity: usize,
    pub block: bool,
    pub wait_slice: Duration,
    pub timeout: Duration,
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn with_wait_slice(mut self, wait_slice: Duration) -> Self {
        self.wait_slice = wait_slice;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            capacity: POOL_CAPACITY,
            block: true,
            wait_slice: POOL_WAIT_SLICE,
            timeout: POOL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchSizing {
    pub tag: usize,
    pub key: usize,
    pub value: usize,
}

impl Default for ScratchSizing {
    fn default() -> Self {
        Self {
            tag: TAG_CAPACITY,
            key: KEY_CAPACITY,
            value: VALUE_CAPACITY,
        }
    }
}
