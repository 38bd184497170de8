use log::trace;
use parking_lot::Mutex;

use crate::constants::BUCKET_DEPTH;

#[derive(Debug)]
pub struct Bucket {
    class: usize,
    depth: usize,
    stack: Mutex<Vec<Vec<u8>>>,
}

impl Bucket {
    pub fn new(class: usize) -> Self {
        Self::with_depth(class, BUCKET_DEPTH)
    }

    pub fn with_depth(class: usize, depth: usize) -> Self {
        Self {
            class,
            depth,
            stack: Mutex::new(Vec::with_capacity(depth)),
        }
    }

    pub fn class(&self) -> usize {
        self.class
    }

    pub fn store(&self, mut buf: Vec<u8>) -> bool {
        if buf.capacity() < self.class {
            return false;
        }
        let mut stack = self.stack.lock();
        if stack.len() >= self.depth {
            return false;
        }
        buf.clear();
        stack.push(buf);
        true
    }

    pub fn take(&self, min: usize) -> Vec<u8> {
        {
            let mut stack = self.stack.lock();
            if let Some(pos) = stack.iter().rposition(|buf| buf.capacity() >= min) {
                return stack.swap_remove(pos);
            }
        }
        trace!("bucket of class {} allocates {} bytes", self.class, min.max(self.class));
        Vec::with_capacity(min.max(self.class))
    }

    pub fn len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.lock().is_empty()
    }
}
