use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::options::{PoolOptions, ScratchSizing};
use crate::parser::{Buckets, Parser};
use crate::{Error, Result};

static NEXT_CLUSTER: AtomicUsize = AtomicUsize::new(1);

struct Slots {
    free: Vec<Parser>,
    /// Pooled parsers alive, idle or leased.
    grow: usize,
}

pub struct Cluster {
    id: usize,
    options: PoolOptions,
    buckets: Buckets,
    slots: Mutex<Slots>,
    idle: Condvar,
}

impl Cluster {
    pub fn new(options: PoolOptions) -> Self {
        Self::with_sizing(options, ScratchSizing::default())
    }

    pub fn with_sizing(options: PoolOptions, sizing: ScratchSizing) -> Self {
        Self {
            id: NEXT_CLUSTER.fetch_add(1, Ordering::Relaxed),
            slots: Mutex::new(Slots {
                free: Vec::with_capacity(options.capacity),
                grow: 0,
            }),
            idle: Condvar::new(),
            buckets: Buckets::new(sizing),
            options,
        }
    }

    /// The process-wide pool with default options.
    pub fn global() -> &'static Cluster {
        static GLOBAL: OnceLock<Cluster> = OnceLock::new();
        GLOBAL.get_or_init(|| Cluster::new(PoolOptions::default()))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Idle parsers ready to be borrowed.
    pub fn idle(&self) -> usize {
        self.slots.lock().free.len()
    }

    /// Pooled parsers alive.
    pub fn size(&self) -> usize {
        self.slots.lock().grow
    }

    /// Takes an idle parser, creating one while below capacity.
    ///
    /// At capacity, a blocking pool waits for a parser to come back (up to
    /// `timeout`, in `wait_slice` steps); a non-blocking pool hands out a
    /// transient parser that is dropped on return.
    pub fn borrow(&self) -> Result<Parser> {
        let started = Instant::now();
        let mut slots = self.slots.lock();
        loop {
            while let Some(parser) = slots.free.pop() {
                if parser.try_acquire() {
                    return Ok(parser);
                }
                warn!("parser {} was busy in the free list, dropping it", parser.id());
                slots.grow = slots.grow.saturating_sub(1);
            }

            if slots.grow < self.options.capacity {
                slots.grow += 1;
                let size = slots.grow;
                drop(slots);
                debug!("cluster grows to {size} parser(s)");
                return Ok(self.fresh(true));
            }

            if !self.options.block {
                drop(slots);
                debug!("cluster is at capacity, handing out a transient parser");
                return Ok(self.fresh(false));
            }

            let waited = started.elapsed();
            if waited >= self.options.timeout {
                warn!("no parser came back within {waited:?}");
                return Err(Error::PoolExhausted {
                    waited_ms: waited.as_millis(),
                });
            }
            let slice = self.options.wait_slice.min(self.options.timeout - waited);
            self.idle.wait_for(&mut slots, slice);
        }
    }

    fn fresh(&self, pooled: bool) -> Parser {
        let mut parser = Parser::with_buckets(&self.buckets);
        parser.owner = pooled.then_some(self.id);
        parser.try_acquire();
        parser
    }

    /// Gives a borrowed parser back.
    ///
    /// Only parsers this cluster lent are kept; anything else is dropped.
    pub fn retreat(&self, parser: Parser) {
        match parser.owner {
            None => {
                debug!("dropping transient parser {}", parser.id());
                return;
            }
            Some(owner) if owner != self.id => {
                warn!(
                    "parser {} was lent by cluster {owner}, not {}, dropping it",
                    parser.id(),
                    self.id
                );
                return;
            }
            Some(_) => {}
        }
        let mut slots = self.slots.lock();
        if !parser.release() {
            warn!("parser {} came back idle, dropping it", parser.id());
            slots.grow = slots.grow.saturating_sub(1);
        } else if slots.free.len() >= self.options.capacity {
            warn!("free list is full, dropping parser {}", parser.id());
            slots.grow = slots.grow.saturating_sub(1);
        } else {
            slots.free.push(parser);
        }
        drop(slots);
        self.idle.notify_one();
    }

    /// Borrows a parser that goes back to the pool when the lease drops.
    pub fn lease(&self) -> Result<Lease<'_>> {
        Ok(Lease {
            cluster: self,
            parser: Some(self.borrow()?),
        })
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("idle", &slots.free.len())
            .field("size", &slots.grow)
            .finish()
    }
}

/// A borrowed parser; returns itself to its [`Cluster`] on drop.
pub struct Lease<'a> {
    cluster: &'a Cluster,
    parser: Option<Parser>,
}

impl Lease<'_> {
    /// Detaches the parser from the lease; the caller must `retreat` it.
    pub fn into_inner(mut self) -> Parser {
        match self.parser.take() {
            Some(parser) => parser,
            None => unreachable!("lease holds its parser until dropped"),
        }
    }
}

impl Deref for Lease<'_> {
    type Target = Parser;

    fn deref(&self) -> &Parser {
        match &self.parser {
            Some(parser) => parser,
            None => unreachable!("lease holds its parser until dropped"),
        }
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut Parser {
        match &mut self.parser {
            Some(parser) => parser,
            None => unreachable!("lease holds its parser until dropped"),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(parser) = self.parser.take() {
            self.cluster.retreat(parser);
        }
    }
}
