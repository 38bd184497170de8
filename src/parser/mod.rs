pub mod pool;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::bucket::Bucket;
use crate::chain::Chain;
use crate::constants::READER_WINDOW;
use crate::decode::{Docx, Format, Mage, Radar, Scratch, Solver};
use crate::options::{DecodeOptions, ScratchSizing};
use crate::pipe::{Builder, Pipe, Registry, Spider};
use crate::reader::Reader;
use crate::{Error, Result};

pub use pool::{Cluster, Lease};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Size-class buckets a parser draws its scratch allocations from.
#[derive(Debug, Clone)]
pub struct Buckets {
    pub tag: Arc<Bucket>,
    pub key: Arc<Bucket>,
    pub value: Arc<Bucket>,
    /// Windows of [`StreamReader`](crate::reader::StreamReader)s.
    pub window: Arc<Bucket>,
}

impl Buckets {
    pub fn new(sizing: ScratchSizing) -> Self {
        Self {
            tag: Arc::new(Bucket::new(sizing.tag)),
            key: Arc::new(Bucket::new(sizing.key)),
            value: Arc::new(Bucket::new(sizing.value)),
            window: Arc::new(Bucket::new(READER_WINDOW)),
        }
    }
}

impl Default for Buckets {
    fn default() -> Self {
        Self::new(ScratchSizing::default())
    }
}

struct Frame {
    builder: Box<dyn Builder>,
    key: SmallVec<[u8; 24]>,
}

/// Node stack above the caller's root, seen by solvers as a [`Pipe`].
struct Stack<'a> {
    root: &'a mut dyn Builder,
    frames: &'a mut Vec<Frame>,
    range: usize,
}

impl Stack<'_> {
    fn current(&mut self) -> &mut dyn Builder {
        match self.frames.last_mut() {
            Some(frame) => frame.builder.as_mut(),
            None => &mut *self.root,
        }
    }
}

impl Pipe for Stack<'_> {
    fn open(&mut self, tag: &Chain, key: &Chain) -> Result<bool> {
        if self.frames.len() >= self.range {
            return Err(Error::DepthExceeded { limit: self.range });
        }
        let Some(mut builder) = self.current().open(tag, key)? else {
            return Ok(false);
        };
        if let Err(err) = builder.create(key.as_bytes()) {
            builder.destroy();
            return Err(err);
        }
        self.frames.push(Frame {
            builder,
            key: SmallVec::from_slice(key.as_bytes()),
        });
        Ok(true)
    }

    fn emit(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()> {
        self.current().emit(tag, key, value)
    }

    fn close(&mut self, commit: bool) -> Result<bool> {
        let Frame { mut builder, key } = self
            .frames
            .pop()
            .ok_or_else(|| Error::structural("close without an open container"))?;
        let built = if commit { builder.result() } else { None };
        builder.destroy();
        drop(builder);
        if let Some(value) = built {
            self.current().receive(&key, value)?;
        }
        Ok(!self.frames.is_empty())
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// A reusable decode driver owning the scratch chains and solver state.
///
/// `read` may be called any number of times; between calls the parser holds
/// no decode state. A parser is used by one thread at a time.
pub struct Parser {
    id: usize,
    busy: Mutex<bool>,
    /// Id of the [`Cluster`] that lent this parser; `None` for standalone
    /// and transient parsers.
    pub(crate) owner: Option<usize>,
    scratch: Scratch,
    frames: Vec<Frame>,
    radar: Radar,
    mage: Mage,
    docx: Docx,
    buckets: Option<Buckets>,
}

impl Parser {
    pub fn new() -> Self {
        Self::with_scratch(Scratch::new(ScratchSizing::default()), None)
    }

    pub fn with_sizing(sizing: ScratchSizing) -> Self {
        Self::with_scratch(Scratch::new(sizing), None)
    }

    /// Takes the scratch allocations from `buckets`, giving them back on drop.
    pub fn with_buckets(buckets: &Buckets) -> Self {
        let scratch = Scratch::from_parts(
            Chain::from_vec(buckets.tag.take(buckets.tag.class())),
            Chain::from_vec(buckets.key.take(buckets.key.class())),
            Chain::from_vec(buckets.value.take(buckets.value.class())),
        );
        Self::with_scratch(scratch, Some(buckets.clone()))
    }

    fn with_scratch(scratch: Scratch, buckets: Option<Buckets>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            busy: Mutex::new(false),
            owner: None,
            scratch,
            frames: Vec::new(),
            radar: Radar::new(),
            mage: Mage::new(),
            docx: Docx::new(),
            buckets,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    /// Marks the parser busy; `false` if it already was.
    pub fn try_acquire(&self) -> bool {
        let mut busy = self.busy.lock();
        if *busy {
            return false;
        }
        *busy = true;
        true
    }

    /// Marks the parser idle; `false` if it was not busy.
    pub fn release(&self) -> bool {
        std::mem::replace(&mut *self.busy.lock(), false)
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.lock()
    }

    /// Open containers above the root; zero outside `read`.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Decodes one document from `reader` into `root`.
    ///
    /// Whatever the outcome, afterwards the scratch chains are empty, the
    /// reader is closed and every node opened above `root` was destroyed.
    pub fn read<R: Reader + ?Sized>(
        &mut self,
        format: Format,
        reader: &mut R,
        root: &mut dyn Builder,
        options: &DecodeOptions,
    ) -> Result<()> {
        trace!("parser {} starts a {format} decode", self.id);
        self.scratch.apply(options);

        let outcome = match root.create(&[]) {
            Ok(()) => {
                let mut stack = Stack {
                    root,
                    frames: &mut self.frames,
                    range: options.max_depth,
                };
                match format {
                    Format::Kat => self.radar.solve(&mut self.scratch, reader, &mut stack),
                    Format::Json => self.mage.solve(&mut self.scratch, reader, &mut stack),
                    Format::Xml => self.docx.solve(&mut self.scratch, reader, &mut stack),
                }
            }
            Err(err) => Err(err),
        };

        self.scratch.clear();
        self.radar.clear();
        self.mage.clear();
        self.docx.clear();
        reader.close();
        let unwound = self.unwind();

        match &outcome {
            Ok(()) => trace!("parser {} finished a {format} decode", self.id),
            Err(err) => debug!(
                "parser {} failed a {format} decode, {unwound} node(s) rolled back: {err}",
                self.id
            ),
        }
        outcome
    }

    /// Decodes into a fresh [`Spider`] and moves the value out.
    pub fn decode<T, R>(
        &mut self,
        format: Format,
        reader: &mut R,
        registry: &Arc<Registry>,
        options: &DecodeOptions,
    ) -> Result<T>
    where
        T: Any + Send + Sync,
        R: Reader + ?Sized,
    {
        let mut spider = Spider::<T>::new(Arc::clone(registry));
        self.read(format, reader, &mut spider, options)?;
        spider.take()
    }

    fn unwind(&mut self) -> usize {
        let count = self.frames.len();
        while let Some(mut frame) = self.frames.pop() {
            frame.builder.destroy();
        }
        count
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Parser {
    fn drop(&mut self) {
        if let Some(buckets) = self.buckets.take() {
            let scratch = std::mem::take(&mut self.scratch);
            buckets.tag.store(scratch.tag.into_inner());
            buckets.key.store(scratch.key.into_inner());
            buckets.value.store(scratch.value.into_inner());
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("id", &self.id)
            .field("busy", &self.is_busy())
            .field("owner", &self.owner)
            .field("depth", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::pipe::ValueBuilder;
    use crate::reader::SliceReader;

    /// Counts builder lifecycles to check every opened node is destroyed.
    struct Counted {
        inner: ValueBuilder,
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    impl Counted {
        fn boxed(tag: &[u8], created: &Arc<AtomicUsize>, destroyed: &Arc<AtomicUsize>) -> Box<dyn Builder> {
            Box::new(Counted {
                inner: ValueBuilder::for_tag(tag),
                created: Arc::clone(created),
                destroyed: Arc::clone(destroyed),
            })
        }
    }

    impl Builder for Counted {
        fn create(&mut self, key: &[u8]) -> Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.inner.create(key)
        }

        fn open(&mut self, tag: &Chain, key: &Chain) -> Result<Option<Box<dyn Builder>>> {
            self.inner.open(tag, key)?;
            Ok(Some(Counted::boxed(tag.as_bytes(), &self.created, &self.destroyed)))
        }

        fn emit(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()> {
            self.inner.emit(tag, key, value)
        }

        fn receive(&mut self, key: &[u8], value: crate::pipe::Built) -> Result<()> {
            self.inner.receive(key, value)
        }

        fn result(&mut self) -> Option<crate::pipe::Built> {
            self.inner.result()
        }

        fn destroy(&mut self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            self.inner.destroy();
        }
    }

    fn counting_registry(created: &Arc<AtomicUsize>, destroyed: &Arc<AtomicUsize>) -> Arc<Registry> {
        let (created, destroyed) = (Arc::clone(created), Arc::clone(destroyed));
        Arc::new(Registry::new().with_fallback(move |_, tag| Counted::boxed(tag, &created, &destroyed)))
    }

    #[rstest::rstest]
    #[case(Format::Kat, "M{ s:name(kraity) L:tags{ s(a) } }")]
    #[case(Format::Json, r#"{"name":"kraity","tags":["a"]}"#)]
    #[case(Format::Xml, "<M><name>kraity</name><tags a=\"x\"/></M>")]
    fn test_balanced_decode_destroys_every_node(#[case] format: Format, #[case] input: &str) {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&created, &destroyed);

        let mut parser = Parser::new();
        let mut reader = SliceReader::new(input.as_bytes());
        let value: Value = parser
            .decode(format, &mut reader, &registry, &DecodeOptions::default())
            .unwrap();
        assert_eq!(value["name"], json!("kraity"));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(parser.depth(), 0);
        assert!(parser.scratch().is_clear());
        assert!(reader.is_closed());
    }

    #[rstest::rstest]
    fn test_failed_decode_rolls_back_open_nodes() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&created, &destroyed);

        let mut parser = Parser::new();
        let mut reader = SliceReader::new(b"M{ M:a{ M:b{ s:x(1)");
        let err = parser
            .decode::<Value, _>(Format::Kat, &mut reader, &registry, &DecodeOptions::default())
            .unwrap_err();
        assert!(err.is_structural());
        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(destroyed.load(Ordering::SeqCst), 3);
        assert_eq!(parser.depth(), 0);
        assert!(parser.scratch().is_clear());
    }

    #[rstest::rstest]
    fn test_depth_limit_is_enforced_before_open() {
        let mut parser = Parser::new();
        let mut reader = SliceReader::new(b"[[[[1]]]]");
        let options = DecodeOptions::default().with_max_depth(3);
        let err = parser
            .decode::<Value, _>(Format::Json, &mut reader, Registry::global(), &options)
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 3 }));
        assert_eq!(reader.position(), 4);
    }

    #[rstest::rstest]
    fn test_parser_is_reusable() {
        let mut parser = Parser::new();
        for input in [r#"{"a":1}"#, r#"{"a":"#, r#"{"a":2}"#] {
            let mut reader = SliceReader::new(input.as_bytes());
            let outcome = parser.decode::<Value, _>(
                Format::Json,
                &mut reader,
                Registry::global(),
                &DecodeOptions::default(),
            );
            if input.ends_with('}') {
                assert!(outcome.is_ok());
            } else {
                assert!(outcome.is_err());
            }
        }
    }

    #[rstest::rstest]
    fn test_busy_flag() {
        let parser = Parser::new();
        assert!(!parser.release());
        assert!(parser.try_acquire());
        assert!(!parser.try_acquire());
        assert!(parser.is_busy());
        assert!(parser.release());
    }

    #[rstest::rstest]
    fn test_bucket_backed_scratch_is_returned_on_drop() {
        let buckets = Buckets::default();
        let parser = Parser::with_buckets(&buckets);
        assert!(buckets.value.is_empty());
        drop(parser);
        assert_eq!(buckets.tag.len(), 1);
        assert_eq!(buckets.key.len(), 1);
        assert_eq!(buckets.value.len(), 1);

        let again = Parser::with_buckets(&buckets);
        assert!(buckets.value.is_empty());
        drop(again);
    }

    #[rstest::rstest]
    fn test_buckets_debug_shows_size_classes() {
        let buckets = Buckets::new(ScratchSizing {
            tag: 32,
            key: 64,
            value: 128,
        });
        let text = format!("{buckets:?}");
        assert!(text.starts_with("Buckets"));
        assert!(text.contains("class: 128"));
    }

    #[rstest::rstest]
    fn test_empty_input_reports_empty() {
        let mut parser = Parser::new();
        let mut reader = SliceReader::new(b"  ");
        let err = parser
            .decode::<Value, _>(Format::Json, &mut reader, Registry::global(), &DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Empty));
    }
}
