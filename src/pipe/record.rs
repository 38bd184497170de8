use std::any::type_name;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;

use crate::chain::Chain;
use crate::pipe::{Builder, Built, Registry, Stage};
use crate::{Error, Result};

/// A type the decoder can fill in directly.
///
/// `accept` receives scalar fields; `explore` decides whether a nested
/// container is built (usually by asking the registry) or skipped; `receive`
/// takes the finished nested value.
pub trait Record: Default + Send + Sync + 'static {
    fn accept(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()>;

    fn explore(&self, _tag: &Chain, _key: &Chain, _registry: &Arc<Registry>) -> Option<Box<dyn Builder>> {
        None
    }

    fn receive(&mut self, _key: &[u8], _value: Built) -> Result<()> {
        Ok(())
    }
}

/// Parses a scalar payload, reporting the target type on failure.
pub fn parse<T: FromStr>(value: &Chain) -> Result<T> {
    value
        .as_str()
        .and_then(|text| text.parse().ok())
        .ok_or(Error::Mismatch(type_name::<T>()))
}

pub struct RecordBuilder<T> {
    record: Option<T>,
    registry: Arc<Registry>,
    stage: Stage,
    built: Option<Built>,
}

impl<T: Record> RecordBuilder<T> {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            record: Some(T::default()),
            registry,
            stage: Stage::Unattached,
            built: None,
        }
    }

    fn record(&mut self) -> Result<&mut T> {
        self.stage.accept()?;
        if self.built.is_some() {
            return Err(Error::state(format!(
                "`{}` already produced its result",
                type_name::<T>()
            )));
        }
        self.record
            .as_mut()
            .ok_or_else(|| Error::state("record was already taken"))
    }
}

impl<T: Record> Builder for RecordBuilder<T> {
    fn create(&mut self, _key: &[u8]) -> Result<()> {
        self.stage.create()
    }

    fn open(&mut self, tag: &Chain, key: &Chain) -> Result<Option<Box<dyn Builder>>> {
        let registry = Arc::clone(&self.registry);
        let child = self.record()?.explore(tag, key, &registry);
        if child.is_none() {
            debug!("`{}` declines nested `{tag}:{key}`", type_name::<T>());
        }
        Ok(child)
    }

    fn emit(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()> {
        self.record()?.accept(tag, key, value)
    }

    fn receive(&mut self, key: &[u8], value: Built) -> Result<()> {
        self.record()?.receive(key, value)
    }

    fn result(&mut self) -> Option<Built> {
        if self.built.is_none() {
            let record = self.record.take()?;
            self.built = Some(Arc::new(record));
        }
        self.built.clone()
    }

    fn destroy(&mut self) {
        self.stage.destroy();
        self.record = None;
        self.built = None;
    }
}
