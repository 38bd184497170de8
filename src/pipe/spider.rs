use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;
use smol_str::SmolStr;

use crate::chain::Chain;
use crate::pipe::{take, Builder, Built, Registry, Stage};
use crate::{Error, Result};

pub struct Spider<T> {
    registry: Arc<Registry>,
    target: Option<SmolStr>,
    stage: Stage,
    built: Option<Built>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Spider<T> {
    pub fn new(registry: Arc<Registry>) -> Self {
        let target = registry.name_of::<T>().cloned();
        Self::build(registry, target)
    }

    pub fn with_target(registry: Arc<Registry>, target: impl Into<SmolStr>) -> Self {
        Self::build(registry, Some(target.into()))
    }

    fn build(registry: Arc<Registry>, target: Option<SmolStr>) -> Self {
        Self {
            registry,
            target,
            stage: Stage::Unattached,
            built: None,
            _marker: PhantomData,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.built.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.built.as_ref()?.downcast_ref::<T>()
    }

    pub fn take(&mut self) -> Result<T> {
        let built = self.built.take().ok_or(Error::Empty)?;
        take::<T>(built).map_err(|back| {
            self.built = Some(back);
            Error::state("root value is still shared")
        })
    }
}

impl<T: Any + Send + Sync> Builder for Spider<T> {
    fn create(&mut self, _key: &[u8]) -> Result<()> {
        self.stage.create()
    }

    fn open(&mut self, tag: &Chain, key: &Chain) -> Result<Option<Box<dyn Builder>>> {
        self.stage.accept()?;
        if self.built.is_some() {
            return Err(Error::structural("input holds more than one root value"));
        }
        let name = match &self.target {
            Some(target) => target.as_bytes(),
            None => tag.as_bytes(),
        };
        let child = self.registry.builder(name);
        if child.is_none() {
            debug!("no builder registered for root `{tag}:{key}`");
        }
        Ok(child)
    }

    fn emit(&mut self, tag: &Chain, key: &Chain, _value: &Chain) -> Result<()> {
        self.stage.accept()?;
        debug!("root ignores scalar `{tag}:{key}`");
        Ok(())
    }

    fn receive(&mut self, _key: &[u8], value: Built) -> Result<()> {
        self.stage.accept()?;
        if !value.is::<T>() {
            return Err(Error::Mismatch(type_name::<T>()));
        }
        self.built = Some(value);
        Ok(())
    }

    fn result(&mut self) -> Option<Built> {
        self.built.clone()
    }

    fn destroy(&mut self) {
        self.stage.destroy();
    }
}
