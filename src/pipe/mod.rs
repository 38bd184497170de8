pub mod record;
pub mod registry;
pub mod spider;
pub mod value;

use std::any::Any;
use std::sync::Arc;

use crate::chain::Chain;
use crate::{Error, Result};

pub use record::{Record, RecordBuilder};
pub use registry::Registry;
pub use spider::Spider;
pub use value::ValueBuilder;

/// A finished value handed from a child builder to its parent.
pub type Built = Arc<dyn Any + Send + Sync>;

/// The event sink solvers drive.
pub trait Pipe {
    /// Starts a container; `Ok(false)` means it was declined and the solver
    /// must skip its contents.
    fn open(&mut self, tag: &Chain, key: &Chain) -> Result<bool>;

    fn emit(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()>;

    /// Ends the current container, committing or discarding it. Returns
    /// whether containers remain open.
    fn close(&mut self, commit: bool) -> Result<bool>;

    fn depth(&self) -> usize;
}

/// One node of the construction pipeline.
///
/// Protocol, driven by the parser: `create` once, then any number of
/// `open`/`emit`/`receive`, then `result`, then `destroy` exactly once.
/// `result` may be called repeatedly and yields the same allocation.
pub trait Builder: Send {
    fn create(&mut self, key: &[u8]) -> Result<()>;

    /// Returns a child for a nested container, or `None` to decline it.
    fn open(&mut self, tag: &Chain, key: &Chain) -> Result<Option<Box<dyn Builder>>>;

    fn emit(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()>;

    /// Takes the result of a committed child opened under `key`.
    fn receive(&mut self, key: &[u8], value: Built) -> Result<()>;

    fn result(&mut self) -> Option<Built>;

    fn destroy(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Unattached,
    Created,
    Accepting,
    Destroyed,
}

impl Stage {
    pub fn create(&mut self) -> Result<()> {
        match self {
            Stage::Unattached => {
                *self = Stage::Created;
                Ok(())
            }
            _ => Err(Error::state(format!("create called on a {self:?} builder"))),
        }
    }

    /// Checks that events may be delivered, entering `Accepting`.
    pub fn accept(&mut self) -> Result<()> {
        match self {
            Stage::Created | Stage::Accepting => {
                *self = Stage::Accepting;
                Ok(())
            }
            _ => Err(Error::state(format!("event delivered to a {self:?} builder"))),
        }
    }

    pub fn destroy(&mut self) {
        *self = Stage::Destroyed;
    }
}

/// Unwraps a built value without cloning when it is uniquely owned.
///
/// Hands the value back unchanged if it is not a `T` or is still shared.
pub fn take<T: Any + Send + Sync>(built: Built) -> std::result::Result<T, Built> {
    match built.downcast::<T>() {
        Ok(typed) => Arc::try_unwrap(typed).map_err(|typed| typed as Built),
        Err(other) => Err(other),
    }
}

/// Like [`take`], cloning when the value is shared.
pub fn take_or_clone<T: Any + Send + Sync + Clone>(built: Built) -> Result<T> {
    match built.downcast::<T>() {
        Ok(typed) => Ok(Arc::try_unwrap(typed).unwrap_or_else(|shared| (*shared).clone())),
        Err(_) => Err(Error::Mismatch(std::any::type_name::<T>())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_stage_transitions() {
        let mut stage = Stage::default();
        assert!(stage.accept().is_err());
        stage.create().unwrap();
        assert!(stage.create().is_err());
        stage.accept().unwrap();
        assert_eq!(stage, Stage::Accepting);
        stage.destroy();
        let err = stage.accept().unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[rstest::rstest]
    fn test_take_unique_and_shared() {
        let built: Built = Arc::new(String::from("kraity"));
        assert_eq!(take::<String>(built).unwrap(), "kraity");

        let built: Built = Arc::new(7u32);
        let shared = Arc::clone(&built);
        let back = take::<u32>(built).unwrap_err();
        assert!(Arc::ptr_eq(&back, &shared));
        assert!(take::<String>(back).is_err());
        assert_eq!(take_or_clone::<u32>(shared).unwrap(), 7);
    }

    #[rstest::rstest]
    fn test_take_or_clone_mismatch() {
        let built: Built = Arc::new(1i64);
        assert!(matches!(take_or_clone::<String>(built), Err(Error::Mismatch(_))));
    }
}
