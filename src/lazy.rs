use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::Result;

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// One-time initialised, shared, read-only value.
///
/// Racing first callers are serialised on the mutex; only one of them runs the
/// loader and every caller receives the same `Arc`. A failed load leaves the slot
/// empty so the next call tries again.
pub struct LazyHandle<T> {
    name: String,
    /// `None` for handles created already initialised
    loader: Option<Loader<T>>,
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> LazyHandle<T> {
    pub fn new(name: impl Into<String>, loader: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            loader: Some(Box::new(loader)),
            slot: Mutex::new(None),
        }
    }

    /// Handle that is already initialised with `value`
    pub fn ready(name: impl Into<String>, value: Arc<T>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            slot: Mutex::new(Some(value)),
        }
    }

    /// Get the value, running the loader on first use
    pub fn get(&self) -> Result<Arc<T>> {
        // The lock is held across the load so racing callers wait for it
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }

        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| crate::RecognitionError::NotLoaded(format!("{} has no loader", self.name)))?;
        info!(handle = %self.name, "initialising");
        let value = Arc::new(loader()?);
        *guard = Some(value.clone());
        debug!(handle = %self.name, "initialised");
        Ok(value)
    }

    /// The value if it has been loaded already; never triggers a load
    pub fn peek(&self) -> Option<Arc<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.peek().is_some()
    }
}

impl<T> std::fmt::Debug for LazyHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyHandle")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
