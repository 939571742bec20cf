//! Load-once access to the landmark detector.

use std::cell::Cell;
use std::rc::Rc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ModelLoadError;
use crate::pipeline::detector::DetectorFactory;

type LoadResult<D> = Result<Rc<D>, ModelLoadError>;

/// Caches the outcome of the first load, success or failure. Callers arriving
/// while a load is in flight wait for it and share its result. A cached
/// failure is only cleared by [`ModelLoader::retry`].
pub struct ModelLoader<F: DetectorFactory> {
    factory: F,
    slot: Mutex<Option<LoadResult<F::Detector>>>,
    attempts: Cell<usize>,
}

impl<F: DetectorFactory> ModelLoader<F> {
    pub fn new(factory: F) -> Self {
        ModelLoader {
            factory,
            slot: Mutex::new(None),
            attempts: Cell::new(0),
        }
    }

    pub async fn load(&self) -> LoadResult<F::Detector> {
        let mut slot = self.slot.lock().await;
        if let Some(result) = slot.as_ref() {
            return result.clone();
        }

        self.attempts.set(self.attempts.get() + 1);
        info!(attempt = self.attempts.get(), "loading landmark model");
        let result = self.factory.load().await.map(Rc::new);
        if let Err(e) = &result {
            warn!("landmark model failed to load: {e}");
        }
        *slot = Some(result.clone());
        result
    }

    /// Forgets a cached failure so the next `load` tries again. A loaded detector is kept.
    pub async fn retry(&self) {
        let mut slot = self.slot.lock().await;
        if matches!(slot.as_ref(), Some(Err(_))) {
            *slot = None;
        }
    }

    /// True when the last load failed and has not been retried.
    pub async fn has_failed(&self) -> bool {
        matches!(self.slot.lock().await.as_ref(), Some(Err(_)))
    }

    /// Number of times the factory has been invoked.
    pub fn attempts(&self) -> usize {
        self.attempts.get()
    }
}
