//! Refresh signals that pace the detection loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Resolves when the next frame may be processed. Dropping it cancels the wait.
pub type FrameTick = Pin<Box<dyn Future<Output = ()>>>;

pub trait FrameScheduler {
    fn schedule_next(&self) -> FrameTick;
}

/// Ticks on the host's display refresh: the host calls [`ManualScheduler::signal`]
/// once per repaint. Signals raised while no iteration is waiting coalesce into
/// one tick, so the loop never runs faster than the display.
#[derive(Clone)]
pub struct ManualScheduler {
    permits: Arc<Semaphore>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn signal(&self) {
        if self.permits.available_permits() == 0 {
            self.permits.add_permits(1);
        }
    }

    pub fn pending(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        ManualScheduler::new()
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule_next(&self) -> FrameTick {
        let permits = Arc::clone(&self.permits);
        Box::pin(async move {
            if let Ok(permit) = permits.acquire_owned().await {
                permit.forget();
            }
        })
    }
}
