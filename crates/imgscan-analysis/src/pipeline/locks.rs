//! Per-image run locks. Same-image runs serialize; distinct images proceed
//! in parallel.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use imgscan_core::errors::PipelineError;
use imgscan_core::traits::Cancellable;
use imgscan_core::types::{FxHashSet, ImageId};

/// Upper bound on a single condvar wait so cancellation is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
pub struct ImageLocks {
    held: Mutex<FxHashSet<ImageId>>,
    released: Condvar,
}

/// Releases the image lock on drop.
pub struct ImageLockGuard<'a> {
    locks: &'a ImageLocks,
    image_id: ImageId,
}

impl ImageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, FxHashSet<ImageId>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait up to `timeout` for exclusive use of `id`.
    pub fn acquire(
        &self,
        id: &ImageId,
        timeout: Duration,
        cancel: &dyn Cancellable,
    ) -> Result<ImageLockGuard<'_>, PipelineError> {
        let start = Instant::now();
        let mut held = self.held();
        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            if !held.contains(id) {
                held.insert(id.clone());
                return Ok(ImageLockGuard {
                    locks: self,
                    image_id: id.clone(),
                });
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(PipelineError::LockTimeout {
                    image_id: id.to_string(),
                    waited,
                });
            }
            let wait = (timeout - waited).min(POLL_INTERVAL);
            held = match self.released.wait_timeout(held, wait) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    pub fn is_held(&self, id: &ImageId) -> bool {
        self.held().contains(id)
    }
}

impl ImageLockGuard<'_> {
    pub fn image_id(&self) -> &ImageId {
        &self.image_id
    }
}

impl Drop for ImageLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held().remove(&self.image_id);
        self.locks.released.notify_all();
    }
}
