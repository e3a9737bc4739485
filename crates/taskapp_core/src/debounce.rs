//! Single-slot deferred job: scheduling replaces whatever was pending.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `job` once `delay` has passed without another call to `schedule`.
    ///
    /// Outside a tokio runtime the job runs immediately.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.take() {
            pending.abort();
        }

        match Handle::try_current() {
            Ok(handle) => {
                let delay = self.delay;
                *slot = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    job();
                }));
            }
            Err(_) => {
                drop(slot);
                job();
            }
        }
    }

    /// Drops the pending job, if any. Returns whether one was still waiting.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            Some(pending) => {
                let waiting = !pending.is_finished();
                pending.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|pending| !pending.is_finished())
    }
}
