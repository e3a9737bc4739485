use crate::model::Task;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

pub type Observer = Arc<dyn Fn(&[Task]) + Send + Sync>;

/// Registered callbacks, notified in registration order.
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Observer)>>,
}

impl Observers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, observer: Observer) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));

        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Calls every observer with `tasks`. The registry lock is not held during the calls.
    pub fn notify(&self, tasks: &[Task]) {
        let observers: Vec<Observer> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer(tasks);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Handle returned by `subscribe`. Dropping it leaves the observer registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Observers>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregisters the observer. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Observers;
    use crate::model::Task;
    use std::sync::{Arc, Mutex};

    #[test]
    fn notifies_in_registration_order() {
        let observers = Observers::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let calls = Arc::clone(&calls);
            observers.register(Arc::new(move |_tasks: &[Task]| {
                calls.lock().unwrap().push(name);
            }));
        }

        observers.notify(&[]);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let observers = Observers::new();
        let subscription = observers.register(Arc::new(|_tasks: &[Task]| {}));

        assert_eq!(observers.len(), 1);
        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(observers.is_empty());
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let observers = Observers::new();
        let subscription = observers.register(Arc::new(|_tasks: &[Task]| {}));
        drop(observers);

        assert!(!subscription.unsubscribe());
    }
}
