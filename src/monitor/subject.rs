//! Observers and the re-scoping subject.

use super::{Event, MonitorPath};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Receives monitor events.
pub trait Observer: Send + Sync {
    /// Handle one event.
    fn on_next(&self, event: &Event);
}

/// Forward events into a channel. A disconnected receiver drops them.
impl Observer for Sender<Event> {
    fn on_next(&self, event: &Event) {
        let _ = self.send(event.clone());
    }
}

/// Fans events out to weakly held observers, prefixing each with its scope.
///
/// A subject is itself an [`Observer`], so a child subject subscribed to a
/// parent forwards through both scopes.
pub struct Subject {
    /// Scope prepended to every forwarded event.
    path: MonitorPath,
    /// Subscribers. Dead entries are pruned on publish.
    observers: Mutex<Vec<Weak<dyn Observer>>>,
}

impl Subject {
    /// Create a subject scoped at `path` (empty forwards events unchanged).
    pub fn new(path: impl Into<MonitorPath>) -> Self {
        Self {
            path: path.into(),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Scope of this subject.
    #[inline]
    pub const fn path(&self) -> &MonitorPath {
        &self.path
    }

    /// Subscribe an observer. The subject does not keep it alive.
    pub fn subscribe<O: Observer + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn Observer> = weak;
        self.lock().push(weak);
    }

    /// Remove an observer.
    pub fn unsubscribe<O: Observer + 'static>(&self, observer: &Arc<O>) {
        let target = Arc::as_ptr(observer).cast::<()>();
        self.lock()
            .retain(|weak| weak.as_ptr().cast::<()>() != target);
    }

    /// Number of live subscribers.
    pub fn observer_count(&self) -> usize {
        self.lock().iter().filter(|weak| weak.strong_count() > 0).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<dyn Observer>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Observer for Subject {
    fn on_next(&self, event: &Event) {
        let live: Vec<Arc<dyn Observer>> = {
            let mut observers = self.lock();
            observers.retain(|weak| weak.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        if live.is_empty() {
            return;
        }

        // Observers run without the lock held so they may re-subscribe.
        if self.path.is_empty() {
            live.iter().for_each(|observer| observer.on_next(event));
        } else {
            let scoped = event.propagate(&self.path);
            live.iter().for_each(|observer| observer.on_next(&scoped));
        }
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new(MonitorPath::new())
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("path", &self.path)
            .field("observers", &self.observer_count())
            .finish()
    }
}
