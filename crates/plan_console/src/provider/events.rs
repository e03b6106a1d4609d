use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::{EventKind, ProviderEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

/// Typed observer for provider events. Listeners register for one
/// [`EventKind`] and must be removed explicitly with [`EventBus::unsubscribe`].
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ProviderEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    pub fn listener_count_for(&self, kind: EventKind) -> usize {
        self.lock()
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    /// Deliver `event` to every listener registered for its kind, in
    /// registration order.
    pub fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        // Snapshot so a listener may (un)subscribe without deadlocking.
        let targets: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|registration| registration.kind == kind)
            .map(|registration| registration.listener.clone())
            .collect();
        if targets.is_empty() {
            tracing::trace!(?kind, "event emitted with no listeners");
        }
        for listener in targets {
            listener(&event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        // A panicking listener cannot leave the list half-updated.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One listener per event kind, all forwarding into a single ordered channel.
/// Dropping the guard detaches all of them.
pub struct ListenerGuard<'a> {
    bus: &'a EventBus,
    ids: Vec<ListenerId>,
}

impl<'a> ListenerGuard<'a> {
    pub fn attach(bus: &'a EventBus) -> (Self, mpsc::UnboundedReceiver<ProviderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ids = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = tx.clone();
                bus.subscribe(kind, move |event| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();
        (Self { bus, ids }, rx)
    }
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.unsubscribe(id);
        }
        tracing::trace!(remaining = self.bus.listener_count(), "stream listeners detached");
    }
}
