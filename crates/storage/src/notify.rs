use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use labnote_core::ExperimentRecord;

pub type ChangeListener = Box<dyn FnMut(&[ExperimentRecord]) + Send>;

type ListenerMap = BTreeMap<u64, ChangeListener>;

/// Fan-out of full record listings to subscribed listeners.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Arc<Mutex<ListenerMap>>,
    next_id: u64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: ChangeListener) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        lock(&self.listeners).insert(id, listener);
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn has_listeners(&self) -> bool {
        !lock(&self.listeners).is_empty()
    }

    pub fn notify(&self, records: &[ExperimentRecord]) {
        for listener in lock(&self.listeners).values_mut() {
            listener(records);
        }
    }
}

fn lock(listeners: &Mutex<ListenerMap>) -> std::sync::MutexGuard<'_, ListenerMap> {
    listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by `subscribe`. Dropping it detaches the listener.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<ListenerMap>>,
}

impl Subscription {
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Subscription({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dropped_subscription_stops_delivery() {
        let mut notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let subscription = notifier.subscribe(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        notifier.notify(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        subscription.cancel();
        notifier.notify(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!notifier.has_listeners());
    }

    #[test]
    fn every_listener_sees_the_listing() {
        let mut notifier = ChangeNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let a = seen.clone();
        let b = seen.clone();
        let _first = notifier.subscribe(Box::new(move |records| {
            a.fetch_add(records.len() + 1, Ordering::SeqCst);
        }));
        let _second = notifier.subscribe(Box::new(move |records| {
            b.fetch_add(records.len() + 1, Ordering::SeqCst);
        }));
        notifier.notify(&[]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
