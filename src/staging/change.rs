//! Change-name sets and the notification substrate
//!
//! A [`ChangeSet`] is the explicit record of which fields moved during an
//! edit or a promotion. It is passed through the apply pipeline by value
//! instead of being collected from global property-changed callbacks.
//!
//! [`FieldNotifier`] delivers field-name batches to subscribers. While a
//! [`ChangeBatch`] guard is alive, names accumulate; releasing the last guard
//! fires them once as a single batch.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Set of changed field names
///
/// Names are unique and iterate in sorted order so diagnostics are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    names: BTreeSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field name. Returns false if it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.names.insert(name.into());
        }
    }

    /// Merge another set into this one
    pub fn union(&mut self, other: &ChangeSet) {
        self.names.extend(other.names.iter().cloned());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ChangeSet::new();
        set.extend(iter);
        set
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

// Process-wide so an id never matches a subscription on another source
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Typed event fan-out
///
/// Callbacks run in subscription order on the emitting thread. The
/// subscriber list is copied before dispatch so a callback may subscribe or
/// unsubscribe without deadlocking.
pub struct EventSource<E> {
    subscribers: Mutex<Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E> EventSource<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<E> Default for EventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct SuspendState {
    depth: usize,
    pending: ChangeSet,
}

/// Field-changed notification source with batch suspension
#[derive(Default)]
pub struct FieldNotifier {
    events: EventSource<ChangeSet>,
    state: Mutex<SuspendState>,
}

impl FieldNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Report one changed field
    pub fn notify(&self, name: &str) {
        {
            let mut state = self.state.lock();
            if state.depth > 0 {
                state.pending.insert(name);
                return;
            }
        }

        let mut single = ChangeSet::new();
        single.insert(name);
        self.events.emit(&single);
    }

    /// Report a set of changed fields
    ///
    /// Outside a batch the whole set is delivered as one notification.
    pub fn notify_all(&self, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.depth > 0 {
                state.pending.union(changes);
                return;
            }
        }
        self.events.emit(changes);
    }

    /// Suspend delivery until the returned guard is released
    pub fn suspend(&self) -> ChangeBatch<'_> {
        self.state.lock().depth += 1;
        ChangeBatch {
            notifier: self,
            released: false,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.state.lock().depth > 0
    }

    fn release(&self) -> ChangeSet {
        let fired = {
            let mut state = self.state.lock();
            state.depth = state.depth.saturating_sub(1);
            if state.depth > 0 {
                return ChangeSet::new();
            }
            std::mem::take(&mut state.pending)
        };

        if !fired.is_empty() {
            self.events.emit(&fired);
        }
        fired
    }
}

/// Scoped accumulator for field notifications
///
/// Dropping the outermost batch fires every accumulated name once.
pub struct ChangeBatch<'a> {
    notifier: &'a FieldNotifier,
    released: bool,
}

impl ChangeBatch<'_> {
    /// Release the batch now and return the names that were fired
    ///
    /// A nested batch returns an empty set; the outermost one fires.
    pub fn finish(mut self) -> ChangeSet {
        self.released = true;
        self.notifier.release()
    }
}

impl Drop for ChangeBatch<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.notifier.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(notifier: &FieldNotifier) -> Arc<Mutex<Vec<ChangeSet>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        notifier.subscribe(move |changes| sink.lock().push(changes.clone()));
        seen
    }

    #[test]
    fn test_change_set_dedupes_and_sorts() {
        let mut set = ChangeSet::new();
        assert!(set.insert("rate"));
        assert!(set.insert("model"));
        assert!(!set.insert("rate"));

        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), vec!["model".to_string(), "rate".to_string()]);
        assert_eq!(set.to_string(), "[model, rate]");
    }

    #[test]
    fn test_notify_outside_batch_fires_immediately() {
        let notifier = FieldNotifier::new();
        let seen = recorder(&notifier);

        notifier.notify("rate");
        notifier.notify("rate");

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_batch_coalesces_into_single_delivery() {
        let notifier = FieldNotifier::new();
        let seen = recorder(&notifier);

        let batch = notifier.suspend();
        notifier.notify("rate");
        notifier.notify("enabled");
        notifier.notify("rate");
        assert!(seen.lock().is_empty());

        let fired = batch.finish();
        assert_eq!(fired.len(), 2);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("rate"));
        assert!(seen[0].contains("enabled"));
    }

    #[test]
    fn test_nested_batches_fire_on_outermost_release() {
        let notifier = FieldNotifier::new();
        let seen = recorder(&notifier);

        let outer = notifier.suspend();
        {
            let inner = notifier.suspend();
            notifier.notify("rate");
            assert!(inner.finish().is_empty());
        }
        assert!(seen.lock().is_empty());
        assert!(notifier.is_suspended());

        drop(outer);
        assert_eq!(seen.lock().len(), 1);
        assert!(!notifier.is_suspended());
    }

    #[test]
    fn test_empty_batch_fires_nothing() {
        let notifier = FieldNotifier::new();
        let seen = recorder(&notifier);

        drop(notifier.suspend());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let source: EventSource<u32> = EventSource::new();
        let count = Arc::new(AtomicU64::new(0));
        let sink = count.clone();
        let id = source.subscribe(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        source.emit(&1);
        assert!(source.unsubscribe(id));
        assert!(!source.unsubscribe(id));
        source.emit(&2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscriber_count(), 0);
    }
}
