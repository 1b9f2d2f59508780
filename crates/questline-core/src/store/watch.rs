//! Watch registrations over the shared tree.
//!
//! A watch fires immediately with the current value at its path, then
//! once per overlapping mutation. The registration lives exactly as long
//! as its [`WatchHandle`]: dropping the handle tears it down, so a
//! session cannot leak listeners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::tree;

struct Watcher {
    segments: Vec<String>,
    tx: UnboundedSender<Option<Value>>,
}

#[derive(Default)]
pub(crate) struct WatchHub {
    inner: Mutex<HubInner>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    watchers: HashMap<u64, Watcher>,
}

impl WatchHub {
    pub(crate) fn register(
        hub: &Arc<WatchHub>,
        segments: &[&str],
        current: Option<Value>,
    ) -> WatchHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        // Immediate fire with the value at registration time.
        let _ = tx.send(current);
        let id = {
            let mut inner = hub.locked();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.watchers.insert(
                id,
                Watcher {
                    segments: segments.iter().map(|s| s.to_string()).collect(),
                    tx,
                },
            );
            id
        };
        WatchHandle {
            rx,
            _guard: WatchGuard {
                hub: Arc::downgrade(hub),
                id,
            },
        }
    }

    /// Re-sends the value at each watcher whose path overlaps `changed`.
    /// Watchers whose receivers are gone are dropped here.
    pub(crate) fn notify(&self, root: &Value, changed: &[&str]) {
        let mut inner = self.locked();
        inner.watchers.retain(|_, watcher| {
            if !overlaps(&watcher.segments, changed) {
                return true;
            }
            let segments: Vec<&str> = watcher.segments.iter().map(String::as_str).collect();
            let value = tree::get(root, &segments).cloned();
            watcher.tx.send(value).is_ok()
        });
    }

    fn unregister(&self, id: u64) {
        self.locked().watchers.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.locked().watchers.len()
    }

    fn locked(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Paths overlap when either is a prefix of the other.
fn overlaps(a: &[String], b: &[&str]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Live view of a store path.
///
/// The first received value is the immediate fire; each further value
/// reflects an overlapping mutation. `None` at a path means the path is
/// absent.
pub struct WatchHandle {
    rx: UnboundedReceiver<Option<Value>>,
    _guard: WatchGuard,
}

impl WatchHandle {
    /// Next value at the watched path. Returns `None` once the store side
    /// is gone.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<Option<Value>> {
        self.rx.try_recv().ok()
    }
}

struct WatchGuard {
    hub: Weak<WatchHub>,
    id: u64,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registration_fires_immediately() {
        let hub = Arc::new(WatchHub::default());
        let mut handle = WatchHub::register(&hub, &["a", "b"], Some(json!(1)));
        assert_eq!(handle.try_next(), Some(Some(json!(1))));
        assert_eq!(handle.try_next(), None);
    }

    #[test]
    fn notify_reaches_overlapping_watchers_both_directions() {
        let hub = Arc::new(WatchHub::default());
        let root = json!({ "scope": { "child": 7 } });

        let mut on_scope = WatchHub::register(&hub, &["scope"], None);
        let mut on_child = WatchHub::register(&hub, &["scope", "child"], None);
        let mut elsewhere = WatchHub::register(&hub, &["other"], None);
        on_scope.try_next();
        on_child.try_next();
        elsewhere.try_next();

        hub.notify(&root, &["scope", "child"]);
        assert_eq!(on_scope.try_next(), Some(Some(json!({ "child": 7 }))));
        assert_eq!(on_child.try_next(), Some(Some(json!(7))));
        assert_eq!(elsewhere.try_next(), None);

        hub.notify(&root, &["scope"]);
        assert_eq!(on_child.try_next(), Some(Some(json!(7))));
    }

    #[test]
    fn notify_sends_none_for_absent_paths() {
        let hub = Arc::new(WatchHub::default());
        let mut handle = WatchHub::register(&hub, &["gone"], None);
        handle.try_next();
        hub.notify(&json!({}), &["gone"]);
        assert_eq!(handle.try_next(), Some(None));
    }

    #[test]
    fn dropping_the_handle_unregisters() {
        let hub = Arc::new(WatchHub::default());
        let handle = WatchHub::register(&hub, &["a"], None);
        assert_eq!(hub.watcher_count(), 1);
        drop(handle);
        assert_eq!(hub.watcher_count(), 0);
    }
}
