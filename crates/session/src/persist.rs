//! Per-tab persistence of screen state, debounced.
//!
//! [`DebouncedSink`] is the generic coalescer: rapid writes to the same key
//! within one debounce window collapse into a single downstream write of the
//! last value. [`TabPersistence`] binds a screen's snapshot to the tab store
//! through such a sink, and restores the snapshot exactly once on attach.

use crate::tabs::TabSessionStore;
use lis_types::TabKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Reserved field inside the per-tab scratch payload holding the scroll
/// offset of the screen's designated scroll container.
pub const SCROLL_FIELD: &str = "__scroll";

struct Pending<T> {
    value: T,
    generation: u64,
}

/// A `(key, value)` coalescer with trailing-edge debounce.
///
/// Writes are delivered on the tokio runtime after `delay` of quiet time per
/// key; a newer value for the same key supersedes the pending one
/// (last-value-wins). Keys debounce independently.
///
/// Must be used from within a tokio runtime.
pub struct DebouncedSink<T> {
    delay: Duration,
    write: Arc<dyn Fn(&str, T) + Send + Sync>,
    pending: Arc<Mutex<HashMap<String, Pending<T>>>>,
    generation: AtomicU64,
}

impl<T: Clone + Send + 'static> DebouncedSink<T> {
    /// Creates a sink delivering coalesced writes to `write`.
    pub fn new(delay: Duration, write: impl Fn(&str, T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            write: Arc::new(write),
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    fn guard(pending: &Mutex<HashMap<String, Pending<T>>>) -> MutexGuard<'_, HashMap<String, Pending<T>>> {
        pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedules `value` for `key`; supersedes any pending value for the key.
    pub fn push(&self, key: &str, value: T) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        Self::guard(&self.pending).insert(key.to_owned(), Pending { value, generation });

        let pending = Arc::clone(&self.pending);
        let write = Arc::clone(&self.write);
        let key = key.to_owned();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let flushed = {
                let mut pending = Self::guard(&pending);
                // A newer push restarted the window; leave its entry alone.
                match pending.get(&key) {
                    Some(entry) if entry.generation == generation => pending.remove(&key),
                    _ => None,
                }
            };
            if let Some(entry) = flushed {
                write(&key, entry.value);
            }
        });
    }

    /// Writes out all pending values immediately (logout/shutdown path).
    pub fn flush(&self) {
        let drained: Vec<(String, T)> = Self::guard(&self.pending)
            .drain()
            .map(|(key, entry)| (key, entry.value))
            .collect();
        for (key, value) in drained {
            (self.write)(&key, value);
        }
    }
}

/// Configuration for [`TabPersistence`].
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Also capture/restore the scroll offset of the screen's scroll
    /// container.
    pub save_scroll: bool,
    /// Quiet time before a snapshot is written through to the tab store.
    pub debounce: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_scroll: false,
            debounce: Duration::from_millis(300),
        }
    }
}

#[derive(Default)]
struct HookState {
    last_snapshot: Option<serde_json::Value>,
    scroll: Option<f64>,
}

/// Makes one screen's local state durable per tab.
///
/// The hook resolves its tab key on every operation: the store's active key
/// when one is set, falling back to the screen's path for the first-paint
/// race before the store has processed the route. Resolving per-operation
/// means a save issued after the route lands targets the real tab even when
/// the hook attached first. The previously stored snapshot is exposed through
/// [`restore`](Self::restore) exactly once. Subsequent [`save`](Self::save)
/// calls are debounced into the tab store; restoring never triggers a save.
pub struct TabPersistence {
    store: Arc<TabSessionStore>,
    fallback_key: TabKey,
    config: PersistenceConfig,
    sink: DebouncedSink<serde_json::Value>,
    state: Mutex<HookState>,
    restored: AtomicBool,
}

impl TabPersistence {
    /// Attaches persistence for the screen at `path`.
    pub fn attach(
        store: Arc<TabSessionStore>,
        path: &str,
        config: PersistenceConfig,
    ) -> Arc<Self> {
        let fallback_key = TabKey::new(path)
            .ok()
            .unwrap_or_else(TabKey::generate);

        let sink_store = Arc::clone(&store);
        let sink = DebouncedSink::new(config.debounce, move |key, value| {
            if let Ok(key) = TabKey::new(key) {
                sink_store.set_tab_data(&key, value);
            }
        });

        Arc::new(Self {
            store,
            fallback_key,
            config,
            sink,
            state: Mutex::new(HookState::default()),
            restored: AtomicBool::new(false),
        })
    }

    fn guard(&self) -> MutexGuard<'_, HookState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The tab key this hook currently saves under: the store's active key,
    /// else the path-derived fallback.
    pub fn tab_key(&self) -> TabKey {
        self.store
            .active_key()
            .unwrap_or_else(|| self.fallback_key.clone())
    }

    /// Returns the stored snapshot for this tab, exactly once per attach.
    ///
    /// Later calls return `None` so applying the restored data cannot loop
    /// back into another restore.
    pub fn restore(&self) -> Option<serde_json::Value> {
        if self.restored.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.store.get_tab_data(&self.tab_key())
    }

    /// Returns the stored scroll offset for this tab, if scroll capture is
    /// enabled and an offset was saved.
    pub fn restore_scroll(&self) -> Option<f64> {
        if !self.config.save_scroll {
            return None;
        }
        self.store
            .get_tab_data(&self.tab_key())
            .and_then(|data| data.get(SCROLL_FIELD).and_then(serde_json::Value::as_f64))
    }

    /// Schedules a debounced write of `snapshot` under this tab's key.
    pub fn save(&self, snapshot: serde_json::Value) {
        let composed = {
            let mut state = self.guard();
            state.last_snapshot = Some(snapshot);
            self.compose(&state)
        };
        self.sink.push(self.tab_key().as_str(), composed);
    }

    /// Schedules a debounced write of the scroll offset, merged into the
    /// snapshot payload. No-op unless `save_scroll` is enabled.
    pub fn save_scroll(&self, offset: f64) {
        if !self.config.save_scroll {
            return;
        }
        let composed = {
            let mut state = self.guard();
            state.scroll = Some(offset);
            self.compose(&state)
        };
        self.sink.push(self.tab_key().as_str(), composed);
    }

    fn compose(&self, state: &HookState) -> serde_json::Value {
        let mut value = state
            .last_snapshot
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        if self.config.save_scroll {
            if let (Some(offset), Some(object)) = (state.scroll, value.as_object_mut()) {
                object.insert(SCROLL_FIELD.to_owned(), serde_json::json!(offset));
            }
        }
        value
    }

    /// Forces any pending write out now (tab switch/unmount path).
    pub fn flush(&self) {
        self.sink.flush();
    }
}
