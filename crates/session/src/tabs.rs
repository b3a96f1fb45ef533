//! Tab Session Store: the ordered collection of open tabs, which one is
//! active, and the per-tab scratch data screens persist through it.
//!
//! Lookup by path is a keyed map; display order is kept separately so
//! insertion order is preserved for rendering. Every mutation persists the
//! full snapshot best-effort, so a page reload restores the same open tabs.

use crate::room::CurrentRoomSelection;
use crate::storage::SessionStorage;
use crate::{SessionError, SessionResult};
use lis_types::TabKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage key for the persisted tab session.
pub const TAB_STORAGE_KEY: &str = "lis.tabs";

/// One open navigational view.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tab {
    pub key: TabKey,
    pub path: String,
    pub label: String,
    pub closable: bool,
    /// Room/department the view is scoped to; only populated for room-scoped
    /// screens.
    pub room: Option<CurrentRoomSelection>,
    /// Free-form scratch payload written by the persistence hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Input to [`TabSessionStore::open_tab`].
///
/// `closable` and `room` are optional so that re-opening an existing path on
/// an unrelated re-render does not erase previously stored values.
#[derive(Debug, Clone, Default)]
pub struct TabDescriptor {
    pub path: String,
    pub label: String,
    pub closable: Option<bool>,
    pub room: Option<CurrentRoomSelection>,
}

impl TabDescriptor {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            closable: None,
            room: None,
        }
    }

    pub fn pinned(mut self) -> Self {
        self.closable = Some(false);
        self
    }

    pub fn in_room(mut self, room: CurrentRoomSelection) -> Self {
        self.room = Some(room);
        self
    }
}

#[derive(Default)]
struct TabState {
    tabs: HashMap<String, Tab>,
    order: Vec<TabKey>,
    by_key: HashMap<String, String>,
    active: Option<TabKey>,
}

impl TabState {
    fn path_of(&self, key: &TabKey) -> Option<&str> {
        self.by_key.get(key.as_str()).map(String::as_str)
    }

    fn tab_by_key(&self, key: &TabKey) -> Option<&Tab> {
        self.path_of(key).and_then(|path| self.tabs.get(path))
    }

    fn tab_by_key_mut(&mut self, key: &TabKey) -> Option<&mut Tab> {
        let path = self.by_key.get(key.as_str())?.clone();
        self.tabs.get_mut(&path)
    }
}

/// Snapshot written to durable storage: the ordered tab list plus active key.
#[derive(serde::Serialize, serde::Deserialize)]
struct TabSnapshot {
    tabs: Vec<Tab>,
    active: Option<TabKey>,
}

/// Process-wide store of open tabs.
///
/// Exclusively owns the [`Tab`] records; other components hold only transient
/// lookups by key. Mutations are atomic with respect to the UI event loop.
pub struct TabSessionStore {
    storage: Arc<dyn SessionStorage>,
    state: Mutex<TabState>,
}

impl TabSessionStore {
    /// Creates an empty store backed by the given storage.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            state: Mutex::new(TabState::default()),
        }
    }

    /// Creates a store restored from a previously persisted snapshot.
    ///
    /// Missing or unreadable snapshots yield an empty store; restore is
    /// best-effort by design.
    pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let mut state = TabState::default();
        match storage.load(TAB_STORAGE_KEY) {
            Ok(Some(contents)) => match serde_json::from_str::<TabSnapshot>(&contents)
                .map_err(SessionError::Deserialization)
            {
                Ok(snapshot) => {
                    for tab in snapshot.tabs {
                        state.order.push(tab.key.clone());
                        state
                            .by_key
                            .insert(tab.key.as_str().to_owned(), tab.path.clone());
                        state.tabs.insert(tab.path.clone(), tab);
                    }
                    // Only accept an active key that still names a tab.
                    state.active = snapshot
                        .active
                        .filter(|key| state.by_key.contains_key(key.as_str()));
                }
                Err(e) => tracing::warn!("discarding unreadable tab session snapshot: {e}"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to read tab session snapshot: {e}"),
        }
        Self {
            storage,
            state: Mutex::new(state),
        }
    }

    fn guard(&self) -> MutexGuard<'_, TabState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &TabState) {
        if let Err(e) = self.try_persist(state) {
            tracing::warn!("failed to persist tab session: {e}");
        }
    }

    fn try_persist(&self, state: &TabState) -> SessionResult<()> {
        let snapshot = TabSnapshot {
            tabs: state
                .order
                .iter()
                .filter_map(|key| state.tab_by_key(key).cloned())
                .collect(),
            active: state.active.clone(),
        };
        let json = serde_json::to_string(&snapshot).map_err(SessionError::Serialization)?;
        self.storage.store(TAB_STORAGE_KEY, &json)
    }

    /// Opens (or re-activates) the tab for `descriptor.path`.
    ///
    /// If a tab with the same path already exists it becomes active; its label
    /// is refreshed, and its `closable`/room fields are refreshed only when
    /// the descriptor supplies them. Otherwise a new tab is appended at the
    /// end with a freshly generated key and becomes active.
    pub fn open_tab(&self, descriptor: TabDescriptor) -> TabKey {
        let mut state = self.guard();

        let key = if let Some(existing) = state.tabs.get_mut(&descriptor.path) {
            existing.label = descriptor.label;
            if let Some(closable) = descriptor.closable {
                existing.closable = closable;
            }
            if let Some(room) = descriptor.room {
                existing.room = Some(room);
            }
            existing.key.clone()
        } else {
            let key = TabKey::generate();
            let tab = Tab {
                key: key.clone(),
                path: descriptor.path.clone(),
                label: descriptor.label,
                closable: descriptor.closable.unwrap_or(true),
                room: descriptor.room,
                data: None,
            };
            state.order.push(key.clone());
            state
                .by_key
                .insert(key.as_str().to_owned(), descriptor.path.clone());
            state.tabs.insert(descriptor.path, tab);
            key
        };

        state.active = Some(key.clone());
        self.persist(&state);
        key
    }

    /// Removes the tab; does not itself change the active key.
    ///
    /// Callers pair this with [`replacement_for`](Self::replacement_for) or
    /// use [`close_and_select`](Self::close_and_select) to avoid a frame in
    /// which tabs exist but none is active.
    pub fn close_tab(&self, key: &TabKey) {
        let mut state = self.guard();
        let Some(path) = state.by_key.remove(key.as_str()) else {
            return;
        };
        state.tabs.remove(&path);
        state.order.retain(|k| k != key);
        self.persist(&state);
    }

    /// Computes which tab should become active once `key` is closed:
    /// right neighbour, else left neighbour, else the last remaining tab,
    /// else none. A pinned dashboard tab is picked up by the neighbour rules
    /// like any other tab.
    pub fn replacement_for(&self, key: &TabKey) -> Option<TabKey> {
        let state = self.guard();
        match state.order.iter().position(|k| k == key) {
            Some(i) if i + 1 < state.order.len() => Some(state.order[i + 1].clone()),
            Some(i) if i > 0 => Some(state.order[i - 1].clone()),
            Some(_) => None,
            // Key already gone: fall back to the last remaining tab.
            None => state.order.last().cloned(),
        }
    }

    /// Closes `key` and, if it was the active tab, activates its replacement
    /// per the neighbour policy.
    pub fn close_and_select(&self, key: &TabKey) -> Option<TabKey> {
        let was_active = self.active_key().as_ref() == Some(key);
        let replacement = self.replacement_for(key);
        self.close_tab(key);
        if was_active {
            let mut state = self.guard();
            state.active = replacement.clone();
            self.persist(&state);
            replacement
        } else {
            self.active_key()
        }
    }

    /// Sets the active tab if `key` names an open tab; no-op otherwise.
    pub fn set_active(&self, key: &TabKey) {
        let mut state = self.guard();
        if state.by_key.contains_key(key.as_str()) {
            state.active = Some(key.clone());
            self.persist(&state);
        }
    }

    /// Attaches free-form scratch data to a tab.
    pub fn set_tab_data(&self, key: &TabKey, data: serde_json::Value) {
        let mut state = self.guard();
        if let Some(tab) = state.tab_by_key_mut(key) {
            tab.data = Some(data);
            self.persist(&state);
        }
    }

    /// Retrieves a tab's scratch data, if any.
    pub fn get_tab_data(&self, key: &TabKey) -> Option<serde_json::Value> {
        self.guard().tab_by_key(key).and_then(|tab| tab.data.clone())
    }

    /// Returns the currently active tab key, if any.
    pub fn active_key(&self) -> Option<TabKey> {
        self.guard().active.clone()
    }

    /// Returns all open tabs in display order.
    pub fn tabs(&self) -> Vec<Tab> {
        let state = self.guard();
        state
            .order
            .iter()
            .filter_map(|key| state.tab_by_key(key).cloned())
            .collect()
    }

    /// Clears all tabs and the active key; called on logout.
    pub fn reset(&self) {
        let mut state = self.guard();
        *state = TabState::default();
        if let Err(e) = self.storage.remove(TAB_STORAGE_KEY) {
            tracing::warn!("failed to clear persisted tab session: {e}");
        }
    }
}
