//! Current-Room Context: the single source of truth for which room the
//! operator is working from.

use crate::storage::SessionStorage;
use crate::{SessionError, SessionResult};
use lis_types::{DepartmentId, NonEmptyText, RoomId};
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage key for the persisted room selection.
pub const ROOM_STORAGE_KEY: &str = "lis.current-room";

/// The operator's active work context.
///
/// The type makes the atomicity invariant structural: there is no way to hold
/// a room without its department. Screens either see a full selection or
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CurrentRoomSelection {
    pub room_id: RoomId,
    pub room_code: NonEmptyText,
    pub room_name: NonEmptyText,
    pub department_id: DepartmentId,
    pub department_code: NonEmptyText,
    pub department_name: NonEmptyText,
}

impl CurrentRoomSelection {
    /// Builds a selection from raw field values, rejecting any missing part.
    ///
    /// This is the normalization step behind the room picker: a confirm with a
    /// half-populated room never reaches the context.
    pub fn from_parts(
        room_id: &str,
        room_code: &str,
        room_name: &str,
        department_id: &str,
        department_code: &str,
        department_name: &str,
    ) -> SessionResult<Self> {
        Ok(Self {
            room_id: RoomId::new(room_id)
                .map_err(|_| SessionError::IncompleteRoomSelection("room id"))?,
            room_code: NonEmptyText::new(room_code)
                .map_err(|_| SessionError::IncompleteRoomSelection("room code"))?,
            room_name: NonEmptyText::new(room_name)
                .map_err(|_| SessionError::IncompleteRoomSelection("room name"))?,
            department_id: DepartmentId::new(department_id)
                .map_err(|_| SessionError::IncompleteRoomSelection("department id"))?,
            department_code: NonEmptyText::new(department_code)
                .map_err(|_| SessionError::IncompleteRoomSelection("department code"))?,
            department_name: NonEmptyText::new(department_name)
                .map_err(|_| SessionError::IncompleteRoomSelection("department name"))?,
        })
    }
}

/// Process-wide holder of the operator's current room selection.
///
/// Reads are pure; `set_room` replaces the whole selection atomically and
/// `clear` is the logout path. Every mutation persists best-effort.
pub struct CurrentRoomContext {
    storage: Arc<dyn SessionStorage>,
    current: Mutex<Option<CurrentRoomSelection>>,
}

impl CurrentRoomContext {
    /// Creates an empty context backed by the given storage.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            current: Mutex::new(None),
        }
    }

    /// Creates a context restored from a previously persisted selection.
    ///
    /// A missing or unreadable snapshot yields an empty context; restore is
    /// best-effort by design.
    pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let restored = match storage.load(ROOM_STORAGE_KEY) {
            Ok(Some(contents)) => match serde_json::from_str(&contents)
                .map_err(SessionError::Deserialization)
            {
                Ok(selection) => Some(selection),
                Err(e) => {
                    tracing::warn!("discarding unreadable room selection snapshot: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("failed to read room selection snapshot: {e}");
                None
            }
        };
        Self {
            storage,
            current: Mutex::new(restored),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<CurrentRoomSelection>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrites the full selection atomically.
    pub fn set_room(&self, selection: CurrentRoomSelection) {
        *self.guard() = Some(selection.clone());
        if let Err(e) = self.try_persist(&selection) {
            tracing::warn!("failed to persist room selection: {e}");
        }
    }

    fn try_persist(&self, selection: &CurrentRoomSelection) -> SessionResult<()> {
        let json = serde_json::to_string(selection).map_err(SessionError::Serialization)?;
        self.storage.store(ROOM_STORAGE_KEY, &json)
    }

    /// Resets to the unset state; called on logout.
    pub fn clear(&self) {
        *self.guard() = None;
        if let Err(e) = self.storage.remove(ROOM_STORAGE_KEY) {
            tracing::warn!("failed to clear persisted room selection: {e}");
        }
    }

    /// Returns the current selection, if any. Pure read.
    pub fn current(&self) -> Option<CurrentRoomSelection> {
        self.guard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn sample_selection() -> CurrentRoomSelection {
        CurrentRoomSelection::from_parts("r1", "R1", "Histology Room 1", "d1", "D1", "Histology")
            .unwrap()
    }

    #[test]
    fn test_from_parts_rejects_partial_selection() {
        let result =
            CurrentRoomSelection::from_parts("r1", "R1", "Histology Room 1", "", "D1", "Histology");
        match result {
            Err(SessionError::IncompleteRoomSelection(field)) => {
                assert_eq!(field, "department id")
            }
            other => panic!("expected IncompleteRoomSelection, got {other:?}"),
        }
    }

    #[test]
    fn test_set_room_then_clear() {
        let context = CurrentRoomContext::new(Arc::new(MemoryStorage::new()));
        assert!(context.current().is_none());

        context.set_room(sample_selection());
        let current = context.current().expect("selection should be set");
        assert_eq!(current.room_id.as_str(), "r1");
        assert_eq!(current.department_name.as_str(), "Histology");

        context.clear();
        assert!(context.current().is_none());
    }

    #[test]
    fn test_selection_survives_reload() {
        let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());

        let context = CurrentRoomContext::new(Arc::clone(&storage));
        context.set_room(sample_selection());
        drop(context);

        let restored = CurrentRoomContext::load(storage);
        assert_eq!(restored.current(), Some(sample_selection()));
    }

    #[test]
    fn test_corrupt_snapshot_yields_empty_context() {
        let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
        storage.store(ROOM_STORAGE_KEY, "not json").unwrap();

        let context = CurrentRoomContext::load(storage);
        assert!(context.current().is_none());
    }
}
