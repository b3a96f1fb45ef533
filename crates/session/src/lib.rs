//! # LIS Session
//!
//! Cross-screen session state for the LIS front-end:
//! - Tab Session Store: the ordered collection of open tabs and which one is
//!   active, durable across reloads
//! - Current-Room Context: the operator's selected work room/department
//! - Tab Persistence: debounced per-tab snapshots of screen state
//!
//! **No API concerns**: talking to the lab backend belongs in `lis-api-client`
//! and `lis-workflow`. This crate only owns client-side state and its durable
//! storage.
//!
//! Persistence throughout is best-effort: the in-memory store is the source of
//! truth for the current page lifetime, and a storage failure degrades to
//! session-only behaviour with a warning rather than surfacing to the screen.

pub mod error;
pub mod persist;
pub mod room;
pub mod storage;
pub mod tabs;

pub use error::{SessionError, SessionResult};
pub use persist::{DebouncedSink, PersistenceConfig, TabPersistence, SCROLL_FIELD};
pub use room::{CurrentRoomContext, CurrentRoomSelection};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use tabs::{Tab, TabDescriptor, TabSessionStore};
