//! # LIS API client
//!
//! The REST backend collaborator as consumed by the session/workflow layer:
//! typed DTOs for the backend's JSON shapes, the [`LabApi`] trait the
//! orchestrator depends on, and the [`RestClient`] implementation.
//!
//! Response-shape quirks are normalized once at this boundary (see
//! [`normalize`]); callers only ever see the canonical types.

pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::{LabApi, RestClient};
pub use error::{ApiError, ApiResult};
pub use types::{
    AttributeUpdate, Department, HistoryFilter, ResultNote, Room, ServiceLine, TransitionCommand,
    TransitionReceipt, WorkflowHistoryEntry, WorkflowState,
};
