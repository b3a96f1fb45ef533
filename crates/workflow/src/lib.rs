//! # LIS Workflow
//!
//! The Workflow Transition Orchestrator: commits a lab-request state advance
//! as an ordered sequence of dependent remote writes, with client-side
//! precondition gating and per-step failure reporting.
//!
//! The authoritative state machine lives server-side; this crate only
//! sequences the calls and surfaces which step failed.

pub mod error;
pub mod orchestrator;

pub use error::{TransitionError, TransitionResult};
pub use orchestrator::{
    RefreshSignal, SelectedRequest, TransitionDraft, TransitionOrchestrator, TransitionOutcome,
    HANDOVER_RESULT_STATUS,
};
