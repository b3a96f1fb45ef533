//! Canonical DTOs for the lab backend's JSON-over-HTTP interface.
//!
//! Wire field names are camelCase throughout; identifiers deserialize through
//! the validated newtypes in `lis-types`, so a response with an empty id
//! fails decoding instead of leaking into the stores.

use chrono::NaiveDate;
use lis_types::{
    ActionType, DepartmentId, NonEmptyText, ReceptionCode, RoomId, ServiceId, StainingMethodId,
    StateId, StoredServiceRequestId, UserId,
};

/// A server-defined workflow state, ordered by `state_order`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub id: StateId,
    pub code: NonEmptyText,
    pub name: NonEmptyText,
    pub state_order: i32,
}

/// One child service (test) of a stored request, as listed in history.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    pub service_id: ServiceId,
    pub name: String,
    #[serde(default)]
    pub result_status: Option<String>,
    #[serde(default)]
    pub result_notes: Option<String>,
}

/// One selectable request in the workflow-history list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowHistoryEntry {
    pub stored_service_request_id: StoredServiceRequestId,
    pub reception_code: ReceptionCode,
    #[serde(default)]
    pub patient_name: Option<String>,
    pub state_id: StateId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
}

/// Filter for the workflow-history query; room is mandatory so a room switch
/// naturally changes the query key and refetches.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFilter {
    pub room_id: RoomId,
    pub state_id: Option<StateId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub code: Option<String>,
}

impl HistoryFilter {
    pub fn for_room(room_id: RoomId) -> Self {
        Self {
            room_id,
            state_id: None,
            date_from: None,
            date_to: None,
            code: None,
        }
    }
}

/// Combined flag/staining-method write for a stored request.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staining_method_id: Option<StainingMethodId>,
}

impl AttributeUpdate {
    /// True when there is nothing to send; the orchestrator skips the call.
    pub fn is_empty(&self) -> bool {
        self.flag.is_none() && self.staining_method_id.is_none()
    }
}

/// A result note written to one child service during handover.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultNote {
    pub result_notes: String,
    pub result_status: String,
}

/// The authoritative state-advance call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCommand {
    pub stored_service_request_id: StoredServiceRequestId,
    pub to_state_id: StateId,
    pub action_type: ActionType,
    pub actor_user_id: UserId,
    pub actor_department_id: DepartmentId,
    pub actor_room_id: RoomId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Backend acknowledgement of a transition.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReceipt {
    pub stored_service_request_id: StoredServiceRequestId,
    pub state_id: StateId,
}

/// A work room within a department.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub name: String,
}

/// A department and its rooms, as offered by the room picker.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: DepartmentId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<Room>,
}
