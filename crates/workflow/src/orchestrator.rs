//! The multi-step commit procedure behind the handover confirm button.
//!
//! Execution order once preconditions pass:
//! 1. attribute update (combined flag + staining method, one call)
//! 2. per-service note fan-out (concurrent, jointly awaited, all must succeed)
//! 3. the authoritative state transition
//!
//! Each step is awaited before the next begins. There is no compensation: a
//! failure in step 2 or 3 leaves an already-applied attribute update in place
//! and the request in its prior workflow state server-side.

use crate::{TransitionError, TransitionResult};
use futures::future::join_all;
use lis_api_client::{
    AttributeUpdate, LabApi, ResultNote, TransitionCommand, TransitionReceipt,
};
use lis_session::CurrentRoomContext;
use lis_types::{
    ActionType, ReceptionCode, ServiceId, StainingMethodId, StateId, StoredServiceRequestId,
    UserId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result status written alongside a handover note on each child service.
pub const HANDOVER_RESULT_STATUS: &str = "HANDED_OVER";

/// Monotonically increasing counter list screens watch to know when to
/// refetch after a committed transition.
#[derive(Debug, Default)]
pub struct RefreshSignal(AtomicU64);

impl RefreshSignal {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// The lab request the operator selected from the history list.
#[derive(Debug, Clone)]
pub struct SelectedRequest {
    pub stored_service_request_id: StoredServiceRequestId,
    pub reception_code: ReceptionCode,
    /// Child services the handover note is propagated to.
    pub services: Vec<ServiceId>,
}

/// Everything the confirm screen holds when the operator commits.
///
/// Fields the operator may not have filled in yet are optional; the
/// orchestrator turns each missing one into its specific precondition error.
#[derive(Debug, Clone)]
pub struct TransitionDraft {
    pub request: Option<SelectedRequest>,
    pub to_state_id: Option<StateId>,
    pub action_type: ActionType,
    pub staining_method_id: Option<StainingMethodId>,
    pub flag: Option<String>,
    pub note: Option<String>,
    pub actor_user_id: UserId,
}

/// What a successful commit reports back to the hosting screen.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub receipt: TransitionReceipt,
    /// Refresh counter value after the bump; the list screen refetches when
    /// it observes a new value.
    pub refresh: u64,
}

/// Orchestrates one transition attempt against the backend.
pub struct TransitionOrchestrator<A: LabApi + ?Sized> {
    api: Arc<A>,
    room: Arc<CurrentRoomContext>,
    refresh: RefreshSignal,
}

impl<A: LabApi + ?Sized> TransitionOrchestrator<A> {
    pub fn new(api: Arc<A>, room: Arc<CurrentRoomContext>) -> Self {
        Self {
            api,
            room,
            refresh: RefreshSignal::default(),
        }
    }

    /// Current value of the refresh counter.
    pub fn refresh_counter(&self) -> u64 {
        self.refresh.current()
    }

    /// Commits the draft: precondition gate, then the ordered call sequence.
    ///
    /// Preconditions are checked in order and abort before any network call.
    /// Remote steps are strictly sequential; step 2's per-service writes run
    /// concurrently with each other but are jointly awaited before step 3.
    pub async fn commit(&self, draft: &TransitionDraft) -> TransitionResult<TransitionOutcome> {
        let request = draft
            .request
            .as_ref()
            .ok_or(TransitionError::NoRequestSelected)?;
        let to_state_id = draft
            .to_state_id
            .clone()
            .ok_or(TransitionError::NoTargetState)?;
        let staining_method_id = draft
            .staining_method_id
            .clone()
            .ok_or(TransitionError::NoStainingMethod)?;
        let room = self.room.current().ok_or(TransitionError::NoRoomContext)?;
        if request.reception_code.is_special_category() && draft.flag.is_none() {
            return Err(TransitionError::FlagRequired(
                request.reception_code.to_string(),
            ));
        }

        // Step 1: combined attribute update.
        let update = AttributeUpdate {
            flag: draft.flag.clone(),
            staining_method_id: Some(staining_method_id),
        };
        if !update.is_empty() {
            self.api
                .update_request_attributes(&request.stored_service_request_id, &update)
                .await
                .map_err(TransitionError::AttributeUpdate)?;
        }

        // Step 2: propagate the note to every child service.
        let note = draft
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if let Some(note) = note {
            let body = ResultNote {
                result_notes: note.to_owned(),
                result_status: HANDOVER_RESULT_STATUS.to_owned(),
            };
            let writes = request
                .services
                .iter()
                .map(|service_id| self.api.save_result_note(service_id, &body));
            let results = join_all(writes).await;
            let total = results.len();
            let failures: Vec<String> = results
                .into_iter()
                .filter_map(Result::err)
                .map(|e| e.to_string())
                .collect();
            if !failures.is_empty() {
                return Err(TransitionError::NoteWrites {
                    failed: failures.len(),
                    total,
                    messages: failures.join("; "),
                });
            }
        }

        // Step 3: the authoritative transition.
        let command = TransitionCommand {
            stored_service_request_id: request.stored_service_request_id.clone(),
            to_state_id,
            action_type: draft.action_type,
            actor_user_id: draft.actor_user_id.clone(),
            actor_department_id: room.department_id.clone(),
            actor_room_id: room.room_id.clone(),
            notes: note.map(str::to_owned),
        };
        let receipt = self
            .api
            .transition(&command)
            .await
            .map_err(TransitionError::Transition)?;

        let refresh = self.refresh.bump();
        tracing::info!(
            request = %receipt.stored_service_request_id,
            state = %receipt.state_id,
            refresh,
            "workflow transition committed"
        );
        Ok(TransitionOutcome { receipt, refresh })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lis_api_client::{
        ApiError, ApiResult, Department, HistoryFilter, WorkflowHistoryEntry, WorkflowState,
    };
    use lis_session::{CurrentRoomSelection, MemoryStorage};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every backend call in order; selected service note writes can
    /// be made to fail.
    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<String>>,
        failing_note_services: Mutex<HashSet<String>>,
        last_command: Mutex<Option<TransitionCommand>>,
    }

    impl MockApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn fail_note_for(&self, service_id: &str) {
            self.failing_note_services
                .lock()
                .unwrap()
                .insert(service_id.to_owned());
        }
    }

    #[async_trait]
    impl LabApi for MockApi {
        async fn workflow_states(&self) -> ApiResult<Vec<WorkflowState>> {
            self.record("states");
            Ok(Vec::new())
        }

        async fn workflow_history(
            &self,
            _filter: &HistoryFilter,
        ) -> ApiResult<Vec<WorkflowHistoryEntry>> {
            self.record("history");
            Ok(Vec::new())
        }

        async fn departments(&self) -> ApiResult<Vec<Department>> {
            self.record("departments");
            Ok(Vec::new())
        }

        async fn update_request_attributes(
            &self,
            id: &StoredServiceRequestId,
            _update: &AttributeUpdate,
        ) -> ApiResult<()> {
            self.record(format!("attributes:{id}"));
            Ok(())
        }

        async fn save_result_note(
            &self,
            service_id: &ServiceId,
            _note: &ResultNote,
        ) -> ApiResult<()> {
            self.record(format!("note:{service_id}"));
            if self
                .failing_note_services
                .lock()
                .unwrap()
                .contains(service_id.as_str())
            {
                return Err(ApiError::Status {
                    status: 500,
                    message: format!("note rejected for {service_id}"),
                });
            }
            Ok(())
        }

        async fn transition(&self, command: &TransitionCommand) -> ApiResult<TransitionReceipt> {
            self.record("transition");
            *self.last_command.lock().unwrap() = Some(command.clone());
            Ok(TransitionReceipt {
                stored_service_request_id: command.stored_service_request_id.clone(),
                state_id: command.to_state_id.clone(),
            })
        }
    }

    fn room_context(with_room: bool) -> Arc<CurrentRoomContext> {
        let context = CurrentRoomContext::new(Arc::new(MemoryStorage::new()));
        if with_room {
            context.set_room(
                CurrentRoomSelection::from_parts(
                    "r1",
                    "R1",
                    "Histology Room 1",
                    "d1",
                    "D1",
                    "Histology",
                )
                .unwrap(),
            );
        }
        Arc::new(context)
    }

    fn selected_request(code: &str, services: &[&str]) -> SelectedRequest {
        SelectedRequest {
            stored_service_request_id: StoredServiceRequestId::new("svc-1").unwrap(),
            reception_code: ReceptionCode::new(code).unwrap(),
            services: services
                .iter()
                .map(|s| ServiceId::new(s).unwrap())
                .collect(),
        }
    }

    fn full_draft() -> TransitionDraft {
        TransitionDraft {
            request: Some(selected_request("HT24-00455", &["c1", "c2"])),
            to_state_id: Some(StateId::new("separation").unwrap()),
            action_type: ActionType::Start,
            staining_method_id: Some(StainingMethodId::new("M1").unwrap()),
            flag: None,
            note: Some("ok".to_owned()),
            actor_user_id: UserId::new("u9").unwrap(),
        }
    }

    fn orchestrator(
        api: Arc<MockApi>,
        with_room: bool,
    ) -> TransitionOrchestrator<MockApi> {
        TransitionOrchestrator::new(api, room_context(with_room))
    }

    #[tokio::test]
    async fn test_missing_request_aborts_without_network() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            request: None,
            ..full_draft()
        };
        let error = orchestrator.commit(&draft).await.unwrap_err();
        assert!(matches!(error, TransitionError::NoRequestSelected));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_target_state_aborts_without_network() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            to_state_id: None,
            ..full_draft()
        };
        let error = orchestrator.commit(&draft).await.unwrap_err();
        assert!(matches!(error, TransitionError::NoTargetState));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_staining_method_aborts_without_network() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            staining_method_id: None,
            ..full_draft()
        };
        let error = orchestrator.commit(&draft).await.unwrap_err();
        assert!(matches!(error, TransitionError::NoStainingMethod));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_room_context_aborts_without_network() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), false);

        let error = orchestrator.commit(&full_draft()).await.unwrap_err();
        assert!(matches!(error, TransitionError::NoRoomContext));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_special_category_requires_flag() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            request: Some(selected_request("ST24-00123", &["c1"])),
            flag: None,
            ..full_draft()
        };
        let error = orchestrator.commit(&draft).await.unwrap_err();
        assert!(matches!(error, TransitionError::FlagRequired(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        orchestrator.commit(&full_draft()).await.unwrap();

        let calls = api.calls();
        assert_eq!(calls.first().map(String::as_str), Some("attributes:svc-1"));
        assert_eq!(calls.last().map(String::as_str), Some("transition"));
        let notes: HashSet<&str> = calls[1..calls.len() - 1]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(notes, HashSet::from(["note:c1", "note:c2"]));
    }

    #[tokio::test]
    async fn test_partial_note_failure_blocks_transition() {
        let api = Arc::new(MockApi::default());
        api.fail_note_for("c2");
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            request: Some(selected_request("HT24-00455", &["c1", "c2", "c3"])),
            ..full_draft()
        };
        let error = orchestrator.commit(&draft).await.unwrap_err();
        match &error {
            TransitionError::NoteWrites {
                failed,
                total,
                messages,
            } => {
                assert_eq!(*failed, 1);
                assert_eq!(*total, 3);
                assert!(messages.contains("note rejected for c2"));
            }
            other => panic!("expected NoteWrites, got {other:?}"),
        }
        assert!(error.to_string().contains("1 of 3"));
        assert!(!api.calls().contains(&"transition".to_owned()));
    }

    #[tokio::test]
    async fn test_blank_note_skips_note_writes() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            note: Some("   ".to_owned()),
            ..full_draft()
        };
        orchestrator.commit(&draft).await.unwrap();

        let calls = api.calls();
        assert!(calls.iter().all(|c| !c.starts_with("note:")));
        assert_eq!(calls.last().map(String::as_str), Some("transition"));
    }

    #[tokio::test]
    async fn test_successful_commit_carries_actor_context_and_bumps_refresh() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);
        assert_eq!(orchestrator.refresh_counter(), 0);

        let outcome = orchestrator.commit(&full_draft()).await.unwrap();
        assert_eq!(outcome.refresh, 1);
        assert_eq!(orchestrator.refresh_counter(), 1);
        assert_eq!(outcome.receipt.state_id.as_str(), "separation");

        let command = api.last_command.lock().unwrap().clone().unwrap();
        assert_eq!(command.actor_room_id.as_str(), "r1");
        assert_eq!(command.actor_department_id.as_str(), "d1");
        assert_eq!(command.actor_user_id.as_str(), "u9");
        assert_eq!(command.notes.as_deref(), Some("ok"));
        assert_eq!(command.action_type, ActionType::Start);
    }

    #[tokio::test]
    async fn test_flagged_special_sample_updates_attributes_with_flag() {
        let api = Arc::new(MockApi::default());
        let orchestrator = orchestrator(Arc::clone(&api), true);

        let draft = TransitionDraft {
            request: Some(selected_request("ST24-00123", &["c1"])),
            flag: Some("ST".to_owned()),
            ..full_draft()
        };
        orchestrator.commit(&draft).await.unwrap();
        assert!(api.calls().contains(&"attributes:svc-1".to_owned()));
    }
}
