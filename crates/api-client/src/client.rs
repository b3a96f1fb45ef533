//! The backend collaborator seam and its reqwest implementation.

use crate::normalize::departments_from_json;
use crate::types::{
    AttributeUpdate, Department, HistoryFilter, ResultNote, TransitionCommand, TransitionReceipt,
    WorkflowHistoryEntry, WorkflowState,
};
use crate::{ApiError, ApiResult};
use async_trait::async_trait;
use lis_types::{ServiceId, StoredServiceRequestId};

/// The operations the session/workflow layer needs from the lab backend.
///
/// Object-safe so the orchestrator and the screens can be driven by a mock in
/// tests.
#[async_trait]
pub trait LabApi: Send + Sync {
    /// All workflow states, ordered by the server-supplied `state_order`.
    async fn workflow_states(&self) -> ApiResult<Vec<WorkflowState>>;

    /// The selectable-request list for a room, optionally narrowed by state,
    /// date range, or reception code.
    async fn workflow_history(
        &self,
        filter: &HistoryFilter,
    ) -> ApiResult<Vec<WorkflowHistoryEntry>>;

    /// Departments and their rooms for the room picker.
    async fn departments(&self) -> ApiResult<Vec<Department>>;

    /// Writes flag/staining-method attributes on a stored request.
    async fn update_request_attributes(
        &self,
        id: &StoredServiceRequestId,
        update: &AttributeUpdate,
    ) -> ApiResult<()>;

    /// Writes a result note to one child service.
    async fn save_result_note(&self, service_id: &ServiceId, note: &ResultNote) -> ApiResult<()>;

    /// Advances workflow state. The authoritative call.
    async fn transition(&self, command: &TransitionCommand) -> ApiResult<TransitionReceipt>;
}

/// reqwest-backed [`LabApi`] implementation.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl RestClient {
    /// Creates a client for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            http: reqwest::Client::new(),
            base_url,
            bearer_token: None,
        }
    }

    /// Attaches a bearer token supplied by the (out-of-scope) auth layer.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Maps a non-2xx response into [`ApiError::Status`], decoding the
    /// backend's `{"message": ...}` envelope when present.
    async fn check(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }
}

/// Decodes a successful response body, attributing malformed JSON to
/// [`ApiError::Decode`] rather than the transport.
fn decode_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    Ok(serde_json::from_slice(body)?)
}

fn status_error(status: u16, body: &str) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                format!("backend returned status {status}")
            } else {
                body.trim().to_owned()
            }
        });
    ApiError::Status { status, message }
}

/// Builds the history query string pairs; kept separate so the filter
/// encoding is testable without a live backend.
fn history_query(filter: &HistoryFilter) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("roomId", filter.room_id.as_str().to_owned())];
    if let Some(state_id) = &filter.state_id {
        pairs.push(("stateId", state_id.as_str().to_owned()));
    }
    if let Some(from) = filter.date_from {
        pairs.push(("dateFrom", from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.date_to {
        pairs.push(("dateTo", to.format("%Y-%m-%d").to_string()));
    }
    if let Some(code) = &filter.code {
        pairs.push(("code", code.clone()));
    }
    pairs
}

#[async_trait]
impl LabApi for RestClient {
    async fn workflow_states(&self) -> ApiResult<Vec<WorkflowState>> {
        let response = self
            .request(reqwest::Method::GET, "/workflow/states")
            .send()
            .await?;
        let body = Self::check(response).await?.bytes().await?;
        let mut states: Vec<WorkflowState> = decode_json(&body)?;
        states.sort_by_key(|state| state.state_order);
        Ok(states)
    }

    async fn workflow_history(
        &self,
        filter: &HistoryFilter,
    ) -> ApiResult<Vec<WorkflowHistoryEntry>> {
        let response = self
            .request(reqwest::Method::GET, "/workflow/history")
            .query(&history_query(filter))
            .send()
            .await?;
        let body = Self::check(response).await?.bytes().await?;
        decode_json(&body)
    }

    async fn departments(&self) -> ApiResult<Vec<Department>> {
        let response = self
            .request(reqwest::Method::GET, "/organisation/departments")
            .send()
            .await?;
        let body = Self::check(response).await?.bytes().await?;
        let value: serde_json::Value = decode_json(&body)?;
        Ok(departments_from_json(value)?)
    }

    async fn update_request_attributes(
        &self,
        id: &StoredServiceRequestId,
        update: &AttributeUpdate,
    ) -> ApiResult<()> {
        let path = format!("/stored-requests/{id}/attributes");
        let response = self
            .request(reqwest::Method::PATCH, &path)
            .json(update)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn save_result_note(&self, service_id: &ServiceId, note: &ResultNote) -> ApiResult<()> {
        let path = format!("/services/{service_id}/result-note");
        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(note)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn transition(&self, command: &TransitionCommand) -> ApiResult<TransitionReceipt> {
        tracing::debug!(
            request = %command.stored_service_request_id,
            to_state = %command.to_state_id,
            action = %command.action_type,
            "issuing workflow transition"
        );
        let response = self
            .request(reqwest::Method::POST, "/workflow/transitions")
            .json(command)
            .send()
            .await?;
        let body = Self::check(response).await?.bytes().await?;
        decode_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lis_types::{RoomId, StateId};

    #[test]
    fn test_history_query_includes_only_supplied_filters() {
        let filter = HistoryFilter::for_room(RoomId::new("r1").unwrap());
        assert_eq!(history_query(&filter), vec![("roomId", "r1".to_owned())]);

        let full = HistoryFilter {
            room_id: RoomId::new("r1").unwrap(),
            state_id: Some(StateId::new("s2").unwrap()),
            date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 31),
            code: Some("HT24".to_owned()),
        };
        assert_eq!(
            history_query(&full),
            vec![
                ("roomId", "r1".to_owned()),
                ("stateId", "s2".to_owned()),
                ("dateFrom", "2024-03-01".to_owned()),
                ("dateTo", "2024-03-31".to_owned()),
                ("code", "HT24".to_owned()),
            ]
        );
    }

    #[test]
    fn test_malformed_body_is_a_decode_error() {
        let error = decode_json::<Vec<WorkflowState>>(b"<html>oops</html>").unwrap_err();
        assert!(matches!(error, ApiError::Decode(_)));
    }

    #[test]
    fn test_status_error_prefers_message_envelope() {
        let error = status_error(422, r#"{"message": "staining method not applicable"}"#);
        match error {
            ApiError::Status { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "staining method not applicable");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn test_status_error_falls_back_to_body_text() {
        let error = status_error(500, "upstream unavailable");
        assert!(error.to_string().contains("upstream unavailable"));

        let empty = status_error(502, "  ");
        assert!(empty.to_string().contains("backend returned status 502"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = RestClient::new("http://lab.example/api/");
        assert_eq!(client.url("/workflow/states"), "http://lab.example/api/workflow/states");
    }

    #[test]
    fn test_attribute_update_skips_absent_fields() {
        let update = AttributeUpdate {
            flag: Some("ST".to_owned()),
            staining_method_id: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"flag": "ST"}));
    }
}
