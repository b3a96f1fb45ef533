use lis_api_client::ApiError;

/// Failures of one orchestrated transition attempt.
///
/// The first five variants are client-side precondition errors raised before
/// any network call; the rest name the remote step that failed so the
/// operator knows what to retry. A failed attempt is terminal: no retry and
/// no compensation of steps that already succeeded.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("no request is selected")]
    NoRequestSelected,
    #[error("no target state is chosen")]
    NoTargetState,
    #[error("a staining method must be selected")]
    NoStainingMethod,
    #[error("no work room is selected; choose a room before confirming")]
    NoRoomContext,
    #[error("reception code {0} requires a classification flag")]
    FlagRequired(String),
    #[error("cannot update request attributes: {0}")]
    AttributeUpdate(#[source] ApiError),
    #[error("cannot save note for {failed} of {total} services: {messages}")]
    NoteWrites {
        failed: usize,
        total: usize,
        messages: String,
    },
    #[error("cannot confirm handover: {0}")]
    Transition(#[source] ApiError),
}

pub type TransitionResult<T> = std::result::Result<T, TransitionError>;
