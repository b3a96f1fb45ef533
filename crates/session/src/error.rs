#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("room selection is incomplete: missing {0}")]
    IncompleteRoomSelection(&'static str),
    #[error("failed to create session storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read session storage: {0}")]
    StorageRead(std::io::Error),
    #[error("failed to write session storage: {0}")]
    StorageWrite(std::io::Error),
    #[error("failed to serialize session state: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize session state: {0}")]
    Deserialization(serde_json::Error),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
