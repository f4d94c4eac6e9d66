use shared::error::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("binder session already initialized; one open attempt per console")]
    AlreadyInitialized,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("call argument is not serializable as JSON: {0}")]
    Argument(#[source] serde_json::Error),
    #[error("invalid session script: {0}")]
    Script(#[source] serde_json::Error),
}
