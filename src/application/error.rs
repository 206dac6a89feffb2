// Errors surfaced by application services
use crate::application::condition_store::StoreError;
use crate::domain::condition::ClassificationError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to get condition level: {0}")]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("bad request: {0}")]
    InvalidInput(String),
}
