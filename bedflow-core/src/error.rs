/// Errors raised by the allocation engine and its collaborator layer.
///
/// "No suitable bed" is not an error: it is reported as a normal decision
/// (`Queued`, `Freed` or `Failure`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("resource {0} not found")]
    ResourceNotFound(String),
    #[error("request {0} not found in waitlist")]
    RequestNotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("request {0} already exists")]
    Duplicate(String),
    #[error("resource {0} already exists")]
    DuplicateResource(String),
    #[error("store failure: {0}")]
    Store(String),
}

impl AllocationError {
    /// `true` for both not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_) | Self::RequestNotFound(_))
    }
}

pub type AllocResult<T> = std::result::Result<T, AllocationError>;
