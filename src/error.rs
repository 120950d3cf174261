use uuid::Uuid;

/// Errors surfaced by the load-testing core and its storage layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid caller input (empty URL, zero rps, unknown method, ...).
    #[error("{0}")]
    Validation(String),

    #[error("setup with id {0} not found")]
    SetupNotFound(Uuid),

    #[error("setup with id {0} already exists")]
    SetupAlreadyExists(Uuid),

    #[error("run with id {0} not found")]
    RunNotFound(Uuid),

    #[error("run with id {0} already exists")]
    RunAlreadyExists(Uuid),

    #[error("setup is not active")]
    SetupNotActive,

    #[error("run {0} is not active")]
    RunNotActive(Uuid),
}
