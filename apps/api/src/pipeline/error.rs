use thiserror::Error;

/// Errors raised inside the orchestration core.
///
/// `GenerationFailure` and `SchemaViolation` are caught at the node boundary and
/// turned into an apology; `MissingPrecondition` never leaves a node;
/// `InvalidSession` and `Store` reject the whole `advance` call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("missing precondition: {0}")]
    MissingPrecondition(String),

    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("session store error: {0}")]
    Store(String),
}
