use thiserror::Error;

/// Failure modes of the report engine. Storage errors are request-fatal;
/// malformed per-record data is recovered locally and never surfaces here.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage query failed: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("failed to render export: {0}")]
    Render(#[from] csv::Error),
}
