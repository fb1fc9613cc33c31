/// Failures surfaced by the completeness query.
#[derive(Debug, thiserror::Error)]
pub enum CompletenessError {
    /// No school year could be resolved from the request.
    #[error("not found: {0}")]
    NotFound(String),

    /// A request parameter could not be interpreted.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, CompletenessError>;
